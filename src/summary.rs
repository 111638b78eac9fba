//! Fringe-file summary: the handful of facts most tools want from a fringe
//! file without walking every record.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Read;
use thiserror::Error;

use crate::io_stream::{records, Collect, RecordSet};
use crate::record::wire::parse_header_date;
use crate::record::{ChannelDef, FfitChan, Record, RecordError, Type200, Type201, Type202};

/// Record types a summary is built from.
pub const SUMMARY_RECORDS: [u16; 7] = [0, 200, 201, 202, 203, 205, 208];

const CROSS_HANDS: [&str; 4] = ["XX", "YY", "XY", "YX"];

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("Inconsistent polarizations: {0}")]
    Inconsistent(String),
    #[error("Malformed fringe file: {0}")]
    Malformed(String),
}

fn channels(set: &RecordSet) -> Option<&[ChannelDef]> {
    match set.first(203)? {
        Record::Type203V0(r) => Some(&r.channels[..]),
        Record::Type203V1(r) => Some(&r.channels[..]),
        _                    => None,
    }
}

fn ffit_chans(set: &RecordSet) -> Option<&[FfitChan]> {
    match set.first(205)? {
        Record::Type205V0(r) => Some(&r.ffit_chans[..]),
        Record::Type205V1(r) => Some(&r.ffit_chans[..]),
        _                    => None,
    }
}

fn channel<'a>(chans: &'a [ChannelDef], index: i16) -> Result<&'a ChannelDef, SummaryError> {
    chans.get(index as usize).ok_or_else(|| {
        SummaryError::Malformed(format!("fourfit channel refers to missing channel {index}"))
    })
}

/// Polarization products named by the fourfit `-P` flag in a version-1
/// type-208 record.
fn flagged_polarizations(unused: &[u8; 3]) -> BTreeSet<String> {
    let mut pols = BTreeSet::new();
    match unused[1] {
        b'_' => {
            pols.insert("I".to_owned());
        }
        b'@' => {
            if let pass @ b'@'..=b'C' = unused[0] {
                pols.insert(CROSS_HANDS[(pass - b'@') as usize].to_owned());
            }
        }
        flags if flags & 0b1_0000 == 0 => {
            for (bit, pol) in CROSS_HANDS.iter().enumerate() {
                if flags & (1 << bit) != 0 {
                    pols.insert((*pol).to_owned());
                }
            }
        }
        _ => {}
    }
    pols
}

/// Every polarization product present in a fringe file.
///
/// The reference/remote polarizations of the channels fourfit used (records
/// 203 and 205) take precedence over the type-208 flags when both records
/// are present.
pub fn polarizations(set: &RecordSet) -> Result<BTreeSet<String>, SummaryError> {
    let mut pols = match set.first(208) {
        Some(Record::Type208V1(r)) => flagged_polarizations(&r.head.unused.0),
        _                          => BTreeSet::new(),
    };
    if let (Some(chans), Some(ffit)) = (channels(set), ffit_chans(set)) {
        let used: BTreeSet<i16> = ffit.iter().flat_map(|f| f.chans.iter().copied()).filter(|&j| j >= 0).collect();
        pols = used
            .into_iter()
            .map(|j| {
                let pol = &channel(chans, j)?.polarization;
                Ok(String::from_utf8_lossy(&[pol[0].0[0], pol[1].0[0]]).into_owned())
            })
            .collect::<Result<_, SummaryError>>()?;
    }
    Ok(pols)
}

/// The fringe file's single polarization product.
pub fn polarization(set: &RecordSet) -> Result<String, SummaryError> {
    let pols = polarizations(set)?;
    let mut iter = pols.iter();
    match (iter.next(), iter.next()) {
        (Some(pol), None) => Ok(pol.clone()),
        (None, _)         => Err(SummaryError::Malformed("no polarization found".to_owned())),
        _                 => Err(SummaryError::Inconsistent(pols.into_iter().collect::<Vec<_>>().join(", "))),
    }
}

/// Basic facts about one fringe file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FringeSummary {
    pub experiment:    String,
    pub number:        i32,
    pub scan:          String,
    /// Baseline as 1-character station ids.
    pub baseline:      String,
    /// Baseline as 2-character station ids.
    pub stations:      String,
    pub station_names: String,
    pub bands:         String,
    pub polarization:  String,
    pub root:          String,
    pub run:           u64,
    pub source:        String,
    pub time:          Option<NaiveDateTime>,
    /// When fourfit wrote the file, from the file header.
    pub created:       Option<NaiveDateTime>,
    pub error_code:    String,
    pub quality:       u32,
    /// The file name the fringe file records for itself.
    pub name:          String,
}

fn text_or(bytes: &[u8], fallback: &str) -> String {
    let s = String::from_utf8_lossy(bytes).trim().to_owned();
    if s.is_empty() { fallback.to_owned() } else { s }
}

macro_rules! required {
    ($set:expr, $id:literal, $($variant:ident)|+) => {
        match $set.first($id) {
            $( Some(Record::$variant(r)) => r, )+
            _ => return Err(RecordError::MissingRecord { ids: $id.to_string() }.into()),
        }
    };
}

impl FringeSummary {
    /// Read just the records a summary needs from `reader`.
    pub fn read<R: Read>(reader: R) -> Result<Self, SummaryError> {
        let set = records(reader, Some(&SUMMARY_RECORDS[..]), Collect::First, true)?;
        Self::from_records(&set)
    }

    pub fn from_records(set: &RecordSet) -> Result<Self, SummaryError> {
        let header = required!(set, 0, Type000);
        let t200: &Type200 = required!(set, 200, Type200);
        let t201: &Type201 = required!(set, 201, Type201);
        let t202: &Type202 = required!(set, 202, Type202);
        let (quality, errcode) = match set.first(208) {
            Some(Record::Type208V0(r)) => (r.quality, r.errcode),
            Some(Record::Type208V1(r)) => (r.quality, r.errcode),
            _ => return Err(RecordError::MissingRecord { ids: "208".to_owned() }.into()),
        };

        let name = String::from_utf8_lossy(header.name.until_nul()).trim().to_owned();
        let base = name.rsplit('/').next().unwrap_or_default();
        let parts: Vec<&str> = base.split('.').collect();
        let root = text_or(parts.last().copied().unwrap_or_default().as_bytes(), "??????");
        let run = match parts.len() {
            n if n > 1 => parts[n - 2].trim().parse().unwrap_or(0),
            _          => 0,
        };

        let mut bands = BTreeSet::new();
        if let (Some(chans), Some(ffit)) = (channels(set), ffit_chans(set)) {
            for f in ffit.iter().filter(|f| !f.id.trimmed().trim_ascii().is_empty()) {
                for &j in f.chans.iter().filter(|&&j| j >= 0) {
                    for id in channel(chans, j)?.chan_id.iter() {
                        if let Some(&b) = id.trimmed().first() {
                            bands.insert(b as char);
                        }
                    }
                }
            }
        }

        let quality = match quality.trimmed().trim_ascii() {
            []  => 0,
            [d] if d.is_ascii_digit() => (d - b'0') as u32,
            other => {
                return Err(SummaryError::Malformed(format!(
                    "quality code {:?}", String::from_utf8_lossy(other)
                )))
            }
        };

        Ok(Self {
            experiment:    text_or(t200.experiment_name.trimmed(), "?"),
            number:        t200.experiment_number,
            scan:          text_or(t200.scan_name.trimmed(), "?"),
            baseline:      text_or(t202.baseline.trimmed(), "??"),
            stations:      t202.station_id.iter().map(|s| s.to_string_lossy()).collect::<Vec<_>>().join("-"),
            station_names: t202.station_name.iter().map(|s| s.to_string_lossy()).collect::<Vec<_>>().join("--"),
            bands:         bands.into_iter().collect(),
            polarization:  {
                let pols = polarizations(set)?;
                if pols.is_empty() { "?".to_owned() } else { pols.into_iter().collect::<Vec<_>>().join(",") }
            },
            root,
            run,
            source:        text_or(t201.source.trimmed(), "?"),
            time:          t200.scan_time.to_datetime(),
            created:       parse_header_date(&header.date.0),
            error_code:    String::from_utf8_lossy(errcode.trimmed().trim_ascii()).into_owned(),
            quality,
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Type203V0, Type205V0, Type208V1};
    use crate::record::wire::Wire;

    fn blank(id: &[u8; 5], size: usize) -> Vec<u8> {
        let mut b = id.to_vec();
        b.resize(size, 0);
        b
    }

    fn with_208(unused: [u8; 3]) -> RecordSet {
        let mut buf = blank(b"20801", Type208V1::SIZE);
        buf[5..8].copy_from_slice(&unused);
        records(&buf[..], None, Collect::First, true).unwrap()
    }

    #[test]
    fn fourfit_flags() {
        assert_eq!(polarizations(&with_208([0, b'_', 0])).unwrap(), BTreeSet::from(["I".to_owned()]));
        let pols = polarizations(&with_208([0, 0b0101, 0])).unwrap();
        assert_eq!(pols.into_iter().collect::<Vec<_>>(), ["XX", "XY"]);
        assert!(polarizations(&with_208([0, 0b1_0001, 0])).unwrap().is_empty());
        assert_eq!(polarization(&with_208([b'B', b'@', 0])).unwrap(), "XY");
    }

    #[test]
    fn inconsistent_polarization() {
        let err = polarization(&with_208([0, 0b0011, 0])).unwrap_err();
        assert!(matches!(err, SummaryError::Inconsistent(ref s) if s == "XX, YY"));
    }

    #[test]
    fn channel_join_takes_precedence() {
        let mut t203 = blank(b"20300", Type203V0::SIZE);
        // channel 1: polarization "RL"
        let ch1 = 8 + ChannelDef::SIZE;
        t203[ch1 + 6..ch1 + 8].copy_from_slice(b"RL");
        let mut t205 = blank(b"20500", Type205V0::SIZE);
        let ffit = Type205V0::SIZE - 16 * FfitChan::SIZE;
        t205[ffit] = b'a';
        t205[ffit + 2..ffit + 10].copy_from_slice(&[0, 1, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
        for f in 1..16 {
            let at = ffit + f * FfitChan::SIZE + 2;
            t205[at..at + 8].copy_from_slice(&[0xff; 8]);
        }
        let data = [t203, t205, blank(b"20801", Type208V1::SIZE)].concat();
        let set = records(&data[..], None, Collect::First, true).unwrap();
        assert_eq!(polarization(&set).unwrap(), "RL");
    }

    #[test]
    fn summary_from_minimal_file() {
        let mut t000 = blank(b"00000", 64);
        t000[8..24].copy_from_slice(b" 2021123-041500 ");
        t000[24..38].copy_from_slice(b"GE.X.12.ABCDEF");
        let mut t208 = blank(b"20801", Type208V1::SIZE);
        t208[5..8].copy_from_slice(&[0, b'_', 0]);
        let data = [
            t000,
            blank(b"20000", Type200::SIZE),
            blank(b"20100", Type201::SIZE),
            blank(b"20200", Type202::SIZE),
            t208,
        ]
        .concat();

        let summary = FringeSummary::read(&data[..]).unwrap();
        assert_eq!(summary.name, "GE.X.12.ABCDEF");
        assert_eq!(summary.root, "ABCDEF");
        assert_eq!(summary.run, 12);
        assert_eq!(summary.polarization, "I");
        assert_eq!(summary.quality, 0);
        assert_eq!(summary.experiment, "?");
        let created = summary.created.unwrap();
        assert_eq!(created.to_string(), "2021-05-03 04:15:00");
    }

    #[test]
    fn summary_needs_its_records() {
        let data = blank(b"20000", Type200::SIZE);
        assert!(matches!(
            FringeSummary::read(&data[..]),
            Err(SummaryError::Record(RecordError::MissingRecord { .. }))
        ));
    }
}
