//! Self-describing record layouts.
//!
//! Each of these records stores an element count (or byte lengths) in a
//! short prefix.  The reader hands [`record_len`](Type101::record_len) that
//! prefix to learn the total size before the rest of the record is read, so
//! filtered scans can skip these records without decoding them.
//!
//! # Length formulas
//! | Type | Prefix | Total bytes |
//! |------|--------|-------------|
//! | 101  | 8      | `40 + 4n` |
//! | 110  | 8      | `44 + 264n` |
//! | 120  | 8      | `40 + k·n`, `k` by lag mode |
//! | 212  | 8      | `16 + (8 or 12)·even(n)` |
//! | 220  | 12     | `12 + width·height` |
//! | 221  | 12     | `12 + padded(ps_len)` |
//! | 222  | 24     | `24 + pad(s) + pad(f) + 8` |
//! | 230  | 8      | `24 + 16n` |

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use std::io::{self, Write};
use tracing::warn;

use super::wire::{layout, read_bytes, read_vec, write_slice, Array, Complex32, Complex64, Text, Wire};
use super::RecordError;
use crate::codec::{self, CodecError};

/// Prefix length shared by most dynamic layouts.
pub const SHORT_PREFIX: usize = 8;
/// Prefix length of the plot records 220 and 221.
pub const PLOT_PREFIX: usize = 12;
/// Prefix length of record 222.
pub const CONTROL_PREFIX: usize = 24;

/// The big-endian `u16` element count at bytes 6..8 of a prefix.
fn count(prefix: &[u8]) -> usize {
    BigEndian::read_u16(&prefix[6..8]) as usize
}

// ── 101: index parameters ────────────────────────────────────────────────────

layout! {
    pub struct Type101Head {
        record_id:   Text<3>,
        record_ver:  Text<2>,
        status:      Text<1>,
        n_blocks:    i16,
        index:       i16,
        primary:     i16,
        chan_id:     Array<Text<8>, 2>,
        corr_board:  i16,
        corr_slot:   i16,
        chan:        Array<i16, 2>,
        post_mortem: i32,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type101 {
    #[serde(flatten)]
    pub head:   Type101Head,
    pub blocks: Vec<i32>,
}

impl Type101 {
    pub fn record_len(prefix: &[u8]) -> Result<usize, RecordError> {
        Ok(Type101Head::SIZE + 4 * count(prefix))
    }

    pub fn decode(buf: &[u8]) -> Result<Self, RecordError> {
        let r = &mut &buf[..];
        let head = Type101Head::read(r)?;
        let blocks = read_vec(r, count(buf))?;
        Ok(Self { head, blocks })
    }

    pub fn encoded_len(&self) -> usize {
        Type101Head::SIZE + 4 * self.blocks.len()
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.head.write(w)?;
        write_slice(w, &self.blocks)
    }
}

// ── 110: lag data, per block ─────────────────────────────────────────────────

layout! {
    pub struct Type110Head {
        record_id:     Text<3>,
        record_ver:    Text<2>,
        unused:        Text<1>,
        n_blocks:      i16,
        unused2:       Text<2>,
        baseline:      Text<2>,
        file_num:      i16,
        root_code:     Text<6>,
        index:         i32,
        ap:            i32,
        flag:          i32,
        status:        i32,
        bitshift:      f32,
        frac_bitshift: f32,
    }

    /// Right- and left-hand correlator cell counts.
    pub struct Cells {
        r: Array<i32, 33>,
        l: Array<i32, 33>,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type110 {
    #[serde(flatten)]
    pub head: Type110Head,
    pub data: Vec<Cells>,
}

impl Type110 {
    pub fn record_len(prefix: &[u8]) -> Result<usize, RecordError> {
        Ok(Type110Head::SIZE + Cells::SIZE * count(prefix))
    }

    pub fn decode(buf: &[u8]) -> Result<Self, RecordError> {
        let r = &mut &buf[..];
        let head = Type110Head::read(r)?;
        let data = read_vec(r, count(buf))?;
        Ok(Self { head, data })
    }

    pub fn encoded_len(&self) -> usize {
        Type110Head::SIZE + Cells::SIZE * self.data.len()
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.head.write(w)?;
        write_slice(w, &self.data)
    }
}

// ── 120: lag data, five sub-formats ──────────────────────────────────────────

layout! {
    pub struct Type120Head {
        record_id:  Text<3>,
        record_ver: Text<2>,
        lag_type:   u8,
        n_lags:     i16,
        baseline:   Text<2>,
        root_code:  Text<6>,
        index:      i32,
        ap:         i32,
        /// Bit pattern of the `f32` weight in spectral records.
        flag:       u32,
        status:     i32,
        fr_delay:   i32,
        delay_rate: i32,
    }

    pub struct CountsPerLag {
        cos_cor:  i32,
        cos_bits: i32,
        sin_cor:  i32,
        sin_bits: i32,
    }

    pub struct LagTag {
        cos_cor: i32,
        sin_cor: i32,
    }

    pub struct AutoPerLag {
        cos_cor:  i32,
        cos_bits: i32,
    }
}

/// The sub-format selected by byte 5 of a type-120 record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagMode {
    CountsPerLag = 1,
    CountsGlobal = 2,
    AutoGlobal   = 3,
    AutoPerLag   = 4,
    Spectral     = 5,
}

impl LagMode {
    pub fn from_byte(mode: u8) -> Result<Self, RecordError> {
        match mode {
            1 => Ok(LagMode::CountsPerLag),
            2 => Ok(LagMode::CountsGlobal),
            3 => Ok(LagMode::AutoGlobal),
            4 => Ok(LagMode::AutoPerLag),
            5 => Ok(LagMode::Spectral),
            _ => Err(RecordError::UnknownSubtype { type_id: 120, mode }),
        }
    }

    /// Bytes following the 40-byte head for `n` lags.
    fn data_len(self, n: usize) -> usize {
        match self {
            LagMode::CountsPerLag => CountsPerLag::SIZE * n,
            LagMode::CountsGlobal => 8 + LagTag::SIZE * n,
            LagMode::AutoGlobal   => 8 + 4 * n,
            LagMode::AutoPerLag   => AutoPerLag::SIZE * n,
            LagMode::Spectral     => Complex32::SIZE * n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LagData {
    CountsPerLag(Vec<CountsPerLag>),
    CountsGlobal { cos_bits: i32, sin_bits: i32, lag_tags: Vec<LagTag> },
    AutoGlobal { cos_bits: i32, unused: Text<4>, cos_cor: Vec<i32> },
    AutoPerLag(Vec<AutoPerLag>),
    Spectral(Vec<Complex32>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type120 {
    #[serde(flatten)]
    pub head: Type120Head,
    pub data: LagData,
}

impl Type120 {
    pub fn record_len(prefix: &[u8]) -> Result<usize, RecordError> {
        let mode = LagMode::from_byte(prefix[5])?;
        Ok(Type120Head::SIZE + mode.data_len(count(prefix)))
    }

    pub fn decode(buf: &[u8]) -> Result<Self, RecordError> {
        let r = &mut &buf[..];
        let head = Type120Head::read(r)?;
        let n = count(buf);
        let data = match LagMode::from_byte(head.lag_type)? {
            LagMode::CountsPerLag => LagData::CountsPerLag(read_vec(r, n)?),
            LagMode::CountsGlobal => LagData::CountsGlobal {
                cos_bits: i32::read(r)?,
                sin_bits: i32::read(r)?,
                lag_tags: read_vec(r, n)?,
            },
            LagMode::AutoGlobal => LagData::AutoGlobal {
                cos_bits: i32::read(r)?,
                unused:   Text::read(r)?,
                cos_cor:  read_vec(r, n)?,
            },
            LagMode::AutoPerLag => LagData::AutoPerLag(read_vec(r, n)?),
            LagMode::Spectral   => LagData::Spectral(read_vec(r, n)?),
        };
        Ok(Self { head, data })
    }

    /// Spectral records store a float weight where the others keep flags.
    pub fn weight(&self) -> Option<f32> {
        match self.data {
            LagData::Spectral(_) => Some(f32::from_bits(self.head.flag)),
            _                    => None,
        }
    }

    pub fn encoded_len(&self) -> usize {
        Type120Head::SIZE + match &self.data {
            LagData::CountsPerLag(v)               => CountsPerLag::SIZE * v.len(),
            LagData::CountsGlobal { lag_tags, .. } => 8 + LagTag::SIZE * lag_tags.len(),
            LagData::AutoGlobal { cos_cor, .. }    => 8 + 4 * cos_cor.len(),
            LagData::AutoPerLag(v)                 => AutoPerLag::SIZE * v.len(),
            LagData::Spectral(v)                   => Complex32::SIZE * v.len(),
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.head.write(w)?;
        match &self.data {
            LagData::CountsPerLag(v) => write_slice(w, v),
            LagData::CountsGlobal { cos_bits, sin_bits, lag_tags } => {
                cos_bits.write(w)?;
                sin_bits.write(w)?;
                write_slice(w, lag_tags)
            }
            LagData::AutoGlobal { cos_bits, unused, cos_cor } => {
                cos_bits.write(w)?;
                unused.write(w)?;
                write_slice(w, cos_cor)
            }
            LagData::AutoPerLag(v) => write_slice(w, v),
            LagData::Spectral(v)   => write_slice(w, v),
        }
    }
}

// ── 212: per-AP phasors ──────────────────────────────────────────────────────

layout! {
    pub struct Type212Head {
        record_id:  Text<3>,
        record_ver: Text<2>,
        unused:     Text<1>,
        n_ap:       i16,
        first_ap:   i16,
        channel:    i16,
        sbd_chan:   i16,
        unused2:    Text<2>,
    }
}

/// Amplitude and phase of one AP; version 01 adds a weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Phasor {
    pub amp:    f32,
    pub phase:  f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type212 {
    #[serde(flatten)]
    pub head: Type212Head,
    pub data: Vec<Phasor>,
}

fn phasor_len(version: &[u8]) -> usize {
    if version == b"00" { 8 } else { 12 }
}

impl Type212 {
    pub fn record_len(prefix: &[u8]) -> Result<usize, RecordError> {
        let n = count(prefix);
        Ok(Type212Head::SIZE + phasor_len(&prefix[3..5]) * (n + n % 2))
    }

    pub fn decode(buf: &[u8]) -> Result<Self, RecordError> {
        let r = &mut &buf[..];
        let head = Type212Head::read(r)?;
        let weighted = phasor_len(&head.record_ver.0) == 12;
        let n = count(buf);
        let data = (0..n + n % 2)
            .map(|_| {
                Ok(Phasor {
                    amp:    f32::read(r)?,
                    phase:  f32::read(r)?,
                    weight: if weighted { Some(f32::read(r)?) } else { None },
                })
            })
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Self { head, data })
    }

    pub fn encoded_len(&self) -> usize {
        Type212Head::SIZE + phasor_len(&self.head.record_ver.0) * self.data.len()
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.head.write(w)?;
        let weighted = phasor_len(&self.head.record_ver.0) == 12;
        for p in &self.data {
            p.amp.write(w)?;
            p.phase.write(w)?;
            if weighted {
                p.weight.unwrap_or(0.0).write(w)?;
            }
        }
        Ok(())
    }
}

// ── 220: fringe plot bitmap ──────────────────────────────────────────────────

layout! {
    pub struct Type220Head {
        record_id:  Text<3>,
        record_ver: Text<2>,
        unused:     Text<3>,
        width:      i16,
        height:     i16,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type220 {
    #[serde(flatten)]
    pub head:  Type220Head,
    pub fplot: Vec<u8>,
}

impl Type220 {
    fn plot_len(prefix: &[u8]) -> usize {
        BigEndian::read_u16(&prefix[8..10]) as usize * BigEndian::read_u16(&prefix[10..12]) as usize
    }

    pub fn record_len(prefix: &[u8]) -> Result<usize, RecordError> {
        Ok(PLOT_PREFIX + Self::plot_len(prefix))
    }

    pub fn decode(buf: &[u8]) -> Result<Self, RecordError> {
        let r = &mut &buf[..];
        let head = Type220Head::read(r)?;
        let fplot = read_bytes(r, Self::plot_len(buf))?;
        Ok(Self { head, fplot })
    }

    pub fn encoded_len(&self) -> usize {
        PLOT_PREFIX + self.fplot.len()
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.head.write(w)?;
        w.write_all(&self.fplot)
    }
}

// ── 221: compressed PostScript plot ──────────────────────────────────────────

layout! {
    pub struct Type221Head {
        record_id:  Text<3>,
        record_ver: Text<2>,
        unused:     Text<1>,
        padded:     i16,
        ps_len:     i32,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type221 {
    #[serde(flatten)]
    pub head:    Type221Head,
    pub ps_plot: Vec<u8>,
}

/// Stored payload size of a type-221 record.
///
/// Padded records round `ps_len` with `c + 10 - ((c - 2) mod 8)`; the
/// result is never below one byte.
pub fn plot_payload_len(ps_len: u32, padded: bool) -> usize {
    let c = ps_len as i64;
    let n = if padded {
        c + 10 - (c - 2).rem_euclid(8)
    } else {
        warn!("type 221 record without padding, payload length taken as stored");
        c
    };
    n.max(1) as usize
}

impl Type221 {
    fn payload_len(prefix: &[u8]) -> usize {
        plot_payload_len(BigEndian::read_u32(&prefix[8..12]), prefix[6..8] != [0, 0])
    }

    pub fn record_len(prefix: &[u8]) -> Result<usize, RecordError> {
        Ok(PLOT_PREFIX + Self::payload_len(prefix))
    }

    pub fn decode(buf: &[u8]) -> Result<Self, RecordError> {
        let r = &mut &buf[..];
        let head = Type221Head::read(r)?;
        let ps_plot = read_bytes(r, Self::payload_len(buf))?;
        Ok(Self { head, ps_plot })
    }

    /// Decompress the embedded PostScript document.
    pub fn plot(&self) -> Result<Vec<u8>, CodecError> {
        let n = (self.head.ps_len.max(0) as usize).min(self.ps_plot.len());
        codec::decompress(&self.ps_plot[..n])
    }

    pub fn encoded_len(&self) -> usize {
        PLOT_PREFIX + self.ps_plot.len()
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.head.write(w)?;
        w.write_all(&self.ps_plot)
    }
}

// ── 222: control file and set string ─────────────────────────────────────────

layout! {
    pub struct Type222Head {
        record_id:        Text<3>,
        record_ver:       Text<2>,
        unused:           Text<1>,
        padded:           i16,
        setstring_hash:   i32,
        control_hash:     i32,
        setstring_length: i32,
        cf_length:        i32,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type222 {
    #[serde(flatten)]
    pub head:      Type222Head,
    #[serde(serialize_with = "serialize_nul_terminated")]
    pub setstring: Vec<u8>,
    #[serde(serialize_with = "serialize_nul_terminated")]
    pub cf:        Vec<u8>,
    pub padding:   Text<8>,
}

fn until_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

fn serialize_nul_terminated<S: serde::Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(until_nul(bytes)))
}

/// Round a stored string length up to 8 bytes plus 8 more.
fn padded_string_len(len: i32) -> i64 {
    ((len as i64 + 7) & !7) + 8
}

impl Type222 {
    fn section_lens(prefix: &[u8]) -> Result<(usize, usize), RecordError> {
        let s = padded_string_len(BigEndian::read_i32(&prefix[16..20]));
        let f = padded_string_len(BigEndian::read_i32(&prefix[20..24]));
        if s < 0 || f < 0 {
            return Err(RecordError::InvalidLength { type_id: 222 });
        }
        Ok((s as usize, f as usize))
    }

    pub fn record_len(prefix: &[u8]) -> Result<usize, RecordError> {
        let (s, f) = Self::section_lens(prefix)?;
        Ok(CONTROL_PREFIX + s + f + 8)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, RecordError> {
        let (s, f) = Self::section_lens(buf)?;
        let r = &mut &buf[..];
        Ok(Self {
            head:      Type222Head::read(r)?,
            setstring: read_bytes(r, s)?,
            cf:        read_bytes(r, f)?,
            padding:   Text::read(r)?,
        })
    }

    /// The fourfit control file text, up to the first NUL.
    pub fn control_file(&self) -> String {
        String::from_utf8_lossy(until_nul(&self.cf)).into_owned()
    }

    /// The fourfit command-line set string, up to the first NUL.
    pub fn set_string(&self) -> String {
        String::from_utf8_lossy(until_nul(&self.setstring)).into_owned()
    }

    pub fn encoded_len(&self) -> usize {
        CONTROL_PREFIX + self.setstring.len() + self.cf.len() + 8
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.head.write(w)?;
        w.write_all(&self.setstring)?;
        w.write_all(&self.cf)?;
        self.padding.write(w)
    }
}

// ── 230: cross-power spectra ─────────────────────────────────────────────────

layout! {
    pub struct Type230Head {
        record_id:  Text<3>,
        record_ver: Text<2>,
        unused:     Text<1>,
        n_spec_pts: i16,
        frq:        i32,
        ap:         i32,
        lsb_weight: f32,
        usb_weight: f32,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type230 {
    #[serde(flatten)]
    pub head:   Type230Head,
    pub xpower: Vec<Complex64>,
}

impl Type230 {
    pub fn record_len(prefix: &[u8]) -> Result<usize, RecordError> {
        warn!("type 230 record layout is untested");
        Ok(Type230Head::SIZE + Complex64::SIZE * count(prefix))
    }

    pub fn decode(buf: &[u8]) -> Result<Self, RecordError> {
        let r = &mut &buf[..];
        let head = Type230Head::read(r)?;
        let xpower = read_vec(r, count(buf))?;
        Ok(Self { head, xpower })
    }

    pub fn encoded_len(&self) -> usize {
        Type230Head::SIZE + Complex64::SIZE * self.xpower.len()
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.head.write(w)?;
        write_slice(w, &self.xpower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn prefix(id: &[u8; 5], byte5: u8, n: u16) -> Vec<u8> {
        let mut p = id.to_vec();
        p.push(byte5);
        p.extend_from_slice(&n.to_be_bytes());
        p
    }

    #[test]
    fn head_sizes() {
        assert_eq!(Type101Head::SIZE, 40);
        assert_eq!(Type110Head::SIZE, 44);
        assert_eq!(Cells::SIZE, 264);
        assert_eq!(Type120Head::SIZE, 40);
        assert_eq!(Type212Head::SIZE, 16);
        assert_eq!(Type220Head::SIZE, PLOT_PREFIX);
        assert_eq!(Type221Head::SIZE, PLOT_PREFIX);
        assert_eq!(Type222Head::SIZE, CONTROL_PREFIX);
        assert_eq!(Type230Head::SIZE, 24);
    }

    #[test]
    fn counted_lengths() {
        assert_eq!(Type101::record_len(&prefix(b"10100", 0, 3)).unwrap(), 52);
        assert_eq!(Type110::record_len(&prefix(b"11000", 0, 2)).unwrap(), 44 + 528);
        assert_eq!(Type230::record_len(&prefix(b"23000", 0, 4)).unwrap(), 24 + 64);
    }

    #[test]
    fn lag_mode_lengths() {
        let expect = [(1u8, 40 + 16 * 10), (2, 48 + 80), (3, 48 + 40), (4, 40 + 80), (5, 40 + 80)];
        for (mode, len) in expect {
            assert_eq!(Type120::record_len(&prefix(b"12000", mode, 10)).unwrap(), len);
        }
        assert!(matches!(
            Type120::record_len(&prefix(b"12000", 6, 10)),
            Err(RecordError::UnknownSubtype { type_id: 120, mode: 6 })
        ));
    }

    #[test]
    fn phasor_count_is_even() {
        assert_eq!(Type212::record_len(&prefix(b"21200", 0, 3)).unwrap(), 16 + 8 * 4);
        assert_eq!(Type212::record_len(&prefix(b"21201", 0, 3)).unwrap(), 16 + 12 * 4);
        assert_eq!(Type212::record_len(&prefix(b"21201", 0, 4)).unwrap(), 16 + 12 * 4);
    }

    #[test]
    fn bitmap_length() {
        let mut p = b"22000\0\0\0".to_vec();
        p.extend_from_slice(&[0, 3, 0, 5]);
        assert_eq!(Type220::record_len(&p).unwrap(), 12 + 15);
    }

    #[test]
    fn plot_padding() {
        assert_eq!(plot_payload_len(2, true), 12);
        assert_eq!(plot_payload_len(9, true), 12);
        assert_eq!(plot_payload_len(10, true), 20);
        assert_eq!(plot_payload_len(0, true), 10 - 6);
        assert_eq!(plot_payload_len(100, false), 100);
        assert_eq!(plot_payload_len(0, false), 1);
    }

    #[test]
    fn plot_record_length() {
        let mut p = b"22100\0\0\x01".to_vec();
        p.extend_from_slice(&17u32.to_be_bytes());
        assert_eq!(Type221::record_len(&p).unwrap(), 12 + 20);
    }

    #[test]
    fn plot_payload_ignores_trailing_bytes() {
        let mut buf = b"22100\0\0\x01".to_vec();
        buf.extend_from_slice(&17u32.to_be_bytes());
        buf.extend_from_slice(&[7u8; 20]);
        buf.extend_from_slice(b"20000");
        let Record::Type221(rec) = crate::record::decode(221, 0, &buf).unwrap() else {
            panic!("not a 221 record")
        };
        assert_eq!(rec.ps_plot, [7u8; 20]);
        assert_eq!(rec.encoded_len(), 32);
    }

    #[test]
    fn control_record_rounding() {
        let mut p = b"22200\0\0\0".to_vec();
        p.extend_from_slice(&[0u8; 8]);
        p.extend_from_slice(&5i32.to_be_bytes());
        p.extend_from_slice(&16i32.to_be_bytes());
        assert_eq!(Type222::record_len(&p).unwrap(), 24 + 16 + 24 + 8);
        p[16..20].copy_from_slice(&(-100i32).to_be_bytes());
        assert!(matches!(Type222::record_len(&p), Err(RecordError::InvalidLength { type_id: 222 })));
    }

    #[test]
    fn control_record_strings() {
        let mut buf = b"22200\0\0\0".to_vec();
        buf.extend_from_slice(&[0u8; 8]);
        buf.extend_from_slice(&3i32.to_be_bytes());
        buf.extend_from_slice(&4i32.to_be_bytes());
        buf.extend_from_slice(b"-m1\0\0\0\0\0\0\0\0\0\0\0\0\0");
        buf.extend_from_slice(b"if x\0garbage\0\0\0\0");
        buf.extend_from_slice(&[0u8; 8]);
        let rec = Type222::decode(&buf).unwrap();
        assert_eq!(rec.set_string(), "-m1");
        assert_eq!(rec.control_file(), "if x");
        let mut out = Vec::new();
        rec.write(&mut out).unwrap();
        assert_eq!(out, buf);
        assert_eq!(rec.encoded_len(), buf.len());
    }

    #[test]
    fn spectral_weight() {
        let mut buf = prefix(b"12000", 5, 1);
        buf.extend_from_slice(b"ABcodeAB");
        buf.extend_from_slice(&[0u8; 8]);
        buf.extend_from_slice(&0.75f32.to_bits().to_be_bytes());
        buf.extend_from_slice(&[0u8; 12]);
        buf.extend_from_slice(&1.0f32.to_be_bytes());
        buf.extend_from_slice(&(-1.0f32).to_be_bytes());
        let rec = Type120::decode(&buf).unwrap();
        assert_eq!(rec.weight(), Some(0.75));
        assert_eq!(rec.data, LagData::Spectral(vec![Complex32 { re: 1.0, im: -1.0 }]));
        assert_eq!(rec.encoded_len(), buf.len());
    }

    #[test]
    fn phasor_round_trip() {
        let mut buf = prefix(b"21201", 0, 1);
        buf.extend_from_slice(&[0u8; 8]);
        for v in [1.0f32, 2.0, 0.5, 0.0, 0.0, 0.0] {
            buf.extend_from_slice(&v.to_be_bytes());
        }
        let rec = Type212::decode(&buf).unwrap();
        assert_eq!(rec.data.len(), 2);
        assert_eq!(rec.data[0].weight, Some(0.5));
        let mut out = Vec::new();
        rec.write(&mut out).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn stored_plot_decompresses() {
        let mut buf = b"22100\0\0\x01".to_vec();
        buf.extend_from_slice(&7u32.to_be_bytes());
        buf.extend_from_slice(&[1, 0, 0, 0, b'%', b'!', b'P']);
        buf.resize(Type221::record_len(&buf[..12]).unwrap(), 0);
        let rec = Type221::decode(&buf).unwrap();
        assert_eq!(rec.plot().unwrap(), b"%!P");
    }
}
