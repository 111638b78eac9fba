//! Record layout registry.
//!
//! Every Mk4 record opens with a 5-byte ASCII header: a 3-digit type id and a
//! 2-digit version.  The pair selects one [`Layout`]: either a fixed size, or
//! a [`DynamicKind`] whose total length is computed from a short prefix.
//!
//! Decoded records are held in the closed [`Record`] enum, one variant per
//! on-disk structure.  Encoding a decoded record reproduces its bytes exactly.

pub mod dynamic;
pub mod fixed;
pub mod wire;

use serde::Serialize;
use std::io::{self, Write};
use thiserror::Error;

pub use dynamic::*;
pub use fixed::*;
use wire::{Text, Wire};

/// Length of the ASCII type/version header.
pub const HEADER_LEN: usize = 5;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record {type_id:03} truncated: needs {expected} bytes, {available} available")]
    TruncatedRecord { type_id: u16, expected: usize, available: usize },
    #[error("Unsupported record type {type_id:03} version {version:02}")]
    UnsupportedRecordType { type_id: u16, version: u8 },
    #[error("Unknown record {type_id:03} sub-format {mode}")]
    UnknownSubtype { type_id: u16, mode: u8 },
    #[error("Missing record(s): {ids}")]
    MissingRecord { ids: String },
    #[error("Invalid record header: {0:?}")]
    InvalidHeader(String),
    #[error("Record {type_id:03} declares a negative length")]
    InvalidLength { type_id: u16 },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Parse the ASCII `TTTVV` header into a type id and version.
pub fn parse_header(header: &[u8]) -> Result<(u16, u8), RecordError> {
    let invalid = || RecordError::InvalidHeader(String::from_utf8_lossy(header).into_owned());
    if header.len() != HEADER_LEN || !header.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    let type_id = header[..3].iter().fold(0u16, |acc, &d| acc * 10 + (d - b'0') as u16);
    let version = header[3..].iter().fold(0u8, |acc, &d| acc * 10 + (d - b'0'));
    Ok((type_id, version))
}

// ── Layout descriptors ───────────────────────────────────────────────────────

/// How many bytes one record occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Fixed(usize),
    Dynamic(DynamicKind),
}

/// The self-describing record families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicKind {
    IndexParams,
    LagBlocks,
    Lags,
    Phasors,
    Bitmap,
    Plot,
    ControlFile,
    CrossPower,
}

impl DynamicKind {
    /// Bytes needed before the total length is known.
    pub fn prefix_len(self) -> usize {
        match self {
            DynamicKind::Bitmap | DynamicKind::Plot => PLOT_PREFIX,
            DynamicKind::ControlFile               => CONTROL_PREFIX,
            _                                      => SHORT_PREFIX,
        }
    }

    /// Total record length given its first [`prefix_len`](Self::prefix_len)
    /// bytes.
    pub fn record_len(self, prefix: &[u8]) -> Result<usize, RecordError> {
        match self {
            DynamicKind::IndexParams => Type101::record_len(prefix),
            DynamicKind::LagBlocks   => Type110::record_len(prefix),
            DynamicKind::Lags        => Type120::record_len(prefix),
            DynamicKind::Phasors     => Type212::record_len(prefix),
            DynamicKind::Bitmap      => Type220::record_len(prefix),
            DynamicKind::Plot        => Type221::record_len(prefix),
            DynamicKind::ControlFile => Type222::record_len(prefix),
            DynamicKind::CrossPower  => Type230::record_len(prefix),
        }
    }
}

impl Layout {
    pub fn prefix_len(self) -> usize {
        match self {
            Layout::Fixed(size)   => size,
            Layout::Dynamic(kind) => kind.prefix_len(),
        }
    }

    pub fn record_len(self, prefix: &[u8]) -> Result<usize, RecordError> {
        match self {
            Layout::Fixed(size)   => Ok(size),
            Layout::Dynamic(kind) => kind.record_len(prefix),
        }
    }
}

// ── Record table ─────────────────────────────────────────────────────────────

macro_rules! record_table {
    (
        fixed {
            $( ($fid:literal, $fver:pat) => $fvar:ident . $fstart:ident, )*
        }
        dynamic {
            $( ($did:literal, $dver:pat) => $dvar:ident : $kind:ident, )*
        }
    ) => {
        /// One decoded record.
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(untagged)]
        pub enum Record {
            $( $fvar($fvar), )*
            $( $dvar($dvar), )*
        }

        /// Resolve the layout of a `(type, version)` pair.
        pub fn layout(type_id: u16, version: u8) -> Result<Layout, RecordError> {
            match (type_id, version) {
                $( ($fid, $fver) => Ok(Layout::Fixed(<$fvar as Wire>::SIZE)), )*
                $( ($did, $dver) => Ok(Layout::Dynamic(DynamicKind::$kind)), )*
                _ => Err(RecordError::UnsupportedRecordType { type_id, version }),
            }
        }

        /// Decode one complete record from `buf`.
        pub fn decode(type_id: u16, version: u8, buf: &[u8]) -> Result<Record, RecordError> {
            let layout = layout(type_id, version)?;
            let prefix = layout.prefix_len();
            if buf.len() < prefix {
                return Err(RecordError::TruncatedRecord { type_id, expected: prefix, available: buf.len() });
            }
            let expected = layout.record_len(buf)?;
            if buf.len() < expected {
                return Err(RecordError::TruncatedRecord { type_id, expected, available: buf.len() });
            }
            match (type_id, version) {
                $( ($fid, $fver) => Ok(Record::$fvar(<$fvar as Wire>::read(&mut &buf[..])?)), )*
                $( ($did, $dver) => Ok(Record::$dvar($dvar::decode(buf)?)), )*
                _ => Err(RecordError::UnsupportedRecordType { type_id, version }),
            }
        }

        impl Record {
            pub fn type_id(&self) -> u16 {
                match self {
                    $( Record::$fvar(_) => $fid, )*
                    $( Record::$dvar(_) => $did, )*
                }
            }

            fn record_ver(&self) -> &Text<2> {
                match self {
                    $( Record::$fvar(r) => &r.$fstart.record_ver, )*
                    $( Record::$dvar(r) => &r.head.record_ver, )*
                }
            }

            /// Bytes this record occupies when encoded.
            pub fn encoded_len(&self) -> usize {
                match self {
                    $( Record::$fvar(_) => <$fvar as Wire>::SIZE, )*
                    $( Record::$dvar(r) => r.encoded_len(), )*
                }
            }

            pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
                match self {
                    $( Record::$fvar(r) => Wire::write(r, w), )*
                    $( Record::$dvar(r) => r.write(w), )*
                }
            }
        }
    };
}

record_table! {
    fixed {
        (0, 0 | 1)   => Type000.head,
        (100, 0)     => Type100.head,
        (130, 0)     => Type130.ap,
        (131, 0)     => Type131.ap,
        (141, 0)     => Type141.ap,
        (142, 0)     => Type142.ap,
        (143, 0)     => Type143.ap,
        (144, 0)     => Type144.ap,
        (150, 0)     => Type150.ap,
        (200, 0)     => Type200.head,
        (201, 0)     => Type201.head,
        (202, 0)     => Type202.head,
        (203, 0)     => Type203V0.head,
        (203, 1)     => Type203V1.head,
        (204, 0)     => Type204.head,
        (205, 0)     => Type205V0.head,
        (205, 1)     => Type205V1.head,
        (206, 0)     => Type206V0.head,
        (206, 1)     => Type206V1.head,
        (206, 2)     => Type206V2.head,
        (207, 0)     => Type207V0.head,
        (207, 1)     => Type207V1.head,
        (207, 2)     => Type207V2.head,
        (208, 0)     => Type208V0.head,
        (208, 1)     => Type208V1.head,
        (210, 0)     => Type210V0.head,
        (210, 1)     => Type210V1.head,
        (300, 0)     => Type300.head,
        (301, 0)     => Type301.head,
        (302, 0)     => Type302.head,
        (303, 0)     => Type303.head,
        (304, 0)     => Type304.head,
        (306, 0)     => Type306.head,
        (307, 0)     => Type307.head,
        (308, 0)     => Type308.head,
        (309, 0)     => Type309V0.head,
        (309, 1)     => Type309V1.head,
    }
    dynamic {
        (101, 0)     => Type101: IndexParams,
        (110, 0)     => Type110: LagBlocks,
        (120, 0)     => Type120: Lags,
        (212, 0 | 1) => Type212: Phasors,
        (220, 0)     => Type220: Bitmap,
        (221, 0)     => Type221: Plot,
        (222, 0)     => Type222: ControlFile,
        (230, 0)     => Type230: CrossPower,
    }
}

impl Record {
    /// Version number from the record's own header.
    pub fn version(&self) -> u8 {
        self.record_ver()
            .0
            .iter()
            .fold(0u8, |acc, &d| acc.wrapping_mul(10).wrapping_add(d.wrapping_sub(b'0')))
    }

    /// The `root_code` field carried by correlator records.
    pub fn root_code(&self) -> Option<&Text<6>> {
        match self {
            Record::Type110(r) => Some(&r.head.root_code),
            Record::Type120(r) => Some(&r.head.root_code),
            Record::Type130(r) => Some(&r.ap.root_code),
            Record::Type131(r) => Some(&r.ap.root_code),
            Record::Type141(r) => Some(&r.ap.root_code),
            Record::Type142(r) => Some(&r.ap.root_code),
            Record::Type143(r) => Some(&r.ap.root_code),
            Record::Type144(r) => Some(&r.ap.root_code),
            Record::Type150(r) => Some(&r.ap.root_code),
            _                  => None,
        }
    }

    pub fn root_code_mut(&mut self) -> Option<&mut Text<6>> {
        match self {
            Record::Type110(r) => Some(&mut r.head.root_code),
            Record::Type120(r) => Some(&mut r.head.root_code),
            Record::Type130(r) => Some(&mut r.ap.root_code),
            Record::Type131(r) => Some(&mut r.ap.root_code),
            Record::Type141(r) => Some(&mut r.ap.root_code),
            Record::Type142(r) => Some(&mut r.ap.root_code),
            Record::Type143(r) => Some(&mut r.ap.root_code),
            Record::Type144(r) => Some(&mut r.ap.root_code),
            Record::Type150(r) => Some(&mut r.ap.root_code),
            _                  => None,
        }
    }

    /// The file name stored in the file header (000) or correlation
    /// header (100), whose extension is a root code.
    pub fn embedded_name_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Record::Type000(r) => Some(&mut r.name.0[..]),
            Record::Type100(r) => Some(&mut r.rootname.0[..]),
            _                  => None,
        }
    }
}
