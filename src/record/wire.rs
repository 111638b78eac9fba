//! Big-endian field codec shared by every record layout.
//!
//! Every on-disk field type implements [`Wire`]: a compile-time byte size plus
//! a read and a write that reproduce the bytes exactly.  Text fields keep their
//! raw bytes (NUL padding included) and floats go through their bit patterns,
//! so decoding and re-encoding a record is byte-identical.
//!
//! The [`layout!`] macro declares a fixed-size structure from an ordered field
//! list and derives its [`Wire`] implementation.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt;
use std::io::{self, Read, Write};

pub trait Wire: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;
    fn read<R: Read>(r: &mut R) -> io::Result<Self>;
    fn write<W: Write>(&self, w: &mut W) -> io::Result<()>;
}

macro_rules! wire_number {
    ($ty:ty, $read:ident, $write:ident) => {
        impl Wire for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();
            fn read<R: Read>(r: &mut R) -> io::Result<Self> {
                r.$read::<BigEndian>()
            }
            fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
                w.$write::<BigEndian>(*self)
            }
        }
    };
}

impl Wire for u8 {
    const SIZE: usize = 1;
    fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        r.read_u8()
    }
    fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(*self)
    }
}

wire_number!(i16, read_i16, write_i16);
wire_number!(u16, read_u16, write_u16);
wire_number!(i32, read_i32, write_i32);
wire_number!(u32, read_u32, write_u32);
wire_number!(f32, read_f32, write_f32);
wire_number!(f64, read_f64, write_f64);

/// Declare a fixed-size big-endian structure.
///
/// ```ignore
/// layout! {
///     /// Doc comment.
///     pub struct Pair { a: i16, b: f32 }
/// }
/// ```
macro_rules! layout {
    ($(
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    )*) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl $crate::record::wire::Wire for $name {
            const SIZE: usize = 0 $( + <$ty as $crate::record::wire::Wire>::SIZE )*;

            fn read<R: std::io::Read>(r: &mut R) -> std::io::Result<Self> {
                Ok(Self {
                    $( $field: <$ty as $crate::record::wire::Wire>::read(r)?, )*
                })
            }

            fn write<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
                $( $crate::record::wire::Wire::write(&self.$field, w)?; )*
                Ok(())
            }
        }
    )*};
}
pub(crate) use layout;

// ── Text ─────────────────────────────────────────────────────────────────────

/// Fixed-width character field, NUL padded on disk.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Text<const N: usize>(pub [u8; N]);

impl<const N: usize> Text<N> {
    /// Bytes with trailing NULs stripped.
    pub fn trimmed(&self) -> &[u8] {
        let end = self.0.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        &self.0[..end]
    }

    /// Bytes before the first NUL.
    pub fn until_nul(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(N);
        &self.0[..end]
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.trimmed()).into_owned()
    }

    /// Overwrite with `value`, truncated to the field width and NUL padded.
    pub fn set(&mut self, value: &[u8]) {
        let n = value.len().min(N);
        self.0 = [0u8; N];
        self.0[..n].copy_from_slice(&value[..n]);
    }
}

impl<const N: usize> Default for Text<N> {
    fn default() -> Self {
        Self([0u8; N])
    }
}

impl<const N: usize> Wire for Text<N> {
    const SIZE: usize = N;

    fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; N];
        r.read_exact(&mut buf)?;
        Ok(Self(buf))
    }

    fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.0)
    }
}

impl<const N: usize> fmt::Debug for Text<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl<const N: usize> Serialize for Text<N> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string_lossy())
    }
}

// ── Array ────────────────────────────────────────────────────────────────────

/// `N` consecutive values of `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct Array<T, const N: usize>(pub Vec<T>);

impl<T, const N: usize> Array<T, N> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T, const N: usize> std::ops::Deref for Array<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T, const N: usize> std::ops::DerefMut for Array<T, N> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.0
    }
}

impl<T: Wire, const N: usize> Wire for Array<T, N> {
    const SIZE: usize = N * T::SIZE;

    fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        (0..N).map(|_| T::read(r)).collect::<io::Result<Vec<_>>>().map(Array)
    }

    fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        if self.0.len() != N {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, format!(
                "fixed array holds {} values, layout needs {N}", self.0.len()
            )));
        }
        self.0.iter().try_for_each(|v| v.write(w))
    }
}

impl<T: Serialize, const N: usize> Serialize for Array<T, N> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(self.0.len()))?;
        for v in &self.0 {
            seq.serialize_element(v)?;
        }
        seq.end()
    }
}

/// Read `count` values of a variable-length trailing array.
pub fn read_vec<T: Wire, R: Read>(r: &mut R, count: usize) -> io::Result<Vec<T>> {
    (0..count).map(|_| T::read(r)).collect()
}

/// Write every value of a variable-length trailing array.
pub fn write_slice<T: Wire, W: Write>(w: &mut W, values: &[T]) -> io::Result<()> {
    values.iter().try_for_each(|v| v.write(w))
}

/// Raw byte payload of a variable-length record.
pub fn read_bytes<R: Read>(r: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

// ── Shared sub-structures ────────────────────────────────────────────────────

layout! {
    /// `record_id`, `record_ver` and three spare bytes that open every fixed
    /// layout.
    pub struct RecordStart {
        record_id:  Text<3>,
        record_ver: Text<2>,
        unused:     Text<3>,
    }

    /// Start of the correlator records that belong to one accumulation period.
    pub struct ApStart {
        record_id:  Text<3>,
        record_ver: Text<2>,
        unused:     Text<3>,
        baseline:   Text<2>,
        root_code:  Text<6>,
        index:      u32,
        ap:         u32,
    }

    /// Year, day-of-year and time of day.
    pub struct Date {
        year:   i16,
        day:    i16,
        hour:   i16,
        minute: i16,
        second: f32,
    }

    pub struct SkyCoord {
        ra_hr:   i16,
        ra_min:  i16,
        ra_sec:  f32,
        dec_deg: i16,
        dec_min: i16,
        dec_sec: f32,
    }

    pub struct Complex32 {
        re: f32,
        im: f32,
    }

    pub struct Complex64 {
        re: f64,
        im: f64,
    }
}

impl Date {
    /// Convert to a calendar time.  Seconds are rounded to the microsecond.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        let micros = (self.second as f64 * 1e6).round() as i64;
        let start = NaiveDate::from_ymd_opt(self.year as i32, 1, 1)?.and_hms_opt(0, 0, 0)?;
        let offset = Duration::try_days(self.day as i64 - 1)?
            + Duration::try_seconds(3600 * self.hour as i64 + 60 * self.minute as i64)?
            + Duration::microseconds(micros);
        start.checked_add_signed(offset)
    }

    pub fn from_datetime(t: &NaiveDateTime) -> Self {
        let micros = t.nanosecond() / 1_000;
        Self {
            year:   t.year() as i16,
            day:    t.ordinal() as i16,
            hour:   t.hour() as i16,
            minute: t.minute() as i16,
            second: ((t.second() as f64 * 1e6 + micros as f64) / 1e6) as f32,
        }
    }
}

const HEADER_DATE_FMT: &str = "%Y%j-%H%M%S";

/// Parse the `yyyyddd-HHMMSS` date of a type-000 record, which version 0
/// wraps in spaces and version 1 pads with NULs.
pub fn parse_header_date(field: &[u8]) -> Option<NaiveDateTime> {
    let body = match field.first() {
        Some(b' ') => field.get(1..15)?,
        _          => field.get(0..14)?,
    };
    NaiveDateTime::parse_from_str(std::str::from_utf8(body).ok()?, HEADER_DATE_FMT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    layout! {
        pub struct Sample {
            tag:    Text<2>,
            count:  i16,
            values: Array<u32, 3>,
            nested: Array<Array<f32, 2>, 2>,
        }
    }

    #[test]
    fn layout_size_is_sum_of_fields() {
        assert_eq!(Sample::SIZE, 2 + 2 + 12 + 16);
        assert_eq!(RecordStart::SIZE, 8);
        assert_eq!(ApStart::SIZE, 24);
        assert_eq!(Date::SIZE, 12);
        assert_eq!(SkyCoord::SIZE, 16);
    }

    #[test]
    fn big_endian_round_trip() {
        let bytes: Vec<u8> = [
            &b"AB"[..],
            &[0xff, 0xfe],
            &[0, 0, 0, 1, 0, 0, 1, 0, 0x80, 0, 0, 0],
            &1.5f32.to_be_bytes(),
            &(-2.0f32).to_be_bytes(),
            &f32::NAN.to_be_bytes(),
            &0.25f32.to_be_bytes(),
        ]
        .concat();
        let s = Sample::read(&mut &bytes[..]).unwrap();
        assert_eq!(s.tag.trimmed(), b"AB");
        assert_eq!(s.count, -2);
        assert_eq!(*s.values, [1, 256, 0x8000_0000]);
        assert_eq!(s.nested[0][1], -2.0);
        let mut out = Vec::new();
        s.write(&mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn text_trimming() {
        let t = Text::<6>(*b"ab\0c\0\0");
        assert_eq!(t.trimmed(), b"ab\0c");
        assert_eq!(t.until_nul(), b"ab");
        let mut t = Text::<4>::default();
        t.set(b"toolong");
        assert_eq!(&t.0, b"tool");
        t.set(b"x");
        assert_eq!(&t.0, b"x\0\0\0");
    }

    #[test]
    fn date_conversion() {
        let d = Date { year: 2020, day: 32, hour: 13, minute: 5, second: 7.5 };
        let t = d.to_datetime().unwrap();
        assert_eq!(t.to_string(), "2020-02-01 13:05:07.500");
        assert_eq!(Date::from_datetime(&t), d);
    }

    #[test]
    fn header_dates() {
        let v0 = b" 2021123-041500 ";
        let v1 = b"2021123-041500\0\0";
        let t = parse_header_date(v0).unwrap();
        assert_eq!(parse_header_date(v1), Some(t));
        assert_eq!(t.to_string(), "2021-05-03 04:15:00");
        assert_eq!(parse_header_date(b"                "), None);
    }
}
