//! Root codes: the 6-character session timestamps embedded in Mk4 file names
//! and in several record fields.
//!
//! A root code counts fixed-duration ticks (usually 4 s) since an epoch.  Two
//! alphabets exist and are never mixed within one code:
//!
//! | Alphabet | Digits | Base | Range |
//! |----------|--------|------|-------|
//! | current  | `0-9A-Z` for all six | 36 | `0 .. 36^6` |
//! | legacy   | `a-z{\|}~` for the first, `a-z` for the other five | 26 | `0 .. 30 * 26^5` |
//!
//! The first character selects the alphabet: anything below `'a'` is current.
//! The most-significant digit comes first.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of characters in every root code.
pub const ROOT_CODE_LEN: usize = 6;

const CURRENT_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LEGACY_DIGITS:  &[u8; 30] = b"abcdefghijklmnopqrstuvwxyz{|}~";
const LEGACY_BASE:    u64 = 26;
const CURRENT_BASE:   u64 = 36;

/// Exclusive upper bound of the current alphabet.
pub const CURRENT_LIMIT: u64 = 2_176_782_336; // 36^6
/// Exclusive upper bound of the legacy alphabet.
pub const LEGACY_LIMIT:  u64 = 356_441_280; // 30 * 26^5

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RootCodeError {
    #[error("Invalid root code: {0:?}")]
    InvalidFormat(String),
    #[error("Value {value} is outside the root code range 0..{limit}")]
    OutOfRange { value: u64, limit: u64 },
}

fn current_digit(c: u8) -> Option<u64> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u64),
        b'A'..=b'Z' => Some((c - b'A') as u64 + 10),
        _           => None,
    }
}

fn legacy_digit(c: u8, most_significant: bool) -> Option<u64> {
    match c {
        b'a'..=b'z'                    => Some((c - b'a') as u64),
        b'{'..=b'~' if most_significant => Some((c - b'a') as u64),
        _                              => None,
    }
}

/// Convert a root code to its tick count.
///
/// Fails with [`RootCodeError::InvalidFormat`] unless `code` is exactly six
/// characters of one alphabet.
pub fn decode(code: &str) -> Result<u64, RootCodeError> {
    let bytes = code.as_bytes();
    let invalid = || RootCodeError::InvalidFormat(code.to_owned());
    if bytes.len() != ROOT_CODE_LEN {
        return Err(invalid());
    }
    let legacy = bytes[0] >= b'a';
    let base = if legacy { LEGACY_BASE } else { CURRENT_BASE };
    bytes.iter().enumerate().try_fold(0u64, |acc, (i, &c)| {
        let digit = if legacy { legacy_digit(c, i == 0) } else { current_digit(c) };
        digit.map(|d| acc * base + d).ok_or_else(invalid)
    })
}

/// Convert a tick count to a root code in the chosen alphabet.
pub fn encode(value: u64, legacy: bool) -> Result<String, RootCodeError> {
    let (limit, base) = if legacy { (LEGACY_LIMIT, LEGACY_BASE) } else { (CURRENT_LIMIT, CURRENT_BASE) };
    if value >= limit {
        return Err(RootCodeError::OutOfRange { value, limit });
    }
    let mut out = [0u8; ROOT_CODE_LEN];
    let mut rest = value;
    for slot in out.iter_mut().skip(1).rev() {
        let d = (rest % base) as usize;
        *slot = if legacy { LEGACY_DIGITS[d] } else { CURRENT_DIGITS[d] };
        rest /= base;
    }
    // What remains is the most-significant digit; for legacy codes it may
    // run past `z` into the extra symbols.
    out[0] = if legacy { LEGACY_DIGITS[rest as usize] } else { CURRENT_DIGITS[rest as usize] };
    Ok(out.iter().map(|&b| b as char).collect())
}

/// Alias of [`decode`] under the name used by the file tooling.
pub fn root_to_int(code: &str) -> Result<u64, RootCodeError> {
    decode(code)
}

/// Alias of [`encode`] under the name used by the file tooling.
pub fn int_to_root(value: u64, legacy: bool) -> Result<String, RootCodeError> {
    encode(value, legacy)
}

/// Whether `bytes` is a root code as it appears in file names and record
/// fields: `[0-9A-Z]{6}` or `[a-z{|}][a-z]{5}`.
pub fn is_root_code(bytes: &[u8]) -> bool {
    if bytes.len() != ROOT_CODE_LEN {
        return false;
    }
    if bytes.iter().all(|&c| current_digit(c).is_some()) {
        return true;
    }
    matches!(bytes[0], b'a'..=b'z' | b'{' | b'|' | b'}')
        && bytes[1..].iter().all(u8::is_ascii_lowercase)
}

// ── RootCode ─────────────────────────────────────────────────────────────────

/// A validated root code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RootCode([u8; ROOT_CODE_LEN]);

impl RootCode {
    pub fn as_bytes(&self) -> &[u8; ROOT_CODE_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII ever reaches the array.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub fn is_legacy(&self) -> bool {
        self.0[0] >= b'a'
    }

    pub fn to_int(&self) -> Result<u64, RootCodeError> {
        decode(self.as_str())
    }

    /// The code one tick later, in the same alphabet.
    pub fn next(&self) -> Result<Self, RootCodeError> {
        encode(self.to_int()? + 1, self.is_legacy())?.parse()
    }
}

impl FromStr for RootCode {
    type Err = RootCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_root_code(s.as_bytes()) {
            return Err(RootCodeError::InvalidFormat(s.to_owned()));
        }
        let mut code = [0u8; ROOT_CODE_LEN];
        code.copy_from_slice(s.as_bytes());
        Ok(Self(code))
    }
}

impl fmt::Display for RootCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_codes() {
        assert_eq!(int_to_root(0, false).unwrap(), "000000");
        assert_eq!(int_to_root(0, true).unwrap(), "aaaaaa");
        assert_eq!(root_to_int("000000").unwrap(), 0);
        assert_eq!(root_to_int("aaaaaa").unwrap(), 0);
    }

    #[test]
    fn most_significant_digit_first() {
        assert_eq!(decode("000010").unwrap(), 36);
        assert_eq!(decode("100000").unwrap(), 36u64.pow(5));
        assert_eq!(decode("aaaaba").unwrap(), 26);
        assert_eq!(encode(35, false).unwrap(), "00000Z");
        assert_eq!(encode(CURRENT_LIMIT - 1, false).unwrap(), "ZZZZZZ");
        assert_eq!(encode(LEGACY_LIMIT - 1, true).unwrap(), "~zzzzz");
    }

    #[test]
    fn legacy_extra_symbols_only_lead() {
        assert_eq!(decode("{aaaaa").unwrap(), 26 * 26u64.pow(5));
        assert!(matches!(decode("a{aaaa"), Err(RootCodeError::InvalidFormat(_))));
    }

    #[test]
    fn rejects_mixed_and_malformed() {
        for bad in ["", "ABCDE", "ABCDEFG", "ABCdef", "abcDEF", "abc de", "00000a"] {
            assert!(decode(bad).is_err(), "{bad:?} should not decode");
        }
    }

    #[test]
    fn out_of_range() {
        assert_eq!(
            encode(CURRENT_LIMIT, false),
            Err(RootCodeError::OutOfRange { value: CURRENT_LIMIT, limit: CURRENT_LIMIT })
        );
        assert!(encode(LEGACY_LIMIT, true).is_err());
    }

    #[test]
    fn validity_matches_file_grammar() {
        assert!(is_root_code(b"0A1B2C"));
        assert!(is_root_code(b"abcdef"));
        assert!(is_root_code(b"}bcdef"));
        assert!(!is_root_code(b"~bcdef"));
        assert!(!is_root_code(b"abcde"));
        assert!(!is_root_code(b"aBcdef"));
    }

    #[test]
    fn next_keeps_alphabet() {
        let code: RootCode = "00000Z".parse().unwrap();
        assert_eq!(code.next().unwrap().as_str(), "000010");
        let code: RootCode = "aaaaaz".parse().unwrap();
        assert_eq!(code.next().unwrap().as_str(), "aaaaba");
        assert!(code.is_legacy());
    }

    proptest! {
        #[test]
        fn current_round_trip(n in 0u64..CURRENT_LIMIT) {
            let code = int_to_root(n, false).unwrap();
            prop_assert_eq!(root_to_int(&code).unwrap(), n);
        }

        #[test]
        fn legacy_round_trip(n in 0u64..LEGACY_LIMIT) {
            let code = int_to_root(n, true).unwrap();
            prop_assert_eq!(root_to_int(&code).unwrap(), n);
        }

        #[test]
        fn current_code_round_trip(code in "[0-9A-Z]{6}") {
            let n = root_to_int(&code).unwrap();
            prop_assert_eq!(int_to_root(n, false).unwrap(), code);
        }

        #[test]
        fn legacy_code_round_trip(code in "[a-z{|}~][a-z]{5}") {
            let n = root_to_int(&code).unwrap();
            prop_assert_eq!(int_to_root(n, true).unwrap(), code);
        }
    }
}
