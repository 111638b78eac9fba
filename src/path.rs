//! Mk4 file name grammar.
//!
//! Every file of a correlation session ends in `.<rootcode>`.  What precedes
//! it identifies the file's role:
//!
//! | Name | Kind |
//! |------|------|
//! | `GE..ABCDEF` | visibility (baseline `GE`) |
//! | `GE.X.12.ABCDEF` | fringe (baseline `GE`, band `X`, run 12) |
//! | `G..ABCDEF` | station (`G`) |
//! | `log.ABCDEF` | log |
//! | `3C279.ABCDEF` | schedule (source `3C279`), the session's root file |

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::Path;

static PATH_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?:^.*/|^)(?:",
        r"([a-zA-Z0-9$%]{2}\.)|",
        r"([a-zA-Z0-9$%]{2}\.[A-Z]\.[0-9]*)|",
        r"([a-zA-Z0-9$%]\.)|",
        r"([Ll][Oo][Gg])|",
        r"(\S*)",
        r")\.([A-Z0-9]{6}|[a-z{][a-z]{5})$",
    ))
    .ok()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    Schedule,
    Visibility,
    Fringe,
    Station,
    Log,
}

/// Parsed view of an Mk4 file name.  Unrecognised names have no `kind`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PathInfo {
    pub kind:     Option<PathKind>,
    pub stations: Option<String>,
    pub band:     Option<char>,
    pub run:      Option<u64>,
    pub source:   Option<String>,
    pub root:     Option<String>,
}

impl PathInfo {
    pub fn parse(path: &str) -> Self {
        let Some(caps) = PATH_PATTERN.as_ref().and_then(|re| re.captures(path)) else {
            return Self::default();
        };
        let mut info = Self {
            root: caps.get(6).map(|m| m.as_str().to_owned()),
            ..Self::default()
        };
        if let Some(m) = caps.get(1) {
            info.kind = Some(PathKind::Visibility);
            info.stations = Some(m.as_str()[..2].to_owned());
        } else if let Some(m) = caps.get(2) {
            let m = m.as_str();
            let digits = &m[5..];
            info.kind = Some(PathKind::Fringe);
            info.stations = Some(m[..2].to_owned());
            info.band = m[3..].chars().next();
            info.run = if digits.is_empty() { Some(0) } else { digits.parse().ok() };
        } else if let Some(m) = caps.get(3) {
            info.kind = Some(PathKind::Station);
            info.stations = Some(m.as_str()[..1].to_owned());
        } else if let Some(m) = caps.get(5) {
            info.kind = Some(PathKind::Schedule);
            info.source = Some(m.as_str().to_owned());
        } else if caps.get(4).is_some() {
            info.kind = Some(PathKind::Log);
        }
        info
    }

    pub fn from_path(path: &Path) -> Self {
        Self::parse(&path.to_string_lossy())
    }

    /// Schedule and log files hold no records and are copied verbatim.
    pub fn is_opaque(&self) -> bool {
        matches!(self.kind, Some(PathKind::Schedule | PathKind::Log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility() {
        let p = PathInfo::parse("1234/No0001/GE..ABCDEF");
        assert_eq!(p.kind, Some(PathKind::Visibility));
        assert_eq!(p.stations.as_deref(), Some("GE"));
        assert_eq!(p.root.as_deref(), Some("ABCDEF"));
    }

    #[test]
    fn fringe() {
        let p = PathInfo::parse("GE.X.12.ABCDEF");
        assert_eq!(p.kind, Some(PathKind::Fringe));
        assert_eq!(p.stations.as_deref(), Some("GE"));
        assert_eq!(p.band, Some('X'));
        assert_eq!(p.run, Some(12));

        let p = PathInfo::parse("dir/G$.S..abcdef");
        assert_eq!(p.kind, Some(PathKind::Fringe));
        assert_eq!(p.run, Some(0));
        assert_eq!(p.root.as_deref(), Some("abcdef"));
    }

    #[test]
    fn station_and_log() {
        let p = PathInfo::parse("G..ABCDEF");
        assert_eq!(p.kind, Some(PathKind::Station));
        assert_eq!(p.stations.as_deref(), Some("G"));
        assert_eq!(PathInfo::parse("/tmp/LOG.ABCDEF").kind, Some(PathKind::Log));
    }

    #[test]
    fn schedule() {
        let p = PathInfo::parse("/data/1234/No0001/3C279.ABCDEF");
        assert_eq!(p.kind, Some(PathKind::Schedule));
        assert_eq!(p.source.as_deref(), Some("3C279"));
        assert!(p.is_opaque());
        assert!(p.stations.is_none());
    }

    #[test]
    fn unrecognised() {
        for name in ["GE.X.1", "GE..ABCDE", "GE..abcDEF", "two words.ABCDEF", "GE..~bcdef"] {
            assert_eq!(PathInfo::parse(name), PathInfo::default(), "{name}");
        }
    }
}
