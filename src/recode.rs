//! Root-code rewriting.
//!
//! [`recode`] moves one file to a new root code.  Record files are streamed
//! record by record into the new name with every embedded root code
//! replaced; schedule and log files are copied as they are.  The new file is
//! synced before the old one is removed, and a failed rewrite deletes the
//! partial output, so a file is either fully renamed or left untouched.
//!
//! [`recode_auto`] resolves root-code collisions between session
//! directories that are about to be merged.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::io_stream::{RecordReader, RecordWriter};
use crate::path::{PathInfo, PathKind};
use crate::record::{Record, RecordError};
use crate::rootcode::{is_root_code, RootCode, RootCodeError};

/// The embedded-name fields keep at most this many bytes before the NUL.
const NAME_MAX: usize = 39;

#[derive(Error, Debug)]
pub enum RecodeError {
    #[error(transparent)]
    RootCode(#[from] RootCodeError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),
}

/// One file moved by [`recode_auto`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renamed {
    pub from: PathBuf,
    pub to:   PathBuf,
}

/// Deletes the output file on drop unless the rewrite completed.
struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// `path` with its trailing root code replaced by `root`, or with `root`
/// appended when the name carries none.
fn recoded_path(path: &Path, root: &str) -> Result<PathBuf, RecodeError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RecodeError::InvalidPath(path.to_path_buf()))?;
    let stem = match name.rsplit_once('.') {
        Some((stem, ext)) if is_root_code(ext.as_bytes()) => stem,
        _                                                => name,
    };
    Ok(path.with_file_name(format!("{stem}.{root}")))
}

/// New contents of a NUL-padded name field whose extension is a root code,
/// or `None` when the stored name has no such extension.
fn recoded_name(field: &[u8], root: &[u8]) -> Option<Vec<u8>> {
    let end = field.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let name = &field[..end];
    let dot = name.iter().rposition(|&b| b == b'.')?;
    if !is_root_code(&name[dot + 1..]) {
        return None;
    }
    let mut out = [&name[..=dot], root].concat();
    out.truncate(NAME_MAX);
    out.push(0);
    out.resize(field.len(), 0);
    Some(out)
}

fn substitute(rec: &mut Record, root: &[u8]) {
    if let Some(field) = rec.embedded_name_mut() {
        if let Some(name) = recoded_name(field, root) {
            field.copy_from_slice(&name);
        }
    } else if let Some(code) = rec.root_code_mut() {
        code.set(root);
    }
}

/// Rewrite `path` under the root code `new_root`; returns the new path.
pub fn recode<P: AsRef<Path>>(path: P, new_root: &str) -> Result<PathBuf, RecodeError> {
    let path = path.as_ref();
    if !is_root_code(new_root.as_bytes()) {
        return Err(RootCodeError::InvalidFormat(new_root.to_owned()).into());
    }
    let new_path = recoded_path(path, new_root)?;
    if new_path == path {
        return Ok(new_path);
    }
    info!("{} -> {}", path.display(), new_path.display());

    let mut guard = PartialFile { path: new_path.clone(), keep: false };
    if PathInfo::from_path(path).is_opaque() {
        fs::copy(path, &new_path)?;
        File::open(&new_path)?.sync_all()?;
    } else {
        let mut writer = RecordWriter::create(&new_path)?;
        rewrite(RecordReader::open(path)?, &mut writer, new_root.as_bytes())?;
        writer.flush()?;
        let file = writer.into_inner().into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
    }
    guard.keep = true;

    fs::remove_file(path)?;
    Ok(new_path)
}

/// Copy every record from `reader` to `writer` under the root code `root`.
fn rewrite<R: Read, W: Write>(
    reader: RecordReader<R>,
    writer: &mut RecordWriter<W>,
    root:   &[u8],
) -> Result<(), RecodeError> {
    for item in reader {
        let (_, mut rec) = item?;
        substitute(&mut rec, root);
        writer.write(&rec)?;
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn is_schedule(path: &Path) -> bool {
    path.file_name()
        .map(|n| PathInfo::parse(&n.to_string_lossy()).kind == Some(PathKind::Schedule))
        .unwrap_or(false)
}

/// Root file names found in each directory.  A directory without one is
/// represented by the first root file of each immediate subdirectory.
fn find_roots<P: AsRef<Path>>(dirs: &[P]) -> io::Result<BTreeMap<String, BTreeSet<PathBuf>>> {
    let mut roots: BTreeMap<String, BTreeSet<PathBuf>> = BTreeMap::new();
    let mut add = |file: &Path, dir: &Path| {
        if let Some(name) = file.file_name() {
            roots
                .entry(name.to_string_lossy().into_owned())
                .or_default()
                .insert(dir.to_path_buf());
        }
    };
    for dir in dirs {
        let dir = dir.as_ref();
        let entries = sorted_entries(dir)?;
        let found: Vec<&PathBuf> = entries.iter().filter(|p| is_schedule(p)).collect();
        for file in &found {
            add(file, dir);
        }
        if !found.is_empty() {
            continue;
        }
        for sub in entries.iter().filter(|p| p.is_dir()) {
            if let Some(file) = sorted_entries(sub)?.iter().find(|p| is_schedule(p)) {
                add(file, sub);
            }
        }
    }
    Ok(roots)
}

/// Give every session whose root file name also appears in another
/// directory a fresh root code.
///
/// For each colliding name the first directory (in sorted order) keeps its
/// code; each other directory moves to the next code, in the same
/// alphabet, that no root file uses yet.  Every file in that directory
/// ending in `.<oldcode>` is recoded.
pub fn recode_auto<P: AsRef<Path>>(dirs: &[P]) -> Result<Vec<Renamed>, RecodeError> {
    let roots = find_roots(dirs)?;
    let mut taken: BTreeSet<String> = roots.keys().cloned().collect();
    let mut renamed = Vec::new();

    for (file, dirs) in roots.iter().filter(|(_, d)| d.len() > 1) {
        let (stem, old) = file
            .rsplit_once('.')
            .ok_or_else(|| RecodeError::InvalidPath(PathBuf::from(file)))?;
        let old_code: RootCode = old.parse()?;

        for dir in dirs.iter().skip(1) {
            let mut code = old_code;
            let new_file = loop {
                code = code.next()?;
                let candidate = format!("{stem}.{code}");
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            info!("{}: {} collides, reassigned to {}", dir.display(), file, new_file);
            taken.insert(new_file);

            let suffix = format!(".{old}");
            for from in sorted_entries(dir)? {
                let matches = from
                    .file_name()
                    .map(|n| n.to_string_lossy().ends_with(&suffix))
                    .unwrap_or(false);
                if matches {
                    let to = recode(&from, code.as_str())?;
                    renamed.push(Renamed { from, to });
                }
            }
        }
    }
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_replacement() {
        let p = recoded_path(Path::new("/x/GE.X.1.ABCDEF"), "ZZZZZZ").unwrap();
        assert_eq!(p, Path::new("/x/GE.X.1.ZZZZZZ"));
        let p = recoded_path(Path::new("notes.txt"), "ZZZZZZ").unwrap();
        assert_eq!(p, Path::new("notes.txt.ZZZZZZ"));
        let p = recoded_path(Path::new("3C279.abcdef"), "ZZZZZZ").unwrap();
        assert_eq!(p, Path::new("3C279.ZZZZZZ"));
    }

    #[test]
    fn name_field_replacement() {
        let mut field = [0u8; 40];
        field[..16].copy_from_slice(b"GE.X.1.ABCDEF\0\0\0");
        let out = recoded_name(&field, b"QWERTY").unwrap();
        assert_eq!(&out[..14], b"GE.X.1.QWERTY\0");
        assert_eq!(out.len(), 40);
    }

    #[test]
    fn long_names_are_cut() {
        let mut field = [b'a'; 40];
        field[33..].copy_from_slice(b".ABCDEF");
        let out = recoded_name(&field, b"QWERTY").unwrap();
        assert_eq!(out.len(), 40);
        assert_eq!(out[39], 0);
        assert_eq!(&out[33..39], b".QWERT");

        // A 34-byte rootname field keeps only its own width.
        let mut field = [0u8; 34];
        field[..12].copy_from_slice(b"3C279.ABCDEF");
        let out = recoded_name(&field, b"QWERTY").unwrap();
        assert_eq!(&out[..13], b"3C279.QWERTY\0");
        assert_eq!(out.len(), 34);
    }

    #[test]
    fn names_without_root_extension_are_kept() {
        assert!(recoded_name(b"GE.X.1\0\0\0\0", b"QWERTY").is_none());
        assert!(recoded_name(b"ABCDEF\0\0", b"QWERTY").is_none());
        assert!(recoded_name(&[0u8; 8], b"QWERTY").is_none());
    }

    /// Accepts `room` bytes, then fails like a full disk.
    struct FullAfter {
        room: usize,
        data: Vec<u8>,
    }

    impl Write for FullAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.data.len() + buf.len() > self.room {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left"));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rewrite_stops_at_write_failure() {
        let mut t150 = b"15000\0\0\0GEABCDEF".to_vec();
        t150.resize(32, 0);
        let data = [t150.clone(), t150.clone(), t150].concat();

        let mut writer = RecordWriter::new(FullAfter { room: 40, data: Vec::new() });
        let err = rewrite(RecordReader::new(&data[..]), &mut writer, b"QWERTY").unwrap_err();
        assert!(matches!(err, RecodeError::Io(ref e) if e.kind() == io::ErrorKind::Other));
        assert_eq!(writer.records_written(), 1);
        assert_eq!(&writer.into_inner().data[10..16], b"QWERTY");
    }

    #[test]
    fn invalid_root_is_rejected() {
        assert!(matches!(
            recode("GE..ABCDEF", "abc"),
            Err(RecodeError::RootCode(RootCodeError::InvalidFormat(_)))
        ));
    }
}
