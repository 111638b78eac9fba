use mk4::io_stream::{records, Collect};
use mk4::record::Record;
use mk4::{recode, recode_auto, RecodeError, RecordError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// File header (000) naming `name`, followed by one type-150 record.
fn fringe_file(name: &str, root: &[u8; 6]) -> Vec<u8> {
    let mut t000 = b"00001".to_vec();
    t000.resize(8, 0);
    t000.extend_from_slice(b"2024-001-000000 ");
    let mut field = name.as_bytes().to_vec();
    field.resize(40, 0);
    t000.extend_from_slice(&field);

    let mut t150 = b"15000\0\0\0GE".to_vec();
    t150.extend_from_slice(root);
    t150.extend_from_slice(&7u32.to_be_bytes());
    t150.extend_from_slice(&3u32.to_be_bytes());
    t150.extend_from_slice(&[0xAB; 8]);
    [t000, t150].concat()
}

fn stored_root(path: &Path) -> (String, String) {
    let set = records(fs::File::open(path).unwrap(), None, Collect::First, false).unwrap();
    let name = match set.first(0) {
        Some(Record::Type000(r)) => r.name.to_string_lossy(),
        other                    => panic!("unexpected {other:?}"),
    };
    let root = match set.first(150) {
        Some(Record::Type150(r)) => r.ap.root_code.to_string_lossy(),
        other                    => panic!("unexpected {other:?}"),
    };
    (name, root)
}

#[test]
fn test_recode_rewrites_embedded_roots() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("GE.X.1.ABCDEF");
    let original = fringe_file("1234/No0001/GE.X.1.ABCDEF", b"ABCDEF");
    fs::write(&src, &original).unwrap();

    let dst = recode(&src, "QWERTY").unwrap();
    assert_eq!(dst, dir.path().join("GE.X.1.QWERTY"));
    assert!(!src.exists());

    let (name, root) = stored_root(&dst);
    assert_eq!(name, "1234/No0001/GE.X.1.QWERTY");
    assert_eq!(root, "QWERTY");

    // Everything outside the two name fields is untouched.
    let rewritten = fs::read(&dst).unwrap();
    assert_eq!(rewritten.len(), original.len());
    for (i, (a, b)) in original.iter().zip(&rewritten).enumerate() {
        let in_name = (24 + 19..24 + 25).contains(&i);
        let in_root = (64 + 10..64 + 16).contains(&i);
        if !in_name && !in_root {
            assert_eq!(a, b, "byte {i}");
        }
    }
}

#[test]
fn test_recode_to_same_root_is_noop() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("GE.X.1.ABCDEF");
    let original = fringe_file("GE.X.1.ABCDEF", b"ABCDEF");
    fs::write(&src, &original).unwrap();

    assert_eq!(recode(&src, "ABCDEF").unwrap(), src);
    assert_eq!(fs::read(&src).unwrap(), original);
}

#[test]
fn test_failed_recode_leaves_original() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("GE.X.1.ABCDEF");
    let mut data = fringe_file("GE.X.1.ABCDEF", b"ABCDEF");
    data.truncate(data.len() - 3);
    fs::write(&src, &data).unwrap();

    let err = recode(&src, "QWERTY").unwrap_err();
    assert!(matches!(
        err,
        RecodeError::Record(RecordError::TruncatedRecord { type_id: 150, expected: 32, available: 29 })
    ));
    assert!(!dir.path().join("GE.X.1.QWERTY").exists());
    assert_eq!(fs::read(&src).unwrap(), data);
}

/// Point `dst` at a device that fails every write with "no space left".
#[cfg(target_os = "linux")]
fn full_disk_at(dst: &Path) -> bool {
    Path::new("/dev/full").exists() && std::os::unix::fs::symlink("/dev/full", dst).is_ok()
}

#[cfg(target_os = "linux")]
#[test]
fn test_write_failure_leaves_original() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("GE.X.1.ABCDEF");
    let dst = dir.path().join("GE.X.1.QWERTY");
    let data = fringe_file("GE.X.1.ABCDEF", b"ABCDEF");
    fs::write(&src, &data).unwrap();
    if !full_disk_at(&dst) {
        return;
    }

    assert!(matches!(recode(&src, "QWERTY"), Err(RecodeError::Io(_))));
    assert!(fs::symlink_metadata(&dst).is_err());
    assert_eq!(fs::read(&src).unwrap(), data);
}

#[cfg(target_os = "linux")]
#[test]
fn test_schedule_write_failure_leaves_original() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("3C279.ABCDEF");
    let dst = dir.path().join("3C279.QWERTY");
    let text = vec![b'x'; 200 * 1024];
    fs::write(&src, &text).unwrap();
    if !full_disk_at(&dst) {
        return;
    }

    assert!(matches!(recode(&src, "QWERTY"), Err(RecodeError::Io(_))));
    assert!(fs::symlink_metadata(&dst).is_err());
    assert_eq!(fs::read(&src).unwrap(), text);
}

#[test]
fn test_schedule_files_are_copied_verbatim() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("3C279.ABCDEF");
    let text = b"$EXPER ABCDEF;\n not a record file\n";
    fs::write(&src, text).unwrap();

    let dst = recode(&src, "QWERTY").unwrap();
    assert_eq!(dst, dir.path().join("3C279.QWERTY"));
    assert_eq!(fs::read(&dst).unwrap(), text);
    assert!(!src.exists());
}

#[test]
fn test_recode_auto_resolves_collision() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let (first, second) = if a.path() < b.path() { (&a, &b) } else { (&b, &a) };
    for dir in [first, second] {
        fs::write(dir.path().join("3C279.ABCDEF"), b"schedule").unwrap();
        fs::write(dir.path().join("GE.X.1.ABCDEF"), fringe_file("GE.X.1.ABCDEF", b"ABCDEF")).unwrap();
    }

    let renamed = recode_auto(&[first.path(), second.path()]).unwrap();
    assert_eq!(renamed.len(), 2);
    assert!(renamed.iter().all(|r| r.from.starts_with(second.path())));

    assert!(first.path().join("3C279.ABCDEF").exists());
    assert!(first.path().join("GE.X.1.ABCDEF").exists());
    assert!(second.path().join("3C279.ABCDEG").exists());
    let (name, root) = stored_root(&second.path().join("GE.X.1.ABCDEG"));
    assert_eq!(name, "GE.X.1.ABCDEG");
    assert_eq!(root, "ABCDEG");
}

#[test]
fn test_recode_auto_without_collision() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    fs::write(a.path().join("3C279.ABCDEF"), b"").unwrap();
    fs::write(b.path().join("3C279.ABCDEG"), b"").unwrap();
    assert!(recode_auto(&[a.path(), b.path()]).unwrap().is_empty());
}
