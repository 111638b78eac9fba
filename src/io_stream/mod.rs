//! Sequential record reader and writer.
//!
//! # Reader
//! [`RecordReader`] walks an Mk4 stream one record at a time.  For each
//! record it reads the 5-byte header, resolves the [`Layout`], reads the
//! layout's prefix, computes the total length and then either reads the
//! rest into an owned buffer and decodes it, or discards it when the record's
//! type id is filtered out.  Only [`Read`] is required; nothing seeks.
//!
//! The reader is an iterator of `Result<(type_id, Record)>`.  After the first
//! error it yields nothing more.
//!
//! # Aggregation
//! [`records`] groups a stream by type id, keeping the first record of each
//! id, all of them, or collapsing single-record groups ([`Collect`]).
//!
//! # Writer
//! [`RecordWriter`] encodes records back to back.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

use crate::record::{self, parse_header, Layout, Record, RecordError, HEADER_LEN};

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct RecordReader<R: Read> {
    reader:  R,
    ids:     Option<HashSet<u16>>,
    done:    bool,
    read:    usize,
    skipped: usize,
}

impl RecordReader<BufReader<File>> {
    /// Open a file for sequential reading.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, ids: None, done: false, read: 0, skipped: 0 }
    }

    /// Decode only these type ids; every other record is skipped unread.
    /// An empty set means no filter.
    pub fn with_ids<I: IntoIterator<Item = u16>>(mut self, ids: I) -> Self {
        let ids: HashSet<u16> = ids.into_iter().collect();
        self.ids = if ids.is_empty() { None } else { Some(ids) };
        self
    }

    /// Records decoded so far.
    pub fn records_read(&self) -> usize {
        self.read
    }

    /// Records skipped by the id filter so far.
    pub fn records_skipped(&self) -> usize {
        self.skipped
    }

    fn wants(&self, type_id: u16) -> bool {
        self.ids.as_ref().map_or(true, |ids| ids.contains(&type_id))
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            debug!(read = self.read, skipped = self.skipped, "record stream finished");
        }
    }

    /// Read the next header; `None` at a clean end of stream.
    fn read_header(&mut self) -> Result<Option<[u8; HEADER_LEN]>, RecordError> {
        let mut header = [0u8; HEADER_LEN];
        match read_full(&mut self.reader, &mut header)? {
            0 => Ok(None),
            HEADER_LEN => Ok(Some(header)),
            n => Err(RecordError::InvalidHeader(String::from_utf8_lossy(&header[..n]).into_owned())),
        }
    }

    fn next_record(&mut self) -> Result<Option<(u16, Record)>, RecordError> {
        loop {
            let header = match self.read_header()? {
                Some(h) => h,
                None    => return Ok(None),
            };
            let (type_id, version) = parse_header(&header)?;
            let layout = record::layout(type_id, version)?;
            let wanted = self.wants(type_id);

            // Fixed records are skipped without touching their contents.
            if let (false, Layout::Fixed(size)) = (wanted, layout) {
                self.discard(type_id, size, HEADER_LEN)?;
                continue;
            }

            let prefix_len = layout.prefix_len();
            let mut buf = vec![0u8; prefix_len];
            buf[..HEADER_LEN].copy_from_slice(&header);
            let got = HEADER_LEN + read_full(&mut self.reader, &mut buf[HEADER_LEN..])?;
            if got < prefix_len {
                return Err(RecordError::TruncatedRecord { type_id, expected: prefix_len, available: got });
            }
            let len = layout.record_len(&buf)?;

            if !wanted {
                self.discard(type_id, len, prefix_len)?;
                continue;
            }

            // Grows only as bytes arrive; a corrupt length never allocates up front.
            let rest = len.saturating_sub(prefix_len) as u64;
            (&mut self.reader).take(rest).read_to_end(&mut buf)?;
            if buf.len() < len {
                return Err(RecordError::TruncatedRecord { type_id, expected: len, available: buf.len() });
            }
            let rec = record::decode(type_id, version, &buf)?;
            self.read += 1;
            return Ok(Some((type_id, rec)));
        }
    }

    /// Drop the remaining `len - consumed` bytes of a filtered record.
    fn discard(&mut self, type_id: u16, len: usize, consumed: usize) -> Result<(), RecordError> {
        let rest = len.saturating_sub(consumed) as u64;
        let copied = io::copy(&mut (&mut self.reader).take(rest), &mut io::sink())?;
        if copied < rest {
            return Err(RecordError::TruncatedRecord {
                type_id,
                expected:  len,
                available: consumed + copied as usize,
            });
        }
        self.skipped += 1;
        Ok(())
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<(u16, Record), RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None)       => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

/// Fill as much of `buf` as the reader can supply; returns the byte count.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0)  => break,
            Ok(n)  => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Iterate over the records of `reader`, optionally restricted to `ids`.
pub fn raw_records<R: Read>(reader: R, ids: Option<&[u16]>) -> RecordReader<R> {
    let r = RecordReader::new(reader);
    match ids {
        Some(ids) => r.with_ids(ids.iter().copied()),
        None      => r,
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct RecordWriter<W: Write> {
    writer:  W,
    written: usize,
}

impl RecordWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn write(&mut self, rec: &Record) -> io::Result<()> {
        rec.encode(&mut self.writer)?;
        self.written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

// ── Aggregator ───────────────────────────────────────────────────────────────

/// How [`records`] groups records of the same type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collect {
    /// Keep the first record of each id; stop once every requested id has
    /// one.
    First,
    /// Keep every record.
    All,
    /// Keep every record, but store single-record groups as one value.
    #[default]
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Group {
    One(Record),
    Many(Vec<Record>),
}

impl Group {
    pub fn first(&self) -> Option<&Record> {
        self.all().first()
    }

    pub fn all(&self) -> &[Record] {
        match self {
            Group::One(r)  => std::slice::from_ref(r),
            Group::Many(v) => v,
        }
    }
}

/// Records grouped by type id, in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RecordSet {
    groups: BTreeMap<u16, Group>,
}

impl RecordSet {
    pub fn get(&self, type_id: u16) -> Option<&Group> {
        self.groups.get(&type_id)
    }

    pub fn first(&self, type_id: u16) -> Option<&Record> {
        self.get(type_id).and_then(Group::first)
    }

    pub fn all(&self, type_id: u16) -> &[Record] {
        self.get(type_id).map_or(&[], Group::all)
    }

    pub fn contains(&self, type_id: u16) -> bool {
        self.groups.contains_key(&type_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.groups.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &Group)> {
        self.groups.iter().map(|(&id, g)| (id, g))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Read `reader` into a [`RecordSet`].
///
/// With `required`, every id in `ids` must be present, otherwise the call
/// fails with [`RecordError::MissingRecord`] listing the absent ids.
pub fn records<R: Read>(
    reader:   R,
    ids:      Option<&[u16]>,
    collect:  Collect,
    required: bool,
) -> Result<RecordSet, RecordError> {
    let ids = ids.filter(|ids| !ids.is_empty());
    let wanted: Option<BTreeSet<u16>> = ids.map(|ids| ids.iter().copied().collect());
    let mut lists: BTreeMap<u16, Vec<Record>> = BTreeMap::new();

    for item in raw_records(reader, ids) {
        let (type_id, rec) = item?;
        let list = lists.entry(type_id).or_default();
        if collect == Collect::First {
            if list.is_empty() {
                list.push(rec);
            }
            if wanted.as_ref().is_some_and(|w| w.len() == lists.len()) {
                break;
            }
        } else {
            list.push(rec);
        }
    }

    if required {
        if let Some(wanted) = &wanted {
            let missing: Vec<String> = wanted
                .iter()
                .filter(|id| !lists.contains_key(id))
                .map(u16::to_string)
                .collect();
            if !missing.is_empty() {
                return Err(RecordError::MissingRecord { ids: missing.join(", ") });
            }
        }
    }

    let groups = lists
        .into_iter()
        .map(|(id, mut list)| {
            let group = match collect {
                Collect::All                     => Group::Many(list),
                Collect::First                   => Group::One(list.swap_remove(0)),
                Collect::Auto if list.len() == 1 => Group::One(list.swap_remove(0)),
                Collect::Auto                    => Group::Many(list),
            };
            (id, group)
        })
        .collect();
    Ok(RecordSet { groups })
}
