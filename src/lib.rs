pub mod rootcode;
pub mod codec;
pub mod record;
pub mod io_stream;
pub mod path;
pub mod recode;
pub mod summary;

pub use rootcode::{int_to_root, root_to_int, RootCode};
pub use codec::decompress;
pub use record::{Record, RecordError};
pub use io_stream::{raw_records, records, Collect, RecordReader, RecordSet, RecordWriter};
pub use path::{PathInfo, PathKind};
pub use recode::{recode, recode_auto, RecodeError};
