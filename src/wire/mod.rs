mod error;
mod reader;
mod record;
mod writer;

pub use error::WireError;
pub use reader::ByteReader;
pub use record::{RecordTag, WireRecord};
pub use writer::ByteWriter;
