use std::fmt;
use std::path::PathBuf;

/// Read-only handle to the bytes of a file pending upload.
///
/// Owned by its record and borrowed out to the checksum and transport
/// stages; the payload is never duplicated between stages.
#[derive(Clone)]
pub enum ByteSource {
    /// Bytes live on disk at this path.
    Path(PathBuf),
    /// Bytes held in memory (small payloads, tests).
    Memory(Vec<u8>),
}

impl From<PathBuf> for ByteSource {
    fn from(path: PathBuf) -> Self {
        ByteSource::Path(path)
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(data: Vec<u8>) -> Self {
        ByteSource::Memory(data)
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            // Don't dump the payload into logs.
            ByteSource::Memory(data) => write!(f, "Memory({} bytes)", data.len()),
        }
    }
}
