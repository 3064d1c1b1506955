use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use packmule_record::ByteSource;

use crate::DEFAULT_CHUNK_SIZE;
use crate::transport::{ProgressFn, TransportError, UploadRequest, UploadTransport};

/// Transport that stores payloads beneath a destination directory.
///
/// Streams the source in fixed-size chunks, reports percent progress per
/// chunk, and verifies the request's declared checksum against the bytes
/// actually written.
pub struct DirStore {
    base_path: PathBuf,
    chunk_size: usize,
}

impl DirStore {
    /// Creates a store rooted at `base_path`.
    pub fn new(base_path: &Path) -> Self {
        Self {
            base_path: base_path.to_path_buf(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Overrides the streaming chunk size (0 keeps the default).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    /// Returns the destination root.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    async fn store(
        &self,
        req: UploadRequest<'_>,
        progress: &ProgressFn,
    ) -> Result<(), TransportError> {
        validate_destination(req.name)?;

        let full_path = self.base_path.join(req.name);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut out = fs::File::create(&full_path).await?;
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;

        match req.source {
            ByteSource::Memory(data) => {
                for chunk in data.chunks(self.chunk_size) {
                    out.write_all(chunk).await?;
                    hasher.update(chunk);
                    written += chunk.len() as u64;
                    report(progress, written, req.byte_size);
                }
            }
            ByteSource::Path(path) => {
                let mut src = fs::File::open(path).await?;
                let mut buf = vec![0u8; self.chunk_size];
                loop {
                    let n = src.read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    out.write_all(&buf[..n]).await?;
                    hasher.update(&buf[..n]);
                    written += n as u64;
                    report(progress, written, req.byte_size);
                }
            }
        }

        out.flush().await?;

        // Verify what actually went over the seam, not what we intended.
        let actual = hex::encode(hasher.finalize());
        if !req.checksum.is_empty() && actual != req.checksum {
            return Err(TransportError::ChecksumMismatch);
        }

        debug!(payload = req.name, bytes = written, "payload stored");
        Ok(())
    }
}

fn report(progress: &ProgressFn, written: u64, total: u64) {
    if total > 0 {
        let percent = ((written * 100) / total).min(100) as u8;
        progress(percent);
    }
}

/// Validates that a destination name stays inside the store root.
///
/// Rejects empty names, absolute paths, parent-directory traversal, and
/// Windows prefix components.
fn validate_destination(name: &str) -> Result<(), TransportError> {
    if name.is_empty() {
        return Err(TransportError::InvalidPath("empty destination".into()));
    }

    let path = Path::new(name);
    if path.is_absolute() {
        return Err(TransportError::InvalidPath(format!(
            "absolute destination not allowed: {name}"
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(TransportError::InvalidPath(format!(
                    "destination escapes the store root: {name}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

impl UploadTransport for DirStore {
    fn send<'a>(
        &'a self,
        req: UploadRequest<'a>,
        progress: ProgressFn,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move { self.store(req, &progress).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use tempfile::TempDir;

    use crate::checksum::checksum_bytes;

    async fn send_bytes(
        store: &DirStore,
        name: &str,
        data: &[u8],
        checksum: &str,
    ) -> (Result<(), TransportError>, Vec<u8>) {
        let source = ByteSource::Memory(data.to_vec());
        let metadata = HashMap::new();
        let req = UploadRequest {
            name,
            source: &source,
            byte_size: data.len() as u64,
            media_type: "application/octet-stream",
            checksum,
            metadata: &metadata,
        };

        let percents = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&percents);
        let progress: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));

        let result = store.send(req, progress).await;
        let percents = percents.lock().unwrap().clone();
        (result, percents)
    }

    #[tokio::test]
    async fn stores_memory_payload() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());

        let data = b"hello store";
        let (result, _) = send_bytes(&store, "out.bin", data, &checksum_bytes(data)).await;
        assert!(result.is_ok());

        let written = std::fs::read(dir.path().join("out.bin")).unwrap();
        assert_eq!(&written, data);
    }

    #[tokio::test]
    async fn stores_path_payload() {
        let dir = TempDir::new().unwrap();
        let src_path = dir.path().join("input.dat");
        let data = b"The quick brown fox jumps over the lazy dog";
        std::fs::write(&src_path, data).unwrap();

        let dst = dir.path().join("dst");
        let store = DirStore::new(&dst).with_chunk_size(10);

        let source = ByteSource::Path(src_path);
        let metadata = HashMap::new();
        let checksum = checksum_bytes(data);
        let req = UploadRequest {
            name: "copied.dat",
            source: &source,
            byte_size: data.len() as u64,
            media_type: "application/octet-stream",
            checksum: &checksum,
            metadata: &metadata,
        };

        store.send(req, Arc::new(|_| {})).await.unwrap();
        let written = std::fs::read(dst.join("copied.dat")).unwrap();
        assert_eq!(&written, data);
    }

    #[tokio::test]
    async fn creates_subdirectories() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());

        let data = b"nested";
        let (result, _) = send_bytes(&store, "sub/dir/file.txt", data, &checksum_bytes(data)).await;
        assert!(result.is_ok());

        let written = std::fs::read(dir.path().join("sub/dir/file.txt")).unwrap();
        assert_eq!(&written, data);
    }

    #[tokio::test]
    async fn progress_is_monotone_and_reaches_100() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path()).with_chunk_size(4);

        let data = b"0123456789"; // 10 bytes, 3 chunks.
        let (result, percents) = send_bytes(&store, "p.bin", data, &checksum_bytes(data)).await;
        assert!(result.is_ok());

        assert!(!percents.is_empty());
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*percents.last().unwrap(), 100);
    }

    #[tokio::test]
    async fn declared_checksum_is_verified() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());

        let (result, _) = send_bytes(
            &store,
            "bad.bin",
            b"data",
            "0000000000000000000000000000000000000000000000000000000000000000",
        )
        .await;
        assert!(matches!(result, Err(TransportError::ChecksumMismatch)));
    }

    #[tokio::test]
    async fn empty_checksum_skips_verification() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());

        let (result, _) = send_bytes(&store, "ok.bin", b"data", "").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn rejects_parent_traversal() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());

        let (result, _) = send_bytes(&store, "../../etc/passwd", b"evil", "").await;
        assert!(matches!(result, Err(TransportError::InvalidPath(_))));

        let (result, _) = send_bytes(&store, "sub/../../escape", b"evil", "").await;
        assert!(matches!(result, Err(TransportError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn rejects_absolute_destination() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());

        let (result, _) = send_bytes(&store, "/tmp/malicious", b"evil", "").await;
        assert!(matches!(result, Err(TransportError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn rejects_empty_destination() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());

        let (result, _) = send_bytes(&store, "", b"evil", "").await;
        assert!(matches!(result, Err(TransportError::InvalidPath(_))));
    }

    #[test]
    fn accepts_ordinary_relative_names() {
        assert!(validate_destination("file.csv").is_ok());
        assert!(validate_destination("sub/dir/file.csv").is_ok());
        assert!(validate_destination("./file.csv").is_ok());
        assert!(validate_destination(".hidden/settings.json").is_ok());
    }
}
