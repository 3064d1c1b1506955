//! Directory scanning for upload.
//!
//! Walks a directory tree and queues every regular file as an upload
//! record with a root-relative name normalized to forward slashes.

use std::path::Path;

use packmule_record::{ByteSource, FileRecord};

/// Scans a directory recursively and returns queued records for upload.
///
/// Record names use `/` as separator (even on Windows) so they are stable
/// destination paths, and the result is sorted by name so batch order is
/// deterministic. Empty files are included; the scheduler rejects them
/// with a per-record error rather than silently dropping them.
pub fn scan_directory(root: &Path) -> std::io::Result<Vec<FileRecord>> {
    let mut records = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let metadata = entry.metadata()?;

            if metadata.is_dir() {
                stack.push(path);
            } else if metadata.is_file() {
                let rel = path.strip_prefix(root).map_err(std::io::Error::other)?;
                let name = rel.to_string_lossy().replace('\\', "/");
                let media_type = media_type_for(&path);
                records.push(FileRecord::new(
                    name,
                    metadata.len(),
                    media_type,
                    ByteSource::Path(path),
                ));
            }
        }
    }

    records.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(records)
}

/// Guesses a media type from the file extension.
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("txt" | "md") => "text/plain",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        _ => "application/octet-stream",
    }
}
