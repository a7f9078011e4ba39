//! Content fingerprinting
//!
//! Calculates a SHA-256 digest of file content. This is a content hash, not an
//! acoustic fingerprint: byte-identical files match, transcodes do not.

use mlc_common::Fingerprint;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Read size per chunk (1MB), bounding memory for arbitrarily large files
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Fingerprint computation errors
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// Permission or I/O failure; reported, not retried
    #[error("File unreadable {path}: {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Zero-byte file; skipped
    #[error("File is empty: {0}")]
    FileEmpty(PathBuf),
}

/// Calculate the content fingerprint of a file
///
/// **Algorithm:**
/// 1. Read file content in 1MB chunks
/// 2. Fold each chunk into a SHA-256 digest
/// 3. Return the hex-encoded digest
pub fn compute_fingerprint(file_path: &Path) -> Result<Fingerprint, FingerprintError> {
    tracing::debug!(path = %file_path.display(), "Calculating fingerprint");

    let unreadable = |source: std::io::Error| FingerprintError::FileUnreadable {
        path: file_path.to_path_buf(),
        source,
    };

    let mut file = File::open(file_path).map_err(unreadable)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(unreadable(e)),
        };

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
        total_bytes += bytes_read as u64;
    }

    if total_bytes == 0 {
        tracing::info!(path = %file_path.display(), "Skipping empty file");
        return Err(FingerprintError::FileEmpty(file_path.to_path_buf()));
    }

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    let fingerprint = Fingerprint::from_digest(&digest);

    tracing::debug!(
        path = %file_path.display(),
        bytes = total_bytes,
        fingerprint = %fingerprint,
        "Calculated fingerprint"
    );

    Ok(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_matches_sha256_of_content() {
        let file = temp_with(b"test content");
        let fp = compute_fingerprint(file.path()).unwrap();

        assert_eq!(fp.as_str().len(), 64);
        let expected = format!("{:x}", Sha256::digest(b"test content"));
        assert_eq!(fp.as_str(), expected);
    }

    #[test]
    fn test_identical_content_identical_fingerprint() {
        let a = temp_with(b"same bytes");
        let b = temp_with(b"same bytes");
        assert_eq!(
            compute_fingerprint(a.path()).unwrap(),
            compute_fingerprint(b.path()).unwrap()
        );
    }

    #[test]
    fn test_different_content_different_fingerprint() {
        let a = temp_with(b"content one");
        let b = temp_with(b"content two");
        assert_ne!(
            compute_fingerprint(a.path()).unwrap(),
            compute_fingerprint(b.path()).unwrap()
        );
    }

    #[test]
    fn test_multi_chunk_file() {
        let content = vec![7u8; CHUNK_SIZE * 2 + 17];
        let file = temp_with(&content);
        let expected = format!("{:x}", Sha256::digest(&content));
        assert_eq!(compute_fingerprint(file.path()).unwrap().as_str(), expected);
    }

    #[test]
    fn test_empty_file() {
        let file = temp_with(b"");
        assert!(matches!(
            compute_fingerprint(file.path()),
            Err(FingerprintError::FileEmpty(_))
        ));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let result = compute_fingerprint(Path::new("/nonexistent/file.wav"));
        assert!(matches!(result, Err(FingerprintError::FileUnreadable { .. })));
    }
}
