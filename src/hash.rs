//! BLAKE3 digests of artifacts, for the report and workdir naming

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use blake3::Hasher;

use crate::error::{RepatchError, Result};

/// Hash prefix for BLAKE3 digests
pub const HASH_PREFIX: &str = "blake3:";

/// Streamed BLAKE3 digest of a file
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| RepatchError::FileReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut reader = BufReader::new(file);
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| RepatchError::FileReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex()))
}

/// First hex characters of a digest, without the prefix. Used to name
/// per-run workdirs after their input artifact.
pub fn short_digest(digest: &str, len: usize) -> &str {
    let hex = digest.strip_prefix(HASH_PREFIX).unwrap_or(digest);
    &hex[..hex.len().min(len)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_file() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("app.apk");
        std::fs::write(&file_path, "apk bytes").unwrap();

        let hash = hash_file(&file_path).unwrap();
        assert!(hash.starts_with(HASH_PREFIX));
        assert_eq!(hash.len(), HASH_PREFIX.len() + 64);
    }

    #[test]
    fn test_hash_file_deterministic() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.apk");
        let b = temp.path().join("b.apk");
        std::fs::write(&a, "same content").unwrap();
        std::fs::write(&b, "same content").unwrap();

        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());

        std::fs::write(&b, "different content").unwrap();
        assert_ne!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
    }

    #[test]
    fn test_hash_file_not_found() {
        let result = hash_file(Path::new("/nonexistent/app.apk"));
        assert!(matches!(
            result.unwrap_err(),
            RepatchError::FileReadFailed { .. }
        ));
    }

    #[test]
    fn test_short_digest() {
        assert_eq!(short_digest("blake3:abcdef0123", 6), "abcdef");
        assert_eq!(short_digest("abcdef0123", 6), "abcdef");
        assert_eq!(short_digest("blake3:ab", 6), "ab");
    }
}
