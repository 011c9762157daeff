//! CRC32 content checksums for snapshot artifacts
//!
//! Every sidecar records the CRC32 (IEEE polynomial) of its artifact,
//! computed exactly once at creation time. Recomputing the checksum on read
//! is a verification step performed by the restore path, never a mutation of
//! the sidecar.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crc32fast::Hasher;

use super::errors::{SnapshotError, SnapshotResult};
use super::CancelToken;

/// Computes a CRC32 checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Computes the CRC32 checksum of an entire file, reading in chunks.
pub fn compute_file_checksum(path: &Path) -> SnapshotResult<u32> {
    compute_file_checksum_with_cancel(path, &CancelToken::new())
}

/// Checksum a file, honoring a cancellation token between chunks.
///
/// Artifacts are bounded only by store size, so a caller-supplied token is
/// checked every 8KB. Cancellation yields `CUSTODIA_SNAPSHOT_CANCELLED`.
pub fn compute_file_checksum_with_cancel(
    path: &Path,
    token: &CancelToken,
) -> SnapshotResult<u32> {
    let file = File::open(path).map_err(|e| SnapshotError::io_error_at_path(path, e))?;

    let mut reader = BufReader::new(file);
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        if token.is_cancelled() {
            return Err(SnapshotError::cancelled("artifact checksum"));
        }

        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| SnapshotError::io_error_at_path(path, e))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize())
}

/// Formats a CRC32 checksum as `crc32:XXXXXXXX` (lowercase hex, zero-padded).
pub fn format_checksum(checksum: u32) -> String {
    format!("crc32:{:08x}", checksum)
}

/// Parses a formatted checksum string back to u32.
///
/// Returns `None` if the format is invalid.
pub fn parse_checksum(formatted: &str) -> Option<u32> {
    let stripped = formatted.strip_prefix("crc32:")?;
    u32::from_str_radix(stripped, 16).ok()
}
