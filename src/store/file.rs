//! Single-file store adapter with a CRC32 trailer
//!
//! `ChecksumFileStore` adapts any engine that exposes its state as one file
//! terminated by an 8-byte trailer: the magic `CST1` followed by the CRC32
//! (IEEE, big-endian) of everything before the trailer. The trailer lets
//! `integrity_check` detect a single flipped byte anywhere in the body.
//!
//! Catalog and query operations return `StoreError::Unsupported`; this
//! adapter covers the file-level lifecycle operations (snapshot, verify,
//! restore) and is what the CLI uses when pointed at a raw store file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;

use super::{ExecOutcome, Row, StoreError, StoreHandle, StoreOpener, StoreResult, Violation};

/// Trailer magic bytes
const TRAILER_MAGIC: &[u8; 4] = b"CST1";

/// Trailer length: magic + u32 checksum
const TRAILER_LEN: usize = 8;

/// Store handle over a single checksummed file.
#[derive(Debug, Clone)]
pub struct ChecksumFileStore {
    path: PathBuf,
    read_only: bool,
}

impl ChecksumFileStore {
    /// Open a store file. The file must exist.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if !path.is_file() {
            return Err(StoreError::Unreachable(format!(
                "store file not found: {}",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            read_only: false,
        })
    }

    /// Write a new store file: body followed by the checksum trailer.
    pub fn create(path: &Path, body: &[u8]) -> StoreResult<Self> {
        let mut hasher = Hasher::new();
        hasher.update(body);
        let checksum = hasher.finalize();

        let mut file = File::create(path)?;
        file.write_all(body)?;
        file.write_all(TRAILER_MAGIC)?;
        file.write_all(&checksum.to_be_bytes())?;
        file.sync_all()?;

        Ok(Self {
            path: path.to_path_buf(),
            read_only: false,
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unsupported<T>(op: &'static str) -> StoreResult<T> {
        Err(StoreError::Unsupported(op))
    }
}

impl StoreHandle for ChecksumFileStore {
    fn query_all(&self, _sql: &str, _params: &[serde_json::Value]) -> StoreResult<Vec<Row>> {
        Self::unsupported("query_all")
    }

    fn exec(&self, _sql: &str, _params: &[serde_json::Value]) -> StoreResult<ExecOutcome> {
        if self.read_only {
            return Err(StoreError::Unsupported("exec on read-only handle"));
        }
        Self::unsupported("exec")
    }

    fn integrity_check(&self) -> StoreResult<bool> {
        let mut file = File::open(&self.path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        if contents.len() < TRAILER_LEN {
            return Ok(false);
        }

        let (body, trailer) = contents.split_at(contents.len() - TRAILER_LEN);
        if &trailer[..4] != TRAILER_MAGIC {
            return Ok(false);
        }

        let recorded = u32::from_be_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);

        let mut hasher = Hasher::new();
        hasher.update(body);
        Ok(hasher.finalize() == recorded)
    }

    fn foreign_key_violations(&self) -> StoreResult<Vec<Violation>> {
        Self::unsupported("foreign_key_violations")
    }

    fn table_names(&self) -> StoreResult<Vec<String>> {
        Self::unsupported("table_names")
    }

    fn snapshot_to(&self, dest: &Path) -> StoreResult<()> {
        let mut src = File::open(&self.path)?;
        let mut dst = File::create(dest)?;

        let mut buffer = [0u8; 8192];
        loop {
            let n = src.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            dst.write_all(&buffer[..n])?;
        }

        dst.sync_all()?;
        Ok(())
    }
}

/// Opener producing read-only [`ChecksumFileStore`] handles.
#[derive(Debug, Clone, Default)]
pub struct ChecksumFileOpener;

impl StoreOpener for ChecksumFileOpener {
    type Handle = ChecksumFileStore;

    fn open_read_only(&self, path: &Path) -> StoreResult<Self::Handle> {
        // Probe for readability up front so a vanished file surfaces here
        OpenOptions::new().read(true).open(path)?;
        let mut handle = ChecksumFileStore::open(path)?;
        handle.read_only = true;
        Ok(handle)
    }
}
