//! Media fingerprinting
//!
//! Files are identified by the MD5 of their first 16 MiB, which is what the
//! comment service indexes. MD5 is only used for deduplication here.

use crate::Result;
use md5::{Digest, Md5};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Number of leading bytes covered by the fingerprint
pub const FINGERPRINT_LEN: u64 = 16 * 1024 * 1024;

const CHUNK_SIZE: usize = 64 * 1024;

/// Hashes the first [`FINGERPRINT_LEN`] bytes of a file into a hex digest
pub async fn fingerprint(path: &Path) -> Result<String> {
    let file = tokio::fs::File::open(path).await?;
    let mut reader = file.take(FINGERPRINT_LEN);
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
