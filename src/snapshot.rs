//! Read-only key scanner for an RDB snapshot file
//!
//! Only the first block of the file is examined. Keys are taken from the
//! hash-table section, which starts after the `0xFB` resize-db opcode and its
//! two size fields and runs until the `0xFF` end-of-file opcode. Entries are
//! separated by splitting on zero bytes (the string value-type opcode), which
//! is only correct for short string keys and values.

use crate::error::{RedliteError, Result};
use crate::pattern::Pattern;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

/// Number of leading bytes read from the snapshot per query
pub const SCAN_BLOCK_SIZE: usize = 4096;

/// Opcode marking the start of the hash-table section
pub const OPCODE_RESIZE_DB: u8 = 0xFB;

/// Opcode marking the end of the file
pub const OPCODE_EOF: u8 = 0xFF;

/// Bytes from the resize-db opcode to the first entry (opcode + two sizes)
const HASH_TABLE_HEADER_LEN: usize = 3;

/// String length encodings, selected by the top two bits of the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeEncoding {
    /// `00`: length is the low six bits
    Short(usize),
    /// `01`: 14-bit length spread over two bytes
    Medium,
    /// `10`: 4-byte big-endian length follows
    Long,
    /// `11`: integer or compressed string
    Special,
}

impl SizeEncoding {
    pub fn classify(byte: u8) -> Self {
        match byte >> 6 {
            0b00 => SizeEncoding::Short((byte & 0x3F) as usize),
            0b01 => SizeEncoding::Medium,
            0b10 => SizeEncoding::Long,
            _ => SizeEncoding::Special,
        }
    }
}

/// Decode the key at the front of one zero-delimited chunk
pub fn decode_key(chunk: &[u8]) -> Result<&[u8]> {
    let (&first, body) = chunk
        .split_first()
        .ok_or(RedliteError::TruncatedEntry { expected: 1, found: 0 })?;

    match SizeEncoding::classify(first) {
        SizeEncoding::Short(len) => body.get(..len).ok_or(RedliteError::TruncatedEntry {
            expected: len,
            found: body.len(),
        }),
        other => Err(RedliteError::UnsupportedEncoding(other)),
    }
}

/// The slice between the hash-table header and the end-of-file marker
pub fn key_region(block: &[u8]) -> Option<&[u8]> {
    let marker = block.iter().position(|&b| b == OPCODE_RESIZE_DB)?;
    let start = marker + HASH_TABLE_HEADER_LEN;
    let tail = block.get(start..)?;
    let end = tail
        .iter()
        .position(|&b| b == OPCODE_EOF)
        .unwrap_or(tail.len());
    Some(&tail[..end])
}

/// Every key that can be decoded from a leading block, in file order
pub fn scan_keys(block: &[u8]) -> Vec<Vec<u8>> {
    let region = match key_region(block) {
        Some(region) => region,
        None => return Vec::new(),
    };
    let region = region.strip_prefix(&[0u8][..]).unwrap_or(region);

    region
        .split(|&b| b == 0)
        .filter(|chunk| !chunk.is_empty())
        .filter_map(|chunk| match decode_key(chunk) {
            Ok(key) => Some(key.to_vec()),
            Err(e) => {
                tracing::debug!(error = %e, "skipping snapshot entry");
                None
            }
        })
        .collect()
}

/// Shared handle on the snapshot file, opened once at startup
pub struct SnapshotScanner {
    path: PathBuf,
    file: Option<Mutex<File>>,
}

impl SnapshotScanner {
    /// Open the snapshot. A missing or unreadable file yields an empty
    /// scanner rather than an error.
    pub async fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match File::open(&path).await {
            Ok(file) => {
                tracing::info!(path = %path.display(), "snapshot opened");
                Some(Mutex::new(file))
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "snapshot unavailable, KEYS will return no results"
                );
                None
            }
        };
        Self { path, file }
    }

    /// A scanner with no backing file
    pub fn empty() -> Self {
        Self {
            path: PathBuf::new(),
            file: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.file.is_some()
    }

    /// Keys in the snapshot matching `pattern`, in scan order
    pub async fn keys(&self, pattern: &Pattern) -> Result<Vec<Vec<u8>>> {
        let block = self.read_block().await?;
        let mut keys = scan_keys(&block);
        if !pattern.matches_all() {
            keys.retain(|key| pattern.matches(key));
        }
        tracing::debug!(
            path = %self.path.display(),
            block_len = block.len(),
            matches = keys.len(),
            "snapshot scanned"
        );
        Ok(keys)
    }

    /// Read the leading block from offset zero under the handle's lock
    async fn read_block(&self) -> Result<Vec<u8>> {
        let file = match &self.file {
            Some(file) => file,
            None => return Ok(Vec::new()),
        };

        let mut file = file.lock().await;
        file.seek(SeekFrom::Start(0)).await?;

        let mut block = vec![0u8; SCAN_BLOCK_SIZE];
        let mut filled = 0;
        while filled < block.len() {
            let n = file.read(&mut block[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        block.truncate(filled);
        Ok(block)
    }
}
