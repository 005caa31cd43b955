//! Save file header.
//!
//! Layout (16 bytes, little-endian), followed by the payload:
//!
//! ```text
//! [0..4]   magic "PSAV"
//! [4..8]   header version
//! [8..12]  flags (bit 0: payload is gzipped)
//! [12..16] xxh32 of the payload
//! ```
//!
//! The checksum lives in the same file as the payload, so the rename that
//! installs a save installs its checksum with it. Files that do not start
//! with the magic bytes are read as headerless saves.

use crate::persistence::types::PersistenceError;
use xxhash_rust::xxh32::xxh32;

/// Magic bytes at the start of every headered save file
pub const MAGIC: [u8; 4] = *b"PSAV";

/// Size of the header in bytes
pub const HEADER_SIZE: usize = 16;

/// Layout version of the header itself
pub const HEADER_VERSION: u32 = 1;

/// Payload is gzip-compressed
pub const FLAG_COMPRESSED: u32 = 1;

const CHECKSUM_SEED: u32 = 0x5341_5645;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub flags: u32,
    pub checksum: u32,
}

impl FileHeader {
    pub fn for_payload(payload: &[u8], compressed: bool) -> Self {
        Self {
            version: HEADER_VERSION,
            flags: if compressed { FLAG_COMPRESSED } else { 0 },
            checksum: checksum(payload),
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    /// Whether `payload` matches the stored checksum
    pub fn verify(&self, payload: &[u8]) -> bool {
        checksum(payload) == self.checksum
    }
}

/// Result of splitting a file into header and payload
#[derive(Debug)]
pub enum Unwrapped<'a> {
    WithHeader {
        header: FileHeader,
        payload: &'a [u8],
    },
    Headerless(&'a [u8]),
}

pub fn checksum(payload: &[u8]) -> u32 {
    xxh32(payload, CHECKSUM_SEED)
}

/// Prepend a header to `payload`
pub fn wrap(payload: &[u8], compressed: bool) -> Vec<u8> {
    let header = FileHeader::for_payload(payload, compressed);
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());

    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&header.version.to_le_bytes());
    out.extend_from_slice(&header.flags.to_le_bytes());
    out.extend_from_slice(&header.checksum.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Split a file into header and payload. The checksum is not checked here.
pub fn unwrap(bytes: &[u8]) -> Result<Unwrapped<'_>, PersistenceError> {
    if !bytes.starts_with(&MAGIC) {
        return Ok(Unwrapped::Headerless(bytes));
    }

    if bytes.len() < HEADER_SIZE {
        return Err(PersistenceError::CorruptHeader(format!(
            "{} bytes, header needs {}",
            bytes.len(),
            HEADER_SIZE
        )));
    }

    let header = FileHeader {
        version: read_u32(bytes, 4),
        flags: read_u32(bytes, 8),
        checksum: read_u32(bytes, 12),
    };

    if header.version > HEADER_VERSION {
        return Err(PersistenceError::CorruptHeader(format!(
            "header version {} is newer than supported version {}",
            header.version, HEADER_VERSION
        )));
    }

    Ok(Unwrapped::WithHeader {
        header,
        payload: &bytes[HEADER_SIZE..],
    })
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}
