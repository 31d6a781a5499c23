// ---------------------------------------------------------------------------
// file_header – fixed-size header in front of every railway save
// ---------------------------------------------------------------------------
//
// Header format (28 bytes, fixed-size, little-endian):
//   [0..4]   Magic bytes: "RAIL"
//   [4..8]   Header format version (u32)
//   [8..12]  Flags (u32: bit 0 = LZ4-compressed payload)
//   [12..20] Timestamp (Unix epoch seconds, u64)
//   [20..24] Uncompressed payload size (u32)
//   [24..28] xxHash32 checksum of the stored payload (everything after the header)

use xxhash_rust::xxh32::xxh32;

use crate::save_error::SaveError;

pub const MAGIC: [u8; 4] = *b"RAIL";

pub const HEADER_SIZE: usize = 28;

/// Version of the header layout, independent of the payload schema.
pub const HEADER_FORMAT_VERSION: u32 = 1;

pub const FLAG_COMPRESSED: u32 = 1;

const XXHASH_SEED: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub format_version: u32,
    pub flags: u32,
    pub timestamp: u64,
    pub uncompressed_size: u32,
    pub checksum: u32,
}

impl FileHeader {
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&MAGIC);
        out[4..8].copy_from_slice(&self.format_version.to_le_bytes());
        out[8..12].copy_from_slice(&self.flags.to_le_bytes());
        out[12..20].copy_from_slice(&self.timestamp.to_le_bytes());
        out[20..24].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        out[24..28].copy_from_slice(&self.checksum.to_le_bytes());
        out
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

/// Prepend a header to `data`, LZ4-compressing the payload when `compress`
/// is set. Returns `[header (28 bytes)] ++ [stored payload]`.
pub fn wrap_with_header(data: &[u8], compress: bool) -> Vec<u8> {
    let stored = if compress {
        lz4_flex::compress_prepend_size(data)
    } else {
        data.to_vec()
    };
    let header = FileHeader {
        format_version: HEADER_FORMAT_VERSION,
        flags: if compress { FLAG_COMPRESSED } else { 0 },
        timestamp: now_secs(),
        uncompressed_size: data.len() as u32,
        checksum: xxh32(&stored, XXHASH_SEED),
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + stored.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&stored);
    out
}

/// Validate the header and return it with the stored (possibly compressed)
/// payload.
pub fn unwrap_header(bytes: &[u8]) -> Result<(FileHeader, &[u8]), SaveError> {
    if bytes.is_empty() {
        return Err(SaveError::NoData);
    }
    if bytes.len() < 4 || bytes[..4] != MAGIC {
        return Err(SaveError::Corrupted("missing RAIL magic bytes".to_string()));
    }
    if bytes.len() < HEADER_SIZE {
        return Err(SaveError::Corrupted(format!(
            "header too short ({} bytes, need {})",
            bytes.len(),
            HEADER_SIZE
        )));
    }

    let mut timestamp = [0u8; 8];
    timestamp.copy_from_slice(&bytes[12..20]);
    let header = FileHeader {
        format_version: read_u32(bytes, 4),
        flags: read_u32(bytes, 8),
        timestamp: u64::from_le_bytes(timestamp),
        uncompressed_size: read_u32(bytes, 20),
        checksum: read_u32(bytes, 24),
    };

    if header.format_version > HEADER_FORMAT_VERSION {
        return Err(SaveError::VersionMismatch {
            expected_max: HEADER_FORMAT_VERSION,
            found: header.format_version,
        });
    }

    let payload = &bytes[HEADER_SIZE..];
    let computed = xxh32(payload, XXHASH_SEED);
    if computed != header.checksum {
        return Err(SaveError::Corrupted(format!(
            "checksum mismatch (expected {:#010X}, got {:#010X})",
            header.checksum, computed
        )));
    }

    Ok((header, payload))
}

/// Undo the compression recorded in `header`.
pub fn decode_payload(header: &FileHeader, payload: &[u8]) -> Result<Vec<u8>, SaveError> {
    let data = if header.is_compressed() {
        lz4_flex::decompress_size_prepended(payload)?
    } else {
        payload.to_vec()
    };
    if data.len() != header.uncompressed_size as usize {
        return Err(SaveError::Corrupted(format!(
            "payload is {} bytes, header says {}",
            data.len(),
            header.uncompressed_size
        )));
    }
    Ok(data)
}
