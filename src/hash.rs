//! Content hashing: FNV-1a identity hashes and CRC32 blob checksums.
//!
//! Neither is cryptographic; both are compact, reproducible fingerprints.
//! `fnv1a32` keys identifiers (spec ids, asset hashes) and CRC32 guards
//! container blobs against corruption.

/// 32-bit FNV-1a over the bytes of `text`.
pub fn fnv1a32(text: &str) -> u32 {
    let mut h: u32 = 0x811C_9DC5;
    for &b in text.as_bytes() {
        h ^= u32::from(b);
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

/// Incremental CRC32 (IEEE, zlib-compatible).
#[derive(Clone, Copy)]
pub struct Crc32(u32);

impl Crc32 {
    pub fn new() -> Self {
        Self(0xFFFF_FFFF)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let mut c = self.0;
        for &b in bytes {
            c ^= u32::from(b);
            for _ in 0..8 {
                let mask = (c & 1).wrapping_neg();
                c = (c >> 1) ^ (0xEDB8_8320 & mask);
            }
        }
        self.0 = c;
    }

    pub fn finish(self) -> u32 {
        !self.0
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot CRC32 of a byte slice.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut c = Crc32::new();
    c.write_bytes(bytes);
    c.finish()
}
