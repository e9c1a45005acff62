//! Key fingerprinting for the slot table
//!
//! MurmurHash3 x86 32-bit with a fixed seed. The hash itself is never
//! written to disk, but slot assignment at load time depends on it, so the
//! seed is part of the store's contract and must not change between builds
//! that share data directories.
//!
//! The std `DefaultHasher` is randomly seeded per process and therefore
//! unusable here; a deterministic hash is implemented in-crate instead.

/// Fixed seed for all key hashing.
pub const HASH_SEED: u32 = 666;

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// Fingerprint a key for slot placement.
pub fn hash_key(key: &[u8]) -> u32 {
    murmur3_x86_32(key, HASH_SEED)
}

/// MurmurHash3, x86 32-bit variant.
pub fn murmur3_x86_32(data: &[u8], seed: u32) -> u32 {
    let mut h1 = seed;

    let blocks = data.chunks_exact(4);
    let tail = blocks.remainder();

    for block in blocks {
        let mut k1 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);

        h1 ^= k1;
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    // Tail: 1-3 trailing bytes that did not fill a block
    let mut k1 = 0u32;
    if tail.len() >= 3 {
        k1 ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        k1 ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        k1 ^= tail[0] as u32;
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;
    }

    // Finalization: force avalanche
    h1 ^= data.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85eb_ca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2_ae35);
    h1 ^= h1 >> 16;

    h1
}
