//! MurmurHash3 (x86, 32-bit) and the shard routing id derived from it.

pub const SCUTTLE_SEED: u32 = 0x183d_1db4;
pub const MAX_SCUTTLE_BUCKETS: u32 = 1024;

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// MurmurHash3 x86_32, reinterpreted as a signed value so digests compare
/// equal to the proxy's own logs.
pub fn murmur3_32(data: &[u8], seed: u32) -> i32 {
    let mut h1 = seed;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let k1 = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h1 ^= mix_k1(k1);
        h1 = h1.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k1 = 0u32;
        for (shift, byte) in tail.iter().enumerate() {
            k1 |= u32::from(*byte) << (8 * shift);
        }
        h1 ^= mix_k1(k1);
    }

    h1 ^= data.len() as u32;
    fmix32(h1) as i32
}

fn mix_k1(k1: u32) -> u32 {
    k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Bucket a bound shard-key fragment routes to. Decimal integers are hashed
/// as their eight little-endian bytes, anything else as raw bytes.
pub fn scuttle_id(fragment: &[u8]) -> u32 {
    let numeric = std::str::from_utf8(fragment)
        .ok()
        .and_then(|text| text.trim().parse::<i64>().ok());
    let hash = match numeric {
        Some(value) => murmur3_32(&value.to_le_bytes(), SCUTTLE_SEED),
        None => murmur3_32(fragment, SCUTTLE_SEED),
    };
    (hash as u32) % MAX_SCUTTLE_BUCKETS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_hashes_to_mixed_seed() {
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"", 1) as u32, 0x514e_28b7);
    }

    #[test]
    fn tail_lengths_are_covered() {
        let a = murmur3_32(b"a", SCUTTLE_SEED);
        let ab = murmur3_32(b"ab", SCUTTLE_SEED);
        let abc = murmur3_32(b"abc", SCUTTLE_SEED);
        assert_ne!(a, ab);
        assert_ne!(ab, abc);
    }
}
