// MurmurHash3 (x86, 32-bit) as used by BIP37 bloom filters

const C1: u32 = 0xcc9e2d51;
const C2: u32 = 0x1b873593;

/// 32-bit MurmurHash3 of `data` with the given seed
pub fn murmur3(data: &[u8], seed: u32) -> u32 {
    let mut h1 = seed;
    let mut blocks = data.chunks_exact(4);

    for block in &mut blocks {
        let k1 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h1 ^= mix(k1);
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let k1 = tail
            .iter()
            .enumerate()
            .fold(0u32, |k, (i, &byte)| k | (byte as u32) << (8 * i));
        h1 ^= mix(k1);
    }

    h1 ^= data.len() as u32;
    fmix(h1)
}

fn mix(k1: u32) -> u32 {
    k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

fn fmix(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}
