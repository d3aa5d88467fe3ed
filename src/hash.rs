//! Field key hashing
//!
//! Field keys are Bob Jenkins' lookup hashes of the field name: the 32-bit
//! `lookup2` variant for x86 databases and the 64-bit `lookup8` variant for
//! x64 databases, each seeded with the constants the game databases use.

const VLT32_INIT: u32 = 0xABCD_EF00;
const VLT64_LEVEL: u64 = 0x1122_3344_ABCD_EF00;

const GOLDEN32: u32 = 0x9e37_79b9;
const GOLDEN64: u64 = 0x9e37_79b9_7f4a_7c13;

/// 32-bit field key hash (Jenkins lookup2)
pub fn vlt32(name: &str) -> u32 {
    lookup2(name.as_bytes(), VLT32_INIT)
}

/// 64-bit field key hash (Jenkins lookup8)
pub fn vlt64(name: &str) -> u64 {
    lookup8(name.as_bytes(), VLT64_LEVEL)
}

fn mix32(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 13);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 8);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 13);
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 12);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 16);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 5);
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 3);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 10);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 15);
}

fn mix64(a: &mut u64, b: &mut u64, c: &mut u64) {
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 43);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 9);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 8);
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 38);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 23);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 5);
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 35);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 49);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 11);
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 12);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 18);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 22);
}

/// Little-endian word from a short byte run, zero padded.
fn word32(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .enumerate()
        .fold(0u32, |acc, (i, &b)| acc | (u32::from(b) << (8 * i)))
}

fn word64(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (u64::from(b) << (8 * i)))
}

fn lookup2(key: &[u8], init: u32) -> u32 {
    let (mut a, mut b, mut c) = (GOLDEN32, GOLDEN32, init);

    let mut chunks = key.chunks_exact(12);
    for chunk in &mut chunks {
        a = a.wrapping_add(word32(&chunk[0..4]));
        b = b.wrapping_add(word32(&chunk[4..8]));
        c = c.wrapping_add(word32(&chunk[8..12]));
        mix32(&mut a, &mut b, &mut c);
    }

    // The low byte of `c` is reserved for the length.
    c = c.wrapping_add(key.len() as u32);
    let tail = chunks.remainder();
    a = a.wrapping_add(word32(&tail[..tail.len().min(4)]));
    if tail.len() > 4 {
        b = b.wrapping_add(word32(&tail[4..tail.len().min(8)]));
    }
    if tail.len() > 8 {
        c = c.wrapping_add(word32(&tail[8..]) << 8);
    }
    mix32(&mut a, &mut b, &mut c);
    c
}

fn lookup8(key: &[u8], level: u64) -> u64 {
    let (mut a, mut b, mut c) = (level, level, GOLDEN64);

    let mut chunks = key.chunks_exact(24);
    for chunk in &mut chunks {
        a = a.wrapping_add(word64(&chunk[0..8]));
        b = b.wrapping_add(word64(&chunk[8..16]));
        c = c.wrapping_add(word64(&chunk[16..24]));
        mix64(&mut a, &mut b, &mut c);
    }

    c = c.wrapping_add(key.len() as u64);
    let tail = chunks.remainder();
    a = a.wrapping_add(word64(&tail[..tail.len().min(8)]));
    if tail.len() > 8 {
        b = b.wrapping_add(word64(&tail[8..tail.len().min(16)]));
    }
    if tail.len() > 16 {
        c = c.wrapping_add(word64(&tail[16..]) << 8);
    }
    mix64(&mut a, &mut b, &mut c);
    c
}
