//! Structural hashing of operators.
//!
//! Operators write a canonical encoding of their identity into a [`Hasher`]. The encoding must not
//! depend on the platform or the process, so only explicit little-endian byte writes are used:
//! [`Hasher::write_usize`] and friends use native endianness and are avoided.
use core::hash::Hasher;

const OFFSET_BASIS: u32 = 0x811c_9dc5;
const PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
#[derive(Debug, Clone, Copy)]
pub struct Fnv32a(u32);

impl Fnv32a {
    pub fn new() -> Self {
        Fnv32a(OFFSET_BASIS)
    }

    pub fn sum32(&self) -> u32 {
        self.0
    }
}

impl Default for Fnv32a {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for Fnv32a {
    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 ^= u32::from(*b);
            self.0 = self.0.wrapping_mul(PRIME);
        }
    }

    fn finish(&self) -> u64 {
        u64::from(self.0)
    }
}

pub fn write_str(h: &mut dyn Hasher, s: &str) {
    h.write(s.as_bytes());
}

pub fn write_u64(h: &mut dyn Hasher, x: u64) {
    h.write(&x.to_le_bytes());
}

/// Lengths and indices are written as 64-bit so 32- and 64-bit targets agree.
pub fn write_len(h: &mut dyn Hasher, n: usize) {
    write_u64(h, n as u64);
}
