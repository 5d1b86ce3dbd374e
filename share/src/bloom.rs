use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher as _;

/// Window length over filename bytes; also the shortest token the filter
/// can reject.
pub const MIN_TOKEN: usize = 3;

const DEFAULT_BITS: usize = 1 << 20;
const DEFAULT_HASHES: u32 = 5;

/// Probabilistic set of lowercased filename substrings.
///
/// Every `MIN_TOKEN`-byte window of every shared filename is added, so a
/// token whose windows are not all present cannot occur in any shared
/// name. Removals are not supported; a full rescan rebuilds the filter
/// and prunes the accumulated false positives.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    m: usize,
    k: u32,
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BITS, DEFAULT_HASHES)
    }
}

impl BloomFilter {
    pub fn new(m: usize, k: u32) -> Self {
        let m = m.max(64);
        Self {
            bits: vec![0u64; m.div_ceil(64)],
            m,
            k,
        }
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
    }

    /// Add every window of a folded (lowercased) filename.
    pub fn add_name(&mut self, folded: &str) {
        let bytes = folded.as_bytes();
        if bytes.len() < MIN_TOKEN {
            return;
        }
        for window in bytes.windows(MIN_TOKEN) {
            self.set(window);
        }
    }

    /// `false` means no shared filename can contain `folded`. Tokens
    /// shorter than the window cannot be rejected.
    pub fn maybe_contains(&self, folded: &str) -> bool {
        let bytes = folded.as_bytes();
        if bytes.len() < MIN_TOKEN {
            return true;
        }
        bytes.windows(MIN_TOKEN).all(|w| self.get(w))
    }

    fn set(&mut self, key: &[u8]) {
        let (h1, h2) = key_hashes(key, 0);
        for i in 0..self.k as u64 {
            let idx = (h1.wrapping_add(i.wrapping_mul(h2)) % self.m as u64) as usize;
            self.bits[idx / 64] |= 1 << (idx % 64);
        }
    }

    fn get(&self, key: &[u8]) -> bool {
        let (h1, h2) = key_hashes(key, 0);
        (0..self.k as u64).all(|i| {
            let idx = (h1.wrapping_add(i.wrapping_mul(h2)) % self.m as u64) as usize;
            self.bits[idx / 64] & (1 << (idx % 64)) != 0
        })
    }
}

/// Build a parameterized filter over raw keys and serialize it as bit
/// bytes, least significant bit first. Used to advertise the set of
/// shared roots to the distributed hash table.
pub fn export_keys<'a, I>(keys: I, k: u32, m: usize, h: u64) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let m = m.max(8);
    let mut bytes = vec![0u8; m.div_ceil(8)];
    for key in keys {
        let (h1, h2) = key_hashes(key, h);
        for i in 0..k as u64 {
            let idx = (h1.wrapping_add(i.wrapping_mul(h2)) % m as u64) as usize;
            bytes[idx / 8] |= 1 << (idx % 8);
        }
    }
    bytes
}

fn key_hashes(key: &[u8], seed: u64) -> (u64, u64) {
    let mut a = DefaultHasher::new();
    a.write_u64(seed);
    a.write(key);
    let h1 = a.finish();
    let mut b = DefaultHasher::new();
    b.write_u64(seed ^ 0x9e37_79b9_7f4a_7c15);
    b.write(key);
    // An even second hash would cycle through a subset of positions.
    (h1, b.finish() | 1)
}
