use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ShareError;

/// Number of bytes in a Tiger tree root.
pub const TTH_BYTES: usize = 24;

/// Base32 length of an encoded root (192 bits / 5, rounded up).
pub const TTH_BASE32_LEN: usize = 39;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Root of a Tiger tree over one file, as advertised on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TthValue(pub [u8; TTH_BYTES]);

impl TthValue {
    /// Wire form: unpadded RFC 4648 base32.
    pub fn encoded(&self) -> String {
        let mut out = String::with_capacity(TTH_BASE32_LEN);
        let mut acc: u32 = 0;
        let mut bits = 0u32;
        for &b in &self.0 {
            acc = (acc << 8) | b as u32;
            bits += 8;
            while bits >= 5 {
                bits -= 5;
                out.push(BASE32_ALPHABET[((acc >> bits) & 0x1f) as usize] as char);
            }
        }
        if bits > 0 {
            out.push(BASE32_ALPHABET[((acc << (5 - bits)) & 0x1f) as usize] as char);
        }
        out
    }
}

impl fmt::Display for TthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded())
    }
}

impl FromStr for TthValue {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != TTH_BASE32_LEN {
            return Err(ShareError::InvalidTth(s.to_string()));
        }
        let mut bytes = [0u8; TTH_BYTES];
        let mut acc: u32 = 0;
        let mut bits = 0u32;
        let mut i = 0;
        for c in s.bytes() {
            let v = decode_symbol(c).ok_or_else(|| ShareError::InvalidTth(s.to_string()))?;
            acc = (acc << 5) | v as u32;
            bits += 5;
            if bits >= 8 {
                bits -= 8;
                if i < TTH_BYTES {
                    bytes[i] = ((acc >> bits) & 0xff) as u8;
                    i += 1;
                }
            }
        }
        if i != TTH_BYTES {
            return Err(ShareError::InvalidTth(s.to_string()));
        }
        Ok(TthValue(bytes))
    }
}

fn decode_symbol(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a'),
        b'2'..=b'7' => Some(c - b'2' + 26),
        _ => None,
    }
}
