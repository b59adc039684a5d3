use crate::error::ChordError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier represents a position on the Chord ring.
///
/// Stored as a 256-bit big-endian value; when a ring is configured with a
/// width `m < 256`, every identifier produced by the [`IdSpace`] has its
/// high `256 - m` bits zeroed, so plain byte-wise ordering agrees with
/// numeric ordering within the ring.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier([u8; 32]);

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hex with leading zero bytes trimmed; small rings stay readable.
        let first = self.0.iter().position(|b| *b != 0).unwrap_or(31);
        write!(f, "{}", hex::encode(&self.0[first..]))
    }
}

impl Identifier {
    /// Builds an identifier from a small integer. Intended for synthetic
    /// ring positions in tests and demos; real positions come from
    /// [`IdSpace::hash`].
    pub fn from_u64(v: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&v.to_be_bytes());
        Identifier(bytes)
    }

    /// Return the byte array corresponding to the identifier.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Rebuild an identifier from its 32-byte wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChordError> {
        if bytes.len() != 32 {
            return Err(ChordError::MalformedIdentifier(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut id = [0u8; 32];
        id.copy_from_slice(bytes);
        Ok(Identifier(id))
    }
}

/// Ring arithmetic over an m-bit identifier space.
///
/// All interval reasoning in the protocol goes through [`IdSpace::between`];
/// raw `<`/`>` comparisons do not survive wraparound past zero. The one
/// sanctioned exception is the no-predecessor responsibility branch, which
/// is defined in terms of plain ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdSpace {
    bits: u32,
}

impl IdSpace {
    /// Creates an identifier space of `2^bits` positions, `1 <= bits <= 256`.
    pub fn new(bits: u32) -> Result<Self, ChordError> {
        if bits == 0 || bits > 256 {
            return Err(ChordError::MalformedIdentifier(format!(
                "identifier width must be between 1 and 256 bits, got {}",
                bits
            )));
        }
        Ok(IdSpace { bits })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Hashes arbitrary bytes (an `address:port` string or an application
    /// key) onto the ring: SHA-256 reduced modulo `2^m` by truncation to
    /// the low `m` bits.
    pub fn hash(&self, data: &[u8]) -> Identifier {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        self.mask(&mut bytes);
        Identifier(bytes)
    }

    /// Does `id` fit within the configured width? Caller-supplied ring
    /// positions must pass this; anything produced by [`IdSpace::hash`] or
    /// [`IdSpace::add_pow2`] does by construction.
    pub fn contains(&self, id: Identifier) -> bool {
        let mut bytes = id.0;
        self.mask(&mut bytes);
        bytes == id.0
    }

    /// Computes `(id + 2^i) mod 2^m`, the start of the i-th finger interval.
    pub fn add_pow2(&self, id: Identifier, i: u32) -> Identifier {
        debug_assert!(i < self.bits, "finger index {} out of range for m={}", i, self.bits);
        let mut bytes = id.0;
        let mut byte = 31 - (i / 8) as usize;
        let (sum, mut carry) = bytes[byte].overflowing_add(1u8 << (i % 8));
        bytes[byte] = sum;
        while carry && byte > 0 {
            byte -= 1;
            let (sum, c) = bytes[byte].overflowing_add(1);
            bytes[byte] = sum;
            carry = c;
        }
        self.mask(&mut bytes);
        Identifier(bytes)
    }

    /// Ring-arc membership: is `x` on the arc from `a` to `b`, walking
    /// clockwise? Endpoint membership is governed by the inclusivity flags.
    /// When `a == b` the arc spans the whole ring.
    pub fn between(&self, a: Identifier, x: Identifier, b: Identifier, incl_low: bool, incl_high: bool) -> bool {
        if x == a && x == b {
            return incl_low || incl_high;
        }
        if x == a {
            return incl_low;
        }
        if x == b {
            return incl_high;
        }
        match a.cmp(&b) {
            std::cmp::Ordering::Less => a < x && x < b,
            std::cmp::Ordering::Greater => x > a || x < b,
            std::cmp::Ordering::Equal => true,
        }
    }

    fn mask(&self, bytes: &mut [u8; 32]) {
        let full = (self.bits / 8) as usize;
        let rem = self.bits % 8;
        let cut = 32 - full;
        if rem == 0 {
            for b in &mut bytes[..cut] {
                *b = 0;
            }
        } else {
            for b in &mut bytes[..cut - 1] {
                *b = 0;
            }
            bytes[cut - 1] &= (1u8 << rem) - 1;
        }
    }
}
