//! Fixed-width digests identifying the content that went into a build.
//!
//! Digests are polynomial: a digest of n leaves is
//!   sum(leaf_i * BASE^(n-1-i))
//! together with BASE^n.  Mixing two digests is then just concatenation,
//! which is associative but sensitive to the order of its operands, so
//! an aggregate's identity reflects how its children were composed.

use crate::fs::{FileSystem, StatError};
use crate::perf;
use rustc_hash::FxHasher;
use std::hash::Hasher;
use std::path::Path;

/// Multiplier applied per leaf.  Odd, so it is invertible mod 2^64 and
/// powers of it never collapse to zero.
const BASE: u64 = 0x0000_0100_0000_01b3;

const UNIT_SEPARATOR: u8 = 0x1F;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Hash {
    value: u64,
    scale: u64,
}

impl Hash {
    /// Digest of nothing; the identity for `mix`.
    pub const EMPTY: Hash = Hash { value: 0, scale: 1 };

    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = FxHasher::default();
        hasher.write(bytes);
        hasher.write_u8(UNIT_SEPARATOR);
        Hash {
            value: hasher.finish(),
            scale: BASE,
        }
    }

    pub fn of_str(s: &str) -> Self {
        Hash::of_bytes(s.as_bytes())
    }

    /// Hashes the content of the file at `path`.
    pub fn of_file(fs: &dyn FileSystem, path: &Path) -> Result<Self, StatError> {
        perf::scope("hash_file", || {
            let bytes = fs.read(path).map_err(|err| StatError::from_io(path, err))?;
            Ok(Hash::of_bytes(&bytes))
        })
    }

    /// Appends `other` after `self`.
    pub fn mix(&self, other: &Hash) -> Hash {
        Hash {
            value: self
                .value
                .wrapping_mul(other.scale)
                .wrapping_add(other.value),
            scale: self.scale.wrapping_mul(other.scale),
        }
    }

    /// Folds digests left to right, starting from EMPTY.
    pub fn mix_all<'a>(hashes: impl IntoIterator<Item = &'a Hash>) -> Hash {
        hashes
            .into_iter()
            .fold(Hash::EMPTY, |acc, hash| acc.mix(hash))
    }
}

impl Default for Hash {
    fn default() -> Self {
        Hash::EMPTY
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}{:016x}", self.value, self.scale)
    }
}
