//! Staleness traces: comparable values recording whether an artifact may
//! be out of date with respect to what it was built from.
//!
//! Traces compose.  An aggregate target's trace is the mix of its
//! children's traces, and mixing is monotonic in time: the aggregate is
//! never older than any child.

use crate::fs::{FileSystem, MTime, StatError};
use crate::hash::Hash;
use std::path::Path;

pub trait Trace: Clone + Send + Sync + 'static {
    /// The trace of an empty aggregate.  Not necessarily an identity for
    /// mix(): a file may be older than the epoch.
    fn nil() -> Self;

    fn mix(&self, other: &Self) -> Self;

    /// Folds traces in order, starting from the first.
    fn mix_all<'a>(traces: impl IntoIterator<Item = &'a Self>) -> Self
    where
        Self: 'a,
    {
        let mut traces = traces.into_iter();
        match traces.next() {
            None => Self::nil(),
            Some(first) => traces.fold(first.clone(), |acc, trace| acc.mix(trace)),
        }
    }
}

/// An aggregate is exactly as stale as its most recently changed member.
impl Trace for MTime {
    fn nil() -> Self {
        MTime::EPOCH
    }

    fn mix(&self, other: &Self) -> Self {
        std::cmp::max(*self, *other)
    }
}

impl Trace for Hash {
    fn nil() -> Self {
        Hash::EMPTY
    }

    fn mix(&self, other: &Self) -> Self {
        Hash::mix(self, other)
    }
}

/// Used for targets that only sequence side effects.
impl Trace for () {
    fn nil() -> Self {}

    fn mix(&self, _other: &Self) -> Self {}
}

/// Content hash plus modification time.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct BuildTrace {
    pub hash: Hash,
    pub mtime: MTime,
}

impl BuildTrace {
    pub fn new(hash: Hash, mtime: MTime) -> Self {
        BuildTrace { hash, mtime }
    }

    /// A trace carrying only time information.
    pub fn from_mtime(mtime: MTime) -> Self {
        BuildTrace {
            hash: Hash::EMPTY,
            mtime,
        }
    }

    /// Hashes and stats the file at `path`.
    pub fn compute_file(fs: &dyn FileSystem, path: &Path) -> Result<Self, StatError> {
        let mtime = fs.stat(path)?;
        let hash = Hash::of_file(fs, path)?;
        Ok(BuildTrace { hash, mtime })
    }

    /// Compares against a hash recorded by an earlier build.  No record
    /// means the output was never built.
    pub fn is_up_to_date(&self, recorded: Option<&Hash>) -> bool {
        recorded == Some(&self.hash)
    }
}

impl Trace for BuildTrace {
    fn nil() -> Self {
        BuildTrace::default()
    }

    fn mix(&self, other: &Self) -> Self {
        BuildTrace {
            hash: self.hash.mix(&other.hash),
            mtime: self.mtime.mix(&other.mtime),
        }
    }
}

impl From<MTime> for BuildTrace {
    fn from(mtime: MTime) -> Self {
        BuildTrace::from_mtime(mtime)
    }
}

impl std::fmt::Display for BuildTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.hash, self.mtime)
    }
}
