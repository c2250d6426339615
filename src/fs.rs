//! Filesystem queries: modification times and file contents.
//!
//! Everything that touches the disk goes through the FileSystem trait so
//! tests can substitute an in-memory implementation.

use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Modification time of a file.  Later is "younger".
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MTime(pub SystemTime);

impl MTime {
    /// The stamp of an empty aggregate.
    pub const EPOCH: MTime = MTime(SystemTime::UNIX_EPOCH);

    pub fn from_secs(secs: u64) -> Self {
        MTime(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
    }

    /// Whether an output stamped `self` is at least as young as `deps`.
    pub fn is_up_to_date(&self, deps: &MTime) -> bool {
        self >= deps
    }
}

impl Default for MTime {
    fn default() -> Self {
        MTime::EPOCH
    }
}

impl std::fmt::Display for MTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(d) => write!(f, "{}.{:09}", d.as_secs(), d.subsec_nanos()),
            Err(err) => {
                let d = err.duration();
                write!(f, "-{}.{:09}", d.as_secs(), d.subsec_nanos())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatError {
    #[error("{path:?}: not found")]
    NotFound { path: PathBuf },
    #[error("stat {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StatError {
    pub(crate) fn from_io(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StatError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            StatError::Io {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            StatError::NotFound { path } | StatError::Io { path, .. } => path,
        }
    }
}

pub trait FileSystem: Send + Sync {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
    /// stat() an on-disk path, producing its MTime.
    fn stat(&self, path: &Path) -> Result<MTime, StatError>;
    /// Called after a build step may have rewritten `path`.
    fn invalidate(&self, _path: &Path) {}
}

impl<F: FileSystem + ?Sized> FileSystem for Arc<F> {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        (**self).read(path)
    }

    fn stat(&self, path: &Path) -> Result<MTime, StatError> {
        (**self).stat(path)
    }

    fn invalidate(&self, path: &Path) {
        (**self).invalidate(path)
    }
}

#[derive(Clone, Copy, Default)]
pub struct RealFileSystem {}
impl RealFileSystem {
    pub fn new() -> Self {
        RealFileSystem {}
    }
}

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn stat(&self, path: &Path) -> Result<MTime, StatError> {
        let meta = std::fs::metadata(path).map_err(|err| StatError::from_io(path, err))?;
        let mtime = meta
            .modified()
            .map_err(|err| StatError::from_io(path, err))?;
        Ok(MTime(mtime))
    }
}

type FxDashMap<K, V> = DashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Memoizes stat() results across a build.  Safe to share between jobs.
/// Only successful stats are remembered, so a file that appears later
/// is still found.
pub struct StatCache<F> {
    inner: F,
    mtimes: FxDashMap<PathBuf, MTime>,
}

impl<F: FileSystem> StatCache<F> {
    pub fn new(inner: F) -> Self {
        StatCache {
            inner,
            mtimes: FxDashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.mtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mtimes.is_empty()
    }
}

impl<F: FileSystem> FileSystem for StatCache<F> {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn stat(&self, path: &Path) -> Result<MTime, StatError> {
        if let Some(mtime) = self.mtimes.get(path) {
            return Ok(*mtime);
        }
        let mtime = self.inner.stat(path)?;
        self.mtimes.insert(path.to_path_buf(), mtime);
        Ok(mtime)
    }

    fn invalidate(&self, path: &Path) {
        self.mtimes.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFileSystem {
        stats: AtomicUsize,
    }

    impl FileSystem for CountingFileSystem {
        fn read(&self, _path: &Path) -> std::io::Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn stat(&self, path: &Path) -> Result<MTime, StatError> {
            self.stats.fetch_add(1, Ordering::SeqCst);
            if path == Path::new("missing") {
                return Err(StatError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Ok(MTime::from_secs(7))
        }
    }

    #[test]
    fn mtime_ordering() {
        assert!(MTime::from_secs(2) > MTime::from_secs(1));
        assert_eq!(MTime::EPOCH, MTime::from_secs(0));
        assert_eq!(MTime::default(), MTime::EPOCH);
        assert!(MTime::from_secs(5).is_up_to_date(&MTime::from_secs(5)));
        assert!(!MTime::from_secs(4).is_up_to_date(&MTime::from_secs(5)));
    }

    #[test]
    fn real_stat_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope");
        match RealFileSystem::new().stat(&path) {
            Err(StatError::NotFound { path: p }) => assert_eq!(p, path),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn cache_memoizes_hits_only() {
        let cache = StatCache::new(CountingFileSystem {
            stats: AtomicUsize::new(0),
        });
        assert_eq!(cache.stat(Path::new("a")).unwrap(), MTime::from_secs(7));
        assert_eq!(cache.stat(Path::new("a")).unwrap(), MTime::from_secs(7));
        assert!(cache.stat(Path::new("missing")).is_err());
        assert!(cache.stat(Path::new("missing")).is_err());
        assert_eq!(cache.inner.stats.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 1);

        cache.invalidate(Path::new("a"));
        assert!(cache.is_empty());
        cache.stat(Path::new("a")).unwrap();
        assert_eq!(cache.inner.stats.load(Ordering::SeqCst), 4);
    }
}
