//! Targets whose artifacts are files, traced by modification time.

use crate::build_target::{ActiveBuildTarget, BuildTarget};
use crate::fs::{FileSystem, MTime, StatError};
use crate::perf;
use crate::target::Target;
use crate::task::{Action, Job};
use crate::trace::Trace;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type FileTarget = BuildTarget<PathBuf, MTime>;
pub type FilesTarget = BuildTarget<Vec<PathBuf>, MTime>;
pub type ActiveFileTarget = ActiveBuildTarget<PathBuf, MTime>;
pub type ActiveFilesTarget = ActiveBuildTarget<Vec<PathBuf>, MTime>;

impl Target<PathBuf, MTime, Action> {
    /// Stats `path` into a target with nothing to build.
    pub fn compute(fs: &dyn FileSystem, path: impl Into<PathBuf>) -> Result<Self, StatError> {
        let path = path.into();
        let mtime = perf::scope("stat", || fs.stat(&path))?;
        Ok(Target::pure(path, mtime))
    }

    pub fn path(&self) -> &Path {
        &self.artifact
    }
}

impl Target<Vec<PathBuf>, MTime, Action> {
    /// Stats every path, in parallel, into one target traced by the
    /// newest of them.  Paths keep their given order.
    pub fn compute<P: Into<PathBuf>>(
        fs: &dyn FileSystem,
        paths: impl IntoIterator<Item = P>,
    ) -> Result<Self, StatError> {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        let mtimes = perf::scope("stat", || {
            paths
                .par_iter()
                .map(|path| fs.stat(path))
                .collect::<Result<Vec<MTime>, StatError>>()
        })?;
        let mtime = MTime::mix_all(&mtimes);
        Ok(Target::pure(paths, mtime))
    }

    /// Joins file targets: building the result builds all of them
    /// concurrently.
    pub fn from_targets(targets: impl IntoIterator<Item = FileTarget>) -> Self {
        FileTarget::collect(targets)
    }

    pub fn singleton(target: FileTarget) -> Self {
        Target {
            artifact: vec![target.artifact],
            trace: target.trace,
            action: target.action,
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.artifact
    }
}

impl<A, T: Trace> FromIterator<BuildTarget<A, T>> for BuildTarget<Vec<A>, T> {
    fn from_iter<I: IntoIterator<Item = BuildTarget<A, T>>>(iter: I) -> Self {
        BuildTarget::collect(iter)
    }
}

impl Target<PathBuf, MTime, Job> {
    pub fn path(&self) -> &Path {
        &self.artifact
    }

    /// Builds `path` from `dep` unless `path` already exists and is not
    /// older than `dep`.  The check happens once `dep` is built, on the
    /// returned target's job.
    ///
    /// The returned target is traced by `dep`: once built, the output
    /// reflects exactly that input state.
    pub fn build_unless_up_to_date<A>(
        fs: Arc<dyn FileSystem>,
        path: impl Into<PathBuf>,
        dep: &ActiveBuildTarget<A, MTime>,
        build: impl FnOnce() -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        let path = path.into();
        let dep_mtime = dep.trace;
        let out = path.clone();
        let job = dep.after(Action::new(move || {
            let stale = match fs.stat(&out) {
                Ok(mtime) => !mtime.is_up_to_date(&dep_mtime),
                Err(StatError::NotFound { .. }) => true,
                Err(err) => return Err(err.into()),
            };
            if stale {
                build()?;
                fs.invalidate(&out);
            }
            Ok(())
        }));
        Target::new(path, dep_mtime, job)
    }
}

impl Target<Vec<PathBuf>, MTime, Job> {
    pub fn from_targets<'a>(targets: impl IntoIterator<Item = &'a ActiveFileTarget>) -> Self {
        ActiveFileTarget::collect(targets)
    }

    pub fn singleton(target: &ActiveFileTarget) -> Self {
        Target::new(
            vec![target.artifact.clone()],
            target.trace,
            target.action.clone(),
        )
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.artifact
    }
}
