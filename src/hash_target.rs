//! Targets traced by content hash and modification time together.

use crate::build_target::ActiveBuildTarget;
use crate::fs::{FileSystem, MTime, StatError};
use crate::target::Target;
use crate::task::{Action, Job};
use crate::trace::{BuildTrace, Trace};
use std::path::PathBuf;

pub type HashTarget<A> = ActiveBuildTarget<A, BuildTrace>;

impl<A, M> Target<A, MTime, M> {
    /// Pairs the time trace with the empty hash, so the target can join a
    /// hash-aware aggregate without changing that aggregate's hash.
    pub fn with_empty_hash(self) -> Target<A, BuildTrace, M> {
        self.map_trace(BuildTrace::from)
    }
}

impl<A> Target<A, BuildTrace, Job> {
    pub fn from_mtime_target(target: ActiveBuildTarget<A, MTime>) -> Self {
        target.with_empty_hash()
    }

    /// Joins targets into one barrier target.  Its hash folds the
    /// children's hashes in order, its time is the newest child's, and
    /// its job finishes once every child's has.
    pub fn all<'a>(targets: impl IntoIterator<Item = &'a Self>) -> HashTarget<()>
    where
        Self: 'a,
    {
        let mut traces = Vec::new();
        let mut jobs = Vec::new();
        for t in targets {
            traces.push(&t.trace);
            jobs.push(t.action.clone());
        }
        let trace = BuildTrace::mix_all(traces);
        Target::new((), trace, Job::after_all(jobs, Action::nop()))
    }
}

impl Target<PathBuf, BuildTrace, Job> {
    /// Hashes and stats a source file into an already-built target.
    pub fn compute_file(fs: &dyn FileSystem, path: impl Into<PathBuf>) -> Result<Self, StatError> {
        let path = path.into();
        let trace = BuildTrace::compute_file(fs, &path)?;
        Ok(Target::new(path, trace, Job::done()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_target::BuildTarget;
    use crate::hash::Hash;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn leaf(name: &str, secs: u64) -> HashTarget<String> {
        Target::new(
            name.to_string(),
            BuildTrace::new(Hash::of_str(name), MTime::from_secs(secs)),
            Job::done(),
        )
    }

    #[test]
    fn all_of_nothing() {
        let t = HashTarget::<()>::all(&[]);
        assert_eq!(t.trace.hash, Hash::EMPTY);
        assert_eq!(t.trace.mtime, MTime::EPOCH);
        assert!(t.is_finished());
    }

    #[test]
    fn all_mixes_in_order() {
        let a = leaf("a", 10);
        let b = leaf("b", 30);
        let ab = HashTarget::all([&a, &b]);
        let ba = HashTarget::all([&b, &a]);
        assert_eq!(ab.trace.hash, Hash::of_str("a").mix(&Hash::of_str("b")));
        assert_eq!(ab.trace.mtime, MTime::from_secs(30));
        assert_ne!(ab.trace.hash, ba.trace.hash);
        assert_eq!(ab.trace.mtime, ba.trace.mtime);
    }

    #[test]
    fn all_waits_for_children() {
        let count = Arc::new(AtomicUsize::new(0));
        let children: Vec<HashTarget<()>> = (0..4)
            .map(|i| {
                let c = count.clone();
                BuildTarget::new(
                    (),
                    BuildTrace::new(Hash::of_str(&i.to_string()), MTime::from_secs(i)),
                    Action::new(move || {
                        std::thread::sleep(std::time::Duration::from_millis(5));
                        c.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                )
                .spawn()
            })
            .collect();
        let joined = HashTarget::all(&children);
        joined.materialize().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert_eq!(joined.trace.mtime, MTime::from_secs(3));
    }

    #[test]
    fn lifted_mtime_target_keeps_hash_neutral() {
        let a = leaf("a", 10);
        let timed: ActiveBuildTarget<String, MTime> =
            Target::new("t".to_string(), MTime::from_secs(50), Job::done());
        let lifted = HashTarget::from_mtime_target(timed);
        assert_eq!(lifted.trace.hash, Hash::EMPTY);

        let joined = HashTarget::all([&a, &lifted]);
        assert_eq!(joined.trace.hash, Hash::of_str("a"));
        assert_eq!(joined.trace.mtime, MTime::from_secs(50));
    }

    #[test]
    fn all_reports_child_failure() {
        let ok = leaf("ok", 1);
        let bad: HashTarget<String> = Target::new(
            "bad".to_string(),
            BuildTrace::default(),
            Job::failed(anyhow::anyhow!("bad child")),
        );
        let err = HashTarget::all([&ok, &bad]).materialize().unwrap_err();
        assert_eq!(err.to_string(), "bad child");
    }
}
