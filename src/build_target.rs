//! Passive and active build targets.
//!
//! A passive target holds an Action that has not started; an active one
//! holds the Job it became.  `spawn` is the only way from one to the
//! other, and since it consumes the passive target an action can never
//! be started twice.

use crate::perf;
use crate::target::{Built, Target};
use crate::task::{Action, Job};
use crate::trace::Trace;

pub type BuildTarget<A, T> = Target<A, T, Action>;
pub type ActiveBuildTarget<A, T> = Target<A, T, Job>;

impl<A, T> Target<A, T, Action> {
    /// A target that is already up to date: nothing to run.
    pub fn pure(artifact: A, trace: T) -> Self {
        Target::new(artifact, trace, Action::nop())
    }

    /// Starts the action concurrently.  Never blocks.
    pub fn spawn(self) -> ActiveBuildTarget<A, T> {
        Target {
            artifact: self.artifact,
            trace: self.trace,
            action: self.action.spawn(),
        }
    }

    /// Runs the action on this thread and waits for it to finish.
    pub fn materialize(self) -> anyhow::Result<Built<A, T>> {
        let Target {
            artifact,
            trace,
            action,
        } = self;
        perf::scope("materialize", || action.run())?;
        Ok(Target::new(artifact, trace, ()))
    }

    /// An action that builds this target, then runs `act`.
    pub fn after(self, act: Action) -> Action {
        self.action.then(act)
    }

    /// An action that builds each target in turn, then runs `act`.
    /// Sequential: targets are not started concurrently.
    pub fn after_list(targets: impl IntoIterator<Item = Self>, act: Action) -> Action {
        Action::sequence(targets.into_iter().map(|t| t.action)).then(act)
    }

    /// Replaces the action with one that runs the old one, then `act`.
    pub fn and_then(self, act: Action) -> Self {
        Target {
            artifact: self.artifact,
            trace: self.trace,
            action: self.action.then(act),
        }
    }
}

impl<A, T: Trace> Target<A, T, Action> {
    /// Aggregates targets into one.  Building the aggregate spawns every
    /// child concurrently and waits for all of them.
    pub fn collect(targets: impl IntoIterator<Item = Self>) -> BuildTarget<Vec<A>, T> {
        let mut artifacts = Vec::new();
        let mut traces = Vec::new();
        let mut actions = Vec::new();
        for t in targets {
            artifacts.push(t.artifact);
            traces.push(t.trace);
            actions.push(t.action);
        }
        Target::new(artifacts, T::mix_all(&traces), Action::join_all(actions))
    }
}

impl<A, T> Target<A, T, Job> {
    /// Waits for the job.  A failure inside the job surfaces here.
    pub fn materialize(&self) -> anyhow::Result<()> {
        self.action.wait()?;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.action.is_finished()
    }

    /// A job that runs `act` once this target is built.  Does not block.
    pub fn after(&self, act: Action) -> Job {
        self.action.then(act)
    }

    /// Fan-in: a job that runs `act` once every target is built, in
    /// whatever order they finish.
    pub fn after_list<'a>(targets: impl IntoIterator<Item = &'a Self>, act: Action) -> Job
    where
        Self: 'a,
    {
        let jobs = targets.into_iter().map(|t| t.action.clone()).collect();
        Job::after_all(jobs, act)
    }
}

impl<A: Clone, T: Trace> Target<A, T, Job> {
    /// Aggregates running targets into one whose job finishes when all
    /// of theirs have.
    pub fn collect<'a>(targets: impl IntoIterator<Item = &'a Self>) -> ActiveBuildTarget<Vec<A>, T>
    where
        Self: 'a,
    {
        let mut artifacts = Vec::new();
        let mut traces = Vec::new();
        let mut jobs = Vec::new();
        for t in targets {
            artifacts.push(t.artifact.clone());
            traces.push(&t.trace);
            jobs.push(t.action.clone());
        }
        let trace = T::mix_all(traces);
        Target::new(artifacts, trace, Job::after_all(jobs, Action::nop()))
    }
}

impl<T: Trace> Target<(), T, Job> {
    /// The already-finished target with nothing in it; the base case for
    /// folding over an empty dependency list.
    pub fn nil() -> Self {
        Target::new((), T::nil(), Job::done())
    }
}
