//! The generic target record: an artifact, the trace it was produced
//! from, and the action that produces it.
//!
//! The mode parameter `M` says what the action is: a deferred `Action`
//! (passive), a running `Job` (active), or `()` once the target has been
//! materialized.

/// Read-only view shared by every target mode.
pub trait Info {
    type Artifact;
    type Trace;
    fn artifact(&self) -> &Self::Artifact;
    fn trace(&self) -> &Self::Trace;
}

#[derive(Debug, Clone)]
pub struct Target<A, T, M> {
    pub artifact: A,
    pub trace: T,
    pub action: M,
}

/// A target whose action has run to completion.
pub type Built<A, T> = Target<A, T, ()>;

impl<A, T, M> Target<A, T, M> {
    pub fn new(artifact: A, trace: T, action: M) -> Self {
        Target {
            artifact,
            trace,
            action,
        }
    }

    pub fn with_trace<U>(self, trace: U) -> Target<A, U, M> {
        Target {
            artifact: self.artifact,
            trace,
            action: self.action,
        }
    }

    pub fn with_artifact<B>(self, artifact: B) -> Target<B, T, M> {
        Target {
            artifact,
            trace: self.trace,
            action: self.action,
        }
    }

    /// Keeps only the ordering dependency, dropping the trace.
    pub fn discard_trace(self) -> Target<A, (), M> {
        self.with_trace(())
    }

    /// Keeps only the ordering dependency, dropping the artifact.
    pub fn discard_artifact(self) -> Target<(), T, M> {
        self.with_artifact(())
    }

    pub fn map_trace<U>(self, f: impl FnOnce(T) -> U) -> Target<A, U, M> {
        Target {
            artifact: self.artifact,
            trace: f(self.trace),
            action: self.action,
        }
    }
}

impl<A, T, M> Info for Target<A, T, M> {
    type Artifact = A;
    type Trace = T;

    fn artifact(&self) -> &A {
        &self.artifact
    }

    fn trace(&self) -> &T {
        &self.trace
    }
}
