//! Units of build work, either deferred or already running.
//!
//! An Action is a closure that has not started.  Spawning it starts it on
//! its own thread and yields a Job, a shareable handle that any number of
//! dependents may wait on.  Failures stay latent in the Job until someone
//! waits for it.
//!
//! Every job gets a thread rather than a slot in a fixed pool: jobs block
//! on other jobs, and a fixed pool of blocked waiters can deadlock.

use crate::perf;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

type Thunk = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// A deferred unit of work.  Runs at most once: running or spawning
/// consumes it.
pub struct Action(Option<Thunk>);

impl Action {
    pub fn new(f: impl FnOnce() -> anyhow::Result<()> + Send + 'static) -> Self {
        Action(Some(Box::new(f)))
    }

    /// The action with nothing to do.
    pub fn nop() -> Self {
        Action(None)
    }

    pub fn is_nop(&self) -> bool {
        self.0.is_none()
    }

    /// Runs to completion on the calling thread.
    pub fn run(self) -> anyhow::Result<()> {
        match self.0 {
            None => Ok(()),
            Some(f) => f(),
        }
    }

    /// Starts running concurrently.  Never blocks.
    pub fn spawn(self) -> Job {
        match self.0 {
            None => Job::done(),
            Some(f) => Job::spawn(f),
        }
    }

    /// Runs `self`, then `next` if `self` succeeded.
    pub fn then(self, next: Action) -> Action {
        match (self.0, next.0) {
            (None, next) => Action(next),
            (first, None) => Action(first),
            (Some(first), Some(next)) => Action::new(move || {
                first()?;
                next()
            }),
        }
    }

    /// Fan-out/fan-in: when run, spawns every action concurrently and
    /// waits for all of them.
    pub fn join_all(actions: impl IntoIterator<Item = Action>) -> Action {
        let actions: Vec<Action> = actions.into_iter().filter(|a| !a.is_nop()).collect();
        if actions.is_empty() {
            return Action::nop();
        }
        Action::new(move || {
            let jobs: Vec<Job> = actions.into_iter().map(Action::spawn).collect();
            Job::wait_all(&jobs)?;
            Ok(())
        })
    }

    /// Runs each action in order, stopping at the first failure.
    pub fn sequence(actions: impl IntoIterator<Item = Action>) -> Action {
        actions.into_iter().fold(Action::nop(), Action::then)
    }
}

impl Default for Action {
    fn default() -> Self {
        Action::nop()
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            None => write!(f, "Action(nop)"),
            Some(_) => write!(f, "Action(..)"),
        }
    }
}

/// The error of a failed job, shared between everyone waiting on it.
#[derive(Clone)]
pub struct Failure(Arc<anyhow::Error>);

impl Failure {
    /// Wraps an error, unwrapping rather than nesting an existing Failure.
    pub fn new(err: anyhow::Error) -> Self {
        match err.downcast::<Failure>() {
            Ok(failure) => failure,
            Err(err) => Failure(Arc::new(err)),
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Failure::new(anyhow::anyhow!("action panicked: {}", msg))
    }

    /// The original error, if it was an `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&*self.0, f)
    }
}

impl std::fmt::Debug for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&*self.0, f)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

struct JobState {
    result: Mutex<Option<Result<(), Failure>>>,
    finished: Condvar,
}

impl JobState {
    fn lock(&self) -> MutexGuard<'_, Option<Result<(), Failure>>> {
        // The slot is written once, under the lock, so a poisoned lock
        // still holds a consistent value.
        self.result
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to work that has already started (and may have finished).
#[derive(Clone)]
pub struct Job {
    state: Arc<JobState>,
}

impl Job {
    fn pending() -> Self {
        Job {
            state: Arc::new(JobState {
                result: Mutex::new(None),
                finished: Condvar::new(),
            }),
        }
    }

    fn finish(&self, result: Result<(), Failure>) {
        *self.state.lock() = Some(result);
        self.state.finished.notify_all();
    }

    /// A job that has already succeeded.
    pub fn done() -> Self {
        let job = Job::pending();
        job.finish(Ok(()));
        job
    }

    /// A job that has already failed.
    pub fn failed(err: anyhow::Error) -> Self {
        let job = Job::pending();
        job.finish(Err(Failure::new(err)));
        job
    }

    /// Starts `f` on a new thread.  If the OS refuses the thread, the
    /// job fails instead.
    pub fn spawn(f: impl FnOnce() -> anyhow::Result<()> + Send + 'static) -> Self {
        let job = Job::pending();
        let handle = job.clone();
        let spawned = thread::Builder::new().spawn(move || {
            let result = perf::scope("job", || panic::catch_unwind(AssertUnwindSafe(f)));
            let result = match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(Failure::new(err)),
                Err(payload) => Err(Failure::from_panic(payload)),
            };
            handle.finish(result);
        });
        job.started(spawned);
        job
    }

    fn started<T>(&self, spawned: std::io::Result<thread::JoinHandle<T>>) {
        if let Err(err) = spawned {
            let err = anyhow::Error::new(err).context("starting job thread");
            self.finish(Err(Failure::new(err)));
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Blocks until the job finishes, surfacing its failure if any.
    pub fn wait(&self) -> Result<(), Failure> {
        let mut slot = self.state.lock();
        loop {
            if let Some(result) = &*slot {
                return result.clone();
            }
            slot = self
                .state
                .finished
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Blocks until every job finishes.  Reports the first failure in
    /// list order, but only after all jobs are done.
    pub fn wait_all<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Result<(), Failure> {
        perf::scope("wait_all", || {
            let mut first_failure = None;
            for job in jobs {
                if let Err(failure) = job.wait() {
                    first_failure.get_or_insert(failure);
                }
            }
            match first_failure {
                None => Ok(()),
                Some(failure) => Err(failure),
            }
        })
    }

    /// A job that runs `act` once this one succeeds.  If this one fails,
    /// `act` is skipped and the failure carries through.
    pub fn then(&self, act: Action) -> Job {
        Job::after_all(vec![self.clone()], act)
    }

    /// Fan-in: a job that runs `act` once all `jobs` have finished.
    pub fn after_all(jobs: Vec<Job>, act: Action) -> Job {
        if act.is_nop() {
            match jobs.len() {
                0 => return Job::done(),
                1 => return jobs.into_iter().next().unwrap_or_else(Job::done),
                _ => {}
            }
        }
        Job::spawn(move || {
            Job::wait_all(&jobs)?;
            act.run()
        })
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.state.lock() {
            None => write!(f, "Job(running)"),
            Some(Ok(())) => write!(f, "Job(done)"),
            Some(Err(failure)) => write!(f, "Job(failed: {})", failure),
        }
    }
}
