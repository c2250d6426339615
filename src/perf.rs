//! Chrome trace output.
//!
//! Scopes may be entered from any job thread; each thread gets its own
//! track in the trace viewer.

use std::cell::Cell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

static TRACE: Mutex<Option<Trace>> = Mutex::new(None);

static NEXT_TID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static TID: Cell<Option<usize>> = Cell::new(None);
}

/// A small integer naming the current thread, for the "tid" field.
fn current_tid() -> usize {
    TID.with(|tid| match tid.get() {
        Some(id) => id,
        None => {
            let id = NEXT_TID.fetch_add(1, Ordering::Relaxed);
            tid.set(Some(id));
            id
        }
    })
}

enum EventType {
    Complete(Instant),
}

struct Event {
    name: &'static str,
    tid: usize,
    timestamp: Instant,
    event_type: EventType,
}

struct Trace {
    start: Instant,
    w: BufWriter<File>,
}

impl Trace {
    fn new(path: &str) -> std::io::Result<Self> {
        let mut w = BufWriter::new(File::create(path)?);
        writeln!(w, "[")?;
        Ok(Trace {
            start: Instant::now(),
            w,
        })
    }

    fn write_event(&mut self, event: Event) -> std::io::Result<()> {
        write!(
            self.w,
            "{{ \"pid\": 0, \"tid\": {}, \"name\": {:?}, \"ts\": {},",
            event.tid,
            event.name,
            event.timestamp.duration_since(self.start).as_micros(),
        )?;
        match event.event_type {
            EventType::Complete(end) => {
                write!(
                    self.w,
                    "\"ph\": \"X\", \"dur\": {} }}",
                    end.duration_since(event.timestamp).as_micros()
                )
            }
        }
    }

    fn write(&mut self, event: Event) -> std::io::Result<()> {
        self.write_event(event)?;
        writeln!(self.w, ",")
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.write_event(Event {
            name: "main",
            tid: current_tid(),
            timestamp: self.start,
            event_type: EventType::Complete(Instant::now()),
        })?;
        writeln!(self.w, "]")?;
        self.w.flush()
    }
}

fn lock() -> MutexGuard<'static, Option<Trace>> {
    // A panic while holding the lock only interrupts a write; the trace
    // itself is still usable.
    TRACE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn open(path: &str) -> std::io::Result<()> {
    let trace = Trace::new(path)?;
    *lock() = Some(trace);
    Ok(())
}

pub fn is_enabled() -> bool {
    lock().is_some()
}

#[inline]
pub fn scope<T>(name: &'static str, f: impl FnOnce() -> T) -> T {
    if !is_enabled() {
        return f();
    }
    let start = Instant::now();
    let result = f();
    let event = Event {
        name,
        tid: current_tid(),
        timestamp: start,
        event_type: EventType::Complete(Instant::now()),
    };
    if let Some(t) = lock().as_mut() {
        // Dropping an event is preferable to failing the build over it.
        let _ = t.write(event);
    }
    result
}

pub fn close() -> std::io::Result<()> {
    match lock().take() {
        Some(mut t) => t.close(),
        None => Ok(()),
    }
}
