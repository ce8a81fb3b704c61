//! Deadline scheduler for deferred bundles
//!
//! Tasks are timed by a single-threaded tokio runtime that lives on one
//! dedicated, named thread. Each task is a spawned future that sleeps until
//! its deadline and then runs on that thread. The runtime is started lazily
//! by the first task. There is no cancellation: once scheduled, a task runs
//! at or after its deadline unless the [`Scheduler`] is dropped first, in
//! which case pending tasks are discarded along with the runtime.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::runtime::{self, Handle};
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

struct Worker {
    runtime: Handle,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

struct Shared {
    worker: Mutex<Option<Worker>>,
    pending: AtomicUsize,
    shut_down: AtomicBool,
    thread_name: String,
}

/// Decrements the pending count when its task finishes or is discarded
struct PendingGuard(Arc<Shared>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Cloneable submission handle.
///
/// Handles do not keep the timer thread alive; once the owning
/// [`Scheduler`] is dropped, submissions are silently discarded.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    /// Run `task` on the timer thread at or after `deadline`.
    ///
    /// Fails only if the timer runtime or its thread cannot be started.
    pub fn schedule_at<F>(&self, deadline: Instant, task: F) -> std::io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(runtime) = self.runtime()? else {
            trace!("Scheduler shut down, discarding task");
            return Ok(());
        };

        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        let guard = PendingGuard(self.shared.clone());
        let deadline = tokio::time::Instant::from_std(deadline);

        let job = runtime.spawn(async move {
            let _guard = guard;
            tokio::time::sleep_until(deadline).await;
            task();
        });
        // A panicking task only fails its own join handle
        runtime.spawn(async move {
            if let Err(e) = job.await {
                if e.is_panic() {
                    error!("Scheduled dispatch panicked: {}", panic_message(e.into_panic()));
                }
            }
        });
        Ok(())
    }

    /// Run `task` on the timer thread once `delay` has elapsed
    pub fn schedule_after<F>(&self, delay: Duration, task: F) -> std::io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_at(Instant::now() + delay, task)
    }

    /// Number of tasks waiting for their deadline
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Handle to the timer runtime, starting it on first use. `None` once
    /// the scheduler has shut down.
    fn runtime(&self) -> std::io::Result<Option<Handle>> {
        let mut worker = self.shared.worker.lock();
        if self.shared.shut_down.load(Ordering::Acquire) {
            return Ok(None);
        }
        if let Some(worker) = worker.as_ref() {
            return Ok(Some(worker.runtime.clone()));
        }

        let rt = runtime::Builder::new_current_thread().enable_time().build()?;
        let handle = rt.handle().clone();
        let (shutdown, stopped) = oneshot::channel::<()>();
        let thread = thread::Builder::new()
            .name(self.shared.thread_name.clone())
            .spawn(move || {
                // Either a send or a dropped sender ends the loop
                let _ = rt.block_on(stopped);
                trace!("Scheduler thread exiting");
                // Dropping the runtime here discards unfinished tasks
            })?;
        debug!("Started scheduler thread {}", self.shared.thread_name);

        *worker = Some(Worker {
            runtime: handle.clone(),
            shutdown,
            thread,
        });
        Ok(Some(handle))
    }
}

/// Owner of the timer thread. Dropping it discards pending tasks and stops
/// the thread.
pub struct Scheduler {
    handle: SchedulerHandle,
}

impl Scheduler {
    pub fn new(thread_name: impl Into<String>) -> Self {
        Self {
            handle: SchedulerHandle {
                shared: Arc::new(Shared {
                    worker: Mutex::new(None),
                    pending: AtomicUsize::new(0),
                    shut_down: AtomicBool::new(false),
                    thread_name: thread_name.into(),
                }),
            },
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn schedule_at<F>(&self, deadline: Instant, task: F) -> std::io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.schedule_at(deadline, task)
    }

    pub fn schedule_after<F>(&self, delay: Duration, task: F) -> std::io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.schedule_after(delay, task)
    }

    pub fn pending(&self) -> usize {
        self.handle.pending()
    }

    fn shutdown(&self) {
        let shared = &self.handle.shared;
        let worker = {
            let mut worker = shared.worker.lock();
            shared.shut_down.store(true, Ordering::Release);
            worker.take()
        };
        let Some(worker) = worker else {
            return;
        };

        let pending = self.pending();
        if pending > 0 {
            debug!("Scheduler dropped with {} pending tasks", pending);
        }
        let _ = worker.shutdown.send(());

        // A task that drops the last dispatcher runs on the timer thread
        // itself; the runtime is torn down once that task returns.
        if worker.thread.thread().id() != thread::current().id() {
            let _ = worker.thread.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("thread_name", &self.handle.shared.thread_name)
            .field("pending", &self.pending())
            .finish()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
