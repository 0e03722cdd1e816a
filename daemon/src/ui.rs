//! The single logical UI execution context.
//!
//! Every operation that binds, rebinds, resizes or disposes a view runs here,
//! one job at a time, in submission order. Engine callbacks and delayed
//! dimension queries are posted onto this context instead of touching view
//! state from whatever thread they originate on.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable handle used to submit work to the UI loop
#[derive(Clone)]
pub struct UiContext {
    tx: mpsc::UnboundedSender<Job>,
}

impl UiContext {
    /// Spawn the UI loop on the current tokio runtime.
    ///
    /// The loop ends once every handle has been dropped.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                // A panicking job must not take the whole context down
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    log::error!("UI job panicked, continuing with the next one");
                }
            }
            log::debug!("UI context stopped");
        });

        (Self { tx }, handle)
    }

    /// Enqueue a job. Safe to call from any thread.
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            log::warn!("UI context is gone, dropping job");
        }
    }

    /// Enqueue a job after `delay`.
    ///
    /// Dropping the returned handle cancels the job if it has not been
    /// enqueued yet. Must be called from within the tokio runtime.
    pub fn post_delayed<F>(&self, delay: Duration, job: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(Box::new(job)).is_err() {
                log::trace!("UI context is gone, dropping delayed job");
            }
        });
        TimerHandle { task }
    }

    /// Run `job` on the UI context and wait for its result.
    ///
    /// Returns `None` if the UI loop stopped before running it.
    pub async fn call<T, F>(&self, job: F) -> Option<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.post(move || {
            let _ = tx.send(job());
        });
        rx.await.ok()
    }

    /// Wait until every job submitted before this call has run
    pub async fn flush(&self) {
        self.call(|| ()).await;
    }
}

/// Pending delayed job; dropping it cancels the timer
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
