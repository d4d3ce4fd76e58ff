//! A single deferred task driven by a tokio task

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use fpga_ts::sync::Deferred;
use tokio::{
    sync::{Mutex, Notify},
    task::JoinHandle,
};

#[derive(Debug, Default)]
struct Shared {
    pending: AtomicBool,
    wake: Notify,
    /// Held for the duration of a run
    pass: Mutex<()>,
}

/// Runs a task on the tokio runtime whenever it is scheduled.
///
/// Scheduling while a run is queued does nothing, scheduling during a run
/// queues exactly one more. Runs never overlap.
///
/// [`Deferred::cancel_sync`] blocks the calling thread until a running pass
/// is done, so call it from [`tokio::task::spawn_blocking`], never from async
/// code.
pub struct WorkQueue {
    name: String,
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl WorkQueue {
    /// Start the worker. Must be called from within a tokio runtime.
    pub fn spawn(name: &str, mut task: impl FnMut() + Send + 'static) -> Self {
        let shared = Arc::new(Shared::default());

        let worker = tokio::spawn({
            let shared = shared.clone();
            async move {
                loop {
                    shared.wake.notified().await;

                    let _pass = shared.pass.lock().await;
                    if shared.pending.swap(false, Ordering::AcqRel) {
                        task();
                    }
                }
            }
        });

        WorkQueue {
            name: name.into(),
            shared,
            worker,
        }
    }

    /// Whether a run is queued or in progress
    pub fn is_busy(&self) -> bool {
        self.shared.pending.load(Ordering::Acquire) || self.shared.pass.try_lock().is_err()
    }
}

impl Deferred for WorkQueue {
    fn schedule(&self) {
        self.shared.pending.store(true, Ordering::Release);
        self.shared.wake.notify_one();
    }

    fn cancel_sync(&self) {
        self.shared.pending.store(false, Ordering::Release);
        // a run that took the pending flag holds the pass lock until it is done
        drop(self.shared.pass.blocking_lock());
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.worker.abort();
        log::trace!("work queue {} stopped", self.name);
    }
}
