//! Platform hooks for locking and deferred work

/// Lock protecting the shared timestamping state.
///
/// The closure passed to [`with_mut`](StateMutex::with_mut) must not block.
/// On platforms where the interrupt producer can preempt the lock holder the
/// implementation has to mask that interrupt for the duration of the closure.
pub trait StateMutex<T> {
    fn new(state: T) -> Self;

    fn with_mut<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> R;
}

#[cfg(feature = "std")]
impl<T> StateMutex<T> for std::sync::Mutex<T> {
    fn new(state: T) -> Self {
        std::sync::Mutex::new(state)
    }

    fn with_mut<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> R {
        // state is kept consistent between statements, a panicking holder
        // does not leave it half updated
        let mut guard = self
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }
}

/// A deferred, single instance task running the correlation pass.
///
/// At most one pass may be active at any time. Scheduling while a pass is
/// queued is a no-op, scheduling while a pass is running queues another one.
pub trait Deferred {
    /// Queue a correlation pass
    fn schedule(&self);

    /// Drop a queued pass and wait for a running one to finish
    fn cancel_sync(&self);
}

impl<D: Deferred + ?Sized> Deferred for &D {
    fn schedule(&self) {
        (**self).schedule()
    }

    fn cancel_sync(&self) {
        (**self).cancel_sync()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use core::cell::Cell;

    use super::*;

    /// Records scheduling requests instead of running anything
    #[derive(Debug, Default)]
    pub(crate) struct CountingWork {
        pub(crate) scheduled: Cell<usize>,
        pub(crate) cancelled: Cell<usize>,
    }

    impl Deferred for CountingWork {
        fn schedule(&self) {
            self.scheduled.set(self.scheduled.get() + 1);
        }

        fn cancel_sync(&self) {
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }
}
