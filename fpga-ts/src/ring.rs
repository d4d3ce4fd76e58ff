//! Fixed capacity ring buffer used for both the timestamp and the packet
//! queue.

/// A fixed capacity FIFO with independent read and write indices.
///
/// One of the `N` slots is always kept free so a full ring can be told apart
/// from an empty one: the write index never advances onto the read index.
/// The usable capacity is therefore `N - 1`.
///
/// Slots are stored as [`Option`]s and are moved out on [`pop`](Ring::pop),
/// so an entry can leave the ring at most once.
pub struct Ring<T, const N: usize> {
    slots: [Option<T>; N],
    read: usize,
    write: usize,
}

impl<T, const N: usize> Ring<T, N> {
    const MIN_SLOTS: () = assert!(N >= 2, "a ring needs at least two slots");

    /// Create an empty ring with both indices at zero
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::MIN_SLOTS;

        Ring {
            slots: core::array::from_fn(|_| None),
            read: 0,
            write: 0,
        }
    }

    #[inline]
    fn next(index: usize) -> usize {
        (index + 1) % N
    }

    /// Number of entries the ring can hold at the same time
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Number of entries currently queued
    pub fn len(&self) -> usize {
        (self.write + N - self.read) % N
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    pub fn is_full(&self) -> bool {
        Self::next(self.write) == self.read
    }

    /// Append an entry, handing it back if the ring is full.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }

        debug_assert!(self.slots[self.write].is_none());
        self.slots[self.write] = Some(item);
        self.write = Self::next(self.write);

        Ok(())
    }

    /// Append an entry, making room by removing the oldest entry when the
    /// ring is full. The removed entry is returned to the caller.
    pub fn push_evicting(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() { self.pop() } else { None };

        debug_assert!(self.slots[self.write].is_none());
        self.slots[self.write] = Some(item);
        self.write = Self::next(self.write);

        evicted
    }

    /// The oldest queued entry, if any
    pub fn front(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }

        self.slots[self.read].as_ref()
    }

    /// Remove and return the oldest queued entry
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let item = self.slots[self.read].take();
        self.read = Self::next(self.read);
        item
    }

    /// Remove all queued entries, oldest first.
    ///
    /// Entries not consumed by the caller are dropped when the iterator is.
    pub fn drain(&mut self) -> Drain<'_, T, N> {
        Drain { ring: self }
    }

    /// Drop whatever is still queued and move both indices back to zero
    pub fn reset(&mut self) {
        self.drain().for_each(drop);
        self.read = 0;
        self.write = 0;
    }

    pub fn read_index(&self) -> usize {
        self.read
    }

    pub fn write_index(&self) -> usize {
        self.write
    }
}

impl<T, const N: usize> Default for Ring<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: core::fmt::Debug, const N: usize> core::fmt::Debug for Ring<T, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ring")
            .field("read", &self.read)
            .field("write", &self.write)
            .field("len", &self.len())
            .finish()
    }
}

/// Iterator returned by [`Ring::drain`]
pub struct Drain<'a, T, const N: usize> {
    ring: &'a mut Ring<T, N>,
}

impl<T, const N: usize> Iterator for Drain<'_, T, N> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.ring.pop()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.ring.len();
        (len, Some(len))
    }
}

impl<T, const N: usize> Drop for Drain<'_, T, N> {
    fn drop(&mut self) {
        self.for_each(drop);
    }
}
