//! Counters describing what happened to timestamps and packets

/// Running totals kept by a [`TxTimestamper`](crate::TxTimestamper)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimestampingStats {
    /// Packets completed with their hardware timestamp
    pub matched: u64,
    /// Timestamp records dropped by the correlation pass
    pub records_discarded: u64,
    /// Packets released without timestamp by the correlation pass
    pub packets_released: u64,
    /// Packets dropped because the packet ring was full
    pub packets_evicted: u64,
    /// Packets too short to carry a PTP sequence id
    pub malformed_packets: u64,
    /// Interrupts that found the timestamp ring full
    pub ts_ring_full: u64,
    /// FIFO words skipped while looking for the start of a record
    pub misaligned_words: u64,
    /// Interrupts where no record start was found at all
    pub missing_start_of_ts: u64,
    /// Inbound packets that received a hardware timestamp
    pub rx_stamped: u64,
    /// Packets released by a flush
    pub flushed_packets: u64,
}

/// Count based log rate limiter.
///
/// The first `burst` events are let through, after that only every
/// `summary_every`th event is, together with the number of events swallowed
/// since the last one.
#[derive(Debug, Clone)]
pub(crate) struct RateLimit {
    burst: u32,
    summary_every: u32,
    emitted: u32,
    suppressed: u32,
}

impl RateLimit {
    pub(crate) const fn new(burst: u32, summary_every: u32) -> Self {
        RateLimit {
            burst,
            summary_every,
            emitted: 0,
            suppressed: 0,
        }
    }

    /// Register an event. Returns the number of suppressed events to report
    /// if this one should be logged.
    pub(crate) fn check(&mut self) -> Option<u32> {
        if self.emitted < self.burst {
            self.emitted += 1;
            return Some(0);
        }

        self.suppressed += 1;
        if self.suppressed >= self.summary_every {
            Some(core::mem::take(&mut self.suppressed) - 1)
        } else {
            None
        }
    }

    /// Events let through in the burst and events swallowed since the last
    /// summary
    #[cfg(test)]
    pub(crate) fn counts(&self) -> (u32, u32) {
        (self.emitted, self.suppressed)
    }
}
