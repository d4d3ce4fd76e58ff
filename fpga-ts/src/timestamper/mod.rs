//! The transmit timestamp correlator
//!
//! See [`TxTimestamper`] for an overview.

use core::marker::PhantomData;

pub use control::ControlChange;
pub use correlate::CorrelationReport;
pub use flush::FlushReport;
pub use irq::IrqOutcome;

#[cfg(feature = "fuzz")]
pub use correlate::{pair, Pairing};

use crate::{
    config::ResyncPolicy,
    hardware::TimestampRecord,
    observability::{RateLimit, TimestampingStats},
    packet::TxPacket,
    ring::Ring,
    sync::StateMutex,
};

mod control;
mod correlate;
mod flush;
mod irq;
mod tx;

/// Default number of slots in the timestamp ring
pub const TS_RING_SLOTS: usize = 32;
/// Default number of slots in the packet ring
pub const PACKET_RING_SLOTS: usize = 32;

/// Everything guarded by the timestamping lock.
///
/// Packets still queued when the state is dropped are released without
/// timestamp.
pub struct RingState<
    P: TxPacket,
    const TS: usize = TS_RING_SLOTS,
    const PKT: usize = PACKET_RING_SLOTS,
> {
    timestamps: Ring<TimestampRecord, TS>,
    packets: Ring<P, PKT>,
    tx_enable: bool,
    rx_enable: bool,
    reenable_irq: bool,
    policy: ResyncPolicy,
    stats: TimestampingStats,
    eviction_log: RateLimit,
}

impl<P: TxPacket, const TS: usize, const PKT: usize> RingState<P, TS, PKT> {
    pub fn new(policy: ResyncPolicy) -> Self {
        RingState {
            timestamps: Ring::new(),
            packets: Ring::new(),
            tx_enable: false,
            rx_enable: false,
            reenable_irq: false,
            policy,
            stats: TimestampingStats::default(),
            eviction_log: RateLimit::new(10, 100),
        }
    }

    /// Release every queued packet without timestamp, oldest first
    fn release_packets(&mut self) -> usize {
        let mut released = 0;
        for packet in self.packets.drain() {
            packet.release();
            released += 1;
        }
        released
    }
}

impl<P: TxPacket, const TS: usize, const PKT: usize> Drop for RingState<P, TS, PKT> {
    fn drop(&mut self) {
        let released = self.release_packets();
        if released != 0 {
            log::debug!("released {released} tx packets still waiting for a timestamp");
        }
    }
}

/// A snapshot of the ring indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RingIndices {
    pub ts_read: usize,
    pub ts_write: usize,
    pub packet_read: usize,
    pub packet_write: usize,
}

impl RingIndices {
    pub fn all_zero(&self) -> bool {
        *self == RingIndices::default()
    }
}

/// Matches hardware transmit timestamps to the packets that caused them.
///
/// Packets asking for a timestamp are queued by [`submit`](Self::submit).
/// The interrupt handler moves records from the FPGA into the timestamp ring
/// with [`handle_tx_ts_irq`](Self::handle_tx_ts_irq), which schedules a
/// deferred [`correlate`](Self::correlate) pass pairing records and packets
/// by PTP sequence id.
///
/// # Generics
/// * **`P`**: the packet handle, see [`TxPacket`]
/// * **`M`**: the lock around the shared [`RingState`], see [`StateMutex`]
/// * **`TS`**, **`PKT`**: number of slots in the timestamp and packet ring,
///   one of which is always kept free
///
/// # Example
/// ```
/// use std::sync::Mutex;
///
/// use fpga_ts::{config::ResyncPolicy, RingState, TxTimestamper};
/// # struct Packet;
/// # impl fpga_ts::packet::TxPacket for Packet {
/// #     fn data(&self) -> &[u8] { &[] }
/// #     fn hw_timestamp_requested(&self) -> bool { true }
/// #     fn set_in_progress(&mut self) {}
/// #     fn complete(self, _: fpga_ts::time::Time) {}
/// #     fn release(self) {}
/// # }
///
/// let timestamper: TxTimestamper<Packet, Mutex<RingState<Packet>>> =
///     TxTimestamper::new(ResyncPolicy::default());
/// assert!(timestamper.indices().all_zero());
/// ```
pub struct TxTimestamper<P, M, const TS: usize = TS_RING_SLOTS, const PKT: usize = PACKET_RING_SLOTS>
where
    P: TxPacket,
    M: StateMutex<RingState<P, TS, PKT>>,
{
    state: M,
    _packet: PhantomData<fn(P)>,
}

impl<P, M, const TS: usize, const PKT: usize> TxTimestamper<P, M, TS, PKT>
where
    P: TxPacket,
    M: StateMutex<RingState<P, TS, PKT>>,
{
    /// Create a timestamper with empty rings and timestamping disabled
    pub fn new(policy: ResyncPolicy) -> Self {
        TxTimestamper {
            state: M::new(RingState::new(policy)),
            _packet: PhantomData,
        }
    }

    pub fn stats(&self) -> TimestampingStats {
        self.state.with_mut(|state| state.stats)
    }

    pub fn indices(&self) -> RingIndices {
        self.state.with_mut(|state| RingIndices {
            ts_read: state.timestamps.read_index(),
            ts_write: state.timestamps.write_index(),
            packet_read: state.packets.read_index(),
            packet_write: state.packets.write_index(),
        })
    }

    /// Number of timestamp records waiting for a packet
    pub fn pending_timestamps(&self) -> usize {
        self.state.with_mut(|state| state.timestamps.len())
    }

    /// Number of packets waiting for a timestamp
    pub fn pending_packets(&self) -> usize {
        self.state.with_mut(|state| state.packets.len())
    }

    pub fn tx_enabled(&self) -> bool {
        self.state.with_mut(|state| state.tx_enable)
    }

    pub fn rx_enabled(&self) -> bool {
        self.state.with_mut(|state| state.rx_enable)
    }

    pub fn resync_policy(&self) -> ResyncPolicy {
        self.state.with_mut(|state| state.policy)
    }
}
