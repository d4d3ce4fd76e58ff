//! `fpga-ts` correlates hardware transmit timestamps captured by an FPGA
//! packet processor with the PTP packets that triggered them.
//!
//! The capture unit pushes a record for every timestamped PTP event message
//! into a FIFO. Records carry the PTP sequence id of their packet, but are
//! produced independently of the send path: either side may lose entries.
//! The [`TxTimestamper`] keeps two bounded rings, one with records drained
//! from the FIFO and one with packets waiting for their timestamp, and pairs
//! them by sequence id in a deferred pass.
//!
//! # Device interfaces
//! `fpga-ts` does not access hardware itself and can run without the
//! standard library. The platform provides
//! * register access through [`Registers`](hardware::Registers) and
//!   [`TxQueue`](hardware::TxQueue),
//! * packet handles implementing [`TxPacket`](packet::TxPacket) and
//!   [`RxPacket`](packet::RxPacket),
//! * a lock around the shared state implementing
//!   [`StateMutex`](sync::StateMutex), which is implemented for
//!   [`std::sync::Mutex`] when the `std` feature is enabled,
//! * a deferred task running [`TxTimestamper::correlate`], implementing
//!   [`Deferred`](sync::Deferred).
//!
//! The `fpga-ts-linux` crate drives the timestamper against a simulated
//! capture unit.
//!
//! # Entry points
//! * [`TxTimestamper::handle_tx_ts_irq`]: the "transmit timestamp
//!   available" interrupt
//! * [`TxTimestamper::submit`]: every outgoing packet
//! * [`TxTimestamper::correlate`]: the deferred correlation pass
//! * [`TxTimestamper::stamp_rx`]: every inbound PTP packet
//! * [`TxTimestamper::hwtstamp_request`] and [`TxTimestamper::apply_config`]:
//!   enabling and disabling timestamping
//! * [`TxTimestamper::flush`]: teardown

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod config;
pub mod hardware;
pub mod observability;
pub mod packet;
pub mod ring;
pub mod sync;
pub mod time;
mod timestamper;

pub use timestamper::{
    ControlChange, CorrelationReport, FlushReport, IrqOutcome, RingIndices, RingState,
    TxTimestamper, PACKET_RING_SLOTS, TS_RING_SLOTS,
};

#[cfg(feature = "fuzz")]
pub mod fuzz {
    pub use crate::timestamper::{pair, Pairing};
}
