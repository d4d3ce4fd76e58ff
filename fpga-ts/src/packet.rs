//! Abstract packet handles and PTP sequence id extraction

use core::cmp::Ordering;

use crate::time::Time;

/// Length of an Ethernet header without VLAN tag
pub const ETH_HLEN: usize = 14;
/// Length of a UDP header
pub const UDP_HLEN: usize = 8;
/// Offset of the sequence id within a PTPv2 header
pub const OFF_PTP_SEQUENCE_ID: usize = 30;

/// An outgoing packet that may ask for a hardware transmit timestamp.
///
/// Once accepted by [`TxTimestamper::submit`](crate::TxTimestamper::submit)
/// the packet is owned by the timestamper until it leaves again through
/// exactly one of [`complete`](TxPacket::complete) or
/// [`release`](TxPacket::release).
pub trait TxPacket {
    /// Raw frame contents, starting at the Ethernet header
    fn data(&self) -> &[u8];

    /// Whether the sender asked for a hardware timestamp
    fn hw_timestamp_requested(&self) -> bool;

    /// Mark the packet as waiting for its hardware timestamp
    fn set_in_progress(&mut self);

    /// Deliver the matched transmit timestamp and free the packet
    fn complete(self, timestamp: Time);

    /// Free the packet without a timestamp
    fn release(self);
}

/// An inbound packet that can carry a hardware receive timestamp
pub trait RxPacket {
    fn set_hw_timestamp(&mut self, timestamp: Time);
}

/// What the send path should do with a packet after it has been handed to
/// [`TxTimestamper::submit`](crate::TxTimestamper::submit)
#[derive(Debug)]
pub enum TxDisposition<P> {
    /// No timestamp will be delivered, the caller keeps the packet and frees
    /// it once it is on the wire.
    Release(P),
    /// The packet now waits for its timestamp; ownership moved to the
    /// timestamper.
    Queued,
}

impl<P> TxDisposition<P> {
    pub fn is_queued(&self) -> bool {
        matches!(self, TxDisposition::Queued)
    }
}

/// Extract the PTP sequence id from a PTPv2 over UDP over IPv4 frame.
///
/// Returns `None` when the frame is too short to contain the field.
pub fn ptp_sequence_id(frame: &[u8]) -> Option<u16> {
    let ihl = usize::from(*frame.get(ETH_HLEN)? & 0x0f);
    let offset = ETH_HLEN + ihl * 4 + UDP_HLEN + OFF_PTP_SEQUENCE_ID;

    match frame.get(offset..offset + 2)? {
        &[hi, lo] => Some(u16::from_be_bytes([hi, lo])),
        _ => None,
    }
}

/// Compare two sequence ids, taking wrap around of the 16 bit space into
/// account.
///
/// `a` is considered greater when it is less than half the sequence space
/// ahead of `b`.
pub fn compare_sequence_ids(a: u16, b: u16) -> Ordering {
    match a.wrapping_sub(b) {
        0 => Ordering::Equal,
        1..=0x7fff => Ordering::Greater,
        _ => Ordering::Less,
    }
}
