use core::cmp::Ordering;

use super::TxTimestamper;
use crate::{
    config::ResyncPolicy,
    hardware::{IrqSource, Registers},
    packet::{compare_sequence_ids, ptp_sequence_id, TxPacket},
    sync::StateMutex,
    RingState,
};

/// Outcome of comparing the oldest timestamp with the oldest packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    /// Sequence ids are equal, the packet gets the timestamp
    Matched,
    /// Drop the timestamp, keep the packet for the next timestamp
    DiscardRecord,
    /// Release the packet without timestamp, keep the timestamp for the next
    /// packet
    ReleasePacket,
    /// The packet carries no sequence id. It is released, the timestamp is
    /// kept.
    Malformed,
}

/// Decide what to do with the oldest timestamp and packet
pub fn pair(record_sequence_id: u16, packet_sequence_id: Option<u16>, policy: ResyncPolicy) -> Pairing {
    let Some(packet_sequence_id) = packet_sequence_id else {
        return Pairing::Malformed;
    };

    match (
        compare_sequence_ids(record_sequence_id, packet_sequence_id),
        policy,
    ) {
        (Ordering::Equal, _) => Pairing::Matched,
        (Ordering::Greater, ResyncPolicy::DiscardLeading) => Pairing::DiscardRecord,
        (Ordering::Greater, ResyncPolicy::DiscardLagging) => Pairing::ReleasePacket,
        (Ordering::Less, ResyncPolicy::DiscardLeading) => Pairing::ReleasePacket,
        (Ordering::Less, ResyncPolicy::DiscardLagging) => Pairing::DiscardRecord,
    }
}

/// What a single correlation pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CorrelationReport {
    pub matched: usize,
    pub records_discarded: usize,
    pub packets_released: usize,
    pub malformed: usize,
}

impl CorrelationReport {
    pub fn is_empty(&self) -> bool {
        *self == CorrelationReport::default()
    }
}

impl<P, M, const TS: usize, const PKT: usize> TxTimestamper<P, M, TS, PKT>
where
    P: TxPacket,
    M: StateMutex<RingState<P, TS, PKT>>,
{
    /// The deferred correlation pass.
    ///
    /// Pairs queued timestamps with queued packets until either ring runs
    /// empty; whatever is left over stays queued for a later pass. Afterwards
    /// the "transmit timestamp available" interrupt is unmasked again if the
    /// interrupt handler masked it because the timestamp ring was full.
    ///
    /// Must not run concurrently with itself.
    pub fn correlate(&self, regs: &impl Registers) -> CorrelationReport {
        log::trace!("correlating tx timestamps");

        let (report, reenable_irq) = self.state.with_mut(|state| {
            let mut report = CorrelationReport::default();

            loop {
                let Some(record) = state.timestamps.front().copied() else {
                    break;
                };
                let Some(packet) = state.packets.front() else {
                    break;
                };
                let packet_sequence_id = ptp_sequence_id(packet.data());

                match pair(record.sequence_id, packet_sequence_id, state.policy) {
                    Pairing::Matched => {
                        log::debug!(
                            "found valid timestamp for tx packet; sequence id {:#06x}",
                            record.sequence_id
                        );
                        state.timestamps.pop();
                        if let Some(packet) = state.packets.pop() {
                            packet.complete(record.time());
                        }
                        report.matched += 1;
                    }
                    Pairing::DiscardRecord => {
                        log::debug!(
                            "timestamp sequence id {:#06x} has no packet (next packet {:#06x}) => discard timestamp",
                            record.sequence_id,
                            packet_sequence_id.unwrap_or_default()
                        );
                        state.timestamps.pop();
                        report.records_discarded += 1;
                    }
                    Pairing::ReleasePacket => {
                        log::debug!(
                            "packet sequence id {:#06x} has no timestamp (next timestamp {:#06x}) => discard packet",
                            packet_sequence_id.unwrap_or_default(),
                            record.sequence_id
                        );
                        if let Some(packet) = state.packets.pop() {
                            packet.release();
                        }
                        report.packets_released += 1;
                    }
                    Pairing::Malformed => {
                        log::debug!("packet does not contain ptp sequence id (length invalid)");
                        if let Some(packet) = state.packets.pop() {
                            packet.release();
                        }
                        report.malformed += 1;
                    }
                }
            }

            state.stats.matched += report.matched as u64;
            state.stats.records_discarded += report.records_discarded as u64;
            state.stats.packets_released += report.packets_released as u64;
            state.stats.malformed_packets += report.malformed as u64;

            (report, core::mem::take(&mut state.reenable_irq))
        });

        if reenable_irq {
            log::debug!("tx timestamp ring drained, interrupt enabled");
            regs.irq_enable(IrqSource::TxTimestampAvailable);
        }

        report
    }
}
