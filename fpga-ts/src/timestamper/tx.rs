use super::TxTimestamper;
use crate::{
    hardware::TimestampRecord,
    packet::{RxPacket, TxDisposition, TxPacket},
    sync::StateMutex,
    RingState,
};

impl<P, M, const TS: usize, const PKT: usize> TxTimestamper<P, M, TS, PKT>
where
    P: TxPacket,
    M: StateMutex<RingState<P, TS, PKT>>,
{
    /// Hand an outgoing packet to the timestamper.
    ///
    /// Packets that did not ask for a hardware timestamp, or that are sent
    /// while transmit timestamping is disabled, are given back to the caller.
    /// Everything else is marked in progress and queued until its timestamp
    /// arrives. When the packet ring is full the oldest waiting packet is
    /// released without timestamp to make room.
    pub fn submit(&self, mut packet: P) -> TxDisposition<P> {
        let evicted = self.state.with_mut(|state| {
            if !state.tx_enable || !packet.hw_timestamp_requested() {
                return Err(packet);
            }

            packet.set_in_progress();

            let Some(evicted) = state.packets.push_evicting(packet) else {
                return Ok(None);
            };
            state.stats.packets_evicted += 1;
            let suppressed = state.eviction_log.check();
            Ok(Some((evicted, suppressed)))
        });

        match evicted {
            Err(packet) => TxDisposition::Release(packet),
            Ok(None) => TxDisposition::Queued,
            Ok(Some((evicted, suppressed))) => {
                match suppressed {
                    Some(0) => log::error!("tx packet ring full, oldest packet dropped"),
                    Some(suppressed) => log::error!(
                        "tx packet ring full, oldest packet dropped ({suppressed} similar messages suppressed)"
                    ),
                    None => {}
                }
                evicted.release();
                TxDisposition::Queued
            }
        }
    }

    /// Attach the timestamp of an inbound PTP packet.
    ///
    /// Receive timestamps arrive inline with the packet, so no correlation is
    /// needed. Records without start of timestamp marker are ignored. Returns
    /// whether the timestamp was applied.
    pub fn stamp_rx(&self, packet: &mut impl RxPacket, record: &TimestampRecord) -> bool {
        if !record.has_start_of_ts() {
            log::debug!("rx timestamp without start of timestamp marker ignored");
            return false;
        }

        let enabled = self.state.with_mut(|state| {
            if state.rx_enable {
                state.stats.rx_stamped += 1;
            }
            state.rx_enable
        });

        if enabled {
            packet.set_hw_timestamp(record.time());
        }

        enabled
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        config::ResyncPolicy,
        hardware::test::FakeRegisters,
        observability::RateLimit,
        packet::test::{Fate, TestPacket},
        sync::test::CountingWork,
        time::Time,
        timestamper::test::{enabled_timestamper, TestTimestamper},
    };

    #[derive(Debug, Default)]
    struct Inbound(Option<Time>);

    impl RxPacket for Inbound {
        fn set_hw_timestamp(&mut self, timestamp: Time) {
            self.0 = Some(timestamp);
        }
    }

    #[test]
    fn unrequested_packets_bypass_the_ring() {
        let log = Rc::new(RefCell::new(vec![]));
        let timestamper: TestTimestamper = enabled_timestamper(ResyncPolicy::default());

        let mut packet = TestPacket::new(1, &log);
        packet.requested = false;

        match timestamper.submit(packet) {
            TxDisposition::Release(packet) => assert!(!packet.in_progress),
            TxDisposition::Queued => panic!("packet should not be queued"),
        }
        assert_eq!(timestamper.pending_packets(), 0);
    }

    #[test]
    fn disabled_timestamper_returns_packets() {
        let log = Rc::new(RefCell::new(vec![]));
        let timestamper = TestTimestamper::<8, 8>::new(ResyncPolicy::default());

        assert!(!timestamper.submit(TestPacket::new(1, &log)).is_queued());
        assert_eq!(timestamper.pending_packets(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn full_ring_evicts_oldest_packet() {
        let regs = FakeRegisters::default();
        let log = Rc::new(RefCell::new(vec![]));
        let timestamper = enabled_timestamper::<4, 4>(ResyncPolicy::default());

        for sequence_id in 0..3 {
            assert!(timestamper
                .submit(TestPacket::new(sequence_id, &log))
                .is_queued());
        }
        assert!(log.borrow().is_empty());

        assert!(timestamper.submit(TestPacket::new(3, &log)).is_queued());
        assert_eq!(*log.borrow(), vec![Fate::Released(0)]);
        assert_eq!(timestamper.pending_packets(), 3);
        assert_eq!(timestamper.stats().packets_evicted, 1);

        // the remaining packets still match in order
        for sequence_id in 1..4 {
            regs.push_record(&TimestampRecord::new(sequence_id, 0, 0));
            timestamper.handle_tx_ts_irq(&regs, &CountingWork::default());
        }
        assert_eq!(timestamper.correlate(&regs).matched, 3);
    }

    #[test]
    fn overflow_evicts_oldest_surplus_in_order() {
        let regs = FakeRegisters::default();
        let log = Rc::new(RefCell::new(vec![]));
        let timestamper = enabled_timestamper::<4, 4>(ResyncPolicy::default());
        timestamper
            .state
            .with_mut(|state| state.eviction_log = RateLimit::new(2, 3));

        for sequence_id in 0..3 {
            assert!(timestamper
                .submit(TestPacket::new(sequence_id, &log))
                .is_queued());
        }

        // two logged, two swallowed, one summary of those, one swallowed
        let expected_counts = [(1, 0), (2, 0), (2, 1), (2, 2), (2, 0), (2, 1)];
        for (sequence_id, counts) in (3..9).zip(expected_counts) {
            assert!(timestamper
                .submit(TestPacket::new(sequence_id, &log))
                .is_queued());
            assert_eq!(
                timestamper.state.with_mut(|state| state.eviction_log.counts()),
                counts
            );
            assert_eq!(timestamper.pending_packets(), 3);
        }

        assert_eq!(
            *log.borrow(),
            (0..6).map(Fate::Released).collect::<Vec<_>>()
        );
        assert_eq!(timestamper.stats().packets_evicted, 6);

        for sequence_id in 6..9 {
            regs.push_record(&TimestampRecord::new(sequence_id, 0, 0));
            timestamper.handle_tx_ts_irq(&regs, &CountingWork::default());
        }
        assert_eq!(timestamper.correlate(&regs).matched, 3);
        assert_eq!(log.borrow().len(), 9);
    }

    #[test]
    fn rx_timestamp_follows_rx_enable() {
        let record = TimestampRecord::new(0, 12, 34);

        let mut inbound = Inbound::default();
        let timestamper = TestTimestamper::<8, 8>::new(ResyncPolicy::default());
        assert!(!timestamper.stamp_rx(&mut inbound, &record));
        assert_eq!(inbound.0, None);

        let timestamper: TestTimestamper = enabled_timestamper(ResyncPolicy::default());
        assert!(timestamper.stamp_rx(&mut inbound, &record));
        assert_eq!(inbound.0, Some(Time::from_parts(12, 34)));
        assert_eq!(timestamper.stats().rx_stamped, 1);

        let mut garbage = record;
        garbage.start_of_ts = 0;
        let mut inbound = Inbound::default();
        assert!(!timestamper.stamp_rx(&mut inbound, &garbage));
        assert_eq!(inbound.0, None);
    }
}
