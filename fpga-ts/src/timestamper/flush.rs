use super::TxTimestamper;
use crate::{
    hardware::{IrqSource, Register, Registers, PP_CONFIG_ENABLE_PTP_TIMESTAMPS, RECORD_WORDS},
    packet::TxPacket,
    sync::{Deferred, StateMutex},
    RingState,
};

/// Upper bound on the records drained from the FPGA in one flush, in case the
/// interrupt status never clears
const MAX_DRAINED_RECORDS: usize = 1024;

/// What a flush cleaned up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FlushReport {
    /// Queued packets released without timestamp
    pub packets_released: usize,
    /// Timestamp records dropped from the timestamp ring
    pub records_discarded: usize,
    /// Records read out of the FPGA and dropped
    pub hardware_records_drained: usize,
}

impl<P, M, const TS: usize, const PKT: usize> TxTimestamper<P, M, TS, PKT>
where
    P: TxPacket,
    M: StateMutex<RingState<P, TS, PKT>>,
{
    /// Throw away every pending timestamp and packet.
    ///
    /// Waits for a running correlation pass to finish first. Afterwards both
    /// rings are empty with all indices back at zero, and the FPGA holds no
    /// more transmit timestamp records. Used on interface teardown and reset.
    pub fn flush(&self, regs: &impl Registers, work: &impl Deferred) -> FlushReport {
        work.cancel_sync();

        let (report, reenable_irq) = self.state.with_mut(|state| {
            let mut report = FlushReport::default();

            let mut words = [0; RECORD_WORDS];
            while regs.read(Register::PpIrqs) & IrqSource::TxTimestampAvailable.mask() != 0 {
                if report.hardware_records_drained == MAX_DRAINED_RECORDS {
                    log::warn!("tx timestamp fifo does not drain, giving up");
                    break;
                }
                regs.read_repeated(Register::TxTimestampFifo, &mut words);
                report.hardware_records_drained += 1;
            }

            report.packets_released = state.release_packets();
            report.records_discarded = state.timestamps.len();

            state.packets.reset();
            state.timestamps.reset();
            state.stats.flushed_packets += report.packets_released as u64;

            (report, core::mem::take(&mut state.reenable_irq))
        });

        // the interrupt was masked for a full ring, which is empty now
        let capturing = regs.read(Register::PpConfig) & PP_CONFIG_ENABLE_PTP_TIMESTAMPS != 0;
        if reenable_irq && capturing {
            regs.irq_enable(IrqSource::TxTimestampAvailable);
        }

        log::debug!(
            "tx timestamps flushed: {} packets, {} timestamps, {} hardware records",
            report.packets_released,
            report.records_discarded,
            report.hardware_records_drained
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        config::{RawHwTstampConfig, ResyncPolicy, SliceTransport},
        hardware::{test::FakeRegisters, TimestampRecord},
        packet::test::{Fate, TestPacket},
        sync::test::CountingWork,
        timestamper::test::enabled_timestamper,
    };

    #[test]
    fn flush_releases_everything_and_resets_indices() {
        let regs = FakeRegisters::default();
        let work = CountingWork::default();
        let log = Rc::new(RefCell::new(vec![]));
        let timestamper = enabled_timestamper::<4, 4>(ResyncPolicy::default());

        for sequence_id in [1, 2] {
            assert!(timestamper
                .submit(TestPacket::new(sequence_id, &log))
                .is_queued());
        }
        regs.push_record(&TimestampRecord::new(9, 0, 0));
        timestamper.handle_tx_ts_irq(&regs, &work);
        regs.push_record(&TimestampRecord::new(10, 0, 0));
        regs.push_record(&TimestampRecord::new(11, 0, 0));

        let report = timestamper.flush(&regs, &work);

        assert_eq!(
            report,
            FlushReport {
                packets_released: 2,
                records_discarded: 1,
                hardware_records_drained: 2,
            }
        );
        assert_eq!(work.cancelled.get(), 1);
        assert_eq!(*log.borrow(), vec![Fate::Released(1), Fate::Released(2)]);
        assert!(timestamper.indices().all_zero());
        assert!(regs.fifo.borrow().is_empty());
        assert_eq!(timestamper.stats().flushed_packets, 2);

        // flushing again has nothing left to do
        assert_eq!(timestamper.flush(&regs, &work), FlushReport::default());
    }

    #[test]
    fn flush_lifts_backpressure() {
        let regs = FakeRegisters::default();
        let work = CountingWork::default();
        let timestamper = enabled_timestamper::<2, 2>(ResyncPolicy::default());
        timestamper.apply_config(&regs, &regs);
        assert!(regs.irq_enabled(IrqSource::TxTimestampAvailable));

        regs.push_record(&TimestampRecord::new(1, 0, 0));
        regs.push_record(&TimestampRecord::new(2, 0, 0));
        timestamper.handle_tx_ts_irq(&regs, &work);
        timestamper.handle_tx_ts_irq(&regs, &work);
        assert!(!regs.irq_enabled(IrqSource::TxTimestampAvailable));

        let report = timestamper.flush(&regs, &work);

        assert_eq!(report.records_discarded, 1);
        assert_eq!(report.hardware_records_drained, 1);
        assert!(regs.irq_enabled(IrqSource::TxTimestampAvailable));
        assert!(timestamper.indices().all_zero());
    }

    #[test]
    fn flush_after_disable_keeps_interrupt_masked() {
        let regs = FakeRegisters::default();
        let work = CountingWork::default();
        let timestamper = enabled_timestamper::<2, 2>(ResyncPolicy::default());
        timestamper.apply_config(&regs, &regs);

        regs.push_record(&TimestampRecord::new(1, 0, 0));
        regs.push_record(&TimestampRecord::new(2, 0, 0));
        timestamper.handle_tx_ts_irq(&regs, &work);
        timestamper.handle_tx_ts_irq(&regs, &work);
        assert!(!regs.irq_enabled(IrqSource::TxTimestampAvailable));

        let mut request = RawHwTstampConfig::default().to_ne_bytes();
        timestamper
            .hwtstamp_request(&regs, &regs, &mut SliceTransport::new(&mut request))
            .unwrap();
        assert!(!regs.capture_enabled());

        let report = timestamper.flush(&regs, &work);

        assert_eq!(report.records_discarded, 1);
        assert!(!regs.irq_enabled(IrqSource::TxTimestampAvailable));

        // enabling again unmasks the interrupt through the controller
        let mut request = RawHwTstampConfig {
            flags: 0,
            tx_type: 1,
            rx_filter: 0,
        }
        .to_ne_bytes();
        timestamper
            .hwtstamp_request(&regs, &regs, &mut SliceTransport::new(&mut request))
            .unwrap();
        assert!(regs.capture_enabled());
        assert!(regs.irq_enabled(IrqSource::TxTimestampAvailable));
    }

    #[test]
    fn dropped_timestamper_releases_queued_packets() {
        let log = Rc::new(RefCell::new(vec![]));
        let timestamper = enabled_timestamper::<4, 4>(ResyncPolicy::default());

        for sequence_id in [5, 6] {
            assert!(timestamper
                .submit(TestPacket::new(sequence_id, &log))
                .is_queued());
        }
        assert!(log.borrow().is_empty());

        drop(timestamper);

        assert_eq!(*log.borrow(), vec![Fate::Released(5), Fate::Released(6)]);
    }

    #[test]
    fn stuck_interrupt_status_is_bounded() {
        struct Stuck;

        impl Registers for Stuck {
            fn read(&self, _: Register) -> u32 {
                IrqSource::TxTimestampAvailable.mask()
            }

            fn read_repeated(&self, _: Register, buffer: &mut [u32]) {
                buffer.fill(0);
            }

            fn write_masked(&self, _: Register, _: u32, _: u32) {}

            fn irq_enable(&self, _: IrqSource) {}

            fn irq_disable(&self, _: IrqSource) {}
        }

        let timestamper = enabled_timestamper::<2, 2>(ResyncPolicy::default());
        let report = timestamper.flush(&Stuck, &CountingWork::default());

        assert_eq!(report.hardware_records_drained, MAX_DRAINED_RECORDS);
    }
}
