use super::TxTimestamper;
use crate::{
    hardware::{IrqSource, Register, Registers, TimestampRecord, RECORD_WORDS},
    packet::TxPacket,
    sync::{Deferred, StateMutex},
    RingState,
};

/// Result of handling a "transmit timestamp available" interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqOutcome {
    /// A record was moved into the timestamp ring and a correlation pass
    /// was scheduled
    Queued,
    /// The timestamp ring is full. The record stays in the FPGA and the
    /// interrupt is masked until the next correlation pass.
    RingFull,
    /// No record start was found in the FIFO, nothing was queued
    NoStartOfTimestamp,
}

/// Scan the FIFO for the first word of a record and read the rest of it.
///
/// Returns the record and the number of words skipped to find its start.
fn read_record(regs: &impl Registers) -> Option<(TimestampRecord, usize)> {
    for skipped in 0..=RECORD_WORDS {
        let start = regs.read(Register::TxTimestampFifo);

        if TimestampRecord::is_start_word(start) {
            let mut rest = [0; RECORD_WORDS - 1];
            regs.read_repeated(Register::TxTimestampFifo, &mut rest);
            return Some((TimestampRecord::from_parts(start, rest), skipped));
        }
    }

    None
}

impl<P, M, const TS: usize, const PKT: usize> TxTimestamper<P, M, TS, PKT>
where
    P: TxPacket,
    M: StateMutex<RingState<P, TS, PKT>>,
{
    /// Pull one record out of the FPGA into the timestamp ring.
    ///
    /// Must be called from the "transmit timestamp available" interrupt,
    /// serialized with the other interrupt time entry points. The FIFO is
    /// only read when the ring has room for the record; otherwise the
    /// interrupt is masked and the record is left in hardware until the next
    /// [`correlate`](Self::correlate) pass unmasks it.
    pub fn handle_tx_ts_irq(&self, regs: &impl Registers, work: &impl Deferred) -> IrqOutcome {
        log::trace!("tx timestamp interrupt");

        let full = self.state.with_mut(|state| {
            if !state.timestamps.is_full() {
                return false;
            }

            state.reenable_irq = true;
            state.stats.ts_ring_full += 1;
            regs.irq_disable(IrqSource::TxTimestampAvailable);
            true
        });

        if full {
            log::error!("tx timestamp buffer full, interrupt disabled");
            return IrqOutcome::RingFull;
        }

        log::trace!(
            "tx timestamp count: {:#010x}",
            regs.read(Register::TxTimestampCount)
        );

        // The slot checked above cannot be taken by anyone else: this is the
        // only producer of the timestamp ring. The record only becomes
        // visible to the correlation pass once it has been read completely.
        let Some((record, skipped)) = read_record(regs) else {
            log::error!("no start of timestamp found in tx timestamp fifo");
            self.state.with_mut(|state| {
                state.stats.missing_start_of_ts += 1;
                state.stats.misaligned_words += RECORD_WORDS as u64 + 1;
            });
            return IrqOutcome::NoStartOfTimestamp;
        };

        if skipped != 0 {
            log::debug!("misaligned timestamp for tx packet found, skipped {skipped} words");
        }

        log::debug!(
            "read tx timestamp; sequence id {:#06x}",
            record.sequence_id
        );

        let lost = self.state.with_mut(|state| {
            state.stats.misaligned_words += skipped as u64;
            state.timestamps.push(record).is_err()
        });

        if lost {
            log::error!("tx timestamp ring filled up by a concurrent producer, record dropped");
        }

        // always schedule, there may be leftovers from an earlier pass
        work.schedule();

        IrqOutcome::Queued
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        config::ResyncPolicy,
        hardware::test::FakeRegisters,
        sync::test::CountingWork,
        timestamper::test::enabled_timestamper,
    };

    #[test]
    fn record_is_queued_and_work_scheduled() {
        let regs = FakeRegisters::default();
        let work = CountingWork::default();
        let timestamper = enabled_timestamper::<4, 4>(ResyncPolicy::default());

        regs.push_record(&TimestampRecord::new(5, 100, 200));

        assert_eq!(
            timestamper.handle_tx_ts_irq(&regs, &work),
            IrqOutcome::Queued
        );
        assert_eq!(work.scheduled.get(), 1);
        assert_eq!(timestamper.pending_timestamps(), 1);
        assert!(regs.fifo.borrow().is_empty());
    }

    #[test]
    fn garbage_before_record_is_skipped() {
        let regs = FakeRegisters::default();
        let work = CountingWork::default();
        let timestamper = enabled_timestamper::<4, 4>(ResyncPolicy::default());

        regs.push_word(0xdead_beef);
        regs.push_word(0x0000_0001);
        regs.push_record(&TimestampRecord::new(9, 1, 2));

        assert_eq!(
            timestamper.handle_tx_ts_irq(&regs, &work),
            IrqOutcome::Queued
        );
        assert_eq!(timestamper.stats().misaligned_words, 2);
        assert_eq!(timestamper.pending_timestamps(), 1);
    }

    #[test]
    fn missing_start_commits_nothing() {
        let regs = FakeRegisters::default();
        let work = CountingWork::default();
        let timestamper = enabled_timestamper::<4, 4>(ResyncPolicy::default());

        for _ in 0..(RECORD_WORDS + 1) {
            regs.push_word(0x1111_2222);
        }

        assert_eq!(
            timestamper.handle_tx_ts_irq(&regs, &work),
            IrqOutcome::NoStartOfTimestamp
        );
        assert_eq!(*regs.fifo_reads.borrow(), RECORD_WORDS + 1);
        assert_eq!(timestamper.pending_timestamps(), 0);
        assert_eq!(timestamper.indices().ts_write, 0);
        assert_eq!(timestamper.stats().missing_start_of_ts, 1);
        assert_eq!(work.scheduled.get(), 0);
    }

    #[test]
    fn full_ring_masks_interrupt_without_reading() {
        let regs = FakeRegisters::default();
        let work = CountingWork::default();
        let timestamper = enabled_timestamper::<3, 4>(ResyncPolicy::default());
        regs.irq_enable(IrqSource::TxTimestampAvailable);

        for seq in 0..3 {
            regs.push_record(&TimestampRecord::new(seq, 0, 0));
        }

        assert_eq!(timestamper.handle_tx_ts_irq(&regs, &work), IrqOutcome::Queued);
        assert_eq!(timestamper.handle_tx_ts_irq(&regs, &work), IrqOutcome::Queued);
        let reads = *regs.fifo_reads.borrow();

        assert_eq!(
            timestamper.handle_tx_ts_irq(&regs, &work),
            IrqOutcome::RingFull
        );
        assert_eq!(*regs.fifo_reads.borrow(), reads);
        assert_eq!(regs.fifo.borrow().len(), RECORD_WORDS);
        assert!(!regs.irq_enabled(IrqSource::TxTimestampAvailable));
        assert_eq!(timestamper.stats().ts_ring_full, 1);

        // draining the ring lifts the backpressure
        let log = Rc::new(RefCell::new(vec![]));
        assert!(timestamper
            .submit(crate::packet::test::TestPacket::new(0, &log))
            .is_queued());
        timestamper.correlate(&regs);

        assert!(regs.irq_enabled(IrqSource::TxTimestampAvailable));
        assert_eq!(
            timestamper.handle_tx_ts_irq(&regs, &work),
            IrqOutcome::Queued
        );
    }
}
