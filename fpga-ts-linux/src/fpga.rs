//! A software model of the packet processor's PTP capture unit

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};

use fpga_ts::{
    hardware::{
        IrqSource, Register, Registers, TimestampRecord, TxQueue, PP_CONFIG_ENABLE_PTP_TIMESTAMPS,
    },
    packet::ptp_sequence_id,
    time::NSEC_PER_SEC,
};
use rand::{rngs::StdRng, Rng};
use tokio::sync::Notify;

/// Time the simulated wire needs for one frame
const FRAME_TIME_NS: u128 = 6_720;

/// Faults injected into the timestamp stream
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Lose the capture of every nth transmitted PTP frame
    pub drop_every: Option<u32>,
    /// Push a stray word before every nth record
    pub misalign_every: Option<u32>,
}

fn every(n: u64, every: Option<u32>) -> bool {
    matches!(every, Some(every) if every != 0 && n % every as u64 == 0)
}

#[derive(Debug)]
struct FpgaState {
    pp_config: u32,
    irq_mask: u32,
    fifo: VecDeque<u32>,
    queue_stopped: bool,
    clock_ns: u128,
    transmitted: u64,
    captures: Vec<TimestampRecord>,
}

#[derive(Debug)]
pub struct SimulatedFpga {
    state: Mutex<FpgaState>,
    faults: Faults,
    irq: Notify,
}

impl SimulatedFpga {
    /// Create a device with capture disabled and the clock started at a
    /// random point in time
    pub fn new(faults: Faults, rng: &mut StdRng) -> Self {
        // 48 bit seconds, keep clear of the top so the clock never wraps
        let seconds: u128 = rng.gen_range(0..(1 << 47));

        SimulatedFpga {
            state: Mutex::new(FpgaState {
                pp_config: 0,
                irq_mask: 0,
                fifo: VecDeque::new(),
                queue_stopped: false,
                clock_ns: seconds * NSEC_PER_SEC,
                transmitted: 0,
                captures: Vec::new(),
            }),
            faults,
            irq: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FpgaState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn now(state: &FpgaState) -> (u64, u32) {
        (
            (state.clock_ns / NSEC_PER_SEC) as u64,
            (state.clock_ns % NSEC_PER_SEC) as u32,
        )
    }

    /// Put a frame on the wire.
    ///
    /// When capture is enabled and the frame is a PTP event message, its
    /// timestamp record is pushed into the FIFO and the interrupt raised,
    /// unless a fault swallows it. Returns the record the capture unit took.
    pub fn transmit(&self, frame: &[u8]) -> Option<TimestampRecord> {
        let mut state = self.lock();
        state.clock_ns += FRAME_TIME_NS;

        if state.pp_config & PP_CONFIG_ENABLE_PTP_TIMESTAMPS == 0 {
            return None;
        }
        let sequence_id = ptp_sequence_id(frame)?;

        state.transmitted += 1;
        let n = state.transmitted;
        let (seconds, nanoseconds) = Self::now(&state);
        let record = TimestampRecord::new(sequence_id, seconds, nanoseconds);
        state.captures.push(record);

        if every(n, self.faults.drop_every) {
            log::trace!("capture of sequence id {sequence_id:#06x} lost");
            return Some(record);
        }

        if every(n, self.faults.misalign_every) {
            state.fifo.push_back(0x0000_dead);
        }
        state.fifo.extend(record.to_words());

        let raise = state.irq_mask & IrqSource::TxTimestampAvailable.mask() != 0;
        drop(state);

        if raise {
            self.irq.notify_one();
        }

        Some(record)
    }

    /// Timestamp an inbound frame the way the receive path does
    pub fn receive(&self) -> TimestampRecord {
        let mut state = self.lock();
        state.clock_ns += FRAME_TIME_NS;
        let (seconds, nanoseconds) = Self::now(&state);
        TimestampRecord::new(0, seconds, nanoseconds)
    }

    /// Wait until the "transmit timestamp available" interrupt fires
    pub async fn interrupt(&self) {
        self.irq.notified().await
    }

    /// Whether the interrupt is both raised and unmasked
    pub fn irq_pending(&self) -> bool {
        let state = self.lock();
        !state.fifo.is_empty() && state.irq_mask & IrqSource::TxTimestampAvailable.mask() != 0
    }

    pub fn fifo_is_empty(&self) -> bool {
        self.lock().fifo.is_empty()
    }

    pub fn queue_stopped(&self) -> bool {
        self.lock().queue_stopped
    }

    /// Every record the capture unit took, including the lost ones
    pub fn captures(&self) -> Vec<TimestampRecord> {
        self.lock().captures.clone()
    }
}

impl Registers for SimulatedFpga {
    fn read(&self, reg: Register) -> u32 {
        let mut state = self.lock();
        match reg {
            Register::PpConfig => state.pp_config,
            Register::PpIrqs => {
                if state.fifo.is_empty() {
                    0
                } else {
                    IrqSource::TxTimestampAvailable.mask()
                }
            }
            Register::TxTimestampFifo => state.fifo.pop_front().unwrap_or(0),
            Register::TxTimestampCount => state.fifo.len() as u32,
        }
    }

    fn read_repeated(&self, reg: Register, buffer: &mut [u32]) {
        for word in buffer {
            *word = self.read(reg);
        }
    }

    fn write_masked(&self, reg: Register, mask: u32, value: u32) {
        let mut state = self.lock();
        match reg {
            Register::PpConfig => state.pp_config = (state.pp_config & !mask) | (value & mask),
            _ => log::warn!("write to read only register {reg:?} ignored"),
        }
    }

    fn irq_enable(&self, source: IrqSource) {
        let mut state = self.lock();
        state.irq_mask |= source.mask();
        let raise = !state.fifo.is_empty();
        drop(state);

        // a level triggered source fires again right away
        if raise {
            self.irq.notify_one();
        }
    }

    fn irq_disable(&self, source: IrqSource) {
        self.lock().irq_mask &= !source.mask();
    }
}

impl TxQueue for SimulatedFpga {
    fn stop_queue(&self) {
        log::trace!("tx queue stopped");
        self.lock().queue_stopped = true;
    }

    fn start_queue(&self) {
        log::trace!("tx queue started");
        self.lock().queue_stopped = false;
    }
}

#[cfg(test)]
mod tests {
    use fpga_ts::{hardware::RECORD_WORDS, packet::TxPacket};
    use rand::SeedableRng;

    use super::*;
    use crate::frame::Frame;

    fn enabled(faults: Faults) -> SimulatedFpga {
        let fpga = SimulatedFpga::new(faults, &mut StdRng::seed_from_u64(1));
        fpga.write_masked(
            Register::PpConfig,
            PP_CONFIG_ENABLE_PTP_TIMESTAMPS,
            PP_CONFIG_ENABLE_PTP_TIMESTAMPS,
        );
        fpga.irq_enable(IrqSource::TxTimestampAvailable);
        fpga
    }

    fn read_record(fpga: &SimulatedFpga) -> TimestampRecord {
        let mut words = [0; RECORD_WORDS];
        fpga.read_repeated(Register::TxTimestampFifo, &mut words);
        TimestampRecord::from_words(words)
    }

    #[test]
    fn capture_needs_enable_bit() {
        let fpga = SimulatedFpga::new(Faults::default(), &mut StdRng::seed_from_u64(1));

        assert_eq!(fpga.transmit(Frame::ptp_sync(1).data()), None);
        assert!(fpga.fifo_is_empty());
    }

    #[test]
    fn transmitted_frames_are_captured_in_order() {
        let fpga = enabled(Faults::default());

        let first = fpga.transmit(Frame::ptp_sync(1).data()).unwrap();
        let second = fpga.transmit(Frame::ptp_sync(2).data()).unwrap();

        assert!(fpga.irq_pending());
        assert_eq!(
            fpga.read(Register::TxTimestampCount),
            2 * RECORD_WORDS as u32
        );
        assert_eq!(read_record(&fpga), first);
        assert_eq!(read_record(&fpga), second);
        assert!(second.time() > first.time());
        assert!(!fpga.irq_pending());
    }

    #[test]
    fn faults_are_injected() {
        let fpga = enabled(Faults {
            drop_every: Some(2),
            misalign_every: Some(3),
        });

        for sequence_id in 1..=3 {
            fpga.transmit(Frame::ptp_sync(sequence_id).data());
        }

        assert_eq!(fpga.captures().len(), 3);
        // record 1, stray word, record 3
        assert_eq!(
            fpga.read(Register::TxTimestampCount),
            2 * RECORD_WORDS as u32 + 1
        );
        assert_eq!(read_record(&fpga).sequence_id, 1);
        assert_eq!(fpga.read(Register::TxTimestampFifo), 0x0000_dead);
        assert_eq!(read_record(&fpga).sequence_id, 3);
    }

    #[test]
    fn masked_interrupt_is_not_pending() {
        let fpga = enabled(Faults::default());
        fpga.irq_disable(IrqSource::TxTimestampAvailable);

        fpga.transmit(Frame::ptp_sync(1).data());

        assert!(!fpga.irq_pending());
        assert_ne!(fpga.read(Register::PpIrqs), 0);
    }
}
