//! Definitions of the abstract FPGA register interface
//!
//! The timestamping logic only needs a handful of register primitives. These
//! are provided by the platform through the [`Registers`] and [`TxQueue`]
//! traits.

mod record;

pub use record::{TimestampRecord, RECORD_WORDS, START_OF_TS};

/// Registers of the packet processor touched by the timestamping logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Packet processor configuration, holds [`PP_CONFIG_ENABLE_PTP_TIMESTAMPS`]
    PpConfig,
    /// Raw (unmasked) packet processor interrupt status
    PpIrqs,
    /// Read side of the transmit timestamp FIFO
    TxTimestampFifo,
    /// Number of words currently in the transmit timestamp FIFO
    TxTimestampCount,
}

/// Capture enable bit in [`Register::PpConfig`]
pub const PP_CONFIG_ENABLE_PTP_TIMESTAMPS: u32 = 1 << 4;

/// Interrupt sources of the packet processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrqSource {
    /// At least one transmit timestamp record is waiting in the FIFO
    TxTimestampAvailable,
}

impl IrqSource {
    /// Bit of this source in [`Register::PpIrqs`] and the interrupt mask
    pub const fn mask(self) -> u32 {
        match self {
            IrqSource::TxTimestampAvailable => 1 << 8,
        }
    }
}

/// Word level access to the FPGA registers
///
/// All methods take `&self`: the register block is shared between the
/// interrupt handler, the send path and the deferred correlation pass.
/// Implementations are expected to complete in bounded time.
pub trait Registers {
    /// Read a single 32 bit word
    fn read(&self, reg: Register) -> u32;

    /// Read `buffer.len()` consecutive words from the same register
    fn read_repeated(&self, reg: Register, buffer: &mut [u32]);

    /// Replace the bits selected by `mask` with the matching bits of `value`
    fn write_masked(&self, reg: Register, mask: u32, value: u32);

    fn irq_enable(&self, source: IrqSource);

    fn irq_disable(&self, source: IrqSource);
}

/// Control over the transmit queue of the surrounding network device
pub trait TxQueue {
    /// Stop handing new packets to the send path
    fn stop_queue(&self);

    /// Resume handing packets to the send path
    fn start_queue(&self);
}

impl<R: Registers + ?Sized> Registers for &R {
    fn read(&self, reg: Register) -> u32 {
        (**self).read(reg)
    }

    fn read_repeated(&self, reg: Register, buffer: &mut [u32]) {
        (**self).read_repeated(reg, buffer)
    }

    fn write_masked(&self, reg: Register, mask: u32, value: u32) {
        (**self).write_masked(reg, mask, value)
    }

    fn irq_enable(&self, source: IrqSource) {
        (**self).irq_enable(source)
    }

    fn irq_disable(&self, source: IrqSource) {
        (**self).irq_disable(source)
    }
}
