use super::TxTimestamper;
use crate::{
    config::{ConfigTransport, HwTstampConfig, HwTstampError, RawHwTstampConfig, RxFilter, TxType},
    hardware::{IrqSource, Register, Registers, TxQueue, PP_CONFIG_ENABLE_PTP_TIMESTAMPS},
    packet::TxPacket,
    sync::StateMutex,
    RingState,
};

/// What [`TxTimestamper::apply_config`] did to the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlChange {
    /// Capture was already in the requested state
    Unchanged,
    Enabled,
    Disabled,
}

impl<P, M, const TS: usize, const PKT: usize> TxTimestamper<P, M, TS, PKT>
where
    P: TxPacket,
    M: StateMutex<RingState<P, TS, PKT>>,
{
    /// Bring the capture hardware in line with the tx and rx enable flags.
    ///
    /// Capture runs when either direction wants timestamps. Changing it is
    /// done with the transmit queue stopped, so no packet is in flight while
    /// the capture bit and its interrupt are toggled.
    pub fn apply_config(&self, regs: &impl Registers, queue: &impl TxQueue) -> ControlChange {
        let want = self.state.with_mut(|state| {
            let want = state.tx_enable || state.rx_enable;
            if !want {
                // a full ring must not unmask the interrupt of a stopped capture
                state.reenable_irq = false;
            }
            want
        });
        let have = regs.read(Register::PpConfig) & PP_CONFIG_ENABLE_PTP_TIMESTAMPS != 0;

        if want == have {
            return ControlChange::Unchanged;
        }

        queue.stop_queue();

        regs.write_masked(
            Register::PpConfig,
            PP_CONFIG_ENABLE_PTP_TIMESTAMPS,
            if want { PP_CONFIG_ENABLE_PTP_TIMESTAMPS } else { 0 },
        );

        if want {
            regs.irq_enable(IrqSource::TxTimestampAvailable);
        } else {
            regs.irq_disable(IrqSource::TxTimestampAvailable);
        }

        queue.start_queue();

        if want {
            log::info!("ptp timestamping enabled");
            ControlChange::Enabled
        } else {
            log::info!("ptp timestamping disabled");
            ControlChange::Disabled
        }
    }

    /// Handle a request to change the timestamping configuration.
    ///
    /// The request is fully validated before anything is changed. On success
    /// the configuration that is now in effect is written back through the
    /// transport and returned, with the specific PTP receive filters widened
    /// to [`RxFilter::PtpV2L4Event`].
    pub fn hwtstamp_request(
        &self,
        regs: &impl Registers,
        queue: &impl TxQueue,
        transport: &mut impl ConfigTransport,
    ) -> Result<HwTstampConfig, HwTstampError> {
        let raw = transport.read()?;
        let config = HwTstampConfig::try_from(raw).map_err(|e| {
            log::warn!("rejected timestamping request: {e:?}");
            e
        })?;

        self.state.with_mut(|state| {
            state.tx_enable = config.tx_type == TxType::On;
            state.rx_enable = config.rx_filter.is_enabled();
        });

        self.apply_config(regs, queue);

        let config = config.normalized();
        transport.write(&RawHwTstampConfig::from(config))?;

        log::debug!(
            "timestamping configured: tx {:?}, rx {:?}",
            config.tx_type,
            config.rx_filter
        );

        Ok(config)
    }

    /// The configuration currently in effect
    pub fn hwtstamp_get(&self) -> HwTstampConfig {
        self.state.with_mut(|state| HwTstampConfig {
            tx_type: if state.tx_enable {
                TxType::On
            } else {
                TxType::Off
            },
            rx_filter: if state.rx_enable {
                RxFilter::PtpV2L4Event
            } else {
                RxFilter::None
            },
        })
    }
}
