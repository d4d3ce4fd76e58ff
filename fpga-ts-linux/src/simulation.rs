//! Drives a [`TxTimestamper`] against the simulated capture unit

use std::{collections::HashMap, sync::Arc, sync::Mutex, time::Duration};

use fpga_ts::{
    config::{HwTstampConfig, HwTstampError, RawHwTstampConfig, ResyncPolicy, SliceTransport},
    observability::TimestampingStats,
    packet::{TxDisposition, TxPacket},
    time::Time,
    FlushReport, IrqOutcome, RingState, TxTimestamper,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tokio::{sync::mpsc::unbounded_channel, task::JoinHandle};

use crate::{
    config::SimulationConfig,
    fpga::{Faults, SimulatedFpga},
    frame::{Frame, TxCompletion},
    workqueue::WorkQueue,
};

pub type Timestamper = TxTimestamper<Frame, Mutex<RingState<Frame>>>;

/// How long to wait for the last timestamps to be correlated
const SETTLE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("timestamping request rejected: {0}")]
    HwTstamp(#[from] HwTstampError),
    #[error("flush task failed: {0}")]
    Flush(#[from] tokio::task::JoinError),
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulationReport {
    /// Configuration granted by the timestamper
    pub hwtstamp: HwTstampConfig,
    pub sent: u64,
    /// Frames handed to the timestamper to wait for their timestamp
    pub queued: u64,
    /// Queued frames that got a timestamp
    pub stamped: u64,
    /// Queued frames released without timestamp
    pub released: u64,
    /// Stamped frames whose timestamp differs from the capture of that frame
    pub mismatched: u64,
    /// Looped back frames that got a receive timestamp
    pub rx_stamped: u64,
    pub flush: FlushReport,
    pub stats: TimestampingStats,
}

/// Hand every pending record to the timestamper, as the interrupt handler
fn service_interrupt(fpga: &SimulatedFpga, timestamper: &Timestamper, work: &WorkQueue) {
    while fpga.irq_pending() {
        if timestamper.handle_tx_ts_irq(fpga, work) == IrqOutcome::RingFull {
            break;
        }
    }
}

fn spawn_interrupt_handler(
    fpga: Arc<SimulatedFpga>,
    timestamper: Arc<Timestamper>,
    work: Arc<WorkQueue>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            fpga.interrupt().await;
            service_interrupt(&fpga, &timestamper, &work);
        }
    })
}

/// Run the traffic described by `config` and check every delivered
/// timestamp against the capture it came from.
pub async fn run(
    config: &SimulationConfig,
    policy: ResyncPolicy,
    hwtstamp: HwTstampConfig,
) -> Result<SimulationReport, SimulationError> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let fpga = Arc::new(SimulatedFpga::new(
        Faults {
            drop_every: config.drop_every,
            misalign_every: config.misalign_every,
        },
        &mut rng,
    ));
    let timestamper = Arc::new(Timestamper::new(policy));

    let work = Arc::new(WorkQueue::spawn("fpga-ts-correlate", {
        let fpga = fpga.clone();
        let timestamper = timestamper.clone();
        move || {
            let report = timestamper.correlate(&*fpga);
            if !report.is_empty() {
                log::trace!("correlation pass: {report:?}");
            }
        }
    }));

    let mut request = RawHwTstampConfig::from(hwtstamp).to_ne_bytes();
    let granted =
        timestamper.hwtstamp_request(&*fpga, &*fpga, &mut SliceTransport::new(&mut request))?;
    log::info!("timestamping granted: {granted:?}");

    let interrupt_handler =
        spawn_interrupt_handler(fpga.clone(), timestamper.clone(), work.clone());

    let (completion_tx, mut completion_rx) = unbounded_channel::<TxCompletion>();
    let first_sequence_id: u16 = rng.gen();
    let mut sent = 0;
    let mut queued = 0;
    let mut rx_stamped = 0;

    for i in 0..config.packets {
        while fpga.queue_stopped() {
            tokio::task::yield_now().await;
        }

        let sequence_id = first_sequence_id.wrapping_add(i as u16);
        let frame = Frame::ptp_sync(sequence_id).request_timestamp(completion_tx.clone());
        let data = frame.data().to_vec();

        match timestamper.submit(frame) {
            TxDisposition::Queued => queued += 1,
            TxDisposition::Release(frame) => drop(frame),
        }
        fpga.transmit(&data);
        sent += 1;

        if matches!(config.rx_every, Some(every) if every != 0 && (i + 1) % every == 0) {
            let record = fpga.receive();
            let mut inbound = Frame::ptp_sync(sequence_id);
            if timestamper.stamp_rx(&mut inbound, &record) {
                log::trace!(
                    "received frame {sequence_id:#06x} at {}",
                    inbound.hw_timestamp().unwrap_or_default()
                );
                rx_stamped += 1;
            }
        }

        if config.interval_ms == 0 {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(Duration::from_millis(config.interval_ms)).await;
        }
    }
    drop(completion_tx);

    let settled = tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !fpga.fifo_is_empty() || work.is_busy() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    if settled.is_err() {
        log::warn!("timestamps did not settle, flushing anyway");
    }

    interrupt_handler.abort();
    // a handler run in progress finishes before the rings are flushed
    if let Err(e) = interrupt_handler.await {
        if e.is_panic() {
            log::error!("interrupt handler panicked: {e}");
        }
    }

    // waiting for the correlation pass blocks
    let flush = tokio::task::spawn_blocking({
        let fpga = fpga.clone();
        let timestamper = timestamper.clone();
        move || timestamper.flush(&*fpga, &*work)
    })
    .await?;

    let captures: HashMap<u16, Time> = fpga
        .captures()
        .into_iter()
        .map(|record| (record.sequence_id, record.time()))
        .collect();

    let mut stamped = 0;
    let mut released = 0;
    let mut mismatched = 0;
    while let Some(completion) = completion_rx.recv().await {
        match completion.timestamp {
            Some(timestamp) => {
                stamped += 1;
                if captures.get(&completion.sequence_id) != Some(&timestamp) {
                    log::error!(
                        "frame {:#06x} got timestamp {timestamp} of another frame",
                        completion.sequence_id
                    );
                    mismatched += 1;
                }
            }
            None => released += 1,
        }
    }

    Ok(SimulationReport {
        hwtstamp: granted,
        sent,
        queued,
        stamped,
        released,
        mismatched,
        rx_stamped,
        flush,
        stats: timestamper.stats(),
    })
}
