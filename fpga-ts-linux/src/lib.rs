pub mod config;
pub mod fpga;
pub mod frame;
pub mod simulation;
pub mod workqueue;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("could not forward log records: {0}")]
    Bridge(#[from] log::SetLoggerError),
    #[error("could not install subscriber: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

/// Install the global subscriber, forwarding the `log` records of the core
/// crate to it.
pub fn setup_logger(level: LevelFilter) -> Result<(), LoggerError> {
    tracing_log::LogTracer::init()?;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init()
        .map_err(LoggerError::Subscriber)
}

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("invalid configuration")]
    InvalidConfig,
    #[error(transparent)]
    Logger(#[from] LoggerError),
    #[error(transparent)]
    Simulation(#[from] simulation::SimulationError),
    #[error("could not write report: {0}")]
    Report(#[from] serde_json::Error),
}
