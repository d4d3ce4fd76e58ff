use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use fpga_ts_linux::{config::Config, setup_logger, simulation, DaemonError};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Configuration file to use
    #[clap(long = "config", short = 'c', default_value = "/etc/fpga-ts/fpga-ts.toml")]
    config_file: PathBuf,

    /// Override the log level of the configuration file
    #[clap(short, long)]
    loglevel: Option<LevelFilter>,
}

async fn run(args: Args) -> Result<(), DaemonError> {
    let config = Config::from_file(&args.config_file).await?;

    let level = match args.loglevel {
        Some(level) => level,
        None => config.log_level()?,
    };
    setup_logger(level)?;

    if !config.check() {
        return Err(DaemonError::InvalidConfig);
    }

    log::info!(
        "simulating {} packets with {:?}",
        config.simulation.packets,
        config.resync_policy
    );

    let report = simulation::run(
        &config.simulation,
        config.resync_policy,
        config.hwtstamp.into(),
    )
    .await?;

    if report.mismatched != 0 {
        log::error!("{} packets received a wrong timestamp", report.mismatched);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fpga-ts: {e}");
            ExitCode::FAILURE
        }
    }
}
