use std::{os::unix::fs::PermissionsExt, path::Path, str::FromStr};

use fpga_ts::config::{HwTstampConfig, ResyncPolicy, RxFilter, TxType};
use log::warn;
use serde::Deserialize;
use thiserror::Error;
use tokio::fs::read_to_string;
use tracing_subscriber::filter::LevelFilter;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_loglevel")]
    pub loglevel: String,
    #[serde(default)]
    pub resync_policy: ResyncPolicy,
    #[serde(default)]
    pub hwtstamp: HwTstampSection,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

fn default_loglevel() -> String {
    "info".into()
}

/// The timestamping request issued when the device comes up
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct HwTstampSection {
    #[serde(default = "default_tx_type")]
    pub tx_type: TxType,
    #[serde(default = "default_rx_filter")]
    pub rx_filter: RxFilter,
}

fn default_tx_type() -> TxType {
    TxType::On
}

fn default_rx_filter() -> RxFilter {
    RxFilter::PtpV2L4Event
}

impl Default for HwTstampSection {
    fn default() -> Self {
        HwTstampSection {
            tx_type: default_tx_type(),
            rx_filter: default_rx_filter(),
        }
    }
}

impl From<HwTstampSection> for HwTstampConfig {
    fn from(section: HwTstampSection) -> Self {
        HwTstampConfig {
            tx_type: section.tx_type,
            rx_filter: section.rx_filter,
        }
    }
}

/// Traffic pattern and faults of the simulated capture unit
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of PTP event packets to send
    #[serde(default = "default_packets")]
    pub packets: u32,
    /// Pause between two packets
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Lose the captured timestamp of every nth packet
    #[serde(default)]
    pub drop_every: Option<u32>,
    /// Put a stray word in front of every nth timestamp record
    #[serde(default)]
    pub misalign_every: Option<u32>,
    /// Loop back every nth packet as a received packet
    #[serde(default)]
    pub rx_every: Option<u32>,
    /// Seed for the capture clock and the first sequence id, random when
    /// absent
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_packets() -> u32 {
    64
}

fn default_interval_ms() -> u64 {
    1
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            packets: default_packets(),
            interval_ms: default_interval_ms(),
            drop_every: None,
            misalign_every: None,
            rx_every: None,
            seed: None,
        }
    }
}

impl Config {
    /// Parse config from file
    pub async fn from_file(file: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let meta = std::fs::metadata(&file)?;
        let perm = meta.permissions();

        if perm.mode() as libc::mode_t & libc::S_IWOTH != 0 {
            warn!("Unrestricted config file permissions: Others can write.");
        }

        let contents = read_to_string(file).await?;
        Ok(toml::de::from_str(&contents)?)
    }

    pub fn log_level(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.loglevel)
            .map_err(|_| ConfigError::LogLevel(self.loglevel.clone()))
    }

    /// Check that the config is reasonable
    pub fn check(&self) -> bool {
        let mut ok = true;

        if self.simulation.packets == 0 {
            warn!("No packets will be sent.");
            ok = false;
        }

        if self.simulation.packets > u16::MAX as u32 {
            warn!("Sequence ids will repeat, timestamps cannot be verified.");
            ok = false;
        }

        for (name, every) in [
            ("drop-every", self.simulation.drop_every),
            ("misalign-every", self.simulation.misalign_every),
            ("rx-every", self.simulation.rx_every),
        ] {
            if every == Some(0) {
                warn!("{name} must be at least 1.");
                ok = false;
            }
        }

        if self.simulation.drop_every == Some(1) {
            warn!("Every timestamp is dropped, no packet can be matched.");
            ok = false;
        }

        if self.hwtstamp.tx_type == TxType::Off {
            warn!("Transmit timestamping is off, no packet will be queued.");
        }

        ok
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error while reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("config toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid log level: {0}")]
    LogLevel(String),
}
