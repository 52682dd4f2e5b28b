use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub sim: SimConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sleep at the end of every loop iteration.
    pub tick_ms: u64,
    pub probe_interval_ms: u64,
    pub rate_window_ms: u64,
    pub frame_bytes: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 2,
            probe_interval_ms: 1003,
            rate_window_ms: 1000,
            frame_bytes: crate::protocol::FRAME_SIZE,
        }
    }
}

impl MonitorConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    /// Number of child nodes that will try to join.
    pub nodes: u8,
    pub join_interval_ms: u64,
    /// Assignments expire after this long; `None` keeps them forever.
    pub lease_ms: Option<u64>,
    pub frame_interval_ms: u64,
    /// Probability in [0, 1] that a probe to a live node is rejected.
    pub probe_loss: f64,
    pub probe_latency_ms: u64,
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            nodes: 6,
            join_interval_ms: 1500,
            lease_ms: None,
            frame_interval_ms: 400,
            probe_loss: 0.1,
            probe_latency_ms: 3,
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LogConfig {
    pub file: PathBuf,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("meshwatch.log"),
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.sim.probe_loss) {
            return Err(ConfigError::Invalid(format!(
                "sim.probe_loss must be within [0, 1], got {}",
                self.sim.probe_loss
            )));
        }
        if self.monitor.frame_bytes == 0 {
            return Err(ConfigError::Invalid("monitor.frame_bytes must be > 0".into()));
        }
        if self.monitor.frame_bytes > u16::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "monitor.frame_bytes must be <= {}, got {}",
                u16::MAX,
                self.monitor.frame_bytes
            )));
        }
        if self.sim.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid("sim.frame_interval_ms must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
