use config::{Config, ConfigError, Environment, File};
use rusty_vna::{ConnectionConfig, Endpoint, ErrorPolicy, SweepSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub instrument: InstrumentConfig,
    pub sweep: SweepSettings,
    pub streaming: StreamingConfig,
    pub recording: RecordingConfig,
    pub console: ConsoleConfig,
}

impl AppConfig {
    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument.host.trim().is_empty() {
            return Err(ConfigError::Message("instrument.host must not be empty".to_string()));
        }
        if self.instrument.port == 0 {
            return Err(ConfigError::Message("instrument.port must not be 0".to_string()));
        }
        if self.instrument.connect_timeout_ms == 0 || self.instrument.read_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "instrument timeouts must be greater than zero".to_string(),
            ));
        }
        self.sweep
            .resolve()
            .map_err(|e| ConfigError::Message(format!("Invalid sweep: {e}")))?;
        if self.streaming.plot_every == Some(0) {
            return Err(ConfigError::Message(
                "streaming.plot_every must be at least 1".to_string(),
            ));
        }
        if self.streaming.max_sweeps == Some(0) {
            return Err(ConfigError::Message(
                "streaming.max_sweeps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply command-line overrides on top of the loaded configuration and
    /// validate the result again.
    pub fn apply_overrides(&mut self, overrides: CliOverrides) -> Result<(), ConfigError> {
        if let Some(host) = overrides.host {
            self.instrument.host = host;
        }
        if let Some(port) = overrides.port {
            self.instrument.port = port;
        }
        if overrides.max_sweeps.is_some() {
            self.streaming.max_sweeps = overrides.max_sweeps;
        }
        if overrides.plot_every.is_some() {
            self.streaming.plot_every = overrides.plot_every;
        }
        self.validate()
    }
}

/// Settings given on the command line, each replacing its config value
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_sweeps: Option<usize>,
    pub plot_every: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct InstrumentConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl InstrumentConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.trim(), self.port)
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            ..ConnectionConfig::default()
        }
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.107".to_string(),
            port: 19542,
            connect_timeout_ms: 5000,
            read_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StreamingConfig {
    /// Pause after each completed sweep
    pub interval_ms: u64,
    /// What a failed configuration command does to the setup sequence
    pub error_policy: ErrorPolicy,
    /// Stop after this many sweeps (None = until Ctrl+C)
    pub max_sweeps: Option<usize>,
    /// Redraw terminal plots every N sweeps (None = no plots)
    pub plot_every: Option<usize>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            error_policy: ErrorPolicy::ContinueOnError,
            max_sweeps: None,
            plot_every: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RecordingConfig {
    /// Write the last snapshot as CSV when streaming ends
    pub save_on_exit: bool,
    pub output_path: String,
    /// Keep a JSON session log of all diagnostics next to the recordings
    pub session_log: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            save_on_exit: true,
            output_path: "./recordings".to_string(),
            session_log: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ConsoleConfig {
    pub verbosity: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            verbosity: "info".to_string(),
        }
    }
}

/// Load configuration: defaults, then the file (if any), then `RUSTY_VNA__*`
/// environment overrides.
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    match config_path {
        Some(path) if path.exists() => {
            builder = builder.add_source(File::from(path));
        }
        Some(path) => {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        None => {
            for candidate in ["vna.toml", "config.toml"] {
                if Path::new(candidate).exists() {
                    builder = builder.add_source(File::with_name(candidate));
                    break;
                }
            }
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("RUSTY_VNA")
            .separator("__")
            .try_parsing(true),
    );

    let app_config = builder.build()?.try_deserialize::<AppConfig>()?;
    app_config.validate()?;
    Ok(app_config)
}
