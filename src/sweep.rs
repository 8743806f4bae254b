//! Measurement setup: turning operator settings into the command sequence
//! that configures and starts a continuous sweep.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::diagnostics::Severity;
use crate::error::{ErrorPolicy, VnaError};
use crate::frequency::{parse_frequency, require_frequency};
use crate::types::{SParameter, SweepType};
use crate::vna::InstrumentClient;

/// Sweep settings as an operator writes them, frequencies with units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSettings {
    pub start: String,
    pub stop: String,
    pub points: u32,
    pub if_bandwidth: String,
    pub averaging: i64,
    pub sweep_type: SweepType,
    pub stimulus_level_dbm: String,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            start: "100 kHz".to_string(),
            stop: "6 GHz".to_string(),
            points: 201,
            if_bandwidth: "1 kHz".to_string(),
            averaging: 1,
            sweep_type: SweepType::Lin,
            stimulus_level_dbm: "0".to_string(),
        }
    }
}

impl SweepSettings {
    /// Validate and convert to hertz.
    ///
    /// Start and stop must parse to non-zero frequencies. The IF bandwidth is
    /// dropped if it does not parse (or is zero), averaging below one is
    /// dropped, and an unreadable stimulus level falls back to 0 dBm.
    pub fn resolve(&self) -> Result<SweepConfig, VnaError> {
        let start_hz = require_frequency("start", &self.start)?;
        let stop_hz = require_frequency("stop", &self.stop)?;
        if start_hz == 0 || stop_hz == 0 {
            return Err(VnaError::InvalidConfiguration(
                "start and stop frequency must be non-zero".to_string(),
            ));
        }
        if self.points == 0 {
            return Err(VnaError::InvalidConfiguration(
                "points must be at least 1".to_string(),
            ));
        }

        let if_bandwidth_hz = parse_frequency(&self.if_bandwidth).filter(|hz| *hz > 0);
        if if_bandwidth_hz.is_none() {
            warn!("Ignoring IF bandwidth '{}'", self.if_bandwidth);
        }

        let averaging = u32::try_from(self.averaging).ok().filter(|n| *n >= 1);

        let stimulus_level_dbm = self.stimulus_level_dbm.trim().parse::<f64>().unwrap_or_else(|_| {
            warn!(
                "Stimulus level '{}' is not a number, using 0 dBm",
                self.stimulus_level_dbm
            );
            0.0
        });

        Ok(SweepConfig {
            start_hz,
            stop_hz,
            points: self.points,
            if_bandwidth_hz,
            averaging,
            sweep_type: self.sweep_type,
            stimulus_level_dbm,
        })
    }
}

/// Validated sweep configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub start_hz: u64,
    pub stop_hz: u64,
    pub points: u32,
    /// Not sent when `None`
    pub if_bandwidth_hz: Option<u64>,
    /// Not sent when `None`
    pub averaging: Option<u32>,
    pub sweep_type: SweepType,
    pub stimulus_level_dbm: f64,
}

/// Failures tolerated while running a command sequence under
/// [`ErrorPolicy::ContinueOnError`].
#[derive(Debug, Default)]
pub struct SequenceReport {
    pub commands_attempted: usize,
    pub failures: Vec<VnaError>,
}

impl SequenceReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(
        &mut self,
        policy: ErrorPolicy,
        result: Result<(), VnaError>,
    ) -> Result<(), VnaError> {
        self.commands_attempted += 1;
        match (result, policy) {
            (Ok(()), _) => Ok(()),
            (Err(e), ErrorPolicy::FailFast) => Err(e),
            (Err(e), ErrorPolicy::ContinueOnError) => {
                self.failures.push(e);
                Ok(())
            }
        }
    }
}

/// Configure the analyzer and start continuous acquisition.
///
/// Commands are fire-and-forget, so a clean report only means every command
/// was written, not that the instrument accepted it.
pub fn configure_sweep(
    client: &mut InstrumentClient,
    config: &SweepConfig,
    policy: ErrorPolicy,
) -> Result<SequenceReport, VnaError> {
    info!(
        "Configuring sweep {}-{} Hz, {} points",
        config.start_hz, config.stop_hz, config.points
    );
    let mut report = SequenceReport::default();

    report.record(policy, client.set_vna_mode())?;
    report.record(policy, client.set_start_frequency(config.start_hz))?;
    report.record(policy, client.set_stop_frequency(config.stop_hz))?;
    report.record(policy, client.set_points(config.points))?;
    if let Some(ifbw) = config.if_bandwidth_hz {
        report.record(policy, client.set_if_bandwidth(ifbw))?;
    }
    if let Some(avg) = config.averaging {
        report.record(policy, client.set_averaging(avg))?;
    }

    client.report(
        Severity::Cmd,
        format!(
            "Type: {}, Power: {} dBm",
            config.sweep_type, config.stimulus_level_dbm
        ),
    );
    report.record(policy, client.set_sweep_type(config.sweep_type))?;
    report.record(policy, client.set_stimulus_level(config.stimulus_level_dbm))?;

    report.record(policy, client.set_single_sweep(false))?;
    report.record(policy, client.acquisition_run())?;

    ensure_traces(client, policy, &mut report)?;

    if !report.is_clean() {
        client.report(
            Severity::Warn,
            format!(
                "{} of {} configuration commands failed",
                report.failures.len(),
                report.commands_attempted
            ),
        );
    }
    Ok(report)
}

/// Make sure one trace per S-parameter exists and measures that parameter.
///
/// The trace list reply is only substring-searched; a failed list query is
/// treated as an empty list.
pub fn ensure_traces(
    client: &mut InstrumentClient,
    policy: ErrorPolicy,
    report: &mut SequenceReport,
) -> Result<(), VnaError> {
    let existing = match client.trace_list() {
        Ok(list) => list,
        Err(e) => {
            report.record(policy, Err(e))?;
            String::new()
        }
    };

    for parameter in SParameter::ALL {
        if !existing.contains(parameter.as_str()) {
            report.record(policy, client.trace_new(parameter))?;
        }
        report.record(policy, client.trace_param(parameter))?;
    }
    Ok(())
}

/// Stop acquisition if connected, then close the connection.
pub fn stop_sweep(client: &mut InstrumentClient) {
    if client.is_connected() {
        let _ = client.acquisition_stop();
    }
    client.disconnect();
}
