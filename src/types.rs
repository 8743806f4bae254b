use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::VnaError;

/// One frequency point of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub frequency_hz: u64,
    pub value: Complex64,
}

impl Sample {
    pub fn new(frequency_hz: u64, re: f64, im: f64) -> Self {
        Self {
            frequency_hz,
            value: Complex64::new(re, im),
        }
    }

    /// Magnitude in dB, offset so a zero value stays finite
    pub fn magnitude_db(&self) -> f64 {
        20.0 * (self.value.norm() + 1e-12).log10()
    }

    pub fn frequency_mhz(&self) -> f64 {
        self.frequency_hz as f64 / 1e6
    }
}

/// Scattering parameter names understood by the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SParameter {
    S11,
    S12,
    S21,
    S22,
}

impl SParameter {
    pub const ALL: [SParameter; 4] = [
        SParameter::S11,
        SParameter::S12,
        SParameter::S21,
        SParameter::S22,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SParameter::S11 => "S11",
            SParameter::S12 => "S12",
            SParameter::S21 => "S21",
            SParameter::S22 => "S22",
        }
    }

    /// Reflection parameters are drawn on the complex plane, transmission
    /// parameters as magnitude over frequency.
    pub fn is_reflection(&self) -> bool {
        matches!(self, SParameter::S11 | SParameter::S22)
    }
}

impl fmt::Display for SParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SParameter {
    type Err = VnaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S11" => Ok(SParameter::S11),
            "S12" => Ok(SParameter::S12),
            "S21" => Ok(SParameter::S21),
            "S22" => Ok(SParameter::S22),
            other => Err(VnaError::InvalidConfiguration(format!(
                "unknown S-parameter '{other}'"
            ))),
        }
    }
}

/// Latest known trace per parameter.
///
/// Sequences keep the order the instrument sent them in. The four traces of a
/// single sweep normally share length and frequencies, but nothing here relies
/// on it: a parameter whose fetch failed simply keeps its previous trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceSet {
    traces: BTreeMap<SParameter, Vec<Sample>>,
}

impl TraceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, parameter: SParameter) -> &[Sample] {
        self.traces
            .get(&parameter)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, parameter: SParameter) -> bool {
        self.traces.contains_key(&parameter)
    }

    pub fn insert(&mut self, parameter: SParameter, samples: Vec<Sample>) {
        self.traces.insert(parameter, samples);
    }

    /// Overlay a newer snapshot. Parameters that are absent or empty in
    /// `newer` keep their current trace.
    pub fn merge(&mut self, newer: TraceSet) {
        for (parameter, samples) in newer.traces {
            if !samples.is_empty() {
                self.traces.insert(parameter, samples);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SParameter, &[Sample])> {
        self.traces.iter().map(|(p, s)| (*p, s.as_slice()))
    }

    /// Length of the longest trace
    pub fn sweep_len(&self) -> usize {
        self.traces.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.traces.values().all(Vec::is_empty)
    }

    /// True when every present trace has the same length and the same
    /// frequency at each index.
    pub fn is_consistent(&self) -> bool {
        let mut traces = self.traces.values();
        let Some(first) = traces.next() else {
            return true;
        };
        traces.all(|other| {
            other.len() == first.len()
                && other
                    .iter()
                    .zip(first)
                    .all(|(a, b)| a.frequency_hz == b.frequency_hz)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Instrument address, remembered for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SweepType {
    #[default]
    Lin,
    Log,
}

impl SweepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepType::Lin => "LIN",
            SweepType::Log => "LOG",
        }
    }
}

impl fmt::Display for SweepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SweepType {
    type Err = VnaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LIN" => Ok(SweepType::Lin),
            "LOG" => Ok(SweepType::Log),
            other => Err(VnaError::InvalidConfiguration(format!(
                "sweep type must be LIN or LOG, got '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(freqs: &[u64]) -> Vec<Sample> {
        freqs.iter().map(|&f| Sample::new(f, 0.1, -0.1)).collect()
    }

    #[test]
    fn test_sparameter_parse_and_display() {
        assert_eq!("s21".parse::<SParameter>().unwrap(), SParameter::S21);
        assert_eq!(SParameter::S12.to_string(), "S12");
        assert!("S33".parse::<SParameter>().is_err());
    }

    #[test]
    fn test_merge_keeps_previous_trace_for_missing_parameter() {
        let mut latest = TraceSet::new();
        latest.insert(SParameter::S11, trace(&[1, 2]));
        latest.insert(SParameter::S21, trace(&[1, 2]));

        let mut newer = TraceSet::new();
        newer.insert(SParameter::S11, trace(&[1, 2, 3]));
        newer.insert(SParameter::S21, Vec::new());
        latest.merge(newer);

        assert_eq!(latest.get(SParameter::S11).len(), 3);
        assert_eq!(latest.get(SParameter::S21).len(), 2);
        assert!(latest.get(SParameter::S22).is_empty());
        assert_eq!(latest.sweep_len(), 3);
    }

    #[test]
    fn test_consistency_check_tolerates_mismatch() {
        let mut set = TraceSet::new();
        assert!(set.is_consistent());

        set.insert(SParameter::S11, trace(&[10, 20]));
        set.insert(SParameter::S22, trace(&[10, 20]));
        assert!(set.is_consistent());

        set.insert(SParameter::S12, trace(&[10, 30]));
        assert!(!set.is_consistent());
    }

    #[test]
    fn test_magnitude_db() {
        let sample = Sample::new(1_000_000, 0.1, 0.0);
        assert!((sample.magnitude_db() + 20.0).abs() < 1e-6);
        assert!(Sample::new(0, 0.0, 0.0).magnitude_db().is_finite());
    }

    #[test]
    fn test_sweep_type_parse() {
        assert_eq!("log".parse::<SweepType>().unwrap(), SweepType::Log);
        assert_eq!(SweepType::Lin.to_string(), "LIN");
        assert!("EXP".parse::<SweepType>().is_err());
    }
}
