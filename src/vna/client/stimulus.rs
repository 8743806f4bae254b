use super::InstrumentClient;
use crate::error::VnaError;
use crate::types::SweepType;

impl InstrumentClient {
    /// Switch the device into network-analyzer mode (`:DEV:MODE VNA`).
    pub fn set_vna_mode(&mut self) -> Result<(), VnaError> {
        self.send(":DEV:MODE VNA")
    }

    /// Set the sweep start frequency in hertz.
    ///
    /// # Examples
    /// ```no_run
    /// use rusty_vna::{Endpoint, InstrumentClient, parse_frequency};
    ///
    /// let mut client = InstrumentClient::new();
    /// client.connect(Endpoint::new("192.168.1.107", 19542))?;
    /// let start = parse_frequency("100 kHz").ok_or("bad frequency")?;
    /// client.set_start_frequency(start)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn set_start_frequency(&mut self, hz: u64) -> Result<(), VnaError> {
        self.send(&format!(":VNA:FREQ:START {hz}"))
    }

    /// Set the sweep stop frequency in hertz.
    pub fn set_stop_frequency(&mut self, hz: u64) -> Result<(), VnaError> {
        self.send(&format!(":VNA:FREQ:STOP {hz}"))
    }

    /// Linear or logarithmic spacing of the sweep points
    pub fn set_sweep_type(&mut self, sweep_type: SweepType) -> Result<(), VnaError> {
        self.send(&format!(":VNA:SWEEPTYPE {sweep_type}"))
    }

    /// Output power during the sweep, in dBm
    pub fn set_stimulus_level(&mut self, dbm: f64) -> Result<(), VnaError> {
        self.send(&format!(":VNA:STIM:LVL {dbm}"))
    }
}
