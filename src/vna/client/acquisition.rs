use super::InstrumentClient;
use crate::error::VnaError;

impl InstrumentClient {
    /// Number of frequency points per sweep
    pub fn set_points(&mut self, points: u32) -> Result<(), VnaError> {
        self.send(&format!(":VNA:ACQ:POINTS {points}"))
    }

    /// IF bandwidth in hertz. Narrower is quieter but slower.
    pub fn set_if_bandwidth(&mut self, hz: u64) -> Result<(), VnaError> {
        self.send(&format!(":VNA:ACQ:IFBW {hz}"))
    }

    /// Number of sweeps averaged per reported trace
    pub fn set_averaging(&mut self, sweeps: u32) -> Result<(), VnaError> {
        self.send(&format!(":VNA:ACQ:AVG {sweeps}"))
    }

    /// Select single-sweep (`true`) or continuous (`false`) acquisition.
    pub fn set_single_sweep(&mut self, single: bool) -> Result<(), VnaError> {
        let flag = if single { "TRUE" } else { "FALSE" };
        self.send(&format!(":VNA:ACQ:SINGLE {flag}"))
    }

    pub fn acquisition_run(&mut self) -> Result<(), VnaError> {
        self.send(":VNA:ACQ:RUN")
    }

    pub fn acquisition_stop(&mut self) -> Result<(), VnaError> {
        self.send(":VNA:ACQ:STOP")
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::FakeInstrument;
    use crate::types::SweepType;
    use crate::vna::InstrumentClient;

    #[test]
    fn test_command_text() {
        let fake = FakeInstrument::spawn(|_| None);
        let mut client = InstrumentClient::new();
        client.connect(fake.endpoint()).unwrap();

        client.set_vna_mode().unwrap();
        client.set_start_frequency(100_000).unwrap();
        client.set_stop_frequency(6_000_000_000).unwrap();
        client.set_points(201).unwrap();
        client.set_if_bandwidth(1000).unwrap();
        client.set_averaging(4).unwrap();
        client.set_sweep_type(SweepType::Log).unwrap();
        client.set_stimulus_level(-10.5).unwrap();
        client.set_single_sweep(false).unwrap();
        client.acquisition_run().unwrap();
        client.acquisition_stop().unwrap();

        assert_eq!(
            fake.wait_for(11),
            vec![
                ":DEV:MODE VNA",
                ":VNA:FREQ:START 100000",
                ":VNA:FREQ:STOP 6000000000",
                ":VNA:ACQ:POINTS 201",
                ":VNA:ACQ:IFBW 1000",
                ":VNA:ACQ:AVG 4",
                ":VNA:SWEEPTYPE LOG",
                ":VNA:STIM:LVL -10.5",
                ":VNA:ACQ:SINGLE FALSE",
                ":VNA:ACQ:RUN",
                ":VNA:ACQ:STOP",
            ]
        );
    }
}
