use super::InstrumentClient;
use crate::diagnostics::Severity;
use crate::error::VnaError;
use crate::types::{SParameter, Sample};
use crate::vna::protocol::Protocol;

impl InstrumentClient {
    /// Raw reply of `:VNA:TRAC:LIST?`.
    ///
    /// The reply is only ever searched for trace names, so it is returned as
    /// text. A truncated reply is returned as far as it got.
    pub fn trace_list(&mut self) -> Result<String, VnaError> {
        Ok(self.query(":VNA:TRAC:LIST?")?.text)
    }

    /// Create a trace named after `parameter`
    pub fn trace_new(&mut self, parameter: SParameter) -> Result<(), VnaError> {
        self.send(&format!(":VNA:TRAC:NEW {parameter}"))
    }

    /// Bind the trace named after `parameter` to that S-parameter
    pub fn trace_param(&mut self, parameter: SParameter) -> Result<(), VnaError> {
        self.send(&format!(":VNA:TRAC:PARAM {parameter} {parameter}"))
    }

    /// Fetch and parse the current data of one trace.
    ///
    /// An empty reply (including a timeout before any byte arrived) gives an
    /// empty trace. A reply with a non-numeric value in any complete
    /// frequency/real/imaginary group is rejected as a whole with
    /// [`VnaError::MalformedReply`]; a reply cut short by a timeout usually
    /// ends in an incomplete group and then yields only the groups before it.
    ///
    /// # Examples
    /// ```no_run
    /// use rusty_vna::{Endpoint, InstrumentClient, SParameter};
    ///
    /// let mut client = InstrumentClient::new();
    /// client.connect(Endpoint::new("192.168.1.107", 19542))?;
    /// for sample in client.get_trace_data(SParameter::S21)? {
    ///     println!("{:.3} MHz: {:.2} dB", sample.frequency_mhz(), sample.magnitude_db());
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn get_trace_data(&mut self, parameter: SParameter) -> Result<Vec<Sample>, VnaError> {
        let reply = self.query(&format!(":VNA:TRAC:DATA? {parameter}"))?;
        if reply.text.is_empty() {
            return Ok(Vec::new());
        }

        Protocol::parse_trace_reply(&reply.text).map_err(|e| {
            let reason = match e {
                VnaError::MalformedReply { reason, .. } => reason,
                other => other.to_string(),
            };
            self.report(
                Severity::Error,
                format!("Trace data processing error ({parameter}): {reason}"),
            );
            VnaError::MalformedReply {
                parameter: parameter.to_string(),
                reason,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::Severity;
    use crate::error::VnaError;
    use crate::test_support::FakeInstrument;
    use crate::types::{SParameter, Sample};
    use crate::vna::InstrumentClient;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn connected(fake: &FakeInstrument) -> InstrumentClient {
        let mut client = InstrumentClient::builder()
            .read_timeout(Duration::from_millis(200))
            .build();
        client.connect(fake.endpoint()).unwrap();
        client
    }

    #[test]
    fn test_get_trace_data_parses_reply() {
        let fake = FakeInstrument::spawn(|cmd| match cmd {
            ":VNA:TRAC:DATA? S11" => Some("[1000000,0.5,0.1],[2000000,0.3,-0.2]\n".to_string()),
            _ => None,
        });
        let mut client = connected(&fake);

        let samples = client.get_trace_data(SParameter::S11).unwrap();
        assert_eq!(
            samples,
            vec![
                Sample::new(1_000_000, 0.5, 0.1),
                Sample::new(2_000_000, 0.3, -0.2)
            ]
        );
    }

    #[test]
    fn test_get_trace_data_malformed_reply() {
        let fake = FakeInstrument::spawn(|_| Some("1000000,abc,0.1\n".to_string()));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut client = connected(&fake);
        client.set_diagnostic_callback(move |event| {
            sink.lock().unwrap().push((event.severity, event.message.clone()))
        });

        let result = client.get_trace_data(SParameter::S21);
        match result {
            Err(VnaError::MalformedReply { parameter, .. }) => assert_eq!(parameter, "S21"),
            other => panic!("expected malformed reply, got {other:?}"),
        }
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Severity::Error);
        assert!(events[0].1.contains("S21"));
    }

    #[test]
    fn test_get_trace_data_timeout_mid_reply_is_empty() {
        let fake = FakeInstrument::spawn(|_| Some("[1000000,0.".to_string()));
        let mut client = connected(&fake);

        let samples = client.get_trace_data(SParameter::S12).unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_get_trace_data_silent_instrument_is_empty() {
        let fake = FakeInstrument::spawn(|_| None);
        let mut client = connected(&fake);
        assert!(client.get_trace_data(SParameter::S22).unwrap().is_empty());
    }

    #[test]
    fn test_trace_commands() {
        let fake = FakeInstrument::spawn(|cmd| match cmd {
            ":VNA:TRAC:LIST?" => Some("S11,S21\n".to_string()),
            _ => None,
        });
        let mut client = connected(&fake);

        client.trace_new(SParameter::S12).unwrap();
        client.trace_param(SParameter::S12).unwrap();
        assert_eq!(client.trace_list().unwrap(), "S11,S21");
        assert_eq!(
            fake.commands(),
            vec![":VNA:TRAC:NEW S12", ":VNA:TRAC:PARAM S12 S12", ":VNA:TRAC:LIST?"]
        );
    }
}
