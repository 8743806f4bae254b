use super::protocol::{Protocol, Reply, ReplyStatus};
use crate::diagnostics::{DiagnosticCallback, DiagnosticEvent, Diagnostics, Severity};
use crate::error::VnaError;
use crate::types::{ConnectionState, Endpoint};
use log::debug;
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

pub mod acquisition;
pub mod stimulus;
pub mod trace;

/// Connection configuration for the instrument client.
///
/// The instrument accepts a single socket timeout in practice, so all three
/// default to 5 seconds.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rusty_vna::ConnectionConfig;
///
/// let config = ConnectionConfig {
///     read_timeout: Duration::from_secs(2),
///     ..ConnectionConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing the TCP connection
    pub connect_timeout: Duration,
    /// Timeout applied to every individual receive
    pub read_timeout: Duration,
    /// Timeout for writing a command
    pub write_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Builder for [`InstrumentClient`].
///
/// ```
/// use std::time::Duration;
/// use rusty_vna::InstrumentClient;
///
/// let client = InstrumentClient::builder()
///     .read_timeout(Duration::from_secs(2))
///     .on_diagnostic(|event| println!("{event}"))
///     .build();
/// assert!(!client.is_connected());
/// ```
#[derive(Default)]
pub struct InstrumentClientBuilder {
    config: ConnectionConfig,
    callback: Option<DiagnosticCallback>,
}

impl InstrumentClientBuilder {
    /// Set the full connection configuration
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Receive every connect, send, read and parse diagnostic
    pub fn on_diagnostic<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&DiagnosticEvent) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Build a disconnected client
    pub fn build(self) -> InstrumentClient {
        InstrumentClient {
            stream: None,
            endpoint: None,
            config: self.config,
            diagnostics: Diagnostics::new(self.callback),
        }
    }
}

/// Client for one vector network analyzer speaking line-based SCPI over TCP.
///
/// Commands are fire-and-forget: [`send`](Self::send) only reports whether
/// the bytes left this process. [`query`](Self::query) sends and then reads
/// until the reply terminator, keeping whatever arrived if a receive times
/// out. Every failure is also reported through the diagnostic callback.
///
/// The client owns its socket and is meant to be driven from one thread.
///
/// # Examples
///
/// ```no_run
/// use rusty_vna::{Endpoint, InstrumentClient, SParameter};
///
/// let mut client = InstrumentClient::new();
/// client.connect(Endpoint::new("192.168.1.107", 19542))?;
/// client.send(":VNA:ACQ:RUN")?;
/// let s11 = client.get_trace_data(SParameter::S11)?;
/// println!("{} points", s11.len());
/// client.disconnect();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct InstrumentClient {
    stream: Option<TcpStream>,
    endpoint: Option<Endpoint>,
    config: ConnectionConfig,
    diagnostics: Diagnostics,
}

impl Default for InstrumentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentClient {
    /// Create a disconnected client with default timeouts.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> InstrumentClientBuilder {
        InstrumentClientBuilder::default()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn set_diagnostic_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&DiagnosticEvent) + Send + 'static,
    {
        self.diagnostics.set_callback(Box::new(callback));
    }

    pub fn state(&self) -> ConnectionState {
        if self.stream.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Endpoint of the last successful connection
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Open a connection to `endpoint`, dropping any existing one first.
    ///
    /// On failure the client is left disconnected and an error diagnostic
    /// is emitted.
    pub fn connect(&mut self, endpoint: Endpoint) -> Result<(), VnaError> {
        if let Some(old) = self.stream.take() {
            debug!("Closing existing connection before reconnecting");
            drop(old);
        }

        match self.open_stream(&endpoint) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.diagnostics
                    .emit(Severity::Ok, format!("Connected to {endpoint}"));
                self.endpoint = Some(endpoint);
                Ok(())
            }
            Err(source) => {
                self.diagnostics
                    .emit(Severity::Error, format!("Connection to {endpoint} failed: {source}"));
                Err(VnaError::Connection { endpoint, source })
            }
        }
    }

    fn open_stream(&self, endpoint: &Endpoint) -> std::io::Result<TcpStream> {
        debug!("Resolving {endpoint}");
        let addrs: Vec<_> = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()?
            .collect();

        let mut last_error = std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("{} did not resolve to any address", endpoint.host),
        );

        for addr in addrs {
            debug!("Connecting to {addr}");
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.config.read_timeout))?;
                    stream.set_write_timeout(Some(self.config.write_timeout))?;
                    return Ok(stream);
                }
                Err(e) => {
                    debug!("Connecting to {addr} failed: {e}");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// Close the connection. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            self.diagnostics.emit(Severity::Info, "Connection closed.");
        }
    }

    /// Send one newline-terminated command without waiting for a reply.
    ///
    /// Returns [`VnaError::NotConnected`] without touching the wire when there
    /// is no connection. A write failure is reported but leaves the client
    /// connected.
    pub fn send(&mut self, command: &str) -> Result<(), VnaError> {
        let Some(stream) = self.stream.as_mut() else {
            debug!("Not connected, dropping command: {command}");
            return Err(VnaError::NotConnected);
        };

        debug!(">> {command}");
        if let Err(source) = stream.write_all(&Protocol::frame_command(command)) {
            self.diagnostics
                .emit(Severity::Error, format!("Send error ({command}): {source}"));
            return Err(VnaError::Write {
                command: command.to_string(),
                source,
            });
        }
        Ok(())
    }

    /// Send `command` and read the reply up to its terminator.
    ///
    /// A receive timeout or read error ends the read early; the returned
    /// [`Reply`] then carries the partial text and the reason. Use
    /// [`Reply::into_result`] to treat that as an error.
    pub fn query(&mut self, command: &str) -> Result<Reply, VnaError> {
        self.send(command)?;

        let Some(stream) = self.stream.as_mut() else {
            return Err(VnaError::NotConnected);
        };
        let reply = Protocol::read_reply(stream);
        debug!("<< {} ({:?})", preview(&reply.text), reply.status);

        match &reply.status {
            ReplyStatus::Complete => {}
            ReplyStatus::TimedOut => self
                .diagnostics
                .emit(Severity::Warn, format!("Query timed out: {command}")),
            ReplyStatus::Failed(reason) => self
                .diagnostics
                .emit(Severity::Error, format!("Read error ({command}): {reason}")),
        }
        Ok(reply)
    }

    pub(crate) fn report(&mut self, severity: Severity, message: impl Into<String>) {
        self.diagnostics.emit(severity, message);
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(80) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeInstrument;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    fn client_with_timeout(ms: u64) -> InstrumentClient {
        InstrumentClient::builder()
            .connect_timeout(Duration::from_millis(ms))
            .read_timeout(Duration::from_millis(ms))
            .build()
    }

    #[test]
    fn test_connect_send_query() {
        let fake = FakeInstrument::spawn(|cmd| match cmd {
            ":VNA:TRAC:LIST?" => Some("S11,S21\n".to_string()),
            _ => None,
        });
        let mut client = client_with_timeout(1000);
        assert_eq!(client.config().read_timeout, Duration::from_millis(1000));
        assert_eq!(client.config().write_timeout, Duration::from_secs(5));

        client.connect(fake.endpoint()).unwrap();
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(client.endpoint(), Some(&fake.endpoint()));

        client.send(":VNA:ACQ:RUN").unwrap();
        let reply = client.query(":VNA:TRAC:LIST?").unwrap();
        assert!(reply.is_complete());
        assert_eq!(reply.text, "S11,S21");

        assert_eq!(fake.commands(), vec![":VNA:ACQ:RUN", ":VNA:TRAC:LIST?"]);
    }

    fn recording_events(client: &mut InstrumentClient) -> Arc<Mutex<Vec<DiagnosticEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        client.set_diagnostic_callback(move |event| sink.lock().unwrap().push(event.clone()));
        events
    }

    #[test]
    fn test_query_timeout_returns_partial_reply() {
        let fake = FakeInstrument::spawn(|_| Some("[1000000,0.".to_string()));
        let mut client = client_with_timeout(200);
        client.connect(fake.endpoint()).unwrap();
        let events = recording_events(&mut client);

        let reply = client.query(":VNA:TRAC:DATA? S11").unwrap();
        assert_eq!(reply.status, ReplyStatus::TimedOut);
        assert_eq!(reply.text, "[1000000,0.");
        assert!(client.is_connected());

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Warn);
        assert_eq!(events[0].message, "Query timed out: :VNA:TRAC:DATA? S11");
    }

    #[test]
    fn test_peer_closing_mid_reply_reports_read_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            (&stream).write_all(b"S11,S2").unwrap();
        });

        let mut client = client_with_timeout(1000);
        client.connect(Endpoint::new("127.0.0.1", port)).unwrap();
        let events = recording_events(&mut client);

        let reply = client.query(":VNA:TRAC:LIST?").unwrap();
        peer.join().unwrap();

        assert!(matches!(reply.status, ReplyStatus::Failed(_)));
        assert_eq!(reply.text, "S11,S2");
        assert_eq!(client.state(), ConnectionState::Connected);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Error);
        assert!(events[0].message.starts_with("Read error (:VNA:TRAC:LIST?)"));
    }

    #[test]
    fn test_write_to_closed_peer_reports_send_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut client = client_with_timeout(1000);
        client.connect(Endpoint::new("127.0.0.1", port)).unwrap();
        peer.join().unwrap();
        let events = recording_events(&mut client);

        // The first writes may still be accepted locally until the reset arrives
        let mut failure = None;
        for _ in 0..50 {
            if let Err(e) = client.send(":VNA:ACQ:RUN") {
                failure = Some(e);
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        match failure {
            Some(VnaError::Write { command, .. }) => assert_eq!(command, ":VNA:ACQ:RUN"),
            other => panic!("expected a write error, got {other:?}"),
        }
        assert_eq!(client.state(), ConnectionState::Connected);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Error);
        assert!(events[0].message.starts_with("Send error (:VNA:ACQ:RUN)"));
    }

    #[test]
    fn test_not_connected_operations() {
        let mut client = InstrumentClient::new();
        assert!(matches!(client.send(":VNA:ACQ:RUN"), Err(VnaError::NotConnected)));
        assert!(matches!(client.query(":VNA:TRAC:LIST?"), Err(VnaError::NotConnected)));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut client = InstrumentClient::new();
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnected);

        let fake = FakeInstrument::spawn(|_| None);
        client.connect(fake.endpoint()).unwrap();
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_reconnect_replaces_stream() {
        let fake = FakeInstrument::spawn(|cmd| Some(format!("{cmd}\n")));
        let mut client = client_with_timeout(1000);
        client.connect(fake.endpoint()).unwrap();
        client.connect(fake.endpoint()).unwrap();

        let reply = client.query("ECHO?").unwrap();
        assert_eq!(reply.text, "ECHO?");
    }

    #[test]
    fn test_connect_refused_reports_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut client = InstrumentClient::builder()
            .connect_timeout(Duration::from_millis(500))
            .on_diagnostic(move |event| sink.lock().unwrap().push(event.severity))
            .build();

        let result = client.connect(Endpoint::new("127.0.0.1", port));
        assert!(matches!(result, Err(VnaError::Connection { .. })));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.endpoint().is_none());
        assert_eq!(*events.lock().unwrap(), vec![Severity::Error]);
    }

    #[test]
    fn test_connect_unreachable_within_timeout() {
        let mut client = client_with_timeout(300);
        let started = Instant::now();

        // TEST-NET-1, never routed
        let result = client.connect(Endpoint::new("192.0.2.1", 9));
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_millis(300) + Duration::from_secs(2));
        assert!(!client.is_connected());
    }

    #[test]
    fn test_connect_bad_host() {
        let mut client = client_with_timeout(300);
        assert!(client.connect(Endpoint::new("not a host name", 80)).is_err());
        assert!(!client.is_connected());
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let long = "x".repeat(200);
        assert_eq!(preview(&long).len(), 80);
        assert_eq!(preview("short"), "short");
    }
}
