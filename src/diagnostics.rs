//! Timestamped diagnostic events emitted by the instrument client.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Ok,
    Warn,
    Error,
    /// File load/save
    File,
    /// Configuration commands about to be sent
    Cmd,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Ok => "OK",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::File => "FILE",
            Severity::Cmd => "CMD",
        }
    }

    fn log_level(&self) -> log::Level {
        match self {
            Severity::Error => log::Level::Error,
            Severity::Warn => log::Level::Warn,
            _ => log::Level::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
}

impl DiagnosticEvent {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.severity,
            self.message
        )
    }
}

pub type DiagnosticCallback = Box<dyn FnMut(&DiagnosticEvent) + Send>;

/// Fans diagnostic events out to the `log` facade and an optional callback.
#[derive(Default)]
pub struct Diagnostics {
    callback: Option<DiagnosticCallback>,
}

impl Diagnostics {
    pub fn new(callback: Option<DiagnosticCallback>) -> Self {
        Self { callback }
    }

    pub fn set_callback(&mut self, callback: DiagnosticCallback) {
        self.callback = Some(callback);
    }

    pub fn emit(&mut self, severity: Severity, message: impl Into<String>) {
        let event = DiagnosticEvent::new(severity, message);
        log::log!(
            target: "rusty_vna::diagnostics",
            severity.log_level(),
            "[{}] {}",
            event.severity,
            event.message
        );
        if let Some(callback) = self.callback.as_mut() {
            callback(&event);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_event_display_format() {
        let event = DiagnosticEvent::new(Severity::Warn, "Query timed out");
        let text = event.to_string();
        assert!(text.ends_with("[WARN] Query timed out"));
        assert_eq!(text.chars().nth(3), Some(':'));
    }

    #[test]
    fn test_callback_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut diagnostics = Diagnostics::new(Some(Box::new(move |event: &DiagnosticEvent| {
            sink.lock().unwrap().push((event.severity, event.message.clone()));
        })));

        diagnostics.emit(Severity::Ok, "connected");
        diagnostics.emit(Severity::Error, "boom");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (Severity::Ok, "connected".to_string()));
        assert_eq!(seen[1].0, Severity::Error);
    }

    #[test]
    fn test_emit_without_callback() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.emit(Severity::Info, "nobody listening");
    }
}
