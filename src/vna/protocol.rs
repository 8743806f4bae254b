use crate::error::VnaError;
use crate::types::Sample;
use log::debug;
use std::io::{ErrorKind, Read};

// Protocol constants
pub const TERMINATOR: u8 = b'\n';
pub const RECV_CHUNK_SIZE: usize = 4096;
pub const GROUP_SIZE: usize = 3;

/// How the read loop for a reply ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
    /// The buffer ended with the terminator
    Complete,
    /// A single receive hit the read timeout
    TimedOut,
    /// Any other read failure (I/O error, peer closed, non-ASCII data)
    Failed(String),
}

/// A reply read off the wire, trimmed of trailing whitespace.
///
/// Timeouts and read errors do not discard what arrived before them; the
/// partial text is kept and `status` says why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub status: ReplyStatus,
}

impl Reply {
    pub fn is_complete(&self) -> bool {
        self.status == ReplyStatus::Complete
    }

    /// Turn a truncated reply into an error for callers that want strictness.
    pub fn into_result(self, command: &str) -> Result<String, VnaError> {
        match self.status {
            ReplyStatus::Complete => Ok(self.text),
            ReplyStatus::TimedOut => Err(VnaError::ReadTimeout {
                command: command.to_string(),
                partial: self.text,
            }),
            ReplyStatus::Failed(reason) => Err(VnaError::Read {
                command: command.to_string(),
                partial: self.text,
                reason,
            }),
        }
    }
}

/// Line-oriented SCPI framing
pub struct Protocol;

impl Protocol {
    /// Append the single newline terminator to a command.
    pub fn frame_command(command: &str) -> Vec<u8> {
        let mut frame = Vec::with_capacity(command.len() + 1);
        frame.extend_from_slice(command.as_bytes());
        frame.push(TERMINATOR);
        frame
    }

    /// Accumulate receives until the buffer ends with the terminator.
    ///
    /// There is no length prefix and no size limit; the only bound is the
    /// per-receive timeout configured on `reader`.
    pub fn read_reply(reader: &mut dyn Read) -> Reply {
        let mut buffer: Vec<u8> = Vec::new();
        let mut chunk = [0u8; RECV_CHUNK_SIZE];

        let status = loop {
            match reader.read(&mut chunk) {
                Ok(0) => {
                    debug!("Peer closed the connection after {} bytes", buffer.len());
                    break ReplyStatus::Failed("connection closed by instrument".to_string());
                }
                Ok(n) => {
                    let part = &chunk[..n];
                    if !part.is_ascii() {
                        break ReplyStatus::Failed("reply contains non-ASCII bytes".to_string());
                    }
                    buffer.extend_from_slice(part);
                    debug!("Received {} bytes ({} total)", n, buffer.len());
                    if buffer.last() == Some(&TERMINATOR) {
                        break ReplyStatus::Complete;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    debug!("Receive timed out after {} bytes", buffer.len());
                    break ReplyStatus::TimedOut;
                }
                Err(e) => break ReplyStatus::Failed(e.to_string()),
            }
        };

        // Everything kept in `buffer` passed the ASCII check
        let text = String::from_utf8_lossy(&buffer).trim_end().to_string();
        Reply { text, status }
    }

    /// Parse a `:VNA:TRAC:DATA?` reply into samples.
    ///
    /// Brackets are deleted wherever they appear, the rest is split on commas
    /// and consumed three tokens at a time as frequency, real, imaginary.
    /// A trailing incomplete group is dropped. A single unparsable token in a
    /// complete group rejects the whole reply.
    pub fn parse_trace_reply(reply: &str) -> Result<Vec<Sample>, VnaError> {
        let cleaned: String = reply.chars().filter(|c| *c != '[' && *c != ']').collect();
        let tokens: Vec<&str> = cleaned.split(',').collect();

        tokens
            .chunks_exact(GROUP_SIZE)
            .map(|group| {
                let frequency = parse_number(group[0])?;
                let re = parse_number(group[1])?;
                let im = parse_number(group[2])?;
                if !(frequency.is_finite() && frequency >= 0.0) {
                    return Err(format!("invalid frequency '{}'", group[0].trim()));
                }
                Ok(Sample::new(frequency as u64, re, im))
            })
            .collect::<Result<Vec<_>, String>>()
            .map_err(|reason| VnaError::MalformedReply {
                parameter: "trace".to_string(),
                reason,
            })
    }
}

fn parse_number(token: &str) -> Result<f64, String> {
    let token = token.trim();
    token
        .parse::<f64>()
        .map_err(|_| format!("'{token}' is not a number"))
}
