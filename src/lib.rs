pub mod diagnostics;
pub mod error;
pub mod frequency;
pub mod logger;
pub mod plotting;
pub mod recording;
pub mod stream;
pub mod sweep;
pub mod types;
pub mod vna;

#[cfg(test)]
pub(crate) mod test_support;

pub use diagnostics::{DiagnosticEvent, Diagnostics, Severity};
pub use error::{ErrorPolicy, VnaError};
pub use frequency::{parse_frequency, require_frequency};
pub use logger::Logger;
pub use plotting::{plot_trace, plot_trace_set};
pub use recording::{default_recording_name, load_csv, read_csv, save_csv, write_csv};
pub use stream::{StopHandle, StreamStats, TraceStreamer};
pub use sweep::{SequenceReport, SweepConfig, SweepSettings, configure_sweep, stop_sweep};
pub use types::{ConnectionState, Endpoint, SParameter, Sample, SweepType, TraceSet};
pub use vna::{
    ConnectionConfig, InstrumentClient, InstrumentClientBuilder, Protocol, Reply, ReplyStatus,
};
