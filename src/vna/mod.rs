pub mod client;
pub mod protocol;

// Re-export the main types from client
pub use client::{ConnectionConfig, InstrumentClient, InstrumentClientBuilder};
pub use protocol::{Protocol, Reply, ReplyStatus};
