pub mod client;
pub mod codex;
pub mod log_sink;
pub mod store;

pub use client::{UpstreamClientConfig, WreqUpstreamClient};
pub use codex::dispatch::{CodexDispatcher, DispatchSettings, OutboundCall};
pub use log_sink::FileEventSink;
pub use store::{FileCredentialStore, MemoryCredentialStore};
