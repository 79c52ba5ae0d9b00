//! Core provider abstractions for codexgate.
//!
//! This crate intentionally does **not** depend on axum or any concrete HTTP client.
//! The codex provider builds `UpstreamHttpRequest` values and hands them to an
//! `UpstreamClient`; credentials, time and logging come in through traits so the
//! pipeline can run against in-memory fakes.

pub mod clock;
pub mod credential;
pub mod errors;
pub mod events;
pub mod headers;
pub mod provider;

pub use clock::{Clock, SystemClock};
pub use credential::{Credential, CredentialKind, CredentialStore};
pub use errors::{DispatchError, ProviderError};
pub use events::{Event, EventSink, LogStage, NoopEventSink, TerminalEventSink};
pub use headers::{Headers, header_get, header_remove, header_set};
pub use provider::{
    ByteStream, HttpMethod, UpstreamBody, UpstreamClient, UpstreamFailure, UpstreamHttpRequest,
    UpstreamHttpResponse, UpstreamTransportErrorKind,
};
