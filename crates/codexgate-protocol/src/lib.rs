pub mod responses;
pub mod sse;
