mod sink;
mod terminal_sink;
mod types;

pub use sink::{EventSink, NoopEventSink};
pub use terminal_sink::TerminalEventSink;
pub use types::{Event, LogStage};
