use std::future::Future;
use std::io::Write;
use std::pin::Pin;

use super::{Event, EventSink};

/// Prints each pipeline stage as one JSON line on stderr.
///
/// stdout is left alone; the whole line is written under one stderr lock so
/// concurrent requests do not interleave.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalEventSink;

impl TerminalEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn encode_line(event: &Event) -> Vec<u8> {
    let mut line = serde_json::to_vec(event).unwrap_or_else(|err| {
        format!(
            "{{\"stage\":\"{}\",\"error\":{}}}",
            event.stage.as_str(),
            serde_json::Value::String(err.to_string())
        )
        .into_bytes()
    });
    line.push(b'\n');
    line
}

impl EventSink for TerminalEventSink {
    fn write<'a>(&'a self, event: &'a Event) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let line = encode_line(event);
            let _ = std::io::stderr().lock().write_all(&line);
        })
    }
}
