use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tracing::warn;

use codexgate_provider_core::{Event, EventSink};

/// Writes each event to `<dir>/<trace>-<stage>.json`.
pub struct FileEventSink {
    dir: PathBuf,
}

impl FileEventSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_path(&self, event: &Event) -> PathBuf {
        let trace = event
            .trace_id
            .as_deref()
            .map(sanitize)
            .unwrap_or_else(|| event.at.to_string());
        self.dir
            .join(format!("{trace}-{}.json", event.stage.as_str()))
    }
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl EventSink for FileEventSink {
    fn write<'a>(&'a self, event: &'a Event) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let json = match serde_json::to_vec_pretty(event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(event = "request_log_serialize_failed", error = %err);
                    return;
                }
            };
            if let Err(err) = tokio::fs::create_dir_all(&self.dir).await {
                warn!(event = "request_log_dir_failed", dir = %self.dir.display(), error = %err);
                return;
            }
            let path = self.file_path(event);
            if let Err(err) = tokio::fs::write(&path, json).await {
                warn!(event = "request_log_write_failed", path = %path.display(), error = %err);
            }
        })
    }
}
