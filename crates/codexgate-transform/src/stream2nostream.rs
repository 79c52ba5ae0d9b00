use std::collections::BTreeMap;

use codexgate_protocol::responses::StreamEventKind;
use codexgate_protocol::sse::{SseEvent, SseParser};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOutcome {
    /// Final `response` object of the turn.
    Complete(Value),
    /// The stream reported an `error` event; the value is `{"error": {...}}`.
    UpstreamError(Value),
    /// The stream ended without a terminal event.
    MissingTerminalEvent,
}

/// Folds a Responses SSE stream into the final response object.
#[derive(Debug, Default)]
pub struct ResponseAggregator {
    parser: SseParser,
    snapshot: Option<Value>,
    output_items: BTreeMap<i64, Value>,
    outcome: Option<AggregateOutcome>,
}

impl ResponseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, chunk: &[u8]) {
        let events = self.parser.push_slice(chunk);
        for event in events {
            self.push_event(event);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn finish(mut self) -> AggregateOutcome {
        let events = self.parser.finish();
        for event in events {
            self.push_event(event);
        }
        self.outcome
            .unwrap_or(AggregateOutcome::MissingTerminalEvent)
    }

    fn push_event(&mut self, event: SseEvent) {
        if self.outcome.is_some() || event.is_terminal_marker() {
            return;
        }
        let Ok(payload) = serde_json::from_str::<Value>(&event.data) else {
            return;
        };
        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .or(event.event.as_deref())
            .unwrap_or_default();
        let kind = StreamEventKind::from_type(event_type);

        match kind {
            StreamEventKind::OutputItemDone => {
                let index = payload
                    .get("output_index")
                    .and_then(Value::as_i64)
                    .unwrap_or(self.output_items.len() as i64);
                if let Some(item) = payload.get("item") {
                    self.output_items.insert(index, item.clone());
                }
            }
            StreamEventKind::Error => {
                self.outcome = Some(AggregateOutcome::UpstreamError(error_body(payload)));
            }
            _ if kind.carries_response() => {
                let Some(response) = payload.get("response").cloned() else {
                    return;
                };
                if kind.is_terminal() {
                    self.outcome = Some(AggregateOutcome::Complete(self.finalize(response)));
                } else {
                    self.snapshot = Some(response);
                }
            }
            _ => {}
        }
    }

    fn finalize(&mut self, mut response: Value) -> Value {
        let output_empty = response
            .get("output")
            .and_then(Value::as_array)
            .is_none_or(Vec::is_empty);
        if output_empty && !self.output_items.is_empty() {
            let items = std::mem::take(&mut self.output_items)
                .into_values()
                .collect::<Vec<_>>();
            if let Some(object) = response.as_object_mut() {
                object.insert("output".to_string(), Value::Array(items));
            }
        }
        if response.get("id").is_none() {
            if let (Some(object), Some(id)) = (
                response.as_object_mut(),
                self.snapshot.as_ref().and_then(|snapshot| snapshot.get("id")).cloned(),
            ) {
                object.insert("id".to_string(), id);
            }
        }
        response
    }
}

fn error_body(mut payload: Value) -> Value {
    if let Some(error) = payload.get_mut("error").map(Value::take) {
        return wrap_error(error);
    }
    if let Some(object) = payload.as_object_mut() {
        object.remove("type");
        object.remove("sequence_number");
    }
    wrap_error(payload)
}

fn wrap_error(error: Value) -> Value {
    let mut wrapper = Map::new();
    wrapper.insert("error".to_string(), error);
    Value::Object(wrapper)
}

/// Convenience for a fully buffered body.
pub fn aggregate_sse(body: &[u8]) -> AggregateOutcome {
    let mut aggregator = ResponseAggregator::new();
    aggregator.push_bytes(body);
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(event: &Value) -> String {
        format!(
            "event: {}\ndata: {}\n\n",
            event["type"].as_str().unwrap(),
            event
        )
    }

    #[test]
    fn completed_event_is_the_result() {
        let body = [
            frame(&json!({"type": "response.created", "response": {"id": "resp_1", "status": "in_progress", "output": []}})),
            frame(&json!({"type": "response.output_text.delta", "delta": "Hel"})),
            frame(&json!({"type": "response.completed", "response": {"id": "resp_1", "status": "completed", "output": [{"type": "message"}]}})),
        ]
        .concat();
        assert_eq!(
            aggregate_sse(body.as_bytes()),
            AggregateOutcome::Complete(
                json!({"id": "resp_1", "status": "completed", "output": [{"type": "message"}]})
            )
        );
    }

    #[test]
    fn empty_final_output_is_filled_from_items() {
        let body = [
            frame(&json!({"type": "response.output_item.done", "output_index": 1, "item": {"id": "b"}})),
            frame(&json!({"type": "response.output_item.done", "output_index": 0, "item": {"id": "a"}})),
            frame(&json!({"type": "response.done", "response": {"id": "resp_2", "output": []}})),
            "data: [DONE]\n\n".to_string(),
        ]
        .concat();
        let AggregateOutcome::Complete(response) = aggregate_sse(body.as_bytes()) else {
            panic!("expected complete outcome");
        };
        assert_eq!(response["output"], json!([{"id": "a"}, {"id": "b"}]));
    }

    #[test]
    fn error_event_becomes_error_body() {
        let body = frame(&json!({"type": "error", "code": "server_error", "message": "boom"}));
        assert_eq!(
            aggregate_sse(body.as_bytes()),
            AggregateOutcome::UpstreamError(
                json!({"error": {"code": "server_error", "message": "boom"}})
            )
        );
    }

    #[test]
    fn truncated_stream_reports_missing_terminal() {
        let body = frame(&json!({"type": "response.created", "response": {"id": "resp_3"}}));
        assert_eq!(
            aggregate_sse(body.as_bytes()),
            AggregateOutcome::MissingTerminalEvent
        );
    }

    #[test]
    fn incremental_chunks_match_buffered_result() {
        let body = frame(&json!({"type": "response.incomplete", "response": {"id": "resp_4", "status": "incomplete", "output": [1]}}));
        let mut aggregator = ResponseAggregator::new();
        for chunk in body.as_bytes().chunks(7) {
            aggregator.push_bytes(chunk);
        }
        assert!(aggregator.is_finished());
        assert_eq!(aggregator.finish(), aggregate_sse(body.as_bytes()));
    }
}
