use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogStage {
    BeforeTransform,
    AfterTransform,
    TransformSkipped,
    Refresh,
    Response,
    ErrorRemap,
    StreamAggregated,
}

impl LogStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStage::BeforeTransform => "before-transform",
            LogStage::AfterTransform => "after-transform",
            LogStage::TransformSkipped => "transform-skipped",
            LogStage::Refresh => "refresh",
            LogStage::Response => "response",
            LogStage::ErrorRemap => "error-remap",
            LogStage::StreamAggregated => "stream-aggregated",
        }
    }
}

/// One `(stage, payload)` record of a dispatched call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub stage: LogStage,
    pub trace_id: Option<String>,
    /// Unix milliseconds.
    pub at: i64,
    pub payload: Value,
}

impl Event {
    pub fn new(stage: LogStage, trace_id: Option<&str>, at: i64, payload: Value) -> Self {
        Self {
            stage,
            trace_id: trace_id.map(str::to_string),
            at,
            payload,
        }
    }
}
