/// Event types of the Responses SSE stream that the bridge reacts to.
///
/// Every other event type is `Other` and only matters to streaming callers,
/// which receive the bytes untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventKind {
    Created,
    InProgress,
    OutputItemDone,
    Completed,
    Done,
    Incomplete,
    Failed,
    Error,
    Other,
}

impl StreamEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "response.created" => Self::Created,
            "response.in_progress" => Self::InProgress,
            "response.output_item.done" => Self::OutputItemDone,
            "response.completed" => Self::Completed,
            "response.done" => Self::Done,
            "response.incomplete" => Self::Incomplete,
            "response.failed" => Self::Failed,
            "error" => Self::Error,
            _ => Self::Other,
        }
    }

    /// Events whose `response` payload is the final state of the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Done | Self::Incomplete | Self::Failed
        )
    }

    /// Events that carry a `response` snapshot.
    pub fn carries_response(&self) -> bool {
        matches!(self, Self::Created | Self::InProgress) || self.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_terminal_events() {
        for name in [
            "response.completed",
            "response.done",
            "response.incomplete",
            "response.failed",
        ] {
            assert!(StreamEventKind::from_type(name).is_terminal(), "{name}");
        }
        assert!(!StreamEventKind::from_type("response.output_text.delta").is_terminal());
        assert_eq!(StreamEventKind::from_type("error"), StreamEventKind::Error);
    }
}
