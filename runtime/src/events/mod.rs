//! Progress events emitted by the audit pipelines.
//!
//! Events are plain values: a kind, a JSON payload, and the time they were
//! emitted. Delivery is handled by [`bus::EventBus`].

pub mod bus;

pub use bus::{EventBus, Observer};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every event type the pipelines emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "pipeline:start")]
    PipelineStart,
    #[serde(rename = "robots:fetch")]
    RobotsFetch,
    #[serde(rename = "robots:result")]
    RobotsResult,
    #[serde(rename = "extract:start")]
    ExtractStart,
    #[serde(rename = "extract:partial")]
    ExtractPartial,
    #[serde(rename = "navigate:start")]
    NavigateStart,
    #[serde(rename = "navigate:complete")]
    NavigateComplete,
    #[serde(rename = "extract:complete")]
    ExtractComplete,
    #[serde(rename = "report:generated")]
    ReportGenerated,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "pipeline:end")]
    PipelineEnd,
}

impl EventKind {
    /// Wire name of the event type, e.g. `robots:result`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PipelineStart => "pipeline:start",
            EventKind::RobotsFetch => "robots:fetch",
            EventKind::RobotsResult => "robots:result",
            EventKind::ExtractStart => "extract:start",
            EventKind::ExtractPartial => "extract:partial",
            EventKind::NavigateStart => "navigate:start",
            EventKind::NavigateComplete => "navigate:complete",
            EventKind::ExtractComplete => "extract:complete",
            EventKind::ReportGenerated => "report:generated",
            EventKind::Error => "error",
            EventKind::PipelineEnd => "pipeline:end",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single progress notification.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind, data: serde_json::Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_serde() {
        let kinds = [
            EventKind::PipelineStart,
            EventKind::RobotsFetch,
            EventKind::RobotsResult,
            EventKind::ExtractStart,
            EventKind::ExtractPartial,
            EventKind::NavigateStart,
            EventKind::NavigateComplete,
            EventKind::ExtractComplete,
            EventKind::ReportGenerated,
            EventKind::Error,
            EventKind::PipelineEnd,
        ];
        for kind in kinds {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()));
        }
    }

    #[test]
    fn test_event_serializes_type_field() {
        let event = Event::new(EventKind::Error, serde_json::json!({"message": "boom"}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["data"]["message"], "boom");
        assert!(json["timestamp"].is_string());
    }
}
