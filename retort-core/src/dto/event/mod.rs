//! Scheduler events
//!
//! Published after each persisted job change, for each output line and on
//! every control-state change. The `event` tag carries the channel name.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::Job;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum QueueEvent {
    #[serde(rename = "job:update")]
    JobUpdate(Box<Job>),

    #[serde(rename = "job:output")]
    JobOutput {
        #[serde(rename = "jobId")]
        job_id: Uuid,
        output: String,
    },

    #[serde(rename = "queue:status")]
    QueueStatus {
        paused: bool,
        #[serde(rename = "stopImmediate")]
        stop_immediate: bool,
    },
}

impl QueueEvent {
    pub fn name(&self) -> &'static str {
        match self {
            QueueEvent::JobUpdate(_) => "job:update",
            QueueEvent::JobOutput { .. } => "job:output",
            QueueEvent::QueueStatus { .. } => "queue:status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_event_shape() {
        let id = Uuid::new_v4();
        let event = QueueEvent::JobOutput {
            job_id: id,
            output: "hello".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "job:output");
        assert_eq!(value["data"]["jobId"], id.to_string());
        assert_eq!(value["data"]["output"], "hello");
        assert_eq!(event.name(), "job:output");
    }

    #[test]
    fn test_status_event_shape() {
        let event = QueueEvent::QueueStatus {
            paused: true,
            stop_immediate: false,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "queue:status");
        assert_eq!(value["data"]["stopImmediate"], false);
    }
}
