//! Event sinks
//!
//! The scheduler reports every persisted job change, every output line and
//! every control-state change to an [`EventSink`]. Sinks must not block.

use retort_core::dto::event::QueueEvent;
use tokio::sync::broadcast;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: QueueEvent);
}

/// Logs events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: QueueEvent) {
        match &event {
            QueueEvent::JobUpdate(job) => tracing::debug!(
                job_id = %job.id,
                status = %job.status,
                progress = job.progress,
                "{}",
                event.name()
            ),
            QueueEvent::JobOutput { job_id, output } => {
                tracing::trace!(job_id = %job_id, "{}: {}", event.name(), output)
            }
            QueueEvent::QueueStatus {
                paused,
                stop_immediate,
            } => tracing::info!(paused, stop_immediate, "{}", event.name()),
        }
    }
}

/// Fans events out to any number of subscribers.
///
/// Slow subscribers lose the oldest events rather than slowing the workers.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<QueueEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: QueueEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}
