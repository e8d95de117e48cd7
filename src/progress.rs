use std::time::Duration;

use tracing::info;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub event: String,
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(
                event = %event.event,
                elapsed_ms = elapsed.as_millis() as u64,
                "{}",
                event.message
            ),
            None => info!(event = %event.event, "{}", event.message),
        }
    }
}
