use std::collections::VecDeque;
use std::fmt::{self, Write};
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Shared buffer of formatted log lines shown in the Logs tab.
pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

/// Tracing layer that keeps the most recent `capacity` events as one-line strings.
pub struct TuiLogLayer {
    buffer: LogBuffer,
    capacity: usize,
}

impl TuiLogLayer {
    pub fn new(buffer: LogBuffer, capacity: usize) -> Self {
        Self { buffer, capacity }
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        let _ = write!(self.fields, " {name}={value}");
    }
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.push_field(field.name(), format_args!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for TuiLogLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let line = format!(
            "[{}] {}: {}{}",
            metadata.level(),
            metadata.target(),
            visitor.message,
            visitor.fields
        );

        if let Ok(mut buf) = self.buffer.lock() {
            while buf.len() >= self.capacity.max(1) {
                buf.pop_front();
            }
            buf.push_back(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    fn make_layer_and_buffer(capacity: usize) -> (LogBuffer, impl tracing::Subscriber) {
        let buffer = Arc::new(Mutex::new(VecDeque::new()));
        let layer = TuiLogLayer::new(Arc::clone(&buffer), capacity);
        let subscriber = Registry::default().with(layer);
        (buffer, subscriber)
    }

    #[test]
    fn test_log_layer_keeps_newest_lines() {
        let (buffer, subscriber) = make_layer_and_buffer(2);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("connecting");
            tracing::info!("connected");
            tracing::warn!("dropping undecodable audio chunk");
        });
        let buf = buffer.lock().unwrap();
        assert_eq!(buf.len(), 2);
        assert!(buf[0].contains("connected"), "got: {}", buf[0]);
        assert!(buf[1].starts_with("[WARN]"), "got: {}", buf[1]);
    }

    #[test]
    fn test_log_layer_format_with_fields() {
        let (buffer, subscriber) = make_layer_and_buffer(10);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "vidya", cancelled = 3, transport = "null", "tutor interrupted");
        });
        let buf = buffer.lock().unwrap();
        assert_eq!(buf[0], "[INFO] vidya: tutor interrupted cancelled=3 transport=null");
    }
}
