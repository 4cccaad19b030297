//! Operator notifications
//!
//! Telemetry and the relay lifecycle talk to a [`NotificationSink`] through a
//! [`Notifier`] handle. Enqueueing never blocks the request path; a worker
//! task drains the queue and delivery failures are logged and swallowed.

mod telegram;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use telegram::TelegramSink;

/// Destination for operator notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one message; a single attempt, no internal retry
    async fn send(&self, text: &str) -> Result<(), NotifyError>;

    /// Name of the sink, for logs
    fn name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("sink rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Clonable fire-and-forget handle over the notification queue
#[derive(Clone)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl Notifier {
    /// Start a drain worker for `sink` and return the sending handle
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = sink.send(&text).await {
                    tracing::warn!(sink = sink.name(), error = %e, "failed to deliver notification");
                }
            }
        });

        Self { tx: Some(tx) }
    }

    /// Handle with no sink: messages are logged and dropped
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Enqueue a message; never blocks, never fails the caller
    pub fn send(&self, text: impl Into<String>) {
        let text = text.into();
        match &self.tx {
            Some(tx) => {
                if tx.send(text).is_err() {
                    tracing::warn!("notification worker stopped, message dropped");
                }
            }
            None => {
                tracing::info!(message = %text, "notification (no sink configured)");
            }
        }
    }

    /// Handle wired to a raw receiver instead of a worker, for tests
    #[cfg(test)]
    pub fn test() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }
}
