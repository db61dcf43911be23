use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

/// Outbound user notifications (account emails).
///
/// Only ever called from a background task, so an implementation may block on
/// network I/O without holding up a response.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, template: &str, data: &Value) -> anyhow::Result<()>;
}

/// Records sends in the log instead of delivering them.
///
/// Template data can hold activation tokens, so only its keys are logged.
pub struct LogNotifier {
    sender: String,
}

impl LogNotifier {
    pub fn new(sender: impl Into<String>) -> Self {
        Self { sender: sender.into() }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, template: &str, data: &Value) -> anyhow::Result<()> {
        let keys: Vec<&str> = match data {
            Value::Object(map) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        };
        info!(from = %self.sender, to = %recipient, template, ?keys, "notification sent");
        Ok(())
    }
}
