//! External messaging sink
//!
//! A thin `send(recipient, text)` adapter over whatever gateway carries
//! out-of-band messages. Strictly best-effort: a failed or slow send is
//! logged and forgotten, never blocking a core state transition.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Per-call ceiling; slower sends are abandoned.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("send failed: {0}")]
    Failed(String),

    #[error("send timed out")]
    TimedOut,
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), SinkError>;
}

/// POSTs `{recipient, text}` to a messaging gateway endpoint.
pub struct HttpMessageSink {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    recipient: &'a str,
    text: &'a str,
}

impl HttpMessageSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl MessageSink for HttpMessageSink {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&OutboundMessage { recipient, text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::TimedOut
                } else {
                    SinkError::Failed(e.to_string())
                }
            })?;
        if !response.status().is_success() {
            warn!(recipient, status = %response.status(), "messaging gateway refused send");
            return Err(SinkError::Failed(format!("status {}", response.status())));
        }
        Ok(())
    }
}

/// Discards everything (no messaging channel configured).
pub struct NullSink;

#[async_trait]
impl MessageSink for NullSink {
    async fn send(&self, _recipient: &str, _text: &str) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Captures sends for assertions in tests and dev runs.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), SinkError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_sink_accepts_everything() {
        assert!(NullSink.send("anyone", "hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_sink_captures_sends() {
        let sink = RecordingSink::new();
        sink.send("alice#1", "first").await.unwrap();
        sink.send("bob#2", "second").await.unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], ("alice#1".to_string(), "first".to_string()));
    }
}
