//! HTTP implementation of the transfer server capability.
//!
//! Requests go through the [`PortGate`]; streaming endpoints are read
//! as server-sent `data:` lines (bare JSON lines are accepted too) and
//! forwarded frame by frame.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::mpsc;

use mapshare_types::ApiErrorBody;

use super::{ProgressStream, ServerError, StreamEvent, TransferServer};
use crate::gate::PortGate;

/// Transfer server client backed by the local HTTP server.
#[derive(Debug)]
pub struct HttpTransferServer {
    gate: Arc<PortGate>,
    client: reqwest::Client,
}

impl HttpTransferServer {
    /// Create a client over the given port gate.
    pub fn new(gate: Arc<PortGate>) -> Self {
        Self {
            gate,
            client: reqwest::Client::new(),
        }
    }

    /// The port gate this client routes through.
    pub fn gate(&self) -> &Arc<PortGate> {
        &self.gate
    }
}

#[async_trait]
impl TransferServer for HttpTransferServer {
    fn is_ready(&self) -> bool {
        self.gate.port().is_some()
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ServerError> {
        let body = if body.is_null() { None } else { Some(&body) };
        let response = self.gate.fetch(Method::POST, path, body).await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            if text.is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }

        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| format!("request failed with status {status}"));
        Err(ServerError::Api(message))
    }

    fn open_stream(&self, path: &str) -> Result<ProgressStream, ServerError> {
        let base = self.gate.base_url().ok_or(ServerError::NotReady)?;
        let url = format!("{base}{path}");
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(read_stream(self.client.clone(), url, tx));
        Ok(ProgressStream { events: rx })
    }
}

/// Connect to a streaming endpoint and forward its frames until the
/// connection ends or the consumer drops the stream handle.
async fn read_stream(client: reqwest::Client, url: String, tx: mpsc::Sender<StreamEvent>) {
    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send(StreamEvent::Lost(e.to_string())).await;
            return;
        }
    };
    let status = response.status();
    if !status.is_success() {
        let _ = tx
            .send(StreamEvent::Lost(format!(
                "stream request failed with status {status}"
            )))
            .await;
        return;
    }

    let mut body = response.bytes_stream();
    let mut buffer = String::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);
                    if line.is_empty() {
                        continue;
                    }
                    let frame = line
                        .strip_prefix("data:")
                        .map(str::trim)
                        .unwrap_or(&line)
                        .to_string();
                    if tx.send(StreamEvent::Frame(frame)).await.is_err() {
                        // Consumer closed the stream.
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(StreamEvent::Lost(e.to_string())).await;
                return;
            }
        }
    }
    // An orderly end of body still means the connection is gone.
    let _ = tx.send(StreamEvent::Lost("stream closed".to_string())).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_until_gate_has_port() {
        let gate = Arc::new(PortGate::new());
        let server = HttpTransferServer::new(Arc::clone(&gate));
        assert!(!server.is_ready());

        gate.set_port(3000);
        assert!(server.is_ready());
    }

    #[tokio::test]
    async fn open_stream_fails_before_port_announcement() {
        let server = HttpTransferServer::new(Arc::new(PortGate::new()));
        let err = server.open_stream("/downloads/dl-1/events").unwrap_err();
        assert!(matches!(err, ServerError::NotReady));
    }
}
