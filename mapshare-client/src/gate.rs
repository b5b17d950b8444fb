//! Port gate: decouples requests to the transfer server from the
//! server's startup.
//!
//! The transfer server binds an ephemeral port and announces it after
//! starting. Requests issued before the announcement queue on
//! [`PortGate::wait_for_port`] and resume once the port is known.

use std::pin::pin;
use std::sync::Mutex;

use reqwest::{Method, Response};
use serde_json::Value;
use tokio::sync::Notify;

#[derive(Default)]
struct GateState {
    /// Most recently announced port.
    current: Option<u16>,
    /// First announced port; waiters queued before any announcement all
    /// resolve to this value.
    first: Option<u16>,
}

/// Gate for the transfer server's dynamically assigned port.
///
/// `set_port` records the port and releases all queued waiters;
/// `fetch` waits for the port and then issues the request.
pub struct PortGate {
    state: Mutex<GateState>,
    ready: Notify,
    client: reqwest::Client,
}

impl PortGate {
    /// Create a gate with no port set.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            ready: Notify::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Record the port once the transfer server has started.
    ///
    /// Releases all queued waiters with the first announced value. A
    /// later call with a different port updates `base_url` for new
    /// reads but does not re-notify already-released waiters; callers
    /// holding a stale base URL must re-read it.
    pub fn set_port(&self, port: u16) {
        {
            let mut state = self.state.lock().unwrap();
            state.current = Some(port);
            if state.first.is_none() {
                state.first = Some(port);
            }
        }
        self.ready.notify_waiters();
    }

    /// The most recently announced port, if any. Never blocks.
    pub fn port(&self) -> Option<u16> {
        self.state.lock().unwrap().current
    }

    /// Wait for the port to be announced, returning it when available.
    ///
    /// Returns immediately when a port is already known; otherwise all
    /// concurrent callers resolve to the first announced value.
    pub async fn wait_for_port(&self) -> u16 {
        loop {
            let mut notified = pin!(self.ready.notified());
            notified.as_mut().enable();
            {
                let state = self.state.lock().unwrap();
                if let Some(port) = state.current {
                    return port;
                }
            }
            notified.await;
            // Queued waiters all resolve to the first announced value.
            let first = self.state.lock().unwrap().first;
            if let Some(port) = first {
                return port;
            }
        }
    }

    /// The server's local origin (`http://127.0.0.1:{port}`), or `None`
    /// while the port is unknown. Never blocks.
    pub fn base_url(&self) -> Option<String> {
        self.port().map(|port| format!("http://127.0.0.1:{port}"))
    }

    /// Issue a request against the transfer server, waiting for the
    /// port first. Queues indefinitely if the port is never set; the
    /// caller applies its own timeout or cancellation.
    pub async fn fetch(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, reqwest::Error> {
        let port = self.wait_for_port().await;
        let url = format!("http://127.0.0.1:{port}{path}");
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await
    }
}

impl Default for PortGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PortGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortGate").field("port", &self.port()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn base_url_is_absent_until_port_is_set() {
        let gate = PortGate::new();
        assert!(gate.port().is_none());
        assert!(gate.base_url().is_none());

        gate.set_port(3000);
        assert_eq!(gate.port(), Some(3000));
        assert_eq!(gate.base_url().as_deref(), Some("http://127.0.0.1:3000"));
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_port_known() {
        let gate = PortGate::new();
        gate.set_port(8080);
        assert_eq!(gate.wait_for_port().await, 8080);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_waiters_all_resolve_to_first_port() {
        let gate = Arc::new(PortGate::new());

        let mut waiters = Vec::new();
        for _ in 0..3 {
            let gate = Arc::clone(&gate);
            waiters.push(tokio::spawn(async move { gate.wait_for_port().await }));
        }
        // Let the waiters park before announcing.
        tokio::time::sleep(Duration::from_millis(1)).await;

        gate.set_port(3000);
        gate.set_port(4000);

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), 3000);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_does_not_resolve_before_set_port() {
        let gate = Arc::new(PortGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait_for_port().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        gate.set_port(9000);
        assert_eq!(waiter.await.unwrap(), 9000);
    }

    #[test]
    fn second_set_port_overwrites_base_url() {
        let gate = PortGate::new();
        gate.set_port(3000);
        gate.set_port(4000);
        assert_eq!(gate.base_url().as_deref(), Some("http://127.0.0.1:4000"));
    }

    #[tokio::test]
    async fn late_waiter_sees_current_port() {
        let gate = PortGate::new();
        gate.set_port(3000);
        gate.set_port(4000);
        // No queued waiter: a fresh call observes the latest value.
        assert_eq!(gate.wait_for_port().await, 4000);
    }
}
