//! Shared utilities for registry integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use request_registry::config::RegistryConfig;
use request_registry::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use request_registry::{RegistryEvent, RequestRegistry};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};

/// A transport call waiting for the test to answer it.
pub struct PendingCall {
    pub request: TransportRequest,
    responder: oneshot::Sender<Result<TransportResponse, TransportError>>,
}

impl PendingCall {
    /// Answer with a JSON body.
    pub fn respond(self, status: u16, body: Value) {
        self.respond_text(status, &body.to_string());
    }

    /// Answer with a raw body.
    pub fn respond_text(self, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).unwrap();
        let _ = self
            .responder
            .send(Ok(TransportResponse::new(status, body.to_string())));
    }

    /// Fail without a response.
    pub fn fail(self, error: TransportError) {
        let _ = self.responder.send(Err(error));
    }
}

/// Transport whose calls are answered by the test, one at a time.
pub struct ScriptedTransport {
    calls_tx: mpsc::UnboundedSender<PendingCall>,
    calls_rx: Mutex<mpsc::UnboundedReceiver<PendingCall>>,
    canceled: Arc<AtomicUsize>,
    started: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        let (calls_tx, calls_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            calls_tx,
            calls_rx: Mutex::new(calls_rx),
            canceled: Arc::new(AtomicUsize::new(0)),
            started: AtomicUsize::new(0),
        })
    }

    /// Wait for the next call the registry makes.
    pub async fn next_call(&self) -> PendingCall {
        let mut rx = self.calls_rx.lock().await;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no transport call within 5s")
            .expect("transport channel closed")
    }

    /// True if no call is waiting to be answered right now.
    pub async fn no_pending_call(&self) -> bool {
        tokio::task::yield_now().await;
        self.calls_rx.lock().await.try_recv().is_err()
    }

    /// Calls dropped before they were answered.
    pub fn canceled(&self) -> usize {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Calls started so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

struct CancelGuard {
    canceled: Arc<AtomicUsize>,
    armed: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.canceled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let (responder, rx) = oneshot::channel();
        let mut guard = CancelGuard {
            canceled: Arc::clone(&self.canceled),
            armed: true,
        };
        let _ = self.calls_tx.send(PendingCall { request, responder });

        let result = rx
            .await
            .unwrap_or_else(|_| Err(TransportError::Other("test dropped the call".into())));
        guard.armed = false;
        result
    }
}

/// Registry over a scripted transport with default settings.
pub fn registry(transport: &Arc<ScriptedTransport>) -> RequestRegistry {
    registry_with(transport, RegistryConfig::default())
}

pub fn registry_with(
    transport: &Arc<ScriptedTransport>,
    config: RegistryConfig,
) -> RequestRegistry {
    RequestRegistry::new(transport.clone(), config)
}

/// Poll a condition until it holds, yielding to spawned tasks in between.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not met in time");
}

/// Receive events until one matches.
pub async fn wait_for_event(
    events: &mut broadcast::Receiver<RegistryEvent>,
    matches: impl Fn(&RegistryEvent) -> bool,
) -> RegistryEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event not received within 5s")
}

/// Assert a future stays pending for a short while.
pub async fn assert_pending<F: std::future::Future + Unpin>(future: &mut F)
where
    F::Output: std::fmt::Debug,
{
    if let Ok(output) = tokio::time::timeout(Duration::from_millis(50), future).await {
        panic!("future settled unexpectedly: {:?}", output);
    }
}
