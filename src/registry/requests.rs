//! The request registry.
//!
//! # Responsibilities
//! - Assign ids and track outstanding requests in submission order
//! - Enforce one outstanding single-flight request per cancellation key
//! - Route transport outcomes to the right caller
//! - Hold 401 answers and re-drive them on demand
//!
//! # Design Decisions
//! - Every mutation happens under one short, non-async lock
//! - Eviction, append and dispatch of a single-flight request share one lock
//!   acquisition, so the predecessor is canceled before the successor is sent
//! - Each dispatch carries an attempt number; outcomes for records that are
//!   gone or re-dispatched are dropped silently
//! - Spawned transport tasks hold a `Weak` reference, so dropping the last
//!   registry handle aborts all in-flight calls

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;

use crate::config::RegistryConfig;
use crate::observability::metrics;
use crate::registry::events::RegistryEvent;
use crate::registry::outcome::{classify, classify_raw, Outcome, ResponseFuture};
use crate::registry::store::{MutexExt, RecordSnapshot, RecordState, RecordStore, RequestRecord};
use crate::registry::types::{RequestError, RequestId, RequestOptions};
use crate::transport::{
    MultipartForm, Payload, Transport, TransportError, TransportRequest, TransportResponse,
};

struct Shared {
    transport: Arc<dyn Transport>,
    config: RegistryConfig,
    next_id: AtomicU64,
    records: Mutex<RecordStore>,
    events: broadcast::Sender<RegistryEvent>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let records = self
            .records
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for record in records.iter() {
            record.cancel();
        }
        let outstanding = records.len();
        if outstanding > 0 {
            tracing::debug!(outstanding, "Registry dropped with outstanding requests");
        }
    }
}

/// Tracks outstanding requests on top of a [`Transport`].
///
/// Cheap to clone; clones share the same records. Submissions spawn Tokio
/// tasks and must be made from within a Tokio runtime.
#[derive(Clone)]
pub struct RequestRegistry {
    shared: Arc<Shared>,
}

impl fmt::Debug for RequestRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestRegistry")
            .field("outstanding", &self.len())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl RequestRegistry {
    /// Create an empty registry.
    ///
    /// Zero capacities are raised to one; a zero hold capacity would reject
    /// every 401 instead of holding it.
    pub fn new(transport: Arc<dyn Transport>, mut config: RegistryConfig) -> Self {
        if config.max_unauthorized_held == 0 {
            tracing::warn!("registry.max_unauthorized_held is 0, holding at most one request");
            config.max_unauthorized_held = 1;
        }
        config.event_capacity = config.event_capacity.max(1);
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                next_id: AtomicU64::new(0),
                records: Mutex::new(RecordStore::default()),
                events,
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.shared.config
    }

    /// Track and dispatch a request.
    ///
    /// With `is_single`, every tracked request sharing the cancellation key is
    /// canceled first and its future resolves to [`RequestError::Superseded`].
    pub fn submit(&self, options: RequestOptions) -> ResponseFuture {
        let id = self.next_id();
        let identifier = options.cancellation_key().to_string();
        let (responder, rx) = oneshot::channel();

        let mut records = self.lock();
        if options.is_single {
            let superseded = records.take_identifier(&identifier);
            if superseded.iter().any(RequestRecord::is_unauthorized) {
                metrics::record_unauthorized_held(records.held_count());
            }
            for record in superseded {
                self.supersede(record);
            }
        }

        let state = self.dispatch(id, &identifier, 1, options.to_transport_request());
        records.push(RequestRecord::new(id, identifier, options, responder, state));
        drop(records);

        ResponseFuture::new(id, rx)
    }

    /// Dispatch a multipart upload outside of the tracked collection.
    ///
    /// Each top-level key of `options.data` becomes one form field. The future
    /// resolves only on status 200; it never takes part in cancellation or the
    /// unauthorized hold.
    pub fn submit_raw(&self, options: RequestOptions) -> ResponseFuture {
        let id = self.next_id();
        let form = match options.data.as_ref().map(MultipartForm::from_value) {
            None => MultipartForm::new(),
            Some(Ok(form)) => form,
            Some(Err(message)) => {
                tracing::warn!(
                    %id,
                    url = %options.url,
                    error = %message,
                    "Rejecting upload with unencodable data"
                );
                return ResponseFuture::ready(id, Err(RequestError::Encode(message)));
            }
        };

        let request = TransportRequest {
            method: options.method.clone(),
            url: options.url.clone(),
            headers: options.headers.clone(),
            body: Some(Payload::Multipart(form)),
        };

        tracing::debug!(%id, method = %request.method, url = %request.url, "Dispatching upload");
        metrics::record_dispatch(request.method.as_str());

        let (tx, rx) = oneshot::channel();
        let transport = Arc::clone(&self.shared.transport);
        let allow_fail = options.allow_fail;
        tokio::spawn(async move {
            let started = Instant::now();
            let result = classify_raw(transport.execute(request).await);
            metrics::record_duration(started.elapsed());

            match &result {
                Ok(_) => {
                    tracing::debug!(%id, "Upload resolved");
                    metrics::record_settled("raw_resolved");
                }
                Err(e) => {
                    log_rejection(id, allow_fail, e);
                    metrics::record_settled("raw_rejected");
                }
            }
            let _ = tx.send(result);
        });

        ResponseFuture::new(id, rx)
    }

    /// True if any tracked request is held after a 401 answer.
    ///
    /// Holds older than the configured TTL are released first.
    pub fn has_unauthorized_request(&self) -> bool {
        let mut records = self.lock();
        let expired = self.take_expired(&mut records);
        let held = records.held_count() > 0;
        drop(records);

        self.release_all(expired, "hold expired");
        held
    }

    /// Re-dispatch every request held after a 401 answer.
    ///
    /// The same record is reused, so the original caller's future is the one
    /// that eventually settles. Held requests whose caller dropped its future
    /// are discarded instead. Returns how many requests were re-dispatched.
    pub fn resubmit_unauthorized_requests(&self) -> usize {
        let mut records = self.lock();
        let expired = self.take_expired(&mut records);
        let abandoned = records.take_abandoned_holds();

        let mut resubmitted = 0;
        for record in records.iter_mut() {
            let Some(attempt) = record.held_attempt() else {
                continue;
            };
            let request = record.options.to_transport_request();
            record.state = self.dispatch(record.id, &record.identifier, attempt + 1, request);
            resubmitted += 1;
        }
        metrics::record_unauthorized_held(records.held_count());
        drop(records);

        self.discard_abandoned(abandoned);
        self.release_all(expired, "hold expired");
        if resubmitted > 0 {
            tracing::info!(count = resubmitted, "Resubmitted unauthorized requests");
        }
        resubmitted
    }

    /// Reject held requests that exceeded the hold TTL. Returns how many were released.
    pub fn release_expired_holds(&self) -> usize {
        let mut records = self.lock();
        let expired = self.take_expired(&mut records);
        drop(records);

        let count = expired.len();
        self.release_all(expired, "hold expired");
        count
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.shared.events.subscribe()
    }

    /// Copy of every tracked record, in submission order.
    pub fn snapshot(&self) -> Vec<RecordSnapshot> {
        self.lock().snapshot()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_id(&self) -> RequestId {
        RequestId(self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn lock(&self) -> MutexGuard<'_, RecordStore> {
        self.shared.records.lock_or_recover()
    }

    fn emit(&self, event: RegistryEvent) {
        // No subscribers is not an error.
        let _ = self.shared.events.send(event);
    }

    /// Spawn the transport call for one attempt and return the in-flight state.
    fn dispatch(
        &self,
        id: RequestId,
        identifier: &str,
        attempt: u32,
        request: TransportRequest,
    ) -> RecordState {
        tracing::debug!(
            %id,
            identifier,
            attempt,
            method = %request.method,
            url = %request.url,
            "Dispatching request"
        );
        metrics::record_dispatch(request.method.as_str());

        let transport = Arc::clone(&self.shared.transport);
        let shared = Arc::downgrade(&self.shared);
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let result = transport.execute(request).await;
            metrics::record_duration(started.elapsed());
            Self::complete_weak(&shared, id, attempt, result);
        });

        self.emit(RegistryEvent::Dispatched {
            id,
            identifier: identifier.to_string(),
            attempt,
        });
        RecordState::InFlight {
            attempt,
            task: task.abort_handle(),
        }
    }

    fn complete_weak(
        shared: &Weak<Shared>,
        id: RequestId,
        attempt: u32,
        result: Result<TransportResponse, TransportError>,
    ) {
        match shared.upgrade() {
            Some(shared) => RequestRegistry { shared }.complete(id, attempt, result),
            None => tracing::debug!(%id, "Registry gone, dropping outcome"),
        }
    }

    /// Apply a transport outcome to the record it belongs to.
    fn complete(
        &self,
        id: RequestId,
        attempt: u32,
        result: Result<TransportResponse, TransportError>,
    ) {
        let outcome = classify(result);
        let mut records = self.lock();

        match records.get(id).map(RequestRecord::in_flight_attempt) {
            None => {
                tracing::debug!(%id, "Outcome for untracked request ignored");
                return;
            }
            Some(current) if current != Some(attempt) => {
                tracing::debug!(%id, attempt, "Outcome for stale attempt ignored");
                return;
            }
            Some(_) => {}
        }

        match outcome {
            Outcome::Unauthorized => {
                let held = match records.iter_mut().find(|record| record.id == id) {
                    Some(record) => {
                        record.hold(attempt);
                        tracing::info!(
                            %id,
                            identifier = %record.identifier,
                            "Request unauthorized, holding for resubmission"
                        );
                        true
                    }
                    None => false,
                };
                if !held {
                    return;
                }
                self.emit(RegistryEvent::Held { id });

                // Holds nobody waits on must not push live callers out.
                let abandoned = records.take_abandoned_holds();
                let capacity = self.shared.config.max_unauthorized_held;
                let overflow = records.take_overflow_holds(capacity);
                metrics::record_unauthorized_held(records.held_count());
                drop(records);

                self.discard_abandoned(abandoned);
                let reason = format!("hold capacity of {} exceeded", capacity);
                self.release_all(overflow, &reason);
            }
            Outcome::Resolved(value) => {
                let Some(record) = records.remove(id) else {
                    return;
                };
                drop(records);

                tracing::debug!(%id, identifier = %record.identifier, "Request resolved");
                metrics::record_settled("resolved");
                self.emit(RegistryEvent::Resolved { id });
                record.settle(Ok(value));
            }
            Outcome::Rejected(error) => {
                let Some(record) = records.remove(id) else {
                    return;
                };
                drop(records);

                log_rejection(id, record.options.allow_fail, &error);
                metrics::record_settled("rejected");
                self.emit(RegistryEvent::Rejected {
                    id,
                    status: error.status().map(|s| s.as_u16()),
                });
                record.settle(Err(error));
            }
        }
    }

    /// Cancel an evicted predecessor and settle it as superseded.
    fn supersede(&self, record: RequestRecord) {
        record.cancel();
        tracing::debug!(id = %record.id, identifier = %record.identifier, "Request superseded");
        metrics::record_superseded();
        self.emit(RegistryEvent::Superseded {
            id: record.id,
            identifier: record.identifier.clone(),
        });
        let identifier = record.identifier.clone();
        record.settle(Err(RequestError::Superseded { identifier }));
    }

    fn take_expired(&self, records: &mut RecordStore) -> Vec<RequestRecord> {
        match self.shared.config.unauthorized_hold_secs {
            0 => Vec::new(),
            secs => {
                let expired = records.take_expired_holds(Instant::now(), Duration::from_secs(secs));
                if !expired.is_empty() {
                    metrics::record_unauthorized_held(records.held_count());
                }
                expired
            }
        }
    }

    /// Drop held records whose caller is gone.
    fn discard_abandoned(&self, records: Vec<RequestRecord>) {
        for record in records {
            tracing::debug!(
                id = %record.id,
                identifier = %record.identifier,
                "Discarding unauthorized request with no caller"
            );
            metrics::record_settled("discarded");
            self.emit(RegistryEvent::Released { id: record.id });
        }
    }

    fn release_all(&self, records: Vec<RequestRecord>, reason: &str) {
        for record in records {
            tracing::warn!(
                id = %record.id,
                identifier = %record.identifier,
                reason,
                "Releasing unauthorized request"
            );
            metrics::record_settled("released");
            self.emit(RegistryEvent::Released { id: record.id });
            record.settle(Err(RequestError::Unauthorized(reason.to_string())));
        }
    }
}

fn log_rejection(id: RequestId, allow_fail: bool, error: &RequestError) {
    if allow_fail {
        tracing::debug!(%id, error = %error, "Request rejected");
    } else {
        tracing::warn!(%id, error = %error, "Request rejected");
    }
}
