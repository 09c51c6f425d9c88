//! Ordered collection of tracked request records.
//!
//! # Responsibilities
//! - Own the request records in submission order
//! - Lookup and removal by internal id (linear scan, misses are no-ops)
//! - Bulk extraction by cancellation key and by unauthorized hold age

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::registry::types::{RequestId, RequestOptions, RequestResult};

/// Where a tracked record is in its lifecycle.
#[derive(Debug)]
pub(crate) enum RecordState {
    /// A transport call is pending. Only outcomes for `attempt` are accepted.
    InFlight { attempt: u32, task: AbortHandle },
    /// The last attempt answered 401; waiting for resubmission.
    Unauthorized { attempt: u32, since: Instant },
}

/// Public view of a record's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    InFlight { attempt: u32 },
    Unauthorized { attempt: u32 },
}

/// Read-only copy of a tracked record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSnapshot {
    pub id: RequestId,
    pub identifier: String,
    pub method: Method,
    pub url: String,
    pub status: RecordStatus,
}

/// One outstanding request.
#[derive(Debug)]
pub(crate) struct RequestRecord {
    pub id: RequestId,
    pub identifier: String,
    pub options: RequestOptions,
    pub state: RecordState,
    responder: oneshot::Sender<RequestResult<Value>>,
}

impl RequestRecord {
    pub fn new(
        id: RequestId,
        identifier: String,
        options: RequestOptions,
        responder: oneshot::Sender<RequestResult<Value>>,
        state: RecordState,
    ) -> Self {
        Self {
            id,
            identifier,
            options,
            state,
            responder,
        }
    }

    /// Attempt number of the pending transport call, if any.
    pub fn in_flight_attempt(&self) -> Option<u32> {
        match self.state {
            RecordState::InFlight { attempt, .. } => Some(attempt),
            RecordState::Unauthorized { .. } => None,
        }
    }

    /// Attempt number of the 401 answer, if held.
    pub fn held_attempt(&self) -> Option<u32> {
        match self.state {
            RecordState::Unauthorized { attempt, .. } => Some(attempt),
            RecordState::InFlight { .. } => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.held_attempt().is_some()
    }

    /// True once the caller dropped its future.
    pub fn is_abandoned(&self) -> bool {
        self.responder.is_closed()
    }

    /// Move from in-flight to held. The pending task has already finished.
    pub fn hold(&mut self, attempt: u32) {
        self.state = RecordState::Unauthorized {
            attempt,
            since: Instant::now(),
        };
    }

    /// Abort the pending transport call, if any.
    pub fn cancel(&self) {
        if let RecordState::InFlight { task, .. } = &self.state {
            task.abort();
        }
    }

    /// Deliver the caller's result. Returns `false` if the caller dropped its future.
    pub fn settle(self, result: RequestResult<Value>) -> bool {
        self.responder.send(result).is_ok()
    }

    pub fn snapshot(&self) -> RecordSnapshot {
        let status = match self.state {
            RecordState::InFlight { attempt, .. } => RecordStatus::InFlight { attempt },
            RecordState::Unauthorized { attempt, .. } => RecordStatus::Unauthorized { attempt },
        };
        RecordSnapshot {
            id: self.id,
            identifier: self.identifier.clone(),
            method: self.options.method.clone(),
            url: self.options.url.clone(),
            status,
        }
    }

    fn held_since(&self) -> Option<Instant> {
        match self.state {
            RecordState::Unauthorized { since, .. } => Some(since),
            RecordState::InFlight { .. } => None,
        }
    }
}

/// Records in submission order.
#[derive(Debug, Default)]
pub(crate) struct RecordStore {
    records: Vec<RequestRecord>,
}

impl RecordStore {
    pub fn push(&mut self, record: RequestRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, id: RequestId) -> Option<&RequestRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RequestRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RequestRecord> {
        self.records.iter_mut()
    }

    /// Remove the record with `id`. A miss removes nothing.
    pub fn remove(&mut self, id: RequestId) -> Option<RequestRecord> {
        let index = self.records.iter().position(|record| record.id == id)?;
        Some(self.records.remove(index))
    }

    /// Remove every record whose cancellation key is `identifier`.
    pub fn take_identifier(&mut self, identifier: &str) -> Vec<RequestRecord> {
        self.take_where(|record| record.identifier == identifier)
    }

    pub fn held_count(&self) -> usize {
        self.records.iter().filter(|record| record.is_unauthorized()).count()
    }

    /// Remove held records that have waited at least `ttl`.
    pub fn take_expired_holds(&mut self, now: Instant, ttl: Duration) -> Vec<RequestRecord> {
        self.take_where(|record| {
            record
                .held_since()
                .is_some_and(|since| now.saturating_duration_since(since) >= ttl)
        })
    }

    /// Remove held records whose caller dropped its future.
    pub fn take_abandoned_holds(&mut self) -> Vec<RequestRecord> {
        self.take_where(|record| record.is_unauthorized() && record.is_abandoned())
    }

    /// Remove the held records beyond `capacity`, oldest first.
    pub fn take_overflow_holds(&mut self, capacity: usize) -> Vec<RequestRecord> {
        let mut overflow = Vec::new();
        while self.held_count() > capacity {
            let oldest = self
                .records
                .iter()
                .filter_map(|record| record.held_since().map(|since| (since, record.id)))
                .min()
                .map(|(_, id)| id);
            match oldest.and_then(|id| self.remove(id)) {
                Some(record) => overflow.push(record),
                None => break,
            }
        }
        overflow
    }

    pub fn snapshot(&self) -> Vec<RecordSnapshot> {
        self.records.iter().map(RequestRecord::snapshot).collect()
    }

    fn take_where(&mut self, predicate: impl Fn(&RequestRecord) -> bool) -> Vec<RequestRecord> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|record| predicate(record));
        self.records = kept;
        taken
    }
}

/// Mutex access that survives poisoning.
pub(crate) trait MutexExt<T> {
    fn lock_or_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    #[track_caller]
    fn lock_or_recover(&self) -> MutexGuard<'_, T> {
        match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                let loc = std::panic::Location::caller();
                tracing::error!(
                    mutex_type = std::any::type_name::<T>(),
                    file = loc.file(),
                    line = loc.line(),
                    "Mutex poisoned, recovering registry state"
                );
                poisoned.into_inner()
            }
        }
    }
}
