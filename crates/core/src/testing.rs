//! Scriptable backend for exercising session timing.

use crate::repositories::{PersistenceBackend, StoredDocument};
use crate::BackendError;
use async_trait::async_trait;
use practice_types::{PersistedId, TargetIdentity};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Create { target: String, payload: Value },
    Update { id: String, payload: Value },
    Fetch { target: String },
}

/// Records every call when it is issued.
///
/// A gated backend parks each call until [`ScriptedBackend::release`] hands out a permit, so
/// tests can hold a save in flight while they edit or rebind.
pub(crate) struct ScriptedBackend {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    failures: AtomicUsize,
    gate: Option<Semaphore>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    stored: Mutex<Option<StoredDocument>>,
}

impl ScriptedBackend {
    /// Calls resolve immediately; created ids count up from 42.
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(42),
            failures: AtomicUsize::new(0),
            gate: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            stored: Mutex::new(None),
        }
    }

    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub(crate) fn with_stored(self, document: StoredDocument) -> Self {
        *self.stored.lock().unwrap() = Some(document);
        self
    }

    /// Let `n` parked calls complete.
    pub(crate) fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Make the next `n` calls fail.
    pub(crate) fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::Fetch { .. }))
            .collect()
    }

    pub(crate) fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Create { .. }))
            .count()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn take_failure(&self) -> Option<BackendError> {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| BackendError::Unavailable("scripted failure".into()))
    }
}

#[async_trait]
impl PersistenceBackend for ScriptedBackend {
    async fn create(
        &self,
        target: &TargetIdentity,
        payload: &Value,
    ) -> Result<PersistedId, BackendError> {
        self.enter(Call::Create {
            target: target.to_string(),
            payload: payload.clone(),
        })
        .await;

        match self.take_failure() {
            Some(err) => Err(err),
            None => Ok(PersistedId::from(
                self.next_id.fetch_add(1, Ordering::SeqCst),
            )),
        }
    }

    async fn update(&self, id: &PersistedId, payload: &Value) -> Result<(), BackendError> {
        self.enter(Call::Update {
            id: id.to_string(),
            payload: payload.clone(),
        })
        .await;

        match self.take_failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn fetch(&self, target: &TargetIdentity) -> Result<Option<StoredDocument>, BackendError> {
        self.enter(Call::Fetch {
            target: target.to_string(),
        })
        .await;

        match self.take_failure() {
            Some(err) => Err(err),
            None => Ok(self.stored.lock().unwrap().clone()),
        }
    }
}
