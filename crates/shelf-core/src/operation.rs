use std::{
    error::Error as StdError,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DomainError, classify_error};

/// Lifecycle of one [`AsyncOperation`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum OperationStatus {
    /// Never executed, or reset.
    #[default]
    Idle,
    /// A call is in flight.
    Pending,
    /// The last settled call succeeded.
    Succeeded,
    /// The last settled call failed.
    Failed,
}

/// Snapshot of an operation's observable state.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationState<T> {
    pub data: Option<T>,
    pub status: OperationStatus,
    pub error: Option<DomainError>,
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self {
            data: None,
            status: OperationStatus::Idle,
            error: None,
        }
    }
}

impl<T> OperationState<T> {
    fn begin(&mut self) {
        self.status = OperationStatus::Pending;
        self.error = None;
    }

    fn succeed(&mut self, value: T) {
        self.data = Some(value);
        self.status = OperationStatus::Succeeded;
        self.error = None;
    }

    /// `data` keeps whatever it held before the call.
    fn fail(&mut self, error: DomainError) {
        self.status = OperationStatus::Failed;
        self.error = Some(error);
    }
}

/// Tracks the lifecycle of a side-effecting remote call.
///
/// Clones share the same state. Overlapping `execute` calls are not queued: whichever settles
/// last overwrites the state.
#[derive(Debug)]
pub struct AsyncOperation<T> {
    label: &'static str,
    state: Arc<Mutex<OperationState<T>>>,
}

impl<T> Clone for AsyncOperation<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label,
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for AsyncOperation<T> {
    fn default() -> Self {
        Self::new("operation")
    }
}

impl<T> AsyncOperation<T> {
    /// Create an idle operation; `label` only shows up in logs.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            state: Arc::new(Mutex::new(OperationState::default())),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn status(&self) -> OperationStatus {
        self.lock().status
    }

    pub fn error(&self) -> Option<DomainError> {
        self.lock().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.status() == OperationStatus::Pending
    }

    pub fn has_error(&self) -> bool {
        self.lock().error.is_some()
    }

    pub fn has_data(&self) -> bool {
        self.lock().data.is_some()
    }

    /// Replace the stored data without touching status or error.
    pub fn set_data(&self, data: Option<T>) {
        self.lock().data = data;
    }

    /// Edit the stored data in place, e.g. after a related mutation succeeded.
    pub fn update_data(&self, edit: impl FnOnce(&mut Option<T>)) {
        edit(&mut self.lock().data);
    }

    /// Drop the stored error. A failed operation goes back to `Idle`.
    pub fn clear_error(&self) {
        let mut state = self.lock();
        state.error = None;
        if state.status == OperationStatus::Failed {
            state.status = OperationStatus::Idle;
        }
    }

    /// Back to the initial idle state with no data.
    pub fn reset(&self) {
        *self.lock() = OperationState::default();
    }

    /// Run `call`, tracking its lifecycle.
    ///
    /// On failure the classified error is stored and the original error is returned unchanged,
    /// so callers can still branch on it locally.
    pub async fn execute<F, Fut, E>(&self, call: F) -> Result<T, E>
    where
        T: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        self.lock().begin();
        debug!(operation = self.label, "operation pending");

        match call().await {
            Ok(value) => {
                self.lock().succeed(value.clone());
                debug!(operation = self.label, "operation succeeded");
                Ok(value)
            }
            Err(err) => {
                let classified = classify_error(&err);
                warn!(
                    operation = self.label,
                    kind = ?classified.kind,
                    status = ?classified.status_code,
                    error = %err,
                    "operation failed"
                );
                self.lock().fail(classified);
                Err(err)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, OperationState<T>> {
        // Every critical section leaves the state consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> AsyncOperation<T> {
    /// Start with data already present, for example from a server-rendered page.
    pub fn with_data(label: &'static str, data: T) -> Self {
        let op = Self::new(label);
        op.set_data(Some(data));
        op
    }

    pub fn data(&self) -> Option<T> {
        self.lock().data.clone()
    }

    pub fn snapshot(&self) -> OperationState<T> {
        self.lock().clone()
    }
}
