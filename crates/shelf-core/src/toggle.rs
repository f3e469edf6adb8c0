use std::{
    collections::HashMap,
    error::Error as StdError,
    fmt::Debug,
    future::Future,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, warn};

use crate::error::{DomainError, classify_error};

/// Per-key optimistic state.
///
/// `proposed` holds the value of the latest unsettled change. Only a successful settlement of that
/// change moves `confirmed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticState<K, V> {
    pub key: K,
    pub confirmed: V,
    pub proposed: Option<V>,
    pub generation: u64,
}

impl<K, V> OptimisticState<K, V> {
    pub fn is_pending(&self) -> bool {
        self.proposed.is_some()
    }

    /// What the UI shows: the proposal while pending, the confirmed value otherwise.
    pub fn displayed(&self) -> &V {
        self.proposed.as_ref().unwrap_or(&self.confirmed)
    }
}

/// Boolean flavour used by favorite-style toggles.
pub type ToggleState<K> = OptimisticState<K, bool>;

/// Speculative change that has been shown but not settled yet.
///
/// `previous` is the confirmed value when the change began.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending change must be settled or the key stays pending"]
pub struct PendingChange<K, V> {
    pub key: K,
    pub generation: u64,
    pub previous: V,
    pub next: V,
}

/// Result of settling one optimistic change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome<V> {
    /// The remote call succeeded and this change was still the latest.
    Applied(V),
    /// The remote call failed; the display went back to the confirmed value.
    RolledBack(DomainError),
    /// A newer change was issued for the key; this result was dropped.
    Superseded,
}

impl<V> ToggleOutcome<V> {
    pub fn error(&self) -> Option<&DomainError> {
        match self {
            Self::RolledBack(err) => Some(err),
            Self::Applied(_) | Self::Superseded => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Keyed optimistic values with last-issued-wins settlement.
///
/// Clones share the same state. The lock is never held across the remote call.
#[derive(Debug)]
pub struct OptimisticMap<K, V> {
    label: &'static str,
    entries: Arc<Mutex<HashMap<K, OptimisticState<K, V>>>>,
}

impl<K, V> Clone for OptimisticMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            label: self.label,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> OptimisticMap<K, V>
where
    K: Clone + Eq + Hash + Debug,
    V: Clone + PartialEq + Default + Debug,
{
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Displayed value, or `V::default()` for unknown keys.
    pub fn value(&self, key: &K) -> V {
        self.lock()
            .get(key)
            .map(|entry| entry.displayed().clone())
            .unwrap_or_default()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.lock().get(key).is_some_and(|entry| entry.is_pending())
    }

    pub fn state(&self, key: &K) -> Option<OptimisticState<K, V>> {
        self.lock().get(key).cloned()
    }

    /// Record a server-acknowledged value, e.g. after an initial fetch.
    ///
    /// A pending proposal stays on display until it settles.
    pub fn seed(&self, key: K, value: V) {
        let mut entries = self.lock();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| fresh_state(key));
        entry.confirmed = value;
    }

    /// Drop all state for `key`; in-flight changes for it settle as superseded.
    pub fn forget(&self, key: &K) {
        self.lock().remove(key);
    }

    /// Propose `next` for `key` and open a new generation.
    pub fn begin(&self, key: K, next: V) -> PendingChange<K, V> {
        self.begin_with(key, |_| next)
    }

    /// Like [`Self::begin`], deriving the proposal from the confirmed value under the same lock.
    pub fn begin_with(&self, key: K, next: impl FnOnce(&V) -> V) -> PendingChange<K, V> {
        let mut entries = self.lock();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| fresh_state(key.clone()));
        let previous = entry.confirmed.clone();
        let next = next(&previous);
        entry.generation += 1;
        entry.proposed = Some(next.clone());
        debug!(
            toggle = self.label,
            key = ?key,
            generation = entry.generation,
            ?previous,
            ?next,
            "optimistic change proposed"
        );

        PendingChange {
            key,
            generation: entry.generation,
            previous,
            next,
        }
    }

    /// Settle a change with the remote outcome.
    ///
    /// Only the latest generation for the key may touch the state. A failure leaves `confirmed`
    /// as it is, so the display falls back to the last acknowledged value.
    pub fn settle(
        &self,
        change: PendingChange<K, V>,
        result: Result<(), DomainError>,
    ) -> ToggleOutcome<V> {
        let mut entries = self.lock();
        let Some(entry) = entries
            .get_mut(&change.key)
            .filter(|entry| entry.generation == change.generation)
        else {
            debug!(
                toggle = self.label,
                key = ?change.key,
                generation = change.generation,
                failed = result.is_err(),
                "superseded optimistic change dropped"
            );
            return ToggleOutcome::Superseded;
        };

        entry.proposed = None;
        match result {
            Ok(()) => {
                entry.confirmed = change.next.clone();
                ToggleOutcome::Applied(change.next)
            }
            Err(error) => {
                warn!(
                    toggle = self.label,
                    key = ?change.key,
                    kind = ?error.kind,
                    restored = ?entry.confirmed,
                    "optimistic change rolled back"
                );
                ToggleOutcome::RolledBack(error)
            }
        }
    }

    /// Set `key` to `next` optimistically and confirm it with `remote`.
    pub async fn apply<F, Fut, E>(&self, key: K, next: V, remote: F) -> ToggleOutcome<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: StdError + 'static,
    {
        let change = self.begin(key, next);
        let result = remote().await.map_err(|err| classify_error(&err));
        self.settle(change, result)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, OptimisticState<K, V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn fresh_state<K, V: Default>(key: K) -> OptimisticState<K, V> {
    OptimisticState {
        key,
        confirmed: V::default(),
        proposed: None,
        generation: 0,
    }
}

/// Boolean on/off toggle keyed by entity, e.g. favorites.
#[derive(Debug)]
pub struct OptimisticToggle<K> {
    inner: OptimisticMap<K, bool>,
}

impl<K> Clone for OptimisticToggle<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K> OptimisticToggle<K>
where
    K: Clone + Eq + Hash + Debug,
{
    pub fn new(label: &'static str) -> Self {
        Self {
            inner: OptimisticMap::new(label),
        }
    }

    /// Displayed value: the speculative one while pending, the confirmed one otherwise.
    pub fn is_on(&self, key: &K) -> bool {
        self.inner.value(key)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.inner.is_pending(key)
    }

    pub fn state(&self, key: &K) -> Option<ToggleState<K>> {
        self.inner.state(key)
    }

    pub fn seed(&self, key: K, on: bool) {
        self.inner.seed(key, on);
    }

    pub fn forget(&self, key: &K) {
        self.inner.forget(key);
    }

    /// Propose the opposite of the confirmed value for `key`.
    ///
    /// Repeated calls before settlement propose the same value, so the display does not flicker.
    pub fn begin(&self, key: K) -> PendingChange<K, bool> {
        self.inner.begin_with(key, |on| !on)
    }

    pub fn settle(
        &self,
        change: PendingChange<K, bool>,
        result: Result<(), DomainError>,
    ) -> ToggleOutcome<bool> {
        self.inner.settle(change, result)
    }

    /// Show `key` flipped now and confirm or roll back once `remote` settles.
    pub async fn toggle<F, Fut, E>(&self, key: K, remote: F) -> ToggleOutcome<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: StdError + 'static,
    {
        let change = self.begin(key);
        let result = remote().await.map_err(|err| classify_error(&err));
        self.settle(change, result)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::error::{ErrorKind, RemoteError, classify_value};

    fn failure() -> Result<(), DomainError> {
        Err(classify_value(&RemoteError::status(500)))
    }

    #[test]
    fn flips_display_immediately_and_marks_pending() {
        let toggle = OptimisticToggle::new("favorite");
        let change = toggle.begin("book-1");

        assert!(toggle.is_on(&"book-1"));
        assert!(toggle.is_pending(&"book-1"));
        let state = toggle.state(&"book-1").expect("state should exist");
        assert!(!state.confirmed);
        assert_eq!(state.generation, 1);

        let outcome = toggle.settle(change, Ok(()));
        assert_eq!(outcome, ToggleOutcome::Applied(true));
    }

    #[test]
    fn success_keeps_speculative_value() {
        let toggle = OptimisticToggle::new("favorite");
        toggle.seed("book-1", true);

        let change = toggle.begin("book-1");
        assert!(!toggle.is_on(&"book-1"));
        assert!(toggle.settle(change, Ok(())).is_applied());

        assert!(!toggle.is_on(&"book-1"));
        assert!(!toggle.is_pending(&"book-1"));
        let state = toggle.state(&"book-1").expect("state should exist");
        assert!(!state.confirmed);
    }

    #[test]
    fn failure_restores_pre_toggle_display() {
        let toggle = OptimisticToggle::new("favorite");
        let before = toggle.is_on(&"book-1");

        let change = toggle.begin("book-1");
        let outcome = toggle.settle(change, failure());

        let error = outcome.error().expect("rollback should carry an error");
        assert_eq!(error.kind, ErrorKind::ServerFault);
        assert_eq!(toggle.is_on(&"book-1"), before);
        assert!(!toggle.is_pending(&"book-1"));
    }

    #[test]
    fn older_success_after_newer_failure_is_ignored() {
        let toggle = OptimisticToggle::new("favorite");
        let first = toggle.begin("book-1");
        let second = toggle.begin("book-1");
        assert!(toggle.is_on(&"book-1"));
        assert_eq!(first.next, second.next);

        assert!(toggle.settle(second, failure()).error().is_some());
        assert!(!toggle.is_on(&"book-1"));
        assert!(!toggle.is_pending(&"book-1"));

        assert_eq!(toggle.settle(first, Ok(())), ToggleOutcome::Superseded);
        assert!(!toggle.is_on(&"book-1"));
        assert_eq!(toggle.state(&"book-1").map(|s| s.confirmed), Some(false));
    }

    #[test]
    fn older_failure_after_newer_success_is_ignored() {
        let toggle = OptimisticToggle::new("favorite");
        let first = toggle.begin("book-1");
        let second = toggle.begin("book-1");

        assert_eq!(toggle.settle(second, Ok(())), ToggleOutcome::Applied(true));
        assert!(toggle.is_on(&"book-1"));

        let stale = toggle.settle(first, failure());
        assert_eq!(stale, ToggleOutcome::Superseded);
        assert!(stale.error().is_none());
        assert!(toggle.is_on(&"book-1"));
        assert!(!toggle.is_pending(&"book-1"));
    }

    #[test]
    fn overlapping_failures_restore_confirmed_value() {
        let toggle = OptimisticToggle::new("favorite");
        toggle.seed("book-1", true);
        let first = toggle.begin("book-1");
        let second = toggle.begin("book-1");
        assert!(!toggle.is_on(&"book-1"));

        assert!(toggle.settle(second, failure()).error().is_some());
        assert_eq!(toggle.settle(first, failure()), ToggleOutcome::Superseded);

        let state = toggle.state(&"book-1").expect("state should exist");
        assert!(state.confirmed);
        assert_eq!(state.proposed, None);
        assert!(toggle.is_on(&"book-1"));
    }

    #[test]
    fn overlapping_failures_in_issue_order_restore_confirmed_value() {
        let toggle = OptimisticToggle::new("favorite");
        let first = toggle.begin("book-1");
        let second = toggle.begin("book-1");

        assert_eq!(toggle.settle(first, failure()), ToggleOutcome::Superseded);
        assert!(toggle.is_on(&"book-1"));
        assert!(toggle.is_pending(&"book-1"));

        assert!(toggle.settle(second, failure()).error().is_some());
        assert!(!toggle.is_on(&"book-1"));
        assert_eq!(toggle.state(&"book-1").map(|s| s.confirmed), Some(false));
    }

    #[test]
    fn older_settlement_does_not_clear_newer_pending_flag() {
        let toggle = OptimisticToggle::new("favorite");
        let first = toggle.begin("book-1");
        let _second = toggle.begin("book-1");

        assert_eq!(toggle.settle(first, Ok(())), ToggleOutcome::Superseded);
        assert!(toggle.is_pending(&"book-1"));
    }

    #[test]
    fn keys_are_independent() {
        let toggle = OptimisticToggle::new("favorite");
        let a = toggle.begin("book-a");
        let b = toggle.begin("book-b");

        assert!(toggle.settle(a, failure()).error().is_some());
        assert!(toggle.settle(b, Ok(())).is_applied());
        assert!(!toggle.is_on(&"book-a"));
        assert!(toggle.is_on(&"book-b"));
    }

    #[test]
    fn seed_during_pending_only_moves_confirmed() {
        let toggle = OptimisticToggle::new("favorite");
        let change = toggle.begin("book-1");
        toggle.seed("book-1", false);
        assert!(toggle.is_on(&"book-1"));

        let _ = toggle.settle(change, Ok(()));
        assert!(toggle.is_on(&"book-1"));
    }

    #[test]
    fn forgotten_key_settles_as_superseded() {
        let toggle = OptimisticToggle::new("favorite");
        let change = toggle.begin("book-1");
        toggle.forget(&"book-1");
        assert_eq!(toggle.settle(change, Ok(())), ToggleOutcome::Superseded);
        assert!(!toggle.is_on(&"book-1"));
    }

    #[test]
    fn enum_values_roll_back_to_previous_variant() {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        enum Progress {
            #[default]
            Unread,
            Reading,
            Finished,
        }

        let map = OptimisticMap::new("progress");
        map.seed(1_u32, Progress::Reading);

        let change = map.begin(1, Progress::Finished);
        assert_eq!(map.value(&1), Progress::Finished);
        let _ = map.settle(change, failure());
        assert_eq!(map.value(&1), Progress::Reading);
        assert_ne!(map.value(&2), Progress::Finished);
        assert_eq!(map.value(&2), Progress::Unread);
    }

    #[tokio::test]
    async fn toggle_rolls_back_when_remote_call_fails() {
        let toggle = OptimisticToggle::new("favorite");
        let outcome = toggle
            .toggle("book-1", || async { Err(RemoteError::status(403)) })
            .await;

        assert_eq!(outcome.error().map(|e| e.kind), Some(ErrorKind::Auth));
        assert!(!toggle.is_on(&"book-1"));
        assert!(!toggle.is_pending(&"book-1"));
    }

    #[tokio::test]
    async fn overlapping_toggles_resolve_to_last_issued() {
        let toggle = OptimisticToggle::new("favorite");
        let (first_tx, first_rx) = oneshot::channel::<Result<(), RemoteError>>();
        let (second_tx, second_rx) = oneshot::channel::<Result<(), RemoteError>>();

        let first = tokio::spawn({
            let toggle = toggle.clone();
            async move {
                toggle
                    .toggle("book-1", || async move {
                        first_rx
                            .await
                            .unwrap_or_else(|_| Err(RemoteError::Transport("dropped".into())))
                    })
                    .await
            }
        });
        while !toggle.is_pending(&"book-1") {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(toggle.is_on(&"book-1"));

        let second = tokio::spawn({
            let toggle = toggle.clone();
            async move {
                toggle
                    .toggle("book-1", || async move {
                        second_rx
                            .await
                            .unwrap_or_else(|_| Err(RemoteError::Transport("dropped".into())))
                    })
                    .await
            }
        });
        while toggle.state(&"book-1").map(|s| s.generation) != Some(2) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(toggle.is_on(&"book-1"));

        first_tx
            .send(Err(RemoteError::status(500)))
            .expect("first call should be waiting");
        let first = first.await.expect("first task should finish");
        assert_eq!(first, ToggleOutcome::Superseded);
        assert!(toggle.is_on(&"book-1"));
        assert!(toggle.is_pending(&"book-1"));

        second_tx.send(Ok(())).expect("second call should be waiting");
        let second = second.await.expect("second task should finish");
        assert_eq!(second, ToggleOutcome::Applied(true));

        assert!(toggle.is_on(&"book-1"));
        assert!(!toggle.is_pending(&"book-1"));
    }
}
