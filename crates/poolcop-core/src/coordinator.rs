// ── Update coordinator ──
//
// Single owner of the API client and the current snapshot. Polls on a
// fixed interval, swaps each successful result in atomically, and folds
// failures into a uniform "update failed" signal. Entities never fetch;
// they read whatever snapshot the coordinator last published.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::StatusClient;
use crate::error::CoreError;
use crate::snapshot::StatusSnapshot;
use crate::stream::{SnapshotReader, SnapshotStream};

/// Polling cadence. 900 s / 12 s = 75 requests per token, under the
/// 90-request budget.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(12);

// ── CoordinatorState ─────────────────────────────────────────────

/// Refresh health observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CoordinatorState {
    /// No refresh has succeeded yet.
    Uninitialized,
    /// The last refresh succeeded.
    Ready,
    /// The last refresh failed; any earlier snapshot is still served.
    Failing,
}

/// The most recent failure, cleared on the next success.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateFailure {
    pub message: String,
    pub at: DateTime<Utc>,
    /// Failures in a row, including this one.
    pub consecutive: u32,
    /// Whether the API key itself was refused.
    pub authentication: bool,
}

// ── Coordinator ──────────────────────────────────────────────────

/// Owns one client and the snapshot it produces.
///
/// Cheaply cloneable; clones share the same client, snapshot, and
/// background task. The task holds only a weak reference, so dropping
/// the last clone stops polling and drops the client.
pub struct Coordinator<C: StatusClient> {
    inner: Arc<CoordinatorInner<C>>,
}

impl<C: StatusClient> Clone for Coordinator<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CoordinatorInner<C> {
    update_interval: Duration,
    client: Mutex<Option<C>>,
    snapshot: Arc<ArcSwapOption<StatusSnapshot>>,
    updates: watch::Sender<Option<Arc<StatusSnapshot>>>,
    state: watch::Sender<CoordinatorState>,
    last_failure: ArcSwapOption<UpdateFailure>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<C> Drop for CoordinatorInner<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<C: StatusClient> Coordinator<C> {
    /// Wrap a client. Does not fetch; call [`first_refresh()`](Self::first_refresh)
    /// and then [`start()`](Self::start).
    ///
    /// `update_interval` of zero disables the background task.
    pub fn new(client: C, update_interval: Duration) -> Self {
        let (updates, _) = watch::channel(None);
        let (state, _) = watch::channel(CoordinatorState::Uninitialized);

        Self {
            inner: Arc::new(CoordinatorInner {
                update_interval,
                client: Mutex::new(Some(client)),
                snapshot: Arc::new(ArcSwapOption::empty()),
                updates,
                state,
                last_failure: ArcSwapOption::empty(),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn update_interval(&self) -> Duration {
        self.inner.update_interval
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Fetch the status once and publish it.
    ///
    /// On success the new snapshot replaces the old one wholesale. On
    /// failure the previous snapshot stays in place and the failure is
    /// recorded; the error is [`CoreError::UpdateFailed`] unless the key
    /// was refused, in which case it is [`CoreError::AuthenticationFailed`].
    pub async fn refresh(&self) -> Result<Arc<StatusSnapshot>, CoreError> {
        let result = {
            let guard = self.inner.client.lock().await;
            let Some(client) = guard.as_ref() else {
                return Err(CoreError::ClientClosed);
            };
            client.fetch_status().await
        };

        match result {
            Ok(status) => Ok(self.publish(StatusSnapshot::new(status))),
            Err(e) => {
                let err = CoreError::from_refresh(e);
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    fn publish(&self, snapshot: StatusSnapshot) -> Arc<StatusSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.inner.snapshot.store(Some(Arc::clone(&snapshot)));

        if let Some(previous) = self.inner.last_failure.swap(None) {
            info!(failures = previous.consecutive, "PoolCop data fetch recovered");
        }
        self.inner.state.send_replace(CoordinatorState::Ready);
        self.inner.updates.send_replace(Some(Arc::clone(&snapshot)));
        debug!(fetched_at = %snapshot.fetched_at(), "snapshot updated");
        snapshot
    }

    fn record_failure(&self, err: &CoreError) {
        let consecutive = self
            .inner
            .last_failure
            .load()
            .as_ref()
            .map_or(1, |f| f.consecutive.saturating_add(1));

        if consecutive == 1 {
            warn!(error = %err, "PoolCop data fetch failed");
        } else {
            debug!(error = %err, consecutive, "PoolCop data fetch still failing");
        }

        self.inner.last_failure.store(Some(Arc::new(UpdateFailure {
            message: err.to_string(),
            at: Utc::now(),
            consecutive,
            authentication: err.is_authentication(),
        })));
        self.inner.state.send_replace(CoordinatorState::Failing);
    }

    /// Initial refresh gating setup.
    ///
    /// Any failure releases the client before returning; an ordinary
    /// failure becomes [`CoreError::NotReady`] so the caller can retry
    /// setup later, a refused key stays [`CoreError::AuthenticationFailed`].
    pub async fn first_refresh(&self) -> Result<Arc<StatusSnapshot>, CoreError> {
        match self.refresh().await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                self.close_client().await;
                Err(match err {
                    CoreError::UpdateFailed { message } => CoreError::NotReady { message },
                    other => other,
                })
            }
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the periodic refresh task. A second call is a no-op.
    pub async fn start(&self) {
        let interval = self.inner.update_interval;
        if interval.is_zero() || self.inner.cancel.is_cancelled() {
            return;
        }

        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return;
        }
        let cancel = self.inner.cancel.child_token();
        let inner = Arc::downgrade(&self.inner);
        handles.push(tokio::spawn(refresh_task(inner, interval, cancel)));
        debug!(interval_secs = interval.as_secs(), "refresh task started");
    }

    /// Stop polling and release the client.
    ///
    /// Cancels the background task (aborting any refresh in flight), waits
    /// for it to finish, then closes the client. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.close_client().await;
    }

    async fn close_client(&self) {
        let client = self.inner.client.lock().await.take();
        if let Some(client) = client {
            client.close().await;
            debug!("PoolCopilot client released");
        }
    }

    /// Device id reported by the client, while it is still held.
    pub async fn poolcop_id(&self) -> Option<String> {
        self.inner
            .client
            .lock()
            .await
            .as_ref()
            .and_then(C::poolcop_id)
    }

    /// Whether the client has been released.
    pub async fn is_closed(&self) -> bool {
        self.inner.client.lock().await.is_none()
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: first refresh, run closure, shut down.
    ///
    /// Never starts the background task; suited to CLI commands that need
    /// a single snapshot.
    pub async fn oneshot<F, Fut, T>(client: C, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Coordinator<C>) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let coordinator = Coordinator::new(client, Duration::ZERO);
        coordinator.first_refresh().await?;
        let result = f(coordinator.clone()).await;
        coordinator.shutdown().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    /// The current snapshot, if any refresh has succeeded.
    pub fn data(&self) -> Option<Arc<StatusSnapshot>> {
        self.inner.snapshot.load_full()
    }

    /// Lock-free handle entities use to read the current snapshot.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader::new(Arc::clone(&self.inner.snapshot))
    }

    /// Subscribe to snapshot replacements.
    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.updates.subscribe())
    }

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn state_changes(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    /// Whether the most recent refresh succeeded.
    pub fn last_update_success(&self) -> bool {
        self.state() == CoordinatorState::Ready
    }

    pub fn last_failure(&self) -> Option<Arc<UpdateFailure>> {
        self.inner.last_failure.load_full()
    }
}

// ── Background task ──────────────────────────────────────────────

/// Periodically refresh until cancelled or every coordinator handle is gone.
///
/// A strong reference is held only for the duration of one refresh.
async fn refresh_task<C: StatusClient>(
    weak: Weak<CoordinatorInner<C>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = weak.upgrade() else { break };
        let coordinator = Coordinator { inner };
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            // Failures are recorded by refresh() itself.
            _ = coordinator.refresh() => {}
        }
    }
    debug!("refresh task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClient {
        status: Value,
        closed: Arc<AtomicUsize>,
    }

    impl StatusClient for FixedClient {
        async fn fetch_status(&self) -> Result<Value, poolcop_api::Error> {
            Ok(self.status.clone())
        }

        fn poolcop_id(&self) -> Option<String> {
            Some("1234".into())
        }

        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fixed() -> (FixedClient, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicUsize::new(0));
        let client = FixedClient {
            status: json!({ "PoolCop": { "pH": 7.3 } }),
            closed: Arc::clone(&closed),
        };
        (client, closed)
    }

    #[tokio::test]
    async fn starts_uninitialized() {
        let (client, _) = fixed();
        let coordinator = Coordinator::new(client, SCAN_INTERVAL);
        assert_eq!(coordinator.state(), CoordinatorState::Uninitialized);
        assert!(coordinator.data().is_none());
        assert!(coordinator.reader().load().is_none());
    }

    #[tokio::test]
    async fn refresh_publishes_to_reader() {
        let (client, _) = fixed();
        let coordinator = Coordinator::new(client, SCAN_INTERVAL);
        let reader = coordinator.reader();
        let snap = coordinator.refresh().await.unwrap();
        assert!(Arc::ptr_eq(&reader.load().unwrap(), &snap));
        assert!(coordinator.last_update_success());
    }

    #[tokio::test]
    async fn oneshot_closes_client_once() {
        let (client, closed) = fixed();
        let ph = Coordinator::oneshot(client, |c| async move {
            let data = c.data().ok_or(CoreError::ClientClosed)?;
            Ok(data.status_value("pH").cloned())
        })
        .await
        .unwrap();
        assert_eq!(ph, Some(json!(7.3)));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_after_shutdown_reports_closed() {
        let (client, closed) = fixed();
        let coordinator = Coordinator::new(client, SCAN_INTERVAL);
        coordinator.shutdown().await;
        coordinator.shutdown().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(matches!(
            coordinator.refresh().await,
            Err(CoreError::ClientClosed)
        ));
        assert!(coordinator.is_closed().await);
    }

    #[test]
    fn state_displays_snake_case() {
        assert_eq!(CoordinatorState::Uninitialized.to_string(), "uninitialized");
        assert_eq!(CoordinatorState::Failing.to_string(), "failing");
    }
}
