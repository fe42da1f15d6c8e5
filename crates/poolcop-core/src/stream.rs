// ── Snapshot access for entities and subscribers ──
//
// Entities read the current snapshot through a `SnapshotReader` (lock-free
// load). Anything that wants to react to new data subscribes through a
// `SnapshotStream` backed by the coordinator's watch channel.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use arc_swap::ArcSwapOption;
use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::snapshot::StatusSnapshot;

/// Read-only handle onto the coordinator's current snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    slot: Arc<ArcSwapOption<StatusSnapshot>>,
}

impl SnapshotReader {
    pub(crate) fn new(slot: Arc<ArcSwapOption<StatusSnapshot>>) -> Self {
        Self { slot }
    }

    /// A reader pinned to a fixed snapshot, detached from any coordinator.
    pub fn fixed(snapshot: Option<StatusSnapshot>) -> Self {
        Self {
            slot: Arc::new(ArcSwapOption::from(snapshot.map(Arc::new))),
        }
    }

    /// The snapshot as of this call. `None` until the first successful refresh.
    pub fn load(&self) -> Option<Arc<StatusSnapshot>> {
        self.slot.load_full()
    }
}

type Slot = Option<Arc<StatusSnapshot>>;

/// A subscription to snapshot replacements.
///
/// Provides point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting to a `Stream`.
pub struct SnapshotStream {
    current: Slot,
    receiver: watch::Receiver<Slot>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: watch::Receiver<Slot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> Option<&Arc<StatusSnapshot>> {
        self.current.as_ref()
    }

    /// Wait for the next successful refresh.
    /// Returns `None` once the coordinator has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<StatusSnapshot>> {
        loop {
            self.receiver.changed().await.ok()?;
            let snap = self.receiver.borrow_and_update().clone();
            if let Some(snap) = snap {
                self.current = Some(Arc::clone(&snap));
                return Some(snap);
            }
        }
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::from_changes(self.receiver),
        }
    }
}

/// `Stream` adapter yielding each newly published snapshot.
pub struct SnapshotWatchStream {
    inner: WatchStream<Slot>,
}

impl Stream for SnapshotWatchStream {
    type Item = Arc<StatusSnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Some(snap))) => return Poll::Ready(Some(snap)),
                Poll::Ready(Some(None)) => {}
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use serde_json::json;

    #[test]
    fn fixed_reader_returns_its_snapshot() {
        let reader = SnapshotReader::fixed(Some(StatusSnapshot::new(json!({ "PoolCop": {} }))));
        assert!(reader.load().is_some());
        assert!(SnapshotReader::fixed(None).load().is_none());
    }

    #[tokio::test]
    async fn changed_skips_empty_publications() {
        let (tx, rx) = watch::channel(None);
        let mut stream = SnapshotStream::new(rx);
        assert!(stream.current().is_none());

        let snap = Arc::new(StatusSnapshot::new(json!({ "PoolCop": { "pH": 7.1 } })));
        let publisher = {
            let snap = Arc::clone(&snap);
            tokio::spawn(async move {
                tx.send_replace(None);
                tx.send_replace(Some(snap));
                tx
            })
        };

        let received = stream.changed().await.unwrap();
        assert!(Arc::ptr_eq(&received, &snap));
        assert!(stream.current().is_some());
        drop(publisher.await.unwrap());
        assert!(stream.changed().await.is_none());
    }

    #[tokio::test]
    async fn into_stream_yields_new_snapshots() {
        let (tx, rx) = watch::channel(None);
        let mut stream = SnapshotStream::new(rx).into_stream();

        tx.send_replace(Some(Arc::new(StatusSnapshot::new(json!({ "PoolCop": { "pH": 7.0 } })))));
        let first = stream.next().await.unwrap();
        assert_eq!(first.status_value("pH"), Some(&json!(7.0)));

        drop(tx);
        assert!(stream.next().await.is_none());
    }
}
