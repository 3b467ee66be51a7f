// ── Reactive device streams ──
//
// Subscription types for consuming device model changes.

mod filter;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Device;

pub use filter::DeviceFilter;

type Snapshot = Arc<Vec<Arc<Device>>>;

/// A subscription to the device model.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via `changed()` or by converting to a `Stream`.
pub struct DeviceStream {
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl DeviceStream {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Snapshot {
        self.receiver.borrow().clone()
    }

    /// Latest snapshot restricted to `filter`.
    pub fn filtered(&self, filter: &DeviceFilter) -> Vec<Arc<Device>> {
        filter.apply(&self.latest())
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the device model is dropped.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> DeviceWatchStream {
        DeviceWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a snapshot on every model mutation.
pub struct DeviceWatchStream {
    inner: WatchStream<Snapshot>,
}

impl Stream for DeviceWatchStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;

    use crate::model::DeviceId;
    use crate::profile::ProfileId;
    use crate::store::DeviceModel;

    #[tokio::test]
    async fn changed_yields_new_snapshot() {
        let model = DeviceModel::new();
        let mut stream = model.subscribe();
        assert!(stream.current().is_empty());

        model.upsert_device(&DeviceId::from("0528C9BA"), ProfileId::Switch1Ch, 1);
        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(stream.current().len(), 1);
    }

    #[tokio::test]
    async fn into_stream_starts_with_current() {
        let model = DeviceModel::new();
        model.upsert_device(&DeviceId::from("0528C9BA"), ProfileId::Switch1Ch, 1);

        let mut stream = model.subscribe().into_stream();
        let first = stream.next().await.unwrap();
        assert_eq!(first.len(), 1);
    }
}
