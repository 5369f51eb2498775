//! Snapshot subscription stream.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::watch;

use slurmwatch_types::Snapshot;

/// An unbounded stream of published snapshots.
///
/// Yields once per publish made after the stream was created. A consumer that
/// falls behind skips straight to the newest snapshot. The stream ends when
/// the store is dropped; subscribing again starts a fresh stream.
pub struct SnapshotStream {
    inner: BoxStream<'static, Arc<Snapshot>>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Snapshot>>) -> Self {
        let inner = stream::unfold(receiver, |mut receiver| async move {
            receiver.changed().await.ok()?;
            let snapshot = receiver.borrow_and_update().clone();
            Some((snapshot, receiver))
        })
        .boxed();
        Self { inner }
    }
}

impl Stream for SnapshotStream {
    type Item = Arc<Snapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for SnapshotStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStream").finish_non_exhaustive()
    }
}
