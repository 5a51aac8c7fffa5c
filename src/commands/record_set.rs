// SPDX-License-Identifier: Apache-2.0

//! Bounded producer/consumer record stream (spec §4.6, §5).
//!
//! Backed by a `tokio::sync::mpsc::Receiver`, which plays the role of the
//! source design's dedicated-parser-thread `BlockingQueue`: child
//! commands (one per node) push parsed records in as they arrive, and the
//! caller pulls them out with [`RecordSet::next`].

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::mpsc;

use crate::errors::Result;

/// A pull-based stream of `T` produced by one or more fanned-out
/// [`super::MultiCommand`] tasks (spec §4.6 "RecordSet").
pub struct RecordSet<T> {
    rx: mpsc::Receiver<Result<T>>,
    cancelled: Arc<AtomicBool>,
}

impl<T> RecordSet<T> {
    pub(crate) fn new(rx: mpsc::Receiver<Result<T>>, cancelled: Arc<AtomicBool>) -> Self {
        RecordSet { rx, cancelled }
    }

    /// Returns the next item, or `None` once every producer has finished
    /// (or the set was cancelled and has drained whatever was already
    /// buffered). Cancelling doesn't discard already-enqueued items: each
    /// producer only checks the flag at its own record boundary, so the
    /// channel still empties in arrival order before closing (spec §4.6
    /// "RecordSet" — a sentinel marks completion, it doesn't truncate the
    /// queue).
    pub async fn next(&mut self) -> Option<Result<T>> {
        self.rx.recv().await
    }

    /// Signals every fanned-out child command to stop at its next record
    /// boundary (spec §4.6 "cancellation"). Already-buffered items are
    /// still drained by [`Self::next`] until the channel empties.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_items_in_arrival_order_and_then_none() {
        let (tx, rx) = mpsc::channel(4);
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut set = RecordSet::new(rx, cancelled);
        tx.send(Ok(1)).await.expect("send");
        tx.send(Ok(2)).await.expect("send");
        drop(tx);

        assert_eq!(set.next().await.expect("item").expect("ok"), 1);
        assert_eq!(set.next().await.expect("item").expect("ok"), 2);
        assert!(set.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_drains_already_buffered_items_then_stops() {
        let (tx, rx) = mpsc::channel(4);
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut set = RecordSet::new(rx, cancelled);
        tx.send(Ok(1)).await.expect("send");
        set.cancel();
        assert!(set.is_cancelled());
        // The item already in the channel before cancellation still drains.
        assert_eq!(set.next().await.expect("item").expect("ok"), 1);
        drop(tx);
        assert!(set.next().await.is_none());
    }
}
