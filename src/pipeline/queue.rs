//! Work queue: an unbounded FIFO of PDF paths between watcher and worker.
//!
//! The sending half is cloneable and its `push` never blocks, so it can be
//! called from the filesystem backend's own event thread. The receiving half
//! is owned by exactly one worker and awaits new items instead of polling.

use crate::receipt::WorkItem;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Create a connected queue pair.
pub fn work_queue() -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        QueueSender {
            tx,
            pushed: Arc::new(AtomicUsize::new(0)),
        },
        QueueReceiver { rx },
    )
}

/// Producer half. Dropping every clone closes the queue.
#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: mpsc::UnboundedSender<WorkItem>,
    pushed: Arc<AtomicUsize>,
}

impl QueueSender {
    /// Enqueue a path. Returns `false` if the consumer is gone.
    pub fn push(&self, path: impl Into<PathBuf>) -> bool {
        let accepted = self.tx.send(WorkItem::new(path)).is_ok();
        if accepted {
            self.pushed.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }

    /// Items accepted so far, across all clones.
    pub fn pushed(&self) -> usize {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<WorkItem>,
}

impl QueueReceiver {
    /// Wait for the next item. `None` once all senders are dropped and the
    /// queue is drained.
    pub async fn next(&mut self) -> Option<WorkItem> {
        self.rx.recv().await
    }

    /// Take an item if one is ready, without waiting.
    pub fn try_next(&mut self) -> Option<WorkItem> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn items_come_out_in_fifo_order() {
        let (tx, mut rx) = work_queue();
        assert!(tx.push("unprocessed/a.pdf"));
        assert!(tx.push("unprocessed/b.pdf"));
        assert_eq!(rx.len(), 2);

        assert_eq!(rx.next().await.unwrap().path, PathBuf::from("unprocessed/a.pdf"));
        assert_eq!(rx.next().await.unwrap().path, PathBuf::from("unprocessed/b.pdf"));
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn closed_after_senders_drop_and_drained() {
        let (tx, mut rx) = work_queue();
        let tx2 = tx.clone();
        tx.push("a.pdf");
        drop(tx);
        tx2.push("b.pdf");
        drop(tx2);

        assert!(rx.next().await.is_some());
        assert!(rx.next().await.is_some());
        assert!(rx.next().await.is_none());
    }

    #[test]
    fn pushed_counts_across_clones() {
        let (tx, _rx) = work_queue();
        let tx2 = tx.clone();
        tx.push("a.pdf");
        tx2.push("b.pdf");
        assert_eq!(tx.pushed(), 2);
        assert_eq!(tx2.pushed(), 2);
    }

    #[test]
    fn push_fails_when_receiver_dropped() {
        let (tx, rx) = work_queue();
        drop(rx);
        assert!(tx.is_closed());
        assert!(!tx.push("a.pdf"));
    }

    #[test]
    fn duplicate_paths_are_not_collapsed() {
        let (tx, mut rx) = work_queue();
        tx.push("a.pdf");
        tx.push("a.pdf");
        assert_eq!(rx.try_next(), Some(WorkItem::new("a.pdf")));
        assert_eq!(rx.try_next(), Some(WorkItem::new("a.pdf")));
        assert_eq!(rx.try_next(), None);
    }
}
