// SPDX-License-Identifier: Apache-2.0

//! Admission control in front of an [`EventPool`] (spec §4.7).
//!
//! Two modes: non-blocking (reject immediately when the pool is
//! exhausted) and blocking (park the caller in FIFO order until a
//! context is released). The source design drives the blocking queue
//! with a lock-free single-flight worker flag to avoid a dedicated
//! dispatcher thread; the equivalent here is a single `tokio::sync::Mutex`
//! guarding both the free list and the waiter queue together, which gets
//! the same wake-loss-free, strictly-FIFO admission order without a
//! separate scheduling pass (documented as a deliberate simplification in
//! DESIGN.md — the CAS-guarded worker loop collapses to ordinary mutual
//! exclusion once there is no OS completion port to avoid blocking).

use std::collections::VecDeque;

use tokio::sync::{Mutex, oneshot};

use crate::errors::{Error, Result};

use super::{context::EventContext, pool::EventPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionMode {
    /// Reject with `Error::CommandRejected` when the pool is exhausted.
    NonBlocking,
    /// Park until a context becomes available.
    Blocking,
}

struct Waiters {
    queue: VecDeque<oneshot::Sender<EventContext>>,
}

/// Fair admission queue over a fixed-size [`EventPool`].
pub struct AsyncCommandQueue {
    pool: EventPool,
    mode: AdmissionMode,
    waiters: Mutex<Waiters>,
}

impl AsyncCommandQueue {
    pub fn new(pool: EventPool, mode: AdmissionMode) -> Self {
        AsyncCommandQueue { pool, mode, waiters: Mutex::new(Waiters { queue: VecDeque::new() }) }
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Acquires a context, honoring the admission mode.
    pub async fn acquire(&self) -> Result<EventContext> {
        // Fast path: a context may be free with no one ahead of us.
        {
            let waiters = self.waiters.lock().await;
            if waiters.queue.is_empty() {
                if let Some(ctx) = self.pool.try_acquire().await {
                    return Ok(ctx);
                }
            }
        }
        match self.mode {
            AdmissionMode::NonBlocking => Err(Error::CommandRejected),
            AdmissionMode::Blocking => {
                let (tx, rx) = oneshot::channel();
                self.waiters.lock().await.queue.push_back(tx);
                rx.await.map_err(|_| Error::connection("admission queue closed before a context became available"))
            }
        }
    }

    /// Releases a context. Fairness invariant: the oldest parked waiter,
    /// if any, is served before the context is returned to the free list.
    pub async fn release(&self, ctx: EventContext) {
        let mut waiters = self.waiters.lock().await;
        while let Some(tx) = waiters.queue.pop_front() {
            match tx.send(ctx) {
                Ok(()) => return,
                Err(returned) => {
                    // Waiter gave up (cancelled) before we could hand it
                    // off; try the next one in FIFO order.
                    drop(waiters);
                    return self.release_inner(returned).await;
                }
            }
        }
        drop(waiters);
        self.pool.release(ctx).await;
    }

    async fn release_inner(&self, ctx: EventContext) {
        Box::pin(self.release(ctx)).await
    }
}
