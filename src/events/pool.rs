// SPDX-License-Identifier: Apache-2.0

//! Bounded pool of [`EventContext`] handles (spec §2 "Cluster", §4.5).

use std::{collections::VecDeque, sync::atomic::{AtomicU64, Ordering}};

use tokio::sync::{Mutex, Notify};

use crate::buffer::BufferPool;
use std::sync::Arc;

use super::context::EventContext;

/// Fixed-size pool of reusable I/O contexts, each holding a buffer
/// segment checked out from the shared [`BufferPool`] at construction.
pub struct EventPool {
    free: Mutex<VecDeque<EventContext>>,
    notify: Notify,
    capacity: usize,
}

impl EventPool {
    pub fn new(buffer_pool: &Arc<BufferPool>, capacity: usize) -> Self {
        let next_id = AtomicU64::new(0);
        let mut free = VecDeque::with_capacity(capacity);
        for _ in 0..capacity {
            let id = next_id.fetch_add(1, Ordering::Relaxed);
            free.push_back(EventContext::new(id, buffer_pool.get_next(0)));
        }
        EventPool { free: Mutex::new(free), notify: Notify::new(), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a context immediately if one is free, without waiting.
    pub async fn try_acquire(&self) -> Option<EventContext> {
        self.free.lock().await.pop_front()
    }

    /// Waits until a context is free.
    pub async fn acquire_blocking(&self) -> EventContext {
        loop {
            if let Some(ctx) = self.try_acquire().await {
                return ctx;
            }
            self.notify.notified().await;
        }
    }

    pub async fn release(&self, ctx: EventContext) {
        self.free.lock().await.push_back(ctx);
        self.notify.notify_one();
    }

    pub async fn available(&self) -> usize {
        self.free.lock().await.len()
    }
}
