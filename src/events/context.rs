// SPDX-License-Identifier: Apache-2.0

//! Reusable I/O context (spec §3 "EventContext", §4.5).

use crate::buffer::{BufferPool, BufferSegment};

/// Pooled I/O scheduling handle carrying a buffer segment.
///
/// In the source design this also carries a "socket-args" handle whose
/// user-token alternates between the owning command (in flight) and the
/// resting buffer segment (at rest in the pool) — the mechanism an I/O
/// completion-port callback uses to find its way back to the right
/// command. Atop `tokio`, ownership of the context *is* that alternation:
/// moving an `EventContext` out of the pool into an in-progress
/// [`crate::commands::AsyncCommand`] and back is enough to keep the
/// single-owner invariant the spec calls for (spec §9 "Cyclic / back
/// references").
#[derive(Debug)]
pub struct EventContext {
    pub id: u64,
    pub segment: BufferSegment,
    /// The pooled segment this context started with, set aside whenever
    /// [`crate::buffer::BufferPool::get_next`] had to hand back an
    /// overflow (non-pooled) segment for an oversized message. Restored
    /// on release so the overflow buffer is dropped rather than returned
    /// to the pool (spec §4.1 "oversized messages").
    original_segment: Option<BufferSegment>,
}

impl EventContext {
    pub fn new(id: u64, segment: BufferSegment) -> Self {
        EventContext { id, segment, original_segment: None }
    }

    /// Swaps in an oversized segment, stashing the original pooled one to
    /// restore later.
    pub fn overflow_to(&mut self, segment: BufferSegment) {
        let original = std::mem::replace(&mut self.segment, segment);
        if self.original_segment.is_none() {
            self.original_segment = Some(original);
        }
    }

    /// Restores the original pooled segment before this context is
    /// released back to its [`crate::events::EventPool`], dropping
    /// whatever overflow buffer the command grew into.
    pub fn restore_original_segment(&mut self) {
        if let Some(original) = self.original_segment.take() {
            self.segment = original;
        }
    }

    /// Grows the held segment to fit `needed` bytes if it doesn't already
    /// (spec §4.5 "size_buffer"), checking out an overflow segment from
    /// `buffer_pool` when `needed` exceeds [`crate::buffer::BUFFER_CUTOFF`].
    pub fn ensure_capacity(&mut self, buffer_pool: &BufferPool, needed: usize) {
        if self.segment.capacity() >= needed {
            self.segment.size = needed;
            return;
        }
        self.overflow_to(buffer_pool.get_next(needed));
    }
}
