// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity shared buffer arena with checkout/return, plus an
//! overflow path for oversized messages (spec §4.1).

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

/// Capacity of a single pooled buffer. Messages larger than this are
/// never cached: they are allocated per-use and dropped on release.
pub const BUFFER_CUTOFF: usize = 128 * 1024;

/// A byte range a command writes into and reads from.
///
/// Either a slice of a pooled shared buffer (`size <= BUFFER_CUTOFF`), or
/// a standalone heap allocation for an oversized message. The invariant
/// from spec §3 holds: pooled segments never exceed `BUFFER_CUTOFF`.
#[derive(Debug)]
pub struct BufferSegment {
    storage: Storage,
    pub offset: usize,
    pub size: usize,
    /// The `BufferPool` generation this segment was checked out under;
    /// used by `BufferPool::has_buffer_changed` to detect a pool resize
    /// that invalidated outstanding offsets.
    generation: u64,
}

#[derive(Debug)]
enum Storage {
    Pooled(Box<[u8; BUFFER_CUTOFF]>),
    Overflow(Vec<u8>),
}

impl BufferSegment {
    fn pooled(buf: Box<[u8; BUFFER_CUTOFF]>, size: usize, generation: u64) -> Self {
        BufferSegment { storage: Storage::Pooled(buf), offset: 0, size, generation }
    }

    fn overflow(size: usize) -> Self {
        BufferSegment {
            storage: Storage::Overflow(vec![0u8; size]),
            offset: 0,
            size,
            generation: 0,
        }
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self.storage, Storage::Pooled(_))
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.storage {
            Storage::Pooled(b) => &b[self.offset..self.offset + self.size],
            Storage::Overflow(v) => &v[self.offset..self.offset + self.size],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let offset = self.offset;
        let size = self.size;
        match &mut self.storage {
            Storage::Pooled(b) => &mut b[offset..offset + size],
            Storage::Overflow(v) => &mut v[offset..offset + size],
        }
    }

    /// Total backing capacity, as opposed to the currently addressed
    /// `size`. A command's `size_buffer()` step may grow `size` up to
    /// this without reallocating.
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Pooled(_) => BUFFER_CUTOFF - self.offset,
            Storage::Overflow(v) => v.len(),
        }
    }

    /// Reset `offset`/`size` to zero so the next `size_buffer()` call
    /// reallocates cleanly (used after a `has_buffer_changed` observation,
    /// spec §4.5 step 1).
    pub fn reset(&mut self) {
        self.offset = 0;
        self.size = 0;
    }
}

/// A finite pool of fixed-capacity buffers.
pub struct BufferPool {
    free: Mutex<VecDeque<Box<[u8; BUFFER_CUTOFF]>>>,
    capacity: usize,
    generation: AtomicU64,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        let mut free = VecDeque::with_capacity(capacity);
        for _ in 0..capacity {
            free.push_back(Box::new([0u8; BUFFER_CUTOFF]));
        }
        BufferPool { free: Mutex::new(free), capacity, generation: AtomicU64::new(0) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Checks out a segment sized for `size` bytes. Segments larger than
    /// `BUFFER_CUTOFF` bypass the pool entirely (spec §4.1).
    pub fn get_next(&self, size: usize) -> BufferSegment {
        if size > BUFFER_CUTOFF {
            return BufferSegment::overflow(size);
        }
        let generation = self.generation.load(Ordering::Acquire);
        let buf = self
            .free
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Box::new([0u8; BUFFER_CUTOFF]));
        BufferSegment::pooled(buf, size, generation)
    }

    /// Returns a segment to the pool. Overflow segments are dropped
    /// instead, per spec §4.1/§4.5 ("on release the original pooled
    /// segment is restored to the pool, not the overflow buffer").
    pub fn release(&self, segment: BufferSegment) {
        if let Storage::Pooled(buf) = segment.storage {
            let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
            if free.len() < self.capacity {
                free.push_back(buf);
            }
        }
    }

    /// Whether `segment` was checked out under a pool generation that has
    /// since been superseded (e.g. the pool was resized). Callers that
    /// observe `true` should reset the segment so the next `size_buffer()`
    /// call reallocates against the current generation.
    pub fn has_buffer_changed(&self, segment: &BufferSegment) -> bool {
        segment.is_pooled() && segment.generation != self.generation.load(Ordering::Acquire)
    }

    /// Bumps the pool generation, invalidating the offsets of any
    /// outstanding segment observed afterwards.
    pub fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_segments_are_capped_at_cutoff() {
        let pool = BufferPool::new(2);
        let seg = pool.get_next(1024);
        assert!(seg.is_pooled());
        assert!(seg.size <= BUFFER_CUTOFF);
    }

    #[test]
    fn oversized_segments_bypass_the_pool() {
        let pool = BufferPool::new(1);
        let seg = pool.get_next(BUFFER_CUTOFF + 1);
        assert!(!seg.is_pooled());
        assert_eq!(seg.size, BUFFER_CUTOFF + 1);
    }

    #[test]
    fn release_returns_pooled_segment_but_drops_overflow() {
        let pool = BufferPool::new(1);
        let seg = pool.get_next(10);
        pool.release(seg);
        assert_eq!(pool.free.lock().unwrap_or_else(|e| e.into_inner()).len(), 1);

        let overflow = pool.get_next(BUFFER_CUTOFF + 1);
        pool.release(overflow);
        assert_eq!(pool.free.lock().unwrap_or_else(|e| e.into_inner()).len(), 1);
    }

    #[test]
    fn generation_bump_is_observed_by_outstanding_segments() {
        let pool = BufferPool::new(1);
        let seg = pool.get_next(10);
        assert!(!pool.has_buffer_changed(&seg));
        pool.bump_generation();
        assert!(pool.has_buffer_changed(&seg));
    }
}
