//! Bounded pool of fixed-size byte buffers.
//!
//! The pool is an optional optimization; the per-request hot path owns a
//! plain growable buffer and does not go through it. The free list is
//! mutex-guarded while the usage counters are atomic, so the counters can
//! be sampled without taking the lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Bounded set of fixed-size buffers with usage accounting.
#[derive(Debug)]
pub struct BufferPool {
    slot_size: usize,
    max_buffers: usize,
    free: Mutex<Vec<Box<[u8]>>>,
    in_use: AtomicUsize,
    peak_in_use: AtomicUsize,
    total_acquired: AtomicUsize,
    double_releases: AtomicUsize,
}

impl BufferPool {
    /// Create a pool of at most `max_buffers` slots of `slot_size` bytes.
    #[must_use]
    pub fn new(slot_size: usize, max_buffers: usize) -> Arc<Self> {
        Arc::new(Self {
            slot_size,
            max_buffers,
            free: Mutex::new(Vec::new()),
            in_use: AtomicUsize::new(0),
            peak_in_use: AtomicUsize::new(0),
            total_acquired: AtomicUsize::new(0),
            double_releases: AtomicUsize::new(0),
        })
    }

    /// Take a zeroed buffer from the pool.
    ///
    /// Returns `None` when `max_buffers` are already out.
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> Option<PooledBuffer> {
        let mut current = self.in_use.load(Ordering::Acquire);
        loop {
            if current >= self.max_buffers {
                return None;
            }
            match self.in_use.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        self.total_acquired.fetch_add(1, Ordering::Relaxed);
        self.peak_in_use
            .fetch_max(self.in_use.load(Ordering::Acquire), Ordering::AcqRel);

        let data = {
            let mut free = self.free.lock();
            free.pop()
        }
        .map_or_else(
            || vec![0u8; self.slot_size].into_boxed_slice(),
            |mut buf| {
                buf.fill(0);
                buf
            },
        );

        Some(PooledBuffer {
            data: Some(data),
            pool: Arc::clone(self),
        })
    }

    /// Return a buffer to the free list.
    ///
    /// Releasing more buffers than are out is detected, counted, and
    /// otherwise ignored so the accounting can never underflow.
    pub fn release(&self, data: Box<[u8]>) {
        let mut current = self.in_use.load(Ordering::Acquire);
        loop {
            if current == 0 {
                self.double_releases.fetch_add(1, Ordering::Relaxed);
                return;
            }
            match self.in_use.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        let mut free = self.free.lock();
        if free.len() < self.max_buffers {
            free.push(data);
        }
    }

    /// Buffer slot size in bytes.
    #[must_use]
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Buffers currently out.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// High-water mark of concurrently outstanding buffers.
    #[must_use]
    pub fn peak_in_use(&self) -> usize {
        self.peak_in_use.load(Ordering::Acquire)
    }

    /// Total successful acquisitions over the pool's lifetime.
    #[must_use]
    pub fn total_acquired(&self) -> usize {
        self.total_acquired.load(Ordering::Relaxed)
    }

    /// Detected releases without a matching acquisition.
    #[must_use]
    pub fn double_releases(&self) -> usize {
        self.double_releases.load(Ordering::Relaxed)
    }
}

/// A buffer checked out of a [`BufferPool`], returned on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    data: Option<Box<[u8]>>,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    /// The buffer contents.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// Mutable buffer contents.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.release(data);
        }
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}
