//! Admission-controlled connection accounting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Process-wide admission counter under `max_connections`.
///
/// Acquisition is a CAS loop so the ceiling can never be overshot under
/// concurrency; release is a single `fetch_sub` performed exactly once by
/// the permit's drop. There is no queue: when the pool is full the accept
/// path drops the socket, keeping memory bounded.
#[derive(Debug)]
pub struct ConnectionPool {
    active: AtomicUsize,
    max_connections: usize,
}

impl ConnectionPool {
    /// Create a pool admitting at most `max_connections` at once.
    #[must_use]
    pub fn new(max_connections: usize) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            max_connections,
        })
    }

    /// Try to take an admission slot.
    ///
    /// Returns `None` when the pool is at its ceiling; the caller is
    /// expected to drop the connection without queueing.
    #[must_use]
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionPermit> {
        let mut current = self.active.load(Ordering::Acquire);
        loop {
            if current >= self.max_connections {
                return None;
            }
            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(ConnectionPermit {
                        pool: Arc::clone(self),
                    });
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Currently admitted connections.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// The admission ceiling.
    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    fn release(&self) {
        self.active.fetch_sub(1, Ordering::Release);
    }
}

/// One admission slot, returned on drop.
///
/// The permit is held for the whole connection lifetime and releases its
/// slot exactly once on the connection's terminal path.
#[derive(Debug)]
pub struct ConnectionPermit {
    pool: Arc<ConnectionPool>,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.pool.release();
    }
}
