//! Bounded pool of mount slots.
//!
//! Every in-flight mount holds exactly one [`SlotPermit`]. A permit is handed
//! from the manager to the [`MountHandle`](crate::handle::MountHandle) it
//! creates and goes back to the pool when the handle releases it.

use std::{path::Path, sync::Arc};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{MountError, Result};

pub const DEFAULT_CONCURRENCY: usize = 3;

#[derive(Debug, Clone)]
pub struct SlotPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Default for SlotPool {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl SlotPool {
    /// # Panics
    ///
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "slot pool capacity must be > 0");
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a free slot. Slots are granted first come, first served.
    ///
    /// Returns [`MountError::Cancelled`] if `cancel` fires before a slot frees up.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<SlotPermit> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MountError::Cancelled),
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit,
        };
        // The semaphore is never closed.
        let permit = permit.map_err(|_| MountError::Cancelled)?;
        tracing::trace!(
            "Acquired mount slot, {} of {} free",
            self.available(),
            self.capacity
        );
        Ok(SlotPermit {
            _permit: permit,
            pool: self.clone(),
        })
    }
}

/// One held slot. Dropping it returns the slot to its pool.
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
    pool: SlotPool,
}

impl SlotPermit {
    /// Returns the slot on behalf of the mount at `mount_point`.
    pub fn release(self, mount_point: &Path) {
        let pool = self.pool.clone();
        drop(self);
        tracing::debug!(
            "Released mount slot for {}, {} of {} free",
            mount_point.display(),
            pool.available(),
            pool.capacity()
        );
    }
}
