// Copyright 2025 Cowboy AI, LLC.

//! Per-device current clock.
//!
//! A device advances its own counter once per locally authored event and
//! merges the clocks of events it receives. Both go through the same lock so
//! a merge can never overwrite a concurrent increment, and two events authored
//! on one device never share a clock.

use crate::identifiers::DeviceId;
use crate::vector_clock::VectorClock;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Single-writer owner of a device's current vector clock
#[derive(Debug)]
pub struct DeviceClock {
    device_id: DeviceId,
    current: Mutex<VectorClock>,
}

impl DeviceClock {
    /// Start a device with an empty clock
    pub fn new(device_id: DeviceId) -> Self {
        Self::resume(device_id, VectorClock::new())
    }

    /// Restore a device from a previously persisted clock
    pub fn resume(device_id: DeviceId, clock: VectorClock) -> Self {
        Self {
            device_id,
            current: Mutex::new(clock),
        }
    }

    /// The device this clock belongs to
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    // The guarded value is replaced wholesale, never partially updated, so a
    // poisoned lock still holds a consistent clock.
    fn lock(&self) -> MutexGuard<'_, VectorClock> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the current clock
    pub fn current(&self) -> VectorClock {
        self.lock().clone()
    }

    /// Advance this device's counter and return the new snapshot
    pub fn tick(&self) -> VectorClock {
        let mut guard = self.lock();
        let next = guard.increment(&self.device_id);
        *guard = next.clone();
        next
    }

    /// Advance the clock and build something from the new snapshot while
    /// still holding the authoring lock.
    ///
    /// If `author` fails the clock is left untouched, so a rejected event
    /// never burns a counter value.
    pub fn author<T, E, F>(&self, author: F) -> Result<T, E>
    where
        F: FnOnce(VectorClock) -> Result<T, E>,
    {
        let mut guard = self.lock();
        let next = guard.increment(&self.device_id);
        let built = author(next.clone())?;
        *guard = next;
        Ok(built)
    }

    /// Merge a foreign clock into the device clock
    pub fn observe(&self, foreign: &VectorClock) -> VectorClock {
        let mut guard = self.lock();
        let merged = guard.merge(foreign);
        debug!(
            device_id = %self.device_id,
            before = ?*guard,
            after = ?merged,
            "Merged foreign clock"
        );
        *guard = merged.clone();
        merged
    }
}
