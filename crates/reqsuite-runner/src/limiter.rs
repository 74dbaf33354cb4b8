//! Counting semaphore bounding how many tests execute at once

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Slots {
    in_flight: usize,
    peak: usize,
}

/// Global concurrency limiter shared by every dispatched test.
#[derive(Debug)]
pub struct Limiter {
    capacity: usize,
    slots: Mutex<Slots>,
    freed: Condvar,
}

/// Held while a test runs; releases its slot on drop.
#[derive(Debug)]
pub struct Permit<'a> {
    limiter: &'a Limiter,
}

impl Limiter {
    /// A capacity of 0 is raised to 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: Mutex::new(Slots::default()),
            freed: Condvar::new(),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block until a slot is free, then take it.
    pub fn acquire(&self) -> Permit<'_> {
        let mut slots = self.lock();
        while slots.in_flight >= self.capacity {
            slots = self
                .freed
                .wait(slots)
                .unwrap_or_else(PoisonError::into_inner);
        }
        slots.in_flight += 1;
        slots.peak = slots.peak.max(slots.in_flight);
        Permit { limiter: self }
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Highest number of slots ever held at once.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.lock().peak
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut slots = self.limiter.lock();
        slots.in_flight -= 1;
        drop(slots);
        self.limiter.freed.notify_one();
    }
}
