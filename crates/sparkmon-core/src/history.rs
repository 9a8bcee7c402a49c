//! Bounded sample history for one counter.
//!
//! A [`CounterHistory`] samples its counter once per tick into a newest-first
//! window of at most [`HISTORY_SIZE`] values, and keeps an all-time peak that
//! survives eviction from that window.

use std::collections::VecDeque;

use crate::counter::Counter;
use crate::error::{Error, Result};

/// Default number of samples kept per counter.
pub const HISTORY_SIZE: usize = 100;

pub struct CounterHistory {
    counter: Counter,
    window: VecDeque<f64>,
    capacity: usize,
    real_max: f64,
}

impl CounterHistory {
    pub fn new(counter: Counter) -> Self {
        Self::with_capacity(counter, HISTORY_SIZE)
    }

    /// History keeping at most `capacity` samples (at least one).
    pub fn with_capacity(counter: Counter, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            counter,
            window: VecDeque::with_capacity(capacity + 1),
            capacity,
            real_max: 0.0,
        }
    }

    pub fn counter(&self) -> &Counter {
        &self.counter
    }

    /// Mutable access for relabelling (name, unit, display coefficient).
    pub fn counter_mut(&mut self) -> &mut Counter {
        &mut self.counter
    }

    /// Swap in a different counter, returning the old one.
    ///
    /// The window and the running peak belong to the previous counter's
    /// readings, so both start over.
    pub fn set_counter(&mut self, counter: Counter) -> Counter {
        self.window.clear();
        self.real_max = 0.0;
        std::mem::replace(&mut self.counter, counter)
    }

    /// Read the counter and push the reading at the front of the window.
    ///
    /// On error nothing is recorded and the window keeps its previous contents.
    pub fn sample(&mut self) -> Result<f64> {
        let value = self.counter.value()?;
        self.window.push_front(value);
        self.real_max = self.real_max.max(value);
        self.window.truncate(self.capacity);
        Ok(value)
    }

    /// Number of stored samples.
    pub fn count(&self) -> usize {
        self.window.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Sample at `index`, counting from the newest (`0`).
    pub fn at(&self, index: usize) -> Result<f64> {
        self.window
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index,
                count: self.window.len(),
            })
    }

    pub fn latest(&self) -> Option<f64> {
        self.window.front().copied()
    }

    /// Samples, newest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.window.iter().copied()
    }

    /// Display ceiling: the counter's own maximum, raised to any observed overshoot.
    pub fn max(&self) -> Result<f64> {
        Ok(self.counter.maximum()?.max(self.real_max))
    }

    /// Largest sample ever recorded, ignoring the counter's declared maximum.
    pub fn real_max(&self) -> f64 {
        self.real_max
    }
}
