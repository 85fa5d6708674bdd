//! Rolling reading window

use serde::Serialize;
use std::collections::VecDeque;

/// Default number of readings kept per device
pub const DEFAULT_WINDOW_CAPACITY: usize = 50;

/// One charted sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub time: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

/// Bounded FIFO of readings for one device
#[derive(Debug, Clone)]
pub struct DeviceSeries {
    device_id: String,
    capacity: usize,
    readings: VecDeque<Reading>,
}

impl DeviceSeries {
    pub fn new(device_id: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            device_id: device_id.into(),
            capacity,
            readings: VecDeque::with_capacity(capacity),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a reading, evicting the oldest once full
    pub fn push(&mut self, reading: Reading) {
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Oldest first
    pub fn readings(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }
}
