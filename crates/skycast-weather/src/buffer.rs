//! Bounded, arrival-ordered store of recent readings.
//!
//! Appending at capacity evicts the oldest reading. Index 0 of any
//! snapshot or series is always the oldest retained sample.

use std::collections::VecDeque;

use crate::types::Reading;

/// Default number of readings kept per session
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct SampleBuffer {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl SampleBuffer {
    /// Create an empty buffer. A zero capacity is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a reading, dropping the oldest one if the buffer is full.
    pub fn append(&mut self, reading: Reading) {
        self.readings.push_back(reading);
        if self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    /// Most recently appended reading
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// Owned copy of the buffer, oldest first
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.iter().copied().collect()
    }

    /// Temperature series indexed by arrival order
    pub fn temperatures(&self) -> Vec<f64> {
        self.series(|r| r.temperature)
    }

    /// Humidity series indexed by arrival order
    pub fn humidities(&self) -> Vec<f64> {
        self.series(|r| r.humidity)
    }

    fn series(&self, f: impl Fn(&Reading) -> f64) -> Vec<f64> {
        self.readings.iter().map(f).collect()
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn reading(i: i64) -> Reading {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Reading::new(base + Duration::minutes(i), i as f64, 50.0 + i as f64, 1000.0)
    }

    #[test]
    fn test_starts_empty() {
        let buf = SampleBuffer::default();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), DEFAULT_CAPACITY);
        assert!(buf.latest().is_none());
        assert!(buf.snapshot().is_empty());
    }

    #[test]
    fn test_append_preserves_arrival_order() {
        let mut buf = SampleBuffer::new(5);
        for i in 0..3 {
            buf.append(reading(i));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.temperatures(), vec![0.0, 1.0, 2.0]);
        assert_eq!(buf.latest(), Some(&reading(2)));
    }

    #[test]
    fn test_overflow_keeps_last_capacity_readings() {
        let mut buf = SampleBuffer::default();
        for i in 0..137 {
            buf.append(reading(i));
            assert!(buf.len() <= DEFAULT_CAPACITY);
        }

        assert_eq!(buf.len(), DEFAULT_CAPACITY);
        let expected: Vec<Reading> = (87..137).map(reading).collect();
        assert_eq!(buf.snapshot(), expected);
    }

    #[test]
    fn test_eviction_at_exact_boundary() {
        let mut buf = SampleBuffer::new(3);
        for i in 0..3 {
            buf.append(reading(i));
        }
        assert_eq!(buf.temperatures(), vec![0.0, 1.0, 2.0]);

        buf.append(reading(3));
        assert_eq!(buf.temperatures(), vec![1.0, 2.0, 3.0]);
        assert_eq!(buf.humidities(), vec![51.0, 52.0, 53.0]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut buf = SampleBuffer::new(2);
        buf.append(reading(0));
        let snap = buf.snapshot();
        buf.append(reading(1));
        buf.append(reading(2));
        assert_eq!(snap, vec![reading(0)]);
        assert_eq!(buf.snapshot(), vec![reading(1), reading(2)]);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut buf = SampleBuffer::new(0);
        buf.append(reading(0));
        buf.append(reading(1));
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.snapshot(), vec![reading(1)]);
    }

    #[test]
    fn test_clear() {
        let mut buf = SampleBuffer::new(4);
        buf.append(reading(0));
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 4);
    }
}
