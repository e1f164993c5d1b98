//! Fixed-capacity rolling sample windows.
//!
//! Two independent instances feed the speaker verifier and the wake-word
//! recognizer; they never alias and have different capacities.

use std::collections::VecDeque;

/// A fixed-capacity ordered sample window with FIFO eviction.
///
/// Appending beyond capacity drops the oldest samples. Length never exceeds
/// capacity and arrival order is preserved.
#[derive(Debug, Clone)]
pub struct RollingBuffer<T: Copy> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T: Copy> RollingBuffer<T> {
    /// Creates an empty buffer with the given capacity.
    ///
    /// A zero capacity is clamped to 1 so the buffer is always usable.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends samples in arrival order, evicting the oldest on overflow.
    pub fn extend(&mut self, samples: &[T]) {
        for &sample in samples {
            if self.samples.len() == self.capacity {
                self.samples.pop_front();
            }
            self.samples.push_back(sample);
        }
    }

    /// Copies the current content, oldest sample first.
    pub fn snapshot(&self) -> Vec<T> {
        self.samples.iter().copied().collect()
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if no samples are held.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples this buffer holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once the window has been fully populated.
    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Drops all samples without changing capacity.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl RollingBuffer<f32> {
    /// Creates a buffer sized to hold `secs` seconds at `sample_rate`.
    pub fn with_duration(secs: u32, sample_rate: u32) -> Self {
        Self::new((secs * sample_rate) as usize)
    }

    /// Duration of the held samples in seconds at the given rate.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        self.samples.len() as f32 / sample_rate as f32
    }
}
