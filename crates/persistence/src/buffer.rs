//! PersistenceBuffer - threshold-flushed sample buffer
//!
//! Lives inside a driver for the duration of one collection session. Its
//! length never exceeds the threshold after a `push` returns.

use contracts::SensorSample;

/// Ordered sample buffer with a flush threshold
#[derive(Debug)]
pub struct PersistenceBuffer {
    samples: Vec<SensorSample>,
    threshold: usize,
    flush_count: u64,
}

impl PersistenceBuffer {
    /// Create a buffer flushing every `threshold` samples (minimum 1)
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            samples: Vec::with_capacity(threshold),
            threshold,
            flush_count: 0,
        }
    }

    /// Append a sample
    ///
    /// # Returns
    /// The drained batch when the buffer reached the threshold
    pub fn push(&mut self, sample: SensorSample) -> Option<Vec<SensorSample>> {
        self.samples.push(sample);
        if self.samples.len() >= self.threshold {
            return self.take();
        }
        None
    }

    /// Drain whatever is buffered (final partial flush)
    ///
    /// Returns `None` when there is nothing to flush.
    pub fn drain(&mut self) -> Option<Vec<SensorSample>> {
        if self.samples.is_empty() {
            return None;
        }
        self.take()
    }

    /// Discard buffered samples without flushing
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Number of batches handed out so far
    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }

    fn take(&mut self) -> Option<Vec<SensorSample>> {
        self.flush_count += 1;
        Some(std::mem::replace(
            &mut self.samples,
            Vec::with_capacity(self.threshold),
        ))
    }
}
