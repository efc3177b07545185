//! Per-tick timing ring buffer.

use std::fmt;
use std::time::Duration;

/// Number of compute ticks kept.
pub const PERFORMANCE_LOG_CAPACITY: usize = 2000;

/// Fixed-size circular log of compute-tick durations in milliseconds.
#[derive(Debug, Clone)]
pub struct PerformanceLog {
    samples: Vec<f64>,
    cursor: usize,
    filled: usize,
}

/// Summary over the recorded samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfStats {
    pub samples: usize,
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

impl Default for PerformanceLog {
    fn default() -> Self {
        Self::with_capacity(PERFORMANCE_LOG_CAPACITY)
    }
}

impl PerformanceLog {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            cursor: 0,
            filled: 0,
        }
    }
    
    /// Writes a sample at the cursor and advances it circularly.
    pub fn record(&mut self, elapsed: Duration) {
        self.samples[self.cursor] = elapsed.as_secs_f64() * 1000.0;
        self.cursor = (self.cursor + 1) % self.samples.len();
        self.filled = (self.filled + 1).min(self.samples.len());
    }
    
    /// Next slot to be written.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
    
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }
    
    pub fn len(&self) -> usize {
        self.filled
    }
    
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }
    
    /// Most recent sample, in milliseconds.
    pub fn last_ms(&self) -> Option<f64> {
        if self.filled == 0 {
            return None;
        }
        let last = (self.cursor + self.samples.len() - 1) % self.samples.len();
        Some(self.samples[last])
    }
    
    /// Min/avg/max over the filled slots; `None` before the first tick.
    pub fn stats(&self) -> Option<PerfStats> {
        if self.filled == 0 {
            return None;
        }
        // Until the buffer wraps, the filled slots are exactly 0..filled.
        let window = &self.samples[..self.filled];
        let min_ms = window.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg_ms = window.iter().sum::<f64>() / self.filled as f64;
        Some(PerfStats {
            samples: self.filled,
            min_ms,
            avg_ms,
            max_ms,
        })
    }
}

impl fmt::Display for PerfStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stats for the past {} update cycles:", self.samples)?;
        writeln!(f, "Min: {:.3}ms", self.min_ms)?;
        writeln!(f, "Avg: {:.3}ms", self.avg_ms)?;
        write!(f, "Max: {:.3}ms", self.max_ms)
    }
}
