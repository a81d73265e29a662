//! Sliding-window RMS detector.
//!
//! # Contract
//! - Squared samples live in a circular buffer of `round(window_ms * sr / 1000)`
//!   entries (minimum 1). Each new sample evicts exactly one old one.
//! - The running sum is kept in f64 and clamped to >= 0 after every update.
//! - Reports `gain_to_db(sqrt(sum / N), MIN_DB)`, or `MIN_DB` when the sum
//!   is not positive.
//!
//! # Allocation
//! `prepare` sizes the buffer for the largest supported window, so window
//! changes inside that range only re-zero the active region. Growing past it
//! reallocates and must stay on a configuration path.

use crate::dsp::utils::{db_to_gain, gain_to_db, MIN_DB};
use crate::meters::AtomicF32;
use assert_no_alloc::permit_alloc;
use std::sync::Arc;

pub const DEFAULT_WINDOW_MS: f32 = 50.0;
pub const MIN_WINDOW_MS: f32 = 10.0;
pub const MAX_WINDOW_MS: f32 = 100.0;

/// Window changes smaller than this are ignored.
const WINDOW_EPSILON_MS: f32 = 0.01;

/// Published half of an [`RmsDetector`].
#[derive(Debug)]
pub struct RmsShared {
    level_db: AtomicF32,
}

impl RmsShared {
    fn new() -> Self {
        Self {
            level_db: AtomicF32::new(MIN_DB),
        }
    }

    pub fn level_db(&self) -> f32 {
        self.level_db.load()
    }

    /// Linear RMS, or exactly 0 while the level sits on the floor.
    pub fn level_linear(&self) -> f32 {
        let db = self.level_db();
        if db <= MIN_DB {
            0.0
        } else {
            db_to_gain(db)
        }
    }
}

pub struct RmsDetector {
    shared: Arc<RmsShared>,
    // Squared samples. Only the first `len` entries are in the window.
    squares: Vec<f32>,
    len: usize,
    cursor: usize,
    running_sum: f64,
    last_level_db: f32,
    sample_rate: f32,
    window_ms: f32,
}

impl RmsDetector {
    pub fn new(sample_rate: f32, window_ms: f32) -> Self {
        let mut detector = Self {
            shared: Arc::new(RmsShared::new()),
            squares: vec![0.0; 1],
            len: 1,
            cursor: 0,
            running_sum: 0.0,
            last_level_db: MIN_DB,
            sample_rate: 0.0,
            window_ms: window_ms.clamp(MIN_WINDOW_MS, MAX_WINDOW_MS),
        };
        detector.prepare(sample_rate, detector.window_ms);
        detector
    }

    /// Sizes the buffer for `sample_rate` and resets all state.
    ///
    /// A non-positive or non-finite sample rate leaves the detector untouched.
    pub fn prepare(&mut self, sample_rate: f32, window_ms: f32) {
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return;
        }
        self.sample_rate = sample_rate;
        if window_ms.is_finite() {
            self.window_ms = window_ms.clamp(MIN_WINDOW_MS, MAX_WINDOW_MS);
        }

        let capacity = Self::window_len(MAX_WINDOW_MS.max(self.window_ms), sample_rate);
        self.squares = vec![0.0; capacity];
        self.len = Self::window_len(self.window_ms, sample_rate);
        self.reset();
    }

    /// Changes the window length. History is discarded.
    pub fn set_window_size(&mut self, window_ms: f32) {
        if !window_ms.is_finite() {
            return;
        }
        let window_ms = window_ms.clamp(MIN_WINDOW_MS, MAX_WINDOW_MS);
        if (window_ms - self.window_ms).abs() < WINDOW_EPSILON_MS {
            return;
        }
        self.window_ms = window_ms;

        let len = Self::window_len(window_ms, self.sample_rate);
        if len > self.squares.len() {
            self.squares = permit_alloc(|| vec![0.0; len]);
        }
        self.len = len;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.squares.fill(0.0);
        self.cursor = 0;
        self.running_sum = 0.0;
        self.last_level_db = MIN_DB;
        self.shared.level_db.store(MIN_DB);
    }

    /// Advances the window by one sample without publishing.
    #[inline]
    pub fn next_level_db(&mut self, x: f32) -> f32 {
        let sq = x * x;
        let old = self.squares[self.cursor];
        self.squares[self.cursor] = sq;
        self.running_sum += sq as f64 - old as f64;
        if self.running_sum < 0.0 {
            self.running_sum = 0.0;
        }
        self.cursor += 1;
        if self.cursor >= self.len {
            self.cursor = 0;
        }

        self.last_level_db = if self.running_sum > 0.0 {
            let mean_sq = self.running_sum / self.len as f64;
            gain_to_db(mean_sq.sqrt() as f32, MIN_DB)
        } else {
            MIN_DB
        };
        self.last_level_db
    }

    pub fn process_sample(&mut self, x: f32) -> f32 {
        let db = self.next_level_db(x);
        self.publish();
        db
    }

    /// Processes a block and publishes the final level once.
    pub fn process_block(&mut self, xs: &[f32]) -> f32 {
        for &x in xs {
            self.next_level_db(x);
        }
        self.publish();
        self.last_level_db
    }

    /// Stores the most recent level for the UI.
    #[inline]
    pub fn publish(&self) {
        self.shared.level_db.store(self.last_level_db);
    }

    pub fn current_level_db(&self) -> f32 {
        self.shared.level_db()
    }

    pub fn current_level_linear(&self) -> f32 {
        self.shared.level_linear()
    }

    pub fn shared(&self) -> Arc<RmsShared> {
        self.shared.clone()
    }

    pub fn window_len_samples(&self) -> usize {
        self.len
    }

    pub fn window_ms(&self) -> f32 {
        self.window_ms
    }

    fn window_len(window_ms: f32, sample_rate: f32) -> usize {
        ((window_ms * sample_rate / 1000.0).round() as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_length() {
        let det = RmsDetector::new(48000.0, 50.0);
        assert_eq!(det.window_len_samples(), 2400);

        let det = RmsDetector::new(44100.0, 10.0);
        assert_eq!(det.window_len_samples(), 441);
    }

    #[test]
    fn test_silence_reports_floor() {
        let mut det = RmsDetector::new(48000.0, 50.0);
        for _ in 0..5000 {
            assert_eq!(det.next_level_db(0.0), MIN_DB);
        }
        det.publish();
        assert_eq!(det.current_level_db(), MIN_DB);
        assert_eq!(det.current_level_linear(), 0.0);
    }

    #[test]
    fn test_constant_converges_after_one_window() {
        let mut det = RmsDetector::new(48000.0, 20.0);
        let n = det.window_len_samples();
        for _ in 0..n {
            det.next_level_db(0.5);
        }
        det.publish();
        assert!((det.current_level_linear() - 0.5).abs() < 1e-5);
        assert!((det.current_level_db() - gain_to_db(0.5, MIN_DB)).abs() < 1e-4);
    }

    #[test]
    fn test_eviction_returns_to_floor() {
        let mut det = RmsDetector::new(48000.0, 10.0);
        let n = det.window_len_samples();
        for _ in 0..n {
            det.next_level_db(0.8);
        }
        let mut last = 0.0;
        for _ in 0..n {
            last = det.next_level_db(0.0);
        }
        assert!(last <= -99.0);
    }

    #[test]
    fn test_block_publishes_once_at_end() {
        let mut det = RmsDetector::new(48000.0, 10.0);
        let block = [0.25f32; 480];
        let level = det.process_block(&block);
        assert_eq!(det.current_level_db(), level);
        assert!((det.current_level_linear() - 0.25).abs() < 1e-5);

        // next_level_db alone does not touch the published value
        det.next_level_db(0.0);
        assert_eq!(det.current_level_db(), level);
    }

    #[test]
    fn test_resize_within_capacity() {
        let mut det = RmsDetector::new(48000.0, 50.0);
        for _ in 0..1000 {
            det.next_level_db(0.3);
        }
        det.set_window_size(20.0);
        assert_eq!(det.window_len_samples(), 960);
        assert_eq!(det.current_level_db(), MIN_DB);

        let level = det.process_sample(0.5);
        assert!(level.is_finite());
        assert!(level > MIN_DB);
    }

    #[test]
    fn test_tiny_resize_ignored() {
        let mut det = RmsDetector::new(48000.0, 50.0);
        for _ in 0..100 {
            det.next_level_db(0.3);
        }
        let before = det.next_level_db(0.3);
        det.set_window_size(50.005);
        let after = det.next_level_db(0.3);
        assert!(after >= before);
        assert_eq!(det.window_len_samples(), 2400);
    }

    #[test]
    fn test_window_is_clamped() {
        let mut det = RmsDetector::new(48000.0, 50.0);
        det.set_window_size(1000.0);
        assert_eq!(det.window_len_samples(), 4800);
        det.set_window_size(0.0);
        assert_eq!(det.window_len_samples(), 480);
        det.set_window_size(f32::NAN);
        assert_eq!(det.window_len_samples(), 480);
    }

    #[test]
    fn test_invalid_sample_rate_is_noop() {
        let mut det = RmsDetector::new(48000.0, 50.0);
        det.prepare(0.0, 50.0);
        assert_eq!(det.window_len_samples(), 2400);
        det.prepare(-44100.0, 50.0);
        assert_eq!(det.window_len_samples(), 2400);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut det = RmsDetector::new(48000.0, 10.0);
        for _ in 0..100 {
            det.process_sample(0.7);
        }
        det.reset();
        let once = (det.current_level_db(), det.next_level_db(0.1));
        det.reset();
        det.reset();
        let twice = (det.current_level_db(), det.next_level_db(0.1));
        assert_eq!(once, twice);
    }
}
