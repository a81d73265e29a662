//! One visual column = 256 audio samples, averaged.

/// Audio samples folded into each column.
pub const SAMPLES_PER_COLUMN: usize = 256;

/// One column of the scrolling waveform. Levels are linear, gain is in dB.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VisualColumn {
    pub input_rms: f32,
    pub input_peak: f32,
    pub output_rms: f32,
    pub gain_db: f32,
}

/// Audio-thread accumulator that emits a [`VisualColumn`] every
/// [`SAMPLES_PER_COLUMN`] samples.
#[derive(Clone, Copy, Debug, Default)]
pub struct ColumnAccumulator {
    input_sum_sq: f32,
    input_peak: f32,
    output_sum_sq: f32,
    gain_sum: f32,
    count: usize,
}

impl ColumnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, input: f32, output: f32, gain_db: f32) -> Option<VisualColumn> {
        self.input_sum_sq += input * input;
        self.input_peak = self.input_peak.max(input.abs());
        self.output_sum_sq += output * output;
        self.gain_sum += gain_db;
        self.count += 1;

        if self.count < SAMPLES_PER_COLUMN {
            return None;
        }

        let n = SAMPLES_PER_COLUMN as f32;
        let column = VisualColumn {
            input_rms: (self.input_sum_sq / n).sqrt(),
            input_peak: self.input_peak,
            output_rms: (self.output_sum_sq / n).sqrt(),
            gain_db: self.gain_sum / n,
        };
        self.reset();
        Some(column)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Samples accumulated toward the next column.
    pub fn pending(&self) -> usize {
        self.count
    }
}
