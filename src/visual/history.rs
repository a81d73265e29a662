//! Fixed-width column image ring for the scrolling waveform.
//!
//! Columns are written at a moving cursor; nothing is ever shifted. Next to
//! each column the history keeps its normalised y positions (0 = top, 1 =
//! bottom) so path rendering is a straight walk over the buffers.

use super::column::VisualColumn;
use crate::dsp::utils::{gain_to_db, MIN_DB};

pub const DEFAULT_HISTORY_WIDTH: usize = 512;

/// Bottom of the level display (dBFS).
pub const LEVEL_FLOOR_DB: f32 = -60.0;

/// The gain curve spans +/- this many dB around the centre line.
pub const GAIN_DISPLAY_RANGE_DB: f32 = 24.0;

/// Normalised positions of one column.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColumnPositions {
    pub input_rms_y: f32,
    pub input_peak_y: f32,
    pub output_rms_y: f32,
    pub gain_y: f32,
    /// Gain curve opacity when the column was drawn.
    pub opacity: f32,
}

/// 0 dBFS maps to 0, [`LEVEL_FLOOR_DB`] and below to 1.
#[inline]
pub fn level_to_y(linear: f32) -> f32 {
    let db = gain_to_db(linear, MIN_DB);
    (db / LEVEL_FLOOR_DB).clamp(0.0, 1.0)
}

/// +range maps to 0, 0 dB to 0.5, -range to 1.
#[inline]
pub fn gain_to_y(gain_db: f32) -> f32 {
    (0.5 - gain_db / (2.0 * GAIN_DISPLAY_RANGE_DB)).clamp(0.0, 1.0)
}

pub struct WaveformHistory {
    columns: Vec<VisualColumn>,
    positions: Vec<ColumnPositions>,
    write_pos: usize,
    len: usize,
}

impl Default for WaveformHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WIDTH)
    }
}

impl WaveformHistory {
    pub fn new(width: usize) -> Self {
        let width = width.max(2);
        Self {
            columns: vec![VisualColumn::default(); width],
            positions: vec![ColumnPositions::default(); width],
            write_pos: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, column: VisualColumn, opacity: f32) {
        self.columns[self.write_pos] = column;
        self.positions[self.write_pos] = ColumnPositions {
            input_rms_y: level_to_y(column.input_rms),
            input_peak_y: level_to_y(column.input_peak),
            output_rms_y: level_to_y(column.output_rms),
            gain_y: gain_to_y(column.gain_db),
            opacity: opacity.clamp(0.0, 1.0),
        };
        self.write_pos = (self.write_pos + 1) % self.width();
        self.len = (self.len + 1).min(self.width());
    }

    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn newest(&self) -> Option<VisualColumn> {
        if self.len == 0 {
            return None;
        }
        Some(self.columns[(self.write_pos + self.width() - 1) % self.width()])
    }

    /// Stored columns, oldest first.
    pub fn columns(&self) -> impl Iterator<Item = &VisualColumn> + '_ {
        (0..self.len).map(move |i| &self.columns[self.slot(i)])
    }

    /// Stored positions, oldest first.
    pub fn positions(&self) -> impl Iterator<Item = &ColumnPositions> + '_ {
        (0..self.len).map(move |i| &self.positions[self.slot(i)])
    }

    /// Gain curve points in pixels, newest column on the right edge.
    pub fn gain_path(
        &self,
        width_px: f32,
        height_px: f32,
    ) -> impl Iterator<Item = (f32, f32)> + '_ {
        let step = width_px / (self.width() - 1) as f32;
        let first_x = width_px - (self.len.saturating_sub(1)) as f32 * step;
        self.positions()
            .enumerate()
            .map(move |(i, p)| (first_x + i as f32 * step, p.gain_y * height_px))
    }

    fn slot(&self, i: usize) -> usize {
        (self.write_pos + self.width() - self.len + i) % self.width()
    }
}
