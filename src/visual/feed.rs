//! UI-side end of the visual pipeline.
//!
//! Driven by the editor timer (at most [`REFRESH_RATE_HZ`]). Each tick drains
//! the column ring into the [`WaveformHistory`], fades the gain curve in or
//! out depending on input activity, and reports any audio-thread diagnostics.

use super::column::VisualColumn;
use super::history::WaveformHistory;
use super::queue::ColumnConsumer;
use crate::diagnostics::EventReceiver;
use crate::dsp::utils::{gain_to_db, MIN_DB, SILENCE_THRESHOLD_DB};

/// Columns the audio thread can publish before the oldest is overwritten.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

pub const REFRESH_RATE_HZ: f32 = 144.0;

/// Time constant of the gain curve fade (seconds).
const OPACITY_TAU_S: f32 = 0.150;

pub struct VisualFeed {
    columns: ColumnConsumer,
    events: EventReceiver,
    history: WaveformHistory,
    opacity: f32,
    active: bool,
}

impl VisualFeed {
    pub(crate) fn new(columns: ColumnConsumer, events: EventReceiver) -> Self {
        Self {
            columns,
            events,
            history: WaveformHistory::default(),
            opacity: 0.0,
            active: false,
        }
    }

    /// One UI timer tick, `dt_seconds` after the previous one.
    ///
    /// Returns the number of columns added to the history.
    pub fn tick(&mut self, dt_seconds: f32) -> usize {
        let opacity = self.opacity;
        let history = &mut self.history;
        let active = &mut self.active;
        let drained = self.columns.drain(|column: VisualColumn| {
            *active = gain_to_db(column.input_peak, MIN_DB) > SILENCE_THRESHOLD_DB;
            history.push(column, opacity);
        });

        let target = if self.active { 1.0 } else { 0.0 };
        if dt_seconds.is_finite() && dt_seconds > 0.0 {
            let a = (-dt_seconds / OPACITY_TAU_S).exp();
            self.opacity = target + (self.opacity - target) * a;
        }

        self.events.report();
        drained
    }

    /// Current gain curve opacity in [0, 1].
    pub fn gain_curve_opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn history(&self) -> &WaveformHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut WaveformHistory {
        &mut self.history
    }

    /// Columns lost because the UI fell behind.
    pub fn dropped_columns(&self) -> u64 {
        self.columns.dropped()
    }
}
