//! Audio-thread diagnostics.
//!
//! The audio thread must not log. It counts noteworthy conditions while it
//! runs and, once per block, pushes at most one event per kind into a
//! pre-allocated SPSC queue. The UI thread drains the queue and reports each
//! event through `log`.

use log::warn;
use ringbuf::{Consumer, Producer, RingBuffer};

const EVENT_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiderEvent {
    /// NaN or infinite samples were flushed to zero.
    NonFiniteInput { samples: u32 },
    /// Visual columns were overwritten before the UI drained them.
    ColumnsOverwritten { count: u32 },
}

pub fn event_channel() -> (EventSender, EventReceiver) {
    let (producer, consumer) = RingBuffer::<RiderEvent>::new(EVENT_CAPACITY).split();
    (
        EventSender {
            producer,
            non_finite: 0,
            overwritten: 0,
        },
        EventReceiver { consumer },
    )
}

/// Audio-thread side. Counting and flushing never allocate or block.
pub struct EventSender {
    producer: Producer<RiderEvent>,
    non_finite: u32,
    overwritten: u32,
}

impl EventSender {
    #[inline]
    pub fn note_non_finite(&mut self) {
        self.non_finite = self.non_finite.saturating_add(1);
    }

    #[inline]
    pub fn note_column_overwritten(&mut self) {
        self.overwritten = self.overwritten.saturating_add(1);
    }

    /// Pushes the pending counts. Counts that do not fit stay pending
    /// and go out with a later flush.
    pub fn flush(&mut self) {
        if self.non_finite > 0
            && self
                .producer
                .push(RiderEvent::NonFiniteInput {
                    samples: self.non_finite,
                })
                .is_ok()
        {
            self.non_finite = 0;
        }
        if self.overwritten > 0
            && self
                .producer
                .push(RiderEvent::ColumnsOverwritten {
                    count: self.overwritten,
                })
                .is_ok()
        {
            self.overwritten = 0;
        }
    }
}

/// UI-thread side.
pub struct EventReceiver {
    consumer: Consumer<RiderEvent>,
}

impl EventReceiver {
    pub fn pop(&mut self) -> Option<RiderEvent> {
        self.consumer.pop()
    }

    /// Drains every pending event into the log. Returns how many were reported.
    pub fn report(&mut self) -> usize {
        let mut reported = 0;
        while let Some(event) = self.consumer.pop() {
            match event {
                RiderEvent::NonFiniteInput { samples } => {
                    warn!("flushed {} non-finite samples to zero", samples);
                }
                RiderEvent::ColumnsOverwritten { count } => {
                    warn!("visual feed fell behind, {} columns overwritten", count);
                }
            }
            reported += 1;
        }
        reported
    }
}
