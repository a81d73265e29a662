//! Audio -> UI column handoff.
//!
//! A pre-allocated single-producer / single-consumer ring that never blocks
//! either side. When the UI falls behind, the producer overwrites the oldest
//! pending column.
//!
//! Each slot carries a sequence stamp. The producer zeroes the stamp, writes
//! the four values, then stores `seq + 1`. The consumer only accepts a slot
//! whose stamp equals the sequence it expects both before and after reading
//! the values, so a slot overwritten mid-read is skipped instead of torn.

use super::column::VisualColumn;
use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

struct Slot {
    stamp: AtomicU64,
    values: [AtomicU32; 4],
}

impl Slot {
    fn new() -> Self {
        Self {
            stamp: AtomicU64::new(0),
            values: [
                AtomicU32::new(0),
                AtomicU32::new(0),
                AtomicU32::new(0),
                AtomicU32::new(0),
            ],
        }
    }
}

struct ColumnRing {
    slots: Box<[Slot]>,
    // Total columns ever published.
    head: AtomicU64,
    // Consumer's read cursor, only used by the producer for overflow counting.
    read: AtomicU64,
}

/// Creates a connected producer/consumer pair holding `capacity` columns.
pub fn column_channel(capacity: usize) -> (ColumnProducer, ColumnConsumer) {
    let capacity = capacity.max(1);
    let ring = Arc::new(ColumnRing {
        slots: (0..capacity).map(|_| Slot::new()).collect(),
        head: AtomicU64::new(0),
        read: AtomicU64::new(0),
    });
    (
        ColumnProducer {
            ring: ring.clone(),
            next: 0,
        },
        ColumnConsumer {
            ring,
            read: 0,
            dropped: 0,
        },
    )
}

/// Audio-thread end of the column ring.
pub struct ColumnProducer {
    ring: Arc<ColumnRing>,
    next: u64,
}

impl ColumnProducer {
    /// Publishes a column. Returns `true` if an unread column was overwritten.
    #[inline]
    pub fn push(&mut self, column: VisualColumn) -> bool {
        let ring = &*self.ring;
        let capacity = ring.slots.len() as u64;
        let seq = self.next;
        let slot = &ring.slots[(seq % capacity) as usize];

        slot.stamp.store(0, Ordering::Relaxed);
        fence(Ordering::Release);
        slot.values[0].store(column.input_rms.to_bits(), Ordering::Relaxed);
        slot.values[1].store(column.input_peak.to_bits(), Ordering::Relaxed);
        slot.values[2].store(column.output_rms.to_bits(), Ordering::Relaxed);
        slot.values[3].store(column.gain_db.to_bits(), Ordering::Relaxed);
        slot.stamp.store(seq + 1, Ordering::Release);

        self.next = seq + 1;
        ring.head.store(self.next, Ordering::Release);

        let unread = seq.saturating_sub(ring.read.load(Ordering::Relaxed));
        unread >= capacity
    }

    pub fn capacity(&self) -> usize {
        self.ring.slots.len()
    }
}

/// UI-thread end of the column ring.
pub struct ColumnConsumer {
    ring: Arc<ColumnRing>,
    read: u64,
    dropped: u64,
}

impl ColumnConsumer {
    /// Visits every intact unread column, oldest first, and returns how many
    /// were delivered. At most `capacity` columns are visited per call.
    pub fn drain<F: FnMut(VisualColumn)>(&mut self, mut f: F) -> usize {
        let ring = &*self.ring;
        let capacity = ring.slots.len() as u64;
        let head = ring.head.load(Ordering::Acquire);
        let start = self.read.max(head.saturating_sub(capacity));
        self.dropped += start - self.read;

        let mut delivered = 0;
        for seq in start..head {
            let slot = &ring.slots[(seq % capacity) as usize];
            let before = slot.stamp.load(Ordering::Acquire);
            if before != seq + 1 {
                self.dropped += 1;
                continue;
            }
            let column = VisualColumn {
                input_rms: f32::from_bits(slot.values[0].load(Ordering::Relaxed)),
                input_peak: f32::from_bits(slot.values[1].load(Ordering::Relaxed)),
                output_rms: f32::from_bits(slot.values[2].load(Ordering::Relaxed)),
                gain_db: f32::from_bits(slot.values[3].load(Ordering::Relaxed)),
            };
            fence(Ordering::Acquire);
            if slot.stamp.load(Ordering::Relaxed) != before {
                self.dropped += 1;
                continue;
            }
            f(column);
            delivered += 1;
        }

        self.read = head;
        ring.read.store(head, Ordering::Relaxed);
        delivered
    }

    /// Columns published but not yet drained (capped at capacity).
    pub fn pending(&self) -> usize {
        let head = self.ring.head.load(Ordering::Acquire);
        (head - self.read).min(self.ring.slots.len() as u64) as usize
    }

    /// Columns lost to overwrites since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(v: f32) -> VisualColumn {
        VisualColumn {
            input_rms: v,
            input_peak: v * 2.0,
            output_rms: v * 3.0,
            gain_db: -v,
        }
    }

    fn drain_all(consumer: &mut ColumnConsumer) -> Vec<VisualColumn> {
        let mut out = Vec::new();
        consumer.drain(|c| out.push(c));
        out
    }

    #[test]
    fn test_fifo_order() {
        let (mut tx, mut rx) = column_channel(8);
        for i in 0..5 {
            assert!(!tx.push(col(i as f32)));
        }
        assert_eq!(rx.pending(), 5);
        let got = drain_all(&mut rx);
        assert_eq!(got, (0..5).map(|i| col(i as f32)).collect::<Vec<_>>());
        assert_eq!(rx.pending(), 0);
        assert!(drain_all(&mut rx).is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let (mut tx, mut rx) = column_channel(4);
        let mut overwritten = 0;
        for i in 0..10 {
            if tx.push(col(i as f32)) {
                overwritten += 1;
            }
        }
        assert_eq!(overwritten, 6);

        let got = drain_all(&mut rx);
        assert_eq!(got, (6..10).map(|i| col(i as f32)).collect::<Vec<_>>());
        assert_eq!(rx.dropped(), 6);
    }

    #[test]
    fn test_consumed_columns_are_not_redelivered() {
        let (mut tx, mut rx) = column_channel(4);
        tx.push(col(1.0));
        tx.push(col(2.0));
        assert_eq!(rx.drain(|_| {}), 2);

        // Reading freed the ring: four more fit without overwriting
        for i in 0..4 {
            assert!(!tx.push(col(10.0 + i as f32)));
        }
        let got = drain_all(&mut rx);
        assert_eq!(got.len(), 4);
        assert_eq!(got[0], col(10.0));
        assert_eq!(rx.dropped(), 0);
    }

    #[test]
    fn test_concurrent_handoff_is_ordered() {
        let (mut tx, mut rx) = column_channel(16);
        let producer = std::thread::spawn(move || {
            for i in 0..20_000u32 {
                tx.push(col(i as f32));
            }
        });

        let mut last = -1.0f32;
        let mut seen = 0usize;
        loop {
            let finished = producer.is_finished();
            rx.drain(|c| {
                // Never torn: all four fields belong to the same push
                assert_eq!(c.input_peak, c.input_rms * 2.0);
                assert_eq!(c.gain_db, -c.input_rms);
                assert!(c.input_rms > last);
                last = c.input_rms;
                seen += 1;
            });
            if finished {
                break;
            }
            std::thread::yield_now();
        }
        producer.join().expect("producer thread");
        rx.drain(|_| seen += 1);

        assert!(seen > 0);
        assert_eq!(seen as u64 + rx.dropped(), 20_000);
    }
}
