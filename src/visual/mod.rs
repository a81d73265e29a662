pub mod column;
pub mod feed;
pub mod history;
pub mod queue;

pub use column::{ColumnAccumulator, VisualColumn, SAMPLES_PER_COLUMN};
pub use feed::{VisualFeed, DEFAULT_QUEUE_CAPACITY, REFRESH_RATE_HZ};
pub use history::{ColumnPositions, WaveformHistory, DEFAULT_HISTORY_WIDTH};
pub use queue::{column_channel, ColumnConsumer, ColumnProducer};
