pub mod metrics;
pub mod queue;
pub mod sampling;

pub use metrics::{QueueStats, QueueStatsSnapshot};
pub use queue::{
    AckQueue, DEFAULT_QUEUE_CAPACITY, Delivery, FLUSH_QUIET_WINDOW, QueueConfig, SubmitOutcome,
    inside_queue,
};
pub use sampling::{RandomSampler, Sampler, SeededSampler, accepts};
