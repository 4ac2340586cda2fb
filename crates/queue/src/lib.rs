//! Background delivery queue for the delayed notifier.

pub mod jobs;
pub mod publisher;
pub mod scheduler;
pub mod workers;

pub use jobs::SendJob;
pub use publisher::{channel_namespace, RedisQueuePublisher};
pub use scheduler::{run_scheduler, SchedulerConfig};
pub use workers::{send_worker, SendContext};
