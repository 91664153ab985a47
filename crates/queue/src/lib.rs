//! Background work for Janta Garage.
//!
//! - **Scheduler**: the periodic overdue sweep
//! - **Pub/Sub**: fans live events out to every server instance over Redis

pub mod pubsub;
pub mod scheduler;

pub use pubsub::{RedisPubSub, UserEventEnvelope, channels as pubsub_channels};
pub use scheduler::{JobExecutor, SchedulerConfig, run_scheduler};
