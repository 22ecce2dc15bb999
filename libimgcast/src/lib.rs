//! Imgcast - scheduled image posts for the social web
//!
//! This library queues image posts for Mastodon, Bluesky and webhook-relayed
//! platforms and publishes them once their posting time has passed.

pub mod caption;
pub mod config;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod router;
pub mod scheduler;
pub mod scheduling;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use caption::CaptionProcessor;
pub use config::Config;
pub use error::{ImgcastError, Result};
pub use router::{handle_event, Request, Response};
pub use scheduler::SchedulerEngine;
pub use store::{MemoryScheduleStore, ScheduleStore, SqliteScheduleStore};
pub use types::{Context, NewPost, ScheduleRecord, ScheduledPost, SweepResult};
