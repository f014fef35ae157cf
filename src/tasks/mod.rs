//! Background Tasks Module
//!
//! Contains background tasks that run alongside foreground cache access.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries at a fixed interval and
//!   rewrites the stats file
//! - Write-behind: applies deferred disk writes in order

mod sweeper;
pub(crate) mod writer;

pub use sweeper::spawn_sweeper_task;
