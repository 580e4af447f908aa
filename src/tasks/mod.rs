//! Background Tasks Module
//!
//! Periodic maintenance run alongside callers of the cache.
//!
//! # Tasks
//! - Expired sweep: drops entries past their TTL (default every 5 minutes)
//! - Unused sweep: drops entries never read within the idle threshold
//!   (default every hour)

mod sweeper;

pub use sweeper::{spawn_expired_sweeper, spawn_idle_sweeper, spawn_sweepers, SweeperHandles};
