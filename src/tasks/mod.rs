//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside cache operations.
//!
//! # Tasks
//! - Sweeper: Removes expired and stale cache entries at a fixed interval

mod sweeper;

pub use sweeper::SweeperState;
pub(crate) use sweeper::{spawn_sweeper, sweep, SweeperSlot};
