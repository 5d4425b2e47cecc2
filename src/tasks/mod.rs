//! Background Tasks Module
//!
//! # Tasks
//! - Purge: drops expired entries from the memory store at configured intervals

mod purge;

pub use purge::spawn_purge_task;
