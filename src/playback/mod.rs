//! # Playback Module
//!
//! Randomized soundboard playback.
//!
//! ## Architecture
//!
//! ### [`scheduler`] - Playback Scheduler
//! - One long-lived task: wait a random number of seconds, pick a sound, repeat
//! - The wait races the shutdown token; cancellation always wins
//! - Never waits on the network, so a hung request cannot delay the next cycle
//!
//! ### [`grouping`] - Sound Groupings
//! - An optional single shot followed by a rapid-fire burst of the same sound
//! - Each burst shot is its own task; only dispatch is spaced, not completion
//! - Failures are logged per shot and never abort the rest of the burst
//!
//! ## State Machine
//!
//! ```text
//! Idle -> Waiting -> Triggering -> Waiting -> ... -> Stopped
//! ```
//!
//! `Stopped` is only reached through the shutdown token. Shots already
//! dispatched when it fires are left to finish on their own.

pub mod grouping;
pub mod scheduler;

pub use grouping::SoundTrigger;
pub use scheduler::{PlaybackScheduler, SchedulerState};
