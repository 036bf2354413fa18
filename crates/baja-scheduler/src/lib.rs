//! `baja-scheduler`: recurring channel and category summaries.
//!
//! # Overview
//!
//! Schedules live in SQLite ([`store::ScheduleStore`]). At startup the
//! [`manager::ScheduleManager`] spawns one Tokio task per active schedule
//! ([`runtime`]). Each task sleeps until the schedule's daily start time in
//! the guild's timezone, then on every fire:
//!
//! 1. re-parses the lookback and resolves the guild and output channel,
//! 2. reads channel and thread history since `now - lookback` ([`history`]),
//! 3. asks the summary pipeline for a flat or sectioned summary,
//! 4. splits the result into posts under the platform limit ([`chunk`]),
//! 5. records `last_run` once something was posted.
//!
//! Failures end the current fire only; the task sleeps `interval_hours` and
//! tries again.

pub mod chunk;
pub mod db;
pub mod error;
pub mod history;
pub mod manager;
pub mod runtime;
pub mod schedule;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{Result, SchedulerError};
pub use manager::ScheduleManager;
pub use runtime::{Clock, RunOutcome, SystemClock, TaskContext};
pub use store::ScheduleStore;
pub use types::{NewSchedule, Schedule, ScheduleKind, Subscription, TargetType, TaskState};
