use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a schedule summarizes one channel or every channel of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Flat summary of a single source.
    Channel,
    /// Sectioned summary, one block per source channel.
    Category,
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScheduleKind::Channel => "channel",
            ScheduleKind::Category => "category",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "channel" => Ok(ScheduleKind::Channel),
            "category" => Ok(ScheduleKind::Category),
            other => Err(format!("unknown schedule type: {other}")),
        }
    }
}

/// A persisted recurring summary definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Assigned by the store; stable for the schedule's lifetime.
    pub id: i64,
    pub guild_id: u64,
    /// Exactly one id for `Channel`, one or more for `Category`.
    pub channel_ids: Vec<u64>,
    /// Channel name or category name, used in headers and listings.
    pub target_name: String,
    pub kind: ScheduleKind,
    pub output_channel_id: u64,
    /// Time of day of the first fire, in the guild's timezone.
    pub start_time: NaiveTime,
    pub interval_hours: u32,
    /// Stored verbatim and re-parsed on every run.
    pub lookback: String,
    pub created_by: u64,
    pub active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields a user supplies when creating a schedule.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub guild_id: u64,
    pub channel_ids: Vec<u64>,
    pub target_name: String,
    pub kind: ScheduleKind,
    pub output_channel_id: u64,
    pub start_time: NaiveTime,
    pub interval_hours: u32,
    pub lookback: String,
    pub created_by: u64,
}

/// Lifecycle of one schedule's in-memory task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Created,
    WaitingForFirstFire,
    Firing,
    Sleeping,
    Stopped,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Created => "created",
            TaskState::WaitingForFirstFire => "waiting for first fire",
            TaskState::Firing => "firing",
            TaskState::Sleeping => "sleeping",
            TaskState::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// What a thread subscription points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Channel,
    Category,
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetType::Channel => "channel",
            TargetType::Category => "category",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "channel" => Ok(TargetType::Channel),
            "category" => Ok(TargetType::Category),
            other => Err(format!("unknown subscription target: {other}")),
        }
    }
}

/// A user's request to be added to every new thread under a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub guild_id: u64,
    pub user_id: u64,
    pub target_id: u64,
    pub target_type: TargetType,
    pub created_at: String,
}
