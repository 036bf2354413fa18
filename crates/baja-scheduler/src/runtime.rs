//! One recurring task per active schedule.
//!
//! A task waits for the schedule's next daily start time in the guild's
//! timezone, fires, then fires again every `interval_hours` until stopped.
//! Waits race a [`CancellationToken`]; a fire in progress is never
//! interrupted, so stopping only guarantees that no further fire happens.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use baja_core::{window_start, ChatPlatform};
use baja_summarizer::{Section, SummaryPipeline};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chunk::{build_summary_messages, MAX_MESSAGE_LEN};
use crate::error::Result;
use crate::history::fetch_history;
use crate::schedule::{next_fire_instant, parse_timezone};
use crate::store::ScheduleStore;
use crate::types::{Schedule, ScheduleKind, TaskState};

/// Consecutive failed runs between two `error`-level reports.
const FAILURE_REPORT_EVERY: u32 = 5;

/// Source of wall-clock time for fire computations.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Everything a task needs besides its own schedule row.
#[derive(Clone)]
pub struct TaskContext {
    pub store: Arc<ScheduleStore>,
    pub platform: Arc<dyn ChatPlatform>,
    pub pipeline: Arc<dyn SummaryPipeline>,
    pub clock: Arc<dyn Clock>,
    /// Per-source (and per-thread) message cap for one fetch.
    pub history_limit: usize,
}

/// How a single fire ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Summary posted and `last_run` advanced.
    Posted { chunks: usize },
    /// Nothing to summarize in the lookback window.
    NoMessages,
    /// Gave up before posting a summary; `last_run` untouched.
    Aborted(String),
}

/// Execute one fire of `schedule`. Never returns an error: every failure
/// becomes [`RunOutcome::Aborted`] and is logged with the schedule id.
pub async fn run_once(ctx: &TaskContext, schedule: &Schedule) -> RunOutcome {
    let fired_at = ctx.clock.now();
    info!(schedule_id = schedule.id, target = %schedule.target_name, "running scheduled summary");

    let outcome = match execute(ctx, schedule, fired_at).await {
        Ok(outcome) => outcome,
        Err(e) => RunOutcome::Aborted(e.to_string()),
    };

    match &outcome {
        RunOutcome::Posted { chunks } => {
            if let Err(e) = ctx.store.touch_last_run(schedule.id, fired_at) {
                error!(schedule_id = schedule.id, err = %e, "failed to record last run");
            }
            info!(schedule_id = schedule.id, chunks, "scheduled summary posted");
        }
        RunOutcome::NoMessages => {
            info!(schedule_id = schedule.id, lookback = %schedule.lookback, "no messages in window");
        }
        RunOutcome::Aborted(reason) => {
            error!(schedule_id = schedule.id, reason = %reason, "scheduled summary aborted");
        }
    }
    outcome
}

async fn execute(
    ctx: &TaskContext,
    schedule: &Schedule,
    fired_at: DateTime<Utc>,
) -> Result<RunOutcome> {
    let cutoff = window_start(fired_at, &schedule.lookback)?;

    let platform = ctx.platform.as_ref();
    if platform.resolve_guild(schedule.guild_id).await?.is_none() {
        return Ok(RunOutcome::Aborted(format!(
            "guild {} not found",
            schedule.guild_id
        )));
    }
    if platform
        .resolve_channel(schedule.guild_id, schedule.output_channel_id)
        .await?
        .is_none()
    {
        return Ok(RunOutcome::Aborted(format!(
            "output channel {} not found",
            schedule.output_channel_id
        )));
    }

    let (header, body) = match schedule.kind {
        ScheduleKind::Channel => {
            let Some(&channel_id) = schedule.channel_ids.first() else {
                return Ok(RunOutcome::Aborted("schedule has no source channel".into()));
            };
            let Some(source) = platform
                .resolve_channel(schedule.guild_id, channel_id)
                .await?
            else {
                warn!(schedule_id = schedule.id, channel_id, "source channel not found");
                platform
                    .post_message(
                        schedule.output_channel_id,
                        &format!(
                            "⚠️ Could not find channel for scheduled summary: {}",
                            schedule.target_name
                        ),
                    )
                    .await?;
                return Ok(RunOutcome::Aborted(format!(
                    "source channel {channel_id} not found"
                )));
            };

            let messages = fetch_history(platform, &source, cutoff, ctx.history_limit).await?;
            if messages.is_empty() {
                return Ok(RunOutcome::NoMessages);
            }
            debug!(schedule_id = schedule.id, messages = messages.len(), "summarizing channel");

            let summary = ctx.pipeline.summarize_flat(&messages).await?;
            let header = format!(
                "**Scheduled Summary: {}** (Last {})",
                platform.channel_mention(source.id),
                schedule.lookback
            );
            (header, summary)
        }
        ScheduleKind::Category => {
            let mut sections = Vec::new();
            for &channel_id in &schedule.channel_ids {
                let source = match platform.resolve_channel(schedule.guild_id, channel_id).await {
                    Ok(Some(source)) => source,
                    Ok(None) => {
                        warn!(schedule_id = schedule.id, channel_id, "category channel not found");
                        continue;
                    }
                    Err(e) => {
                        warn!(schedule_id = schedule.id, channel_id, err = %e, "failed to resolve category channel");
                        continue;
                    }
                };
                match fetch_history(platform, &source, cutoff, ctx.history_limit).await {
                    Ok(messages) if !messages.is_empty() => {
                        sections.push(Section::new(source.name, messages));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(schedule_id = schedule.id, channel_id, err = %e, "failed to fetch channel history");
                    }
                }
            }
            if sections.is_empty() {
                return Ok(RunOutcome::NoMessages);
            }
            debug!(schedule_id = schedule.id, sections = sections.len(), "summarizing category");

            let summary = ctx.pipeline.summarize_sectioned(&sections).await?;
            let header = format!(
                "**Scheduled Summary: Category '{}'** (Last {})",
                schedule.target_name, schedule.lookback
            );
            (header, summary)
        }
    };

    let chunks = build_summary_messages(&header, &body, MAX_MESSAGE_LEN);
    for chunk in &chunks {
        platform
            .post_message(schedule.output_channel_id, chunk)
            .await?;
    }
    Ok(RunOutcome::Posted {
        chunks: chunks.len(),
    })
}

/// Owner-side handle of a spawned task.
pub struct ScheduleHandle {
    schedule_id: i64,
    cancel: CancellationToken,
    state: watch::Receiver<TaskState>,
    join: JoinHandle<()>,
}

impl ScheduleHandle {
    pub fn schedule_id(&self) -> i64 {
        self.schedule_id
    }

    /// Request a stop. Takes effect at the next wait; an in-flight fire completes.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Spawn the recurring task for `schedule` on the current Tokio runtime.
pub fn spawn(schedule: Schedule, ctx: TaskContext) -> ScheduleHandle {
    let (state_tx, state_rx) = watch::channel(TaskState::Created);
    let cancel = CancellationToken::new();
    let schedule_id = schedule.id;

    let task = ScheduleTask {
        schedule,
        ctx,
        state: state_tx,
        cancel: cancel.clone(),
        consecutive_failures: 0,
    };
    let join = tokio::spawn(task.run());

    ScheduleHandle {
        schedule_id,
        cancel,
        state: state_rx,
        join,
    }
}

struct ScheduleTask {
    schedule: Schedule,
    ctx: TaskContext,
    state: watch::Sender<TaskState>,
    cancel: CancellationToken,
    consecutive_failures: u32,
}

impl ScheduleTask {
    async fn run(mut self) {
        let id = self.schedule.id;
        self.set_state(TaskState::WaitingForFirstFire);

        let tz = self.timezone();
        let now = self.ctx.clock.now();
        let target = next_fire_instant(self.schedule.start_time, tz, now);
        let wait = (target - now).to_std().unwrap_or_default();
        info!(
            schedule_id = id,
            first_fire = %target.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z"),
            wait_hours = wait.as_secs_f64() / 3600.0,
            "waiting for first fire"
        );

        let mut deadline = Instant::now() + wait;
        let interval = std::time::Duration::from_secs(u64::from(self.schedule.interval_hours) * 3600);

        while self.wait_until(deadline).await {
            self.set_state(TaskState::Firing);
            let fired = Instant::now();
            self.fire().await;

            self.set_state(TaskState::Sleeping);
            deadline = fired + interval;
        }

        self.set_state(TaskState::Stopped);
        info!(schedule_id = id, "schedule task stopped");
    }

    /// `false` when the stop request won the race.
    async fn wait_until(&self, deadline: Instant) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep_until(deadline) => true,
        }
    }

    async fn fire(&mut self) {
        let outcome = AssertUnwindSafe(run_once(&self.ctx, &self.schedule))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| RunOutcome::Aborted("run panicked".to_string()));

        if let RunOutcome::Aborted(_) = outcome {
            self.consecutive_failures += 1;
            if self.consecutive_failures % FAILURE_REPORT_EVERY == 0 {
                error!(
                    schedule_id = self.schedule.id,
                    failures = self.consecutive_failures,
                    "schedule keeps failing; remove and recreate it if its channels are gone"
                );
            }
        } else {
            self.consecutive_failures = 0;
        }
    }

    fn timezone(&self) -> Tz {
        let name = match self.ctx.store.get_timezone(self.schedule.guild_id) {
            Ok(name) => name,
            Err(e) => {
                warn!(schedule_id = self.schedule.id, err = %e, "timezone lookup failed, using UTC");
                return Tz::UTC;
            }
        };
        parse_timezone(&name).unwrap_or_else(|e| {
            warn!(schedule_id = self.schedule.id, err = %e, "stored timezone invalid, using UTC");
            Tz::UTC
        })
    }

    fn set_state(&self, state: TaskState) {
        debug!(schedule_id = self.schedule.id, %state, "task state");
        self.state.send_replace(state);
    }
}
