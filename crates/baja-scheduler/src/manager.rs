use dashmap::DashMap;
use tracing::{error, info, warn};

use crate::error::{Result, SchedulerError};
use crate::runtime::{spawn, ScheduleHandle, TaskContext};
use crate::types::{NewSchedule, Schedule, TaskState};

/// Registry of running schedule tasks, keyed by schedule id.
///
/// The only owner of [`ScheduleHandle`]s. Map shards are locked only while
/// inserting or removing a handle, never while a task runs.
pub struct ScheduleManager {
    ctx: TaskContext,
    tasks: DashMap<i64, ScheduleHandle>,
}

impl ScheduleManager {
    pub fn new(ctx: TaskContext) -> Self {
        Self {
            ctx,
            tasks: DashMap::new(),
        }
    }

    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    /// Start a task for every active schedule in the store.
    ///
    /// A row that fails to start is logged and skipped. Returns how many
    /// tasks were started.
    pub fn load_all(&self) -> Result<usize> {
        let schedules = self.ctx.store.list_active(None)?;
        info!(count = schedules.len(), "loading scheduled summaries");

        let mut started = 0;
        for schedule in schedules {
            let id = schedule.id;
            let target = schedule.target_name.clone();
            match self.start_one(schedule) {
                Ok(()) => {
                    started += 1;
                    info!(schedule_id = id, %target, "schedule started");
                }
                Err(e) => error!(schedule_id = id, err = %e, "failed to start schedule"),
            }
        }
        info!(started, "scheduled summaries loaded");
        Ok(started)
    }

    /// Spawn and register the task for an already persisted schedule.
    ///
    /// A task already registered under the same id is stopped and replaced.
    pub fn start_one(&self, schedule: Schedule) -> Result<()> {
        if !schedule.active {
            return Err(SchedulerError::Validation(format!(
                "schedule {} is inactive",
                schedule.id
            )));
        }
        if schedule.interval_hours == 0 || schedule.channel_ids.is_empty() {
            return Err(SchedulerError::Validation(format!(
                "schedule {} has no interval or no source channels",
                schedule.id
            )));
        }

        let id = schedule.id;
        let handle = spawn(schedule, self.ctx.clone());
        if let Some(previous) = self.tasks.insert(id, handle) {
            warn!(schedule_id = id, "replacing running task");
            previous.stop();
        }
        Ok(())
    }

    /// Stop and forget the task for `id`. Unknown ids are a no-op; returns
    /// whether a task was stopped.
    pub fn stop_one(&self, id: i64) -> bool {
        match self.tasks.remove(&id) {
            Some((_, handle)) => {
                handle.stop();
                info!(schedule_id = id, "schedule stopped");
                true
            }
            None => false,
        }
    }

    /// Persist a schedule and start its task.
    pub fn create(&self, new: &NewSchedule) -> Result<Schedule> {
        let schedule = self.ctx.store.create(new)?;
        self.start_one(schedule.clone())?;
        Ok(schedule)
    }

    /// Deactivate a schedule in the store and stop its task together.
    pub fn remove(&self, id: i64) -> Result<()> {
        self.ctx.store.soft_delete(id)?;
        self.stop_one(id);
        Ok(())
    }

    /// Re-spawn the guild's tasks that have not fired yet, so their first
    /// fire is recomputed from the stored timezone. Tasks past their first
    /// fire keep their interval cadence.
    ///
    /// The replacement happens under the registry entry's lock, so a
    /// concurrent [`remove`](Self::remove) either sees the new task or finds
    /// the row already inactive.
    pub fn restart_waiting(&self, guild_id: u64) -> Result<usize> {
        let mut restarted = 0;
        for schedule in self.ctx.store.list_active(Some(guild_id))? {
            let id = schedule.id;
            let Some(mut entry) = self.tasks.get_mut(&id) else {
                continue;
            };
            if !matches!(
                entry.state(),
                TaskState::Created | TaskState::WaitingForFirstFire
            ) {
                continue;
            }
            let previous = std::mem::replace(&mut *entry, spawn(schedule, self.ctx.clone()));
            previous.stop();
            restarted += 1;
            info!(schedule_id = id, "first fire rescheduled");
        }
        Ok(restarted)
    }

    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn state(&self, id: i64) -> Option<TaskState> {
        self.tasks.get(&id).map(|h| h.state())
    }

    /// Stop every task, e.g. on shutdown.
    pub fn stop_all(&self) {
        let ids: Vec<i64> = self.tasks.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.stop_one(id);
        }
    }
}
