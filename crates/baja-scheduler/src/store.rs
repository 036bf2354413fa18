use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, instrument};

use crate::db::init_db;
use crate::error::{Result, SchedulerError};
use crate::schedule::parse_timezone;
use crate::types::{NewSchedule, Schedule, ScheduleKind, Subscription, TargetType};

const SCHEDULE_COLUMNS: &str = "id, guild_id, channel_ids, target_name, schedule_type,
     output_channel_id, start_time, interval_hours, lookback_duration,
     created_by_user_id, active, last_run, created_at";

/// Durable storage for schedules, guild timezones and thread subscriptions.
///
/// Wraps a single SQLite connection in a `Mutex`; every method is one
/// statement, so writes from different schedules never hold the lock across
/// an await point or touch more than their own row.
pub struct ScheduleStore {
    db: Mutex<Connection>,
    default_timezone: String,
}

impl ScheduleStore {
    /// Initialise the schema on `conn` and wrap it.
    pub fn new(conn: Connection, default_timezone: impl Into<String>) -> Result<Self> {
        init_db(&conn)?;
        let default_timezone = default_timezone.into();
        parse_timezone(&default_timezone)?;
        Ok(Self {
            db: Mutex::new(conn),
            default_timezone,
        })
    }

    pub fn open(path: &str, default_timezone: impl Into<String>) -> Result<Self> {
        Self::new(Connection::open(path)?, default_timezone)
    }

    pub fn open_in_memory(default_timezone: impl Into<String>) -> Result<Self> {
        Self::new(Connection::open_in_memory()?, default_timezone)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Active schedules, optionally for one guild, by start time then id.
    #[instrument(skip(self))]
    pub fn list_active(&self, guild_id: Option<u64>) -> Result<Vec<Schedule>> {
        let db = self.conn();
        let mut stmt = db.prepare(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM scheduled_summaries
             WHERE active = 1 AND (?1 IS NULL OR guild_id = ?1)
             ORDER BY start_time, id"
        ))?;
        let rows = stmt.query_map(
            rusqlite::params![guild_id.map(|g| g as i64)],
            row_to_schedule,
        )?;
        let mut schedules = Vec::new();
        for row in rows {
            schedules.push(row?);
        }
        Ok(schedules)
    }

    /// Insert a new active schedule and return it with its assigned id.
    #[instrument(skip(self, new), fields(guild_id = new.guild_id, kind = %new.kind))]
    pub fn create(&self, new: &NewSchedule) -> Result<Schedule> {
        validate(new)?;

        let now = Utc::now();
        let channel_ids = serde_json::to_string(
            &new.channel_ids.iter().map(|&c| c as i64).collect::<Vec<_>>(),
        )?;

        let db = self.conn();
        db.execute(
            "INSERT INTO scheduled_summaries
             (guild_id, channel_ids, target_name, schedule_type, output_channel_id,
              start_time, interval_hours, lookback_duration, created_by_user_id,
              active, last_run, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, NULL, ?10)",
            rusqlite::params![
                new.guild_id as i64,
                channel_ids,
                new.target_name,
                new.kind.to_string(),
                new.output_channel_id as i64,
                new.start_time.format("%H:%M").to_string(),
                new.interval_hours,
                new.lookback,
                new.created_by as i64,
                now.to_rfc3339(),
            ],
        )?;
        let id = db.last_insert_rowid();
        info!(schedule_id = id, target = %new.target_name, "schedule created");

        Ok(Schedule {
            id,
            guild_id: new.guild_id,
            channel_ids: new.channel_ids.clone(),
            target_name: new.target_name.clone(),
            kind: new.kind,
            output_channel_id: new.output_channel_id,
            start_time: new.start_time,
            interval_hours: new.interval_hours,
            lookback: new.lookback.clone(),
            created_by: new.created_by,
            active: true,
            last_run: None,
            created_at: now,
        })
    }

    /// Any schedule by id, active or not.
    pub fn get(&self, id: i64) -> Result<Option<Schedule>> {
        let db = self.conn();
        let schedule = db
            .query_row(
                &format!("SELECT {SCHEDULE_COLUMNS} FROM scheduled_summaries WHERE id = ?1"),
                rusqlite::params![id],
                row_to_schedule,
            )
            .optional()?;
        Ok(schedule)
    }

    /// Mark a schedule inactive. The row is kept; repeating the call is a no-op.
    #[instrument(skip(self))]
    pub fn soft_delete(&self, id: i64) -> Result<()> {
        let db = self.conn();
        let changed = db.execute(
            "UPDATE scheduled_summaries SET active = 0 WHERE id = ?1",
            rusqlite::params![id],
        )?;
        if changed == 0 {
            return Err(SchedulerError::NotFound { id });
        }
        info!(schedule_id = id, "schedule deactivated");
        Ok(())
    }

    pub fn touch_last_run(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let db = self.conn();
        let changed = db.execute(
            "UPDATE scheduled_summaries SET last_run = ?1 WHERE id = ?2",
            rusqlite::params![at.to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(SchedulerError::NotFound { id });
        }
        debug!(schedule_id = id, last_run = %at, "last run recorded");
        Ok(())
    }

    /// The guild's zone name, or the configured default when never set.
    pub fn get_timezone(&self, guild_id: u64) -> Result<String> {
        let db = self.conn();
        let zone: Option<String> = db
            .query_row(
                "SELECT timezone FROM guild_settings WHERE guild_id = ?1",
                rusqlite::params![guild_id as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(zone.unwrap_or_else(|| self.default_timezone.clone()))
    }

    /// Upsert the guild's zone after checking it is a known IANA name.
    #[instrument(skip(self))]
    pub fn set_timezone(&self, guild_id: u64, zone: &str) -> Result<()> {
        let tz = parse_timezone(zone)?;
        let db = self.conn();
        db.execute(
            "INSERT INTO guild_settings (guild_id, timezone, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (guild_id)
             DO UPDATE SET timezone = excluded.timezone, updated_at = excluded.updated_at",
            rusqlite::params![guild_id as i64, tz.name(), Utc::now().to_rfc3339()],
        )?;
        info!(guild_id, timezone = tz.name(), "guild timezone updated");
        Ok(())
    }

    // --- thread subscriptions ----------------------------------------------

    /// Returns `false` when the subscription already existed.
    pub fn add_subscription(
        &self,
        guild_id: u64,
        user_id: u64,
        target_id: u64,
        target_type: TargetType,
    ) -> Result<bool> {
        let db = self.conn();
        let inserted = db.execute(
            "INSERT OR IGNORE INTO thread_subscriptions
             (guild_id, user_id, target_id, target_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                guild_id as i64,
                user_id as i64,
                target_id as i64,
                target_type.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Returns `false` when there was nothing to remove.
    pub fn remove_subscription(
        &self,
        guild_id: u64,
        user_id: u64,
        target_id: u64,
        target_type: TargetType,
    ) -> Result<bool> {
        let db = self.conn();
        let removed = db.execute(
            "DELETE FROM thread_subscriptions
             WHERE guild_id = ?1 AND user_id = ?2 AND target_id = ?3 AND target_type = ?4",
            rusqlite::params![
                guild_id as i64,
                user_id as i64,
                target_id as i64,
                target_type.to_string(),
            ],
        )?;
        Ok(removed > 0)
    }

    /// A user's subscriptions in a guild, newest first.
    pub fn user_subscriptions(&self, guild_id: u64, user_id: u64) -> Result<Vec<Subscription>> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT id, guild_id, user_id, target_id, target_type, created_at
             FROM thread_subscriptions
             WHERE guild_id = ?1 AND user_id = ?2
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![guild_id as i64, user_id as i64],
            row_to_subscription,
        )?;
        let mut subs = Vec::new();
        for row in rows {
            subs.push(row?);
        }
        Ok(subs)
    }

    /// User ids subscribed to one target.
    pub fn subscribers(
        &self,
        guild_id: u64,
        target_id: u64,
        target_type: TargetType,
    ) -> Result<Vec<u64>> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT user_id FROM thread_subscriptions
             WHERE guild_id = ?1 AND target_id = ?2 AND target_type = ?3
             ORDER BY id",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![guild_id as i64, target_id as i64, target_type.to_string()],
            |row| row.get::<_, i64>(0),
        )?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row? as u64);
        }
        Ok(users)
    }
}

/// Last line of defence; commands validate earlier with friendlier messages.
fn validate(new: &NewSchedule) -> Result<()> {
    if new.interval_hours == 0 {
        return Err(SchedulerError::Validation(
            "interval_hours must be greater than 0".to_string(),
        ));
    }
    if new.channel_ids.is_empty() {
        return Err(SchedulerError::Validation(
            "a schedule needs at least one source channel".to_string(),
        ));
    }
    if new.kind == ScheduleKind::Channel && new.channel_ids.len() != 1 {
        return Err(SchedulerError::Validation(
            "a channel schedule has exactly one source channel".to_string(),
        ));
    }
    Ok(())
}

fn conversion_error(col: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        col,
        rusqlite::types::Type::Text,
        msg.into(),
    )
}

fn parse_timestamp(col: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(col, e.to_string()))
}

/// Map a SQLite row to a `Schedule`.
fn row_to_schedule(row: &rusqlite::Row<'_>) -> rusqlite::Result<Schedule> {
    let channel_json: String = row.get(2)?;
    let channel_ids: Vec<i64> =
        serde_json::from_str(&channel_json).map_err(|e| conversion_error(2, e.to_string()))?;

    let kind_str: String = row.get(4)?;
    let kind = kind_str
        .parse::<ScheduleKind>()
        .map_err(|e| conversion_error(4, e))?;

    let start_str: String = row.get(6)?;
    let start_time = NaiveTime::parse_from_str(&start_str, "%H:%M")
        .map_err(|e| conversion_error(6, e.to_string()))?;

    let last_run = match row.get::<_, Option<String>>(11)? {
        Some(raw) => Some(parse_timestamp(11, &raw)?),
        None => None,
    };
    let created_at = parse_timestamp(12, &row.get::<_, String>(12)?)?;

    Ok(Schedule {
        id: row.get(0)?,
        guild_id: row.get::<_, i64>(1)? as u64,
        channel_ids: channel_ids.into_iter().map(|c| c as u64).collect(),
        target_name: row.get(3)?,
        kind,
        output_channel_id: row.get::<_, i64>(5)? as u64,
        start_time,
        interval_hours: row.get(7)?,
        lookback: row.get(8)?,
        created_by: row.get::<_, i64>(9)? as u64,
        active: row.get::<_, i64>(10)? != 0,
        last_run,
        created_at,
    })
}

fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscription> {
    let target_str: String = row.get(4)?;
    Ok(Subscription {
        id: row.get(0)?,
        guild_id: row.get::<_, i64>(1)? as u64,
        user_id: row.get::<_, i64>(2)? as u64,
        target_id: row.get::<_, i64>(3)? as u64,
        target_type: target_str
            .parse()
            .map_err(|e| conversion_error(4, e))?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ScheduleStore {
        ScheduleStore::open_in_memory("America/New_York").unwrap()
    }

    fn new_schedule(guild_id: u64, start: &str) -> NewSchedule {
        NewSchedule {
            guild_id,
            channel_ids: vec![1_234_567_890_123_456_789],
            target_name: "chassis".to_string(),
            kind: ScheduleKind::Channel,
            output_channel_id: 42,
            start_time: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
            interval_hours: 24,
            lookback: "24h".to_string(),
            created_by: 7,
        }
    }

    #[test]
    fn create_then_get_round_trips_snowflakes() {
        let s = store();
        let created = s.create(&new_schedule(1, "09:00")).unwrap();
        let fetched = s.get(created.id).unwrap().unwrap();
        assert_eq!(fetched.channel_ids, vec![1_234_567_890_123_456_789]);
        assert_eq!(fetched.lookback, "24h");
        assert!(fetched.active);
        assert!(fetched.last_run.is_none());
        assert_eq!(fetched.start_time, created.start_time);
    }

    #[test]
    fn get_missing_is_none() {
        assert!(store().get(99).unwrap().is_none());
    }

    #[test]
    fn list_active_orders_by_start_then_insertion() {
        let s = store();
        let late = s.create(&new_schedule(1, "18:00")).unwrap();
        let early_a = s.create(&new_schedule(1, "07:30")).unwrap();
        let early_b = s.create(&new_schedule(2, "07:30")).unwrap();

        let ids: Vec<i64> = s.list_active(None).unwrap().iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![early_a.id, early_b.id, late.id]);

        let guild1: Vec<i64> = s.list_active(Some(1)).unwrap().iter().map(|x| x.id).collect();
        assert_eq!(guild1, vec![early_a.id, late.id]);
    }

    #[test]
    fn soft_delete_is_idempotent_and_hides_row() {
        let s = store();
        let created = s.create(&new_schedule(1, "09:00")).unwrap();
        s.soft_delete(created.id).unwrap();
        s.soft_delete(created.id).unwrap();

        assert!(s.list_active(None).unwrap().is_empty());
        let row = s.get(created.id).unwrap().unwrap();
        assert!(!row.active);
    }

    #[test]
    fn soft_delete_unknown_id_is_not_found() {
        assert!(matches!(
            store().soft_delete(5),
            Err(SchedulerError::NotFound { id: 5 })
        ));
    }

    #[test]
    fn create_rejects_zero_interval_and_missing_sources() {
        let s = store();
        let mut zero = new_schedule(1, "09:00");
        zero.interval_hours = 0;
        assert!(matches!(s.create(&zero), Err(SchedulerError::Validation(_))));

        let mut empty = new_schedule(1, "09:00");
        empty.channel_ids.clear();
        assert!(matches!(s.create(&empty), Err(SchedulerError::Validation(_))));
    }

    #[test]
    fn touch_last_run_persists_timestamp() {
        let s = store();
        let created = s.create(&new_schedule(1, "09:00")).unwrap();
        let at = Utc::now();
        s.touch_last_run(created.id, at).unwrap();
        let row = s.get(created.id).unwrap().unwrap();
        assert_eq!(row.last_run.unwrap().timestamp(), at.timestamp());
    }

    #[test]
    fn timezone_defaults_and_upserts() {
        let s = store();
        assert_eq!(s.get_timezone(1).unwrap(), "America/New_York");
        s.set_timezone(1, "Europe/Berlin").unwrap();
        s.set_timezone(1, "Asia/Tokyo").unwrap();
        assert_eq!(s.get_timezone(1).unwrap(), "Asia/Tokyo");
        assert_eq!(s.get_timezone(2).unwrap(), "America/New_York");
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let s = store();
        assert!(matches!(
            s.set_timezone(1, "Not/AZone"),
            Err(SchedulerError::InvalidTimezone(_))
        ));
        assert_eq!(s.get_timezone(1).unwrap(), "America/New_York");
    }

    #[test]
    fn subscriptions_are_unique_per_target() {
        let s = store();
        assert!(s.add_subscription(1, 10, 100, TargetType::Channel).unwrap());
        assert!(!s.add_subscription(1, 10, 100, TargetType::Channel).unwrap());
        assert!(s.add_subscription(1, 10, 100, TargetType::Category).unwrap());
        assert!(s.add_subscription(1, 11, 100, TargetType::Channel).unwrap());

        assert_eq!(s.subscribers(1, 100, TargetType::Channel).unwrap(), vec![10, 11]);
        assert_eq!(s.user_subscriptions(1, 10).unwrap().len(), 2);

        assert!(s.remove_subscription(1, 10, 100, TargetType::Channel).unwrap());
        assert!(!s.remove_subscription(1, 10, 100, TargetType::Channel).unwrap());
        assert_eq!(s.subscribers(1, 100, TargetType::Channel).unwrap(), vec![11]);
    }
}
