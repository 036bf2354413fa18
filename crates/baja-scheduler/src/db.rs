use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`. Safe to run on every start.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS scheduled_summaries (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            guild_id           INTEGER NOT NULL,
            channel_ids        TEXT    NOT NULL,   -- JSON array of channel ids
            target_name        TEXT    NOT NULL,
            schedule_type      TEXT    NOT NULL,
            output_channel_id  INTEGER NOT NULL,
            start_time         TEXT    NOT NULL,   -- HH:MM in the guild timezone
            interval_hours     INTEGER NOT NULL,
            lookback_duration  TEXT    NOT NULL,   -- re-parsed on every run
            created_by_user_id INTEGER NOT NULL,
            active             INTEGER NOT NULL DEFAULT 1,
            last_run           TEXT,               -- RFC 3339 UTC or NULL
            created_at         TEXT    NOT NULL,

            CONSTRAINT valid_schedule_type CHECK (schedule_type IN ('channel', 'category')),
            CONSTRAINT valid_interval CHECK (interval_hours > 0)
        );

        CREATE INDEX IF NOT EXISTS idx_active_schedules
            ON scheduled_summaries (guild_id, active);

        CREATE TABLE IF NOT EXISTS guild_settings (
            guild_id   INTEGER NOT NULL PRIMARY KEY,
            timezone   TEXT    NOT NULL,
            updated_at TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS thread_subscriptions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            guild_id    INTEGER NOT NULL,
            user_id     INTEGER NOT NULL,
            target_id   INTEGER NOT NULL,
            target_type TEXT    NOT NULL,
            created_at  TEXT    NOT NULL,

            CONSTRAINT valid_target_type CHECK (target_type IN ('channel', 'category')),
            CONSTRAINT unique_subscription UNIQUE (guild_id, user_id, target_id, target_type)
        );

        CREATE INDEX IF NOT EXISTS idx_subscription_lookup
            ON thread_subscriptions (guild_id, target_id);
        CREATE INDEX IF NOT EXISTS idx_user_subscriptions
            ON thread_subscriptions (guild_id, user_id);
        ",
    )?;
    Ok(())
}
