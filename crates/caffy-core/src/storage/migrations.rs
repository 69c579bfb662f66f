//! Database schema migrations for caffy.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 1;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (fresh database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version, assuming fresh database");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: profiles, intakes, personalization state, feedback and
/// learning history.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(indoc::indoc! {"
        CREATE TABLE IF NOT EXISTS profiles (
            user_id            INTEGER PRIMARY KEY,
            metabolism         TEXT NOT NULL DEFAULT 'normal',
            body_mass_kg       REAL,
            is_smoker          INTEGER NOT NULL DEFAULT 0,
            is_pregnant        INTEGER NOT NULL DEFAULT 0,
            exercises_per_week INTEGER,
            updated_at         TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS intakes (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id    INTEGER NOT NULL,
            label      TEXT NOT NULL DEFAULT '',
            amount_mg  REAL NOT NULL,
            intake_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS personalization (
            user_id              INTEGER PRIMARY KEY,
            personal_half_life   REAL,
            confidence           REAL NOT NULL DEFAULT 0,
            total_feedback_count INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS feedback (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id                 INTEGER NOT NULL,
            feedback_at             TEXT NOT NULL,
            perceived_level         INTEGER NOT NULL,
            predicted_mg            REAL NOT NULL,
            note                    TEXT NOT NULL DEFAULT '',
            hours_since_last_intake REAL NOT NULL DEFAULT 0,
            last_intake_amount_mg   REAL NOT NULL DEFAULT 0,
            consumed                INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS learning_history (
            id                        INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id                   INTEGER NOT NULL,
            recorded_at               TEXT NOT NULL,
            previous_half_life        REAL,
            new_half_life             REAL NOT NULL,
            data_points_used          INTEGER NOT NULL,
            error_improvement_percent REAL NOT NULL DEFAULT 0,
            reason                    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_intakes_user_time ON intakes(user_id, intake_at);
        CREATE INDEX IF NOT EXISTS idx_feedback_user_consumed ON feedback(user_id, consumed, feedback_at);
        CREATE INDEX IF NOT EXISTS idx_history_user_time ON learning_history(user_id, recorded_at);
    "})?;

    set_schema_version(&tx, 1)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn fresh_database_reports_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 0);
    }
}
