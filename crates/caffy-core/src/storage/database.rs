//! SQLite-backed repository.
//!
//! Provides persistent storage for:
//! - Metabolism profiles
//! - Intake events
//! - Perception feedback and personalization state
//! - Learning history (append-only)

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{data_dir, migrations};
use crate::error::{DatabaseError, Result};
use crate::learning::{
    FeedbackEvent, LearningHistoryEntry, LearningReason, LearningUpdate, NewFeedback,
    PerceivedLevel, PersonalizationState,
};
use crate::model::{IntakeEvent, Metabolism, MetabolismProfile, NewIntake};
use crate::repository::Repository;

/// SQLite database holding every user's records.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/caffy.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("caffy.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "opened database");
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }
}

/// Fixed-width UTC timestamps, so text order is chronological order.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<MetabolismProfile> {
    let metabolism: String = row.get(0)?;
    let metabolism = metabolism
        .parse::<Metabolism>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Ok(MetabolismProfile {
        metabolism,
        body_mass_kg: row.get(1)?,
        is_smoker: row.get(2)?,
        is_pregnant: row.get(3)?,
        exercises_per_week: row.get(4)?,
    })
}

const INTAKE_COLUMNS: &str = "id, user_id, label, amount_mg, intake_at";

fn row_to_intake(row: &Row<'_>) -> rusqlite::Result<IntakeEvent> {
    Ok(IntakeEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        label: row.get(2)?,
        amount_mg: row.get(3)?,
        intake_at: parse_ts(row, 4)?,
    })
}

const FEEDBACK_COLUMNS: &str = "id, user_id, feedback_at, perceived_level, predicted_mg, note, \
     hours_since_last_intake, last_intake_amount_mg, consumed";

fn row_to_feedback(row: &Row<'_>) -> rusqlite::Result<FeedbackEvent> {
    let level: i64 = row.get(3)?;
    let perceived_level = PerceivedLevel::new(level)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, Box::new(e)))?;
    Ok(FeedbackEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        feedback_at: parse_ts(row, 2)?,
        perceived_level,
        predicted_mg: row.get(4)?,
        note: row.get(5)?,
        hours_since_last_intake: row.get(6)?,
        last_intake_amount_mg: row.get(7)?,
        consumed: row.get(8)?,
    })
}

fn row_to_history(row: &Row<'_>) -> rusqlite::Result<LearningHistoryEntry> {
    let reason: String = row.get(6)?;
    let reason = reason.parse::<LearningReason>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into())
    })?;
    let data_points: i64 = row.get(4)?;
    Ok(LearningHistoryEntry {
        user_id: row.get(0)?,
        recorded_at: parse_ts(row, 1)?,
        previous_half_life: row.get(2)?,
        new_half_life: row.get(3)?,
        data_points_used: data_points.max(0) as usize,
        error_improvement_percent: row.get(5)?,
        reason,
    })
}

fn write_state(conn: &Connection, user_id: i64, state: &PersonalizationState) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO personalization (user_id, personal_half_life, confidence, total_feedback_count)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id) DO UPDATE SET
             personal_half_life = excluded.personal_half_life,
             confidence = excluded.confidence,
             total_feedback_count = excluded.total_feedback_count",
        params![
            user_id,
            state.personal_half_life_hours,
            state.confidence,
            state.total_feedback_count,
        ],
    )?;
    Ok(())
}

fn write_history(conn: &Connection, entry: &LearningHistoryEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO learning_history
             (user_id, recorded_at, previous_half_life, new_half_life,
              data_points_used, error_improvement_percent, reason)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.user_id,
            fmt_ts(entry.recorded_at),
            entry.previous_half_life,
            entry.new_half_life,
            entry.data_points_used as i64,
            entry.error_improvement_percent,
            entry.reason.as_str(),
        ],
    )?;
    Ok(())
}

fn write_consumed(conn: &Connection, user_id: i64, feedback_ids: &[i64]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("UPDATE feedback SET consumed = 1 WHERE id = ?1 AND user_id = ?2")?;
    for id in feedback_ids {
        stmt.execute(params![id, user_id])?;
    }
    Ok(())
}

impl Repository for Database {
    fn get_profile(&self, user_id: i64) -> Result<Option<MetabolismProfile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT metabolism, body_mass_kg, is_smoker, is_pregnant, exercises_per_week
                 FROM profiles WHERE user_id = ?1",
                params![user_id],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    fn save_profile(&self, user_id: i64, profile: &MetabolismProfile) -> Result<()> {
        self.conn.execute(
            "INSERT INTO profiles
                 (user_id, metabolism, body_mass_kg, is_smoker, is_pregnant, exercises_per_week, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id) DO UPDATE SET
                 metabolism = excluded.metabolism,
                 body_mass_kg = excluded.body_mass_kg,
                 is_smoker = excluded.is_smoker,
                 is_pregnant = excluded.is_pregnant,
                 exercises_per_week = excluded.exercises_per_week,
                 updated_at = excluded.updated_at",
            params![
                user_id,
                profile.metabolism.as_str(),
                profile.body_mass_kg,
                profile.is_smoker,
                profile.is_pregnant,
                profile.exercises_per_week,
                fmt_ts(Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn list_intake_events(&self, user_id: i64, since: DateTime<Utc>) -> Result<Vec<IntakeEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INTAKE_COLUMNS} FROM intakes
             WHERE user_id = ?1 AND intake_at >= ?2
             ORDER BY intake_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![user_id, fmt_ts(since)], row_to_intake)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn latest_intake_event(&self, user_id: i64, at: DateTime<Utc>) -> Result<Option<IntakeEvent>> {
        let event = self
            .conn
            .query_row(
                &format!(
                    "SELECT {INTAKE_COLUMNS} FROM intakes
                     WHERE user_id = ?1 AND intake_at <= ?2
                     ORDER BY intake_at DESC, id DESC LIMIT 1"
                ),
                params![user_id, fmt_ts(at)],
                row_to_intake,
            )
            .optional()?;
        Ok(event)
    }

    fn get_intake_event(&self, user_id: i64, intake_id: i64) -> Result<Option<IntakeEvent>> {
        let event = self
            .conn
            .query_row(
                &format!("SELECT {INTAKE_COLUMNS} FROM intakes WHERE id = ?1 AND user_id = ?2"),
                params![intake_id, user_id],
                row_to_intake,
            )
            .optional()?;
        Ok(event)
    }

    fn add_intake_event(&self, user_id: i64, intake: &NewIntake) -> Result<IntakeEvent> {
        self.conn.execute(
            "INSERT INTO intakes (user_id, label, amount_mg, intake_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, intake.label, intake.amount_mg, fmt_ts(intake.intake_at)],
        )?;
        Ok(IntakeEvent {
            id: self.conn.last_insert_rowid(),
            user_id,
            label: intake.label.clone(),
            amount_mg: intake.amount_mg,
            intake_at: intake.intake_at,
        })
    }

    fn update_intake_amount(&self, user_id: i64, intake_id: i64, amount_mg: f64) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE intakes SET amount_mg = ?1 WHERE id = ?2 AND user_id = ?3",
            params![amount_mg, intake_id, user_id],
        )?;
        Ok(changed > 0)
    }

    fn delete_intake_event(&self, user_id: i64, intake_id: i64) -> Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM intakes WHERE id = ?1 AND user_id = ?2",
            params![intake_id, user_id],
        )?;
        Ok(changed > 0)
    }

    fn get_personalization_state(&self, user_id: i64) -> Result<PersonalizationState> {
        let state = self
            .conn
            .query_row(
                "SELECT personal_half_life, confidence, total_feedback_count
                 FROM personalization WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(PersonalizationState {
                        personal_half_life_hours: row.get(0)?,
                        confidence: row.get(1)?,
                        total_feedback_count: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(state.unwrap_or_default())
    }

    fn save_personalization_state(&self, user_id: i64, state: &PersonalizationState) -> Result<()> {
        write_state(&self.conn, user_id, state)?;
        Ok(())
    }

    fn save_feedback(&self, user_id: i64, feedback: &NewFeedback) -> Result<FeedbackEvent> {
        self.conn.execute(
            "INSERT INTO feedback
                 (user_id, feedback_at, perceived_level, predicted_mg, note,
                  hours_since_last_intake, last_intake_amount_mg, consumed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
            params![
                user_id,
                fmt_ts(feedback.feedback_at),
                feedback.perceived_level.value(),
                feedback.predicted_mg,
                feedback.note,
                feedback.hours_since_last_intake,
                feedback.last_intake_amount_mg,
            ],
        )?;
        Ok(FeedbackEvent::from_new(
            self.conn.last_insert_rowid(),
            user_id,
            feedback.clone(),
        ))
    }

    fn list_unconsumed_feedback(&self, user_id: i64) -> Result<Vec<FeedbackEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback
             WHERE user_id = ?1 AND consumed = 0
             ORDER BY feedback_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_feedback)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn mark_feedback_consumed(&self, user_id: i64, feedback_ids: &[i64]) -> Result<()> {
        write_consumed(&self.conn, user_id, feedback_ids)?;
        Ok(())
    }

    fn count_feedback(&self, user_id: i64) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM feedback WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn append_learning_history(&self, entry: &LearningHistoryEntry) -> Result<()> {
        write_history(&self.conn, entry)?;
        Ok(())
    }

    fn recent_learning_history(&self, user_id: i64, limit: usize) -> Result<Vec<LearningHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, recorded_at, previous_half_life, new_half_life,
                    data_points_used, error_improvement_percent, reason
             FROM learning_history
             WHERE user_id = ?1
             ORDER BY recorded_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], row_to_history)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn commit_learning(&self, user_id: i64, update: &LearningUpdate) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        write_state(&tx, user_id, &update.state)?;
        write_history(&tx, &update.history)?;
        write_consumed(&tx, user_id, &update.consumed_feedback)?;
        tx.commit()?;
        Ok(())
    }
}
