//! Database module for wifi_doctor
//!
//! Provides SQLite persistence for troubleshooting sessions.

mod schema;

use schema::{MIGRATION_QUESTION_TARGETS, SCHEMA, SESSION_COLUMNS};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::diagnosis::{Evidence, QuestionPath};
use crate::state_machine::{ConvState, Session};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Corrupt session row {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// Raw column values, decoded into a `Session` outside the rusqlite closure
struct SessionRow {
    id: String,
    state: String,
    issue_description: String,
    test_results: Option<String>,
    question_path: Option<String>,
    asked_questions: String,
    answers: String,
    question_index: i64,
    created_at: String,
    updated_at: String,
    question_targets: String,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;

        // Older databases lack the column - ignore error if it already exists
        let _ = conn.execute(MIGRATION_QUESTION_TARGETS, []);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Session Operations ====================

    /// Load a session, inserting a fresh GREETING session first if the id is unseen
    pub fn get_or_create_session(&self, id: &str) -> DbResult<Session> {
        {
            let conn = self.conn();
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT OR IGNORE INTO sessions (id, state, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![id, ConvState::Greeting.as_str(), now],
            )?;
        }
        self.get_session(id)
    }

    /// Get session by ID
    pub fn get_session(&self, id: &str) -> DbResult<Session> {
        let row = {
            let conn = self.conn();
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            stmt.query_row(params![id], read_row).optional()?
        };

        match row {
            Some(row) => decode(row),
            None => Err(DbError::SessionNotFound(id.to_string())),
        }
    }

    /// Insert or fully replace a session
    pub fn save_session(&self, session: &Session) -> DbResult<()> {
        let test_results = session
            .test_results
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let asked = serde_json::to_string(&session.asked_questions)?;
        let targets = serde_json::to_string(&session.question_targets)?;
        let answers = serde_json::to_string(&session.answers)?;
        let index = i64::try_from(session.question_index).map_err(|e| DbError::Corrupt {
            id: session.id.clone(),
            reason: e.to_string(),
        })?;

        let conn = self.conn();
        conn.execute(
            "INSERT INTO sessions (id, state, issue_description, test_results, question_path,
                                   asked_questions, answers, question_index, created_at, updated_at,
                                   question_targets)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                issue_description = excluded.issue_description,
                test_results = excluded.test_results,
                question_path = excluded.question_path,
                asked_questions = excluded.asked_questions,
                answers = excluded.answers,
                question_index = excluded.question_index,
                updated_at = excluded.updated_at,
                question_targets = excluded.question_targets",
            params![
                session.id,
                session.state.as_str(),
                session.issue_description,
                test_results,
                session.question_path.map(QuestionPath::as_str),
                asked,
                answers,
                index,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
                targets,
            ],
        )?;
        Ok(())
    }

    /// Delete a session
    pub fn delete_session(&self, id: &str) -> DbResult<()> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;

        if deleted == 0 {
            return Err(DbError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    /// All session ids, most recently updated first
    pub fn list_session_ids(&self) -> DbResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM sessions ORDER BY updated_at DESC, id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        state: row.get(1)?,
        issue_description: row.get(2)?,
        test_results: row.get(3)?,
        question_path: row.get(4)?,
        asked_questions: row.get(5)?,
        answers: row.get(6)?,
        question_index: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        question_targets: row.get(10)?,
    })
}

fn decode(row: SessionRow) -> DbResult<Session> {
    let corrupt = |reason: String| DbError::Corrupt {
        id: row.id.clone(),
        reason,
    };

    let state: ConvState = row.state.parse().map_err(corrupt)?;
    let question_index =
        usize::try_from(row.question_index).map_err(|e| corrupt(e.to_string()))?;
    let test_results: Option<Evidence> = row
        .test_results
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    let question_path: Option<QuestionPath> = row
        .question_path
        .map(|p| serde_json::from_value(serde_json::Value::String(p)))
        .transpose()?;

    Ok(Session {
        state,
        issue_description: row.issue_description,
        test_results,
        question_path,
        asked_questions: serde_json::from_str(&row.asked_questions)?,
        question_targets: serde_json::from_str(&row.question_targets)?,
        answers: serde_json::from_str(&row.answers)?,
        question_index,
        created_at: parse_datetime(&row.created_at),
        updated_at: parse_datetime(&row.updated_at),
        id: row.id,
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
