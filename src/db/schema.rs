//! Database schema

/// SQL schema for initialization
///
/// List and evidence columns hold JSON. `state` holds the bare state name
/// (`GREETING`, `TARGETED_QUESTIONS`, ...).
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    state TEXT NOT NULL DEFAULT 'GREETING',
    issue_description TEXT NOT NULL DEFAULT '',
    test_results TEXT,
    question_path TEXT,
    asked_questions TEXT NOT NULL DEFAULT '[]',
    answers TEXT NOT NULL DEFAULT '[]',
    question_index INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    question_targets TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at DESC);
";

/// Added after the first release; existing databases get it via `ALTER TABLE`
pub const MIGRATION_QUESTION_TARGETS: &str =
    "ALTER TABLE sessions ADD COLUMN question_targets TEXT NOT NULL DEFAULT '[]'";

/// Column list shared by every session query, in `read_row` order
pub const SESSION_COLUMNS: &str = "id, state, issue_description, test_results, question_path,
    asked_questions, answers, question_index, created_at, updated_at, question_targets";
