//! SQLite schema for the checkpoint store.

/// Accepted results, one row per category path. Re-accepting overwrites.
pub const CREATE_ACCEPTED_RESULTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accepted_results (
    category_path   TEXT    PRIMARY KEY,
    level1          TEXT    NOT NULL,
    level2          TEXT    NOT NULL,
    level3          TEXT    NOT NULL,
    schema_version  INTEGER NOT NULL,
    payload         TEXT    NOT NULL,
    selection_count INTEGER NOT NULL,
    cost            REAL    NOT NULL DEFAULT 0,
    model           TEXT    NOT NULL DEFAULT '',
    accepted_at     TEXT    NOT NULL DEFAULT (datetime('now'))
)
"#;

/// Audit log of rejected or failed attempts. Append-only.
pub const CREATE_FAILED_ATTEMPTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS failed_attempts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    category_path   TEXT    NOT NULL,
    payload         TEXT    NOT NULL,
    issues          TEXT    NOT NULL DEFAULT '[]',
    reason          TEXT    NOT NULL,
    cost            REAL    NOT NULL DEFAULT 0,
    failed_at       TEXT    NOT NULL DEFAULT (datetime('now'))
)
"#;

pub const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_failed_attempts_path ON failed_attempts(category_path)
"#;

/// Statements in creation order.
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_ACCEPTED_RESULTS_TABLE,
        CREATE_FAILED_ATTEMPTS_TABLE,
        CREATE_INDEXES,
    ]
}
