//! SQL migration definitions for the ChapterWatch database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: detections",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per announced chapter. (year, week) is not UNIQUE:
-- callers check has_detection before writing.
CREATE TABLE IF NOT EXISTS detections (
    id          TEXT PRIMARY KEY,
    year        INTEGER NOT NULL,
    week        INTEGER NOT NULL,
    url         TEXT NOT NULL,
    detected_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_detections_week ON detections(year, week);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
