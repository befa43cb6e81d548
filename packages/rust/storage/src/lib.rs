//! libSQL detection store.
//!
//! The [`Storage`] struct wraps a libSQL database holding one row per
//! announced chapter. It implements [`DetectionStore`], the seam the pipeline
//! talks to.
//!
//! **Access rules:**
//! - `chapterwatch run`: read-write via [`Storage::open`] / [`Storage::open_remote`]
//! - `chapterwatch history`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chapterwatch_shared::{ChapterWatchError, Detection, Result, StorageTarget, WeekIndex};
use libsql::{Connection, Database, params};

// ---------------------------------------------------------------------------
// DetectionStore
// ---------------------------------------------------------------------------

/// Week-keyed record of announced chapters.
///
/// Writes are not idempotent: recording twice for one week stores two rows.
/// Callers query with [`DetectionStore::has_detection`] first.
#[async_trait]
pub trait DetectionStore: Send + Sync {
    /// Whether at least one detection exists for `week`.
    async fn has_detection(&self, week: WeekIndex) -> Result<bool>;

    /// Record that `url` was announced for `week`.
    async fn record_detection(&self, week: WeekIndex, url: &str) -> Result<Detection>;
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open the store described by a resolved [`StorageTarget`] in read-write mode.
    pub async fn connect(target: &StorageTarget) -> Result<Self> {
        match target {
            StorageTarget::Local(path) => Self::open(path).await,
            StorageTarget::Remote { url, auth_token } => {
                Self::open_remote(url, auth_token).await
            }
        }
    }

    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ChapterWatchError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(ChapterWatchError::store)?;

        Self::from_database(db, false).await
    }

    /// Open a remote libSQL database in read-write mode.
    pub async fn open_remote(url: &str, auth_token: &str) -> Result<Self> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(ChapterWatchError::store)?;

        Self::from_database(db, false).await
    }

    /// Open the store described by `target` without writing to it.
    ///
    /// No migrations run, so a remote schema is never touched.
    pub async fn connect_readonly(target: &StorageTarget) -> Result<Self> {
        match target {
            StorageTarget::Local(path) => Self::open_readonly(path).await,
            StorageTarget::Remote { url, auth_token } => {
                let db = libsql::Builder::new_remote(url.to_string(), auth_token.to_string())
                    .build()
                    .await
                    .map_err(ChapterWatchError::store)?;
                Self::from_database(db, true).await
            }
        }
    }

    /// Open a local database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ChapterWatchError::StoreUnavailable(format!(
                "no database at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(ChapterWatchError::store)?;

        Self::from_database(db, true).await
    }

    async fn from_database(db: Database, readonly: bool) -> Result<Self> {
        let conn = db.connect().map_err(ChapterWatchError::store)?;

        let storage = Self { db, conn, readonly };
        if !readonly {
            storage.run_migrations().await?;
        }
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ChapterWatchError::StoreUnavailable(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ChapterWatchError::StoreUnavailable(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Detection operations
    // -----------------------------------------------------------------------

    /// Insert a detection record.
    pub async fn insert_detection(&self, detection: &Detection) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO detections (id, year, week, url, detected_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    detection.id.as_str(),
                    i64::from(detection.week.year),
                    i64::from(detection.week.number),
                    detection.url.as_str(),
                    detection.detected_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(ChapterWatchError::store)?;
        Ok(())
    }

    /// Count detections recorded for `week`.
    pub async fn count_for_week(&self, week: WeekIndex) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM detections WHERE year = ?1 AND week = ?2",
                params![i64::from(week.year), i64::from(week.number)],
            )
            .await
            .map_err(ChapterWatchError::store)?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row.get(0).map_err(ChapterWatchError::store)?;
                Ok(count as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(ChapterWatchError::store(e)),
        }
    }

    /// List all detections, newest week first.
    pub async fn list_detections(&self) -> Result<Vec<Detection>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, year, week, url, detected_at FROM detections
                 ORDER BY year DESC, week DESC, detected_at DESC",
                params![],
            )
            .await
            .map_err(ChapterWatchError::store)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(ChapterWatchError::store)? {
            results.push(row_to_detection(&row)?);
        }
        Ok(results)
    }
}

#[async_trait]
impl DetectionStore for Storage {
    async fn has_detection(&self, week: WeekIndex) -> Result<bool> {
        Ok(self.count_for_week(week).await? > 0)
    }

    async fn record_detection(&self, week: WeekIndex, url: &str) -> Result<Detection> {
        let detection = Detection::new(week, url);
        self.insert_detection(&detection).await?;
        tracing::info!(%week, url, id = %detection.id, "detection recorded");
        Ok(detection)
    }
}

/// Convert a database row to a [`Detection`].
fn row_to_detection(row: &libsql::Row) -> Result<Detection> {
    let year: i64 = row.get(1).map_err(ChapterWatchError::store)?;
    let week: i64 = row.get(2).map_err(ChapterWatchError::store)?;

    Ok(Detection {
        id: row.get::<String>(0).map_err(ChapterWatchError::store)?,
        week: WeekIndex::new(year as i32, week as u32),
        url: row.get::<String>(3).map_err(ChapterWatchError::store)?,
        detected_at: {
            let s: String = row.get(4).map_err(ChapterWatchError::store)?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| ChapterWatchError::StoreUnavailable(format!("invalid date: {e}")))?
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chapterwatch_shared::ErrorKind;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("cw_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("cw_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn record_then_query_round_trip() {
        let storage = test_storage().await;
        let week = WeekIndex::new(2026, 42);

        assert!(!storage.has_detection(week).await.expect("query empty"));

        let detection = storage
            .record_detection(week, "https://reader.example/read/1050")
            .await
            .expect("record");
        assert_eq!(detection.week, week);

        assert!(storage.has_detection(week).await.expect("query after write"));
        assert!(!storage.has_detection(WeekIndex::new(2026, 43)).await.unwrap());
    }

    #[tokio::test]
    async fn same_week_number_in_other_year_is_separate() {
        let storage = test_storage().await;
        storage
            .record_detection(WeekIndex::new(2025, 42), "https://reader.example/read/1001")
            .await
            .unwrap();

        assert!(!storage.has_detection(WeekIndex::new(2026, 42)).await.unwrap());
    }

    #[tokio::test]
    async fn writes_are_not_deduplicated() {
        let storage = test_storage().await;
        let week = WeekIndex::new(2026, 10);

        storage.record_detection(week, "https://reader.example/read/a").await.unwrap();
        storage.record_detection(week, "https://reader.example/read/b").await.unwrap();

        assert_eq!(storage.count_for_week(week).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let storage = test_storage().await;
        for (week, url) in [
            (WeekIndex::new(2026, 2), "https://reader.example/read/2"),
            (WeekIndex::new(2025, 52), "https://reader.example/read/1"),
            (WeekIndex::new(2026, 3), "https://reader.example/read/3"),
        ] {
            storage.record_detection(week, url).await.unwrap();
        }

        let listed = storage.list_detections().await.expect("list");
        let weeks: Vec<WeekIndex> = listed.iter().map(|d| d.week).collect();
        assert_eq!(
            weeks,
            vec![
                WeekIndex::new(2026, 3),
                WeekIndex::new(2026, 2),
                WeekIndex::new(2025, 52),
            ]
        );
        assert_eq!(listed[0].url, "https://reader.example/read/3");
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("cw_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.record_detection(WeekIndex::new(2026, 1), "https://reader.example/read/1")
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.list_detections().await.unwrap().len(), 1);

        let result = ro
            .record_detection(WeekIndex::new(2026, 2), "https://reader.example/read/2")
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(err.to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn connect_readonly_skips_migrations() {
        let tmp = std::env::temp_dir().join(format!("cw_bare_{}.db", Uuid::now_v7()));
        let bare = libsql::Builder::new_local(&tmp).build().await.unwrap();
        bare.connect().unwrap().execute("CREATE TABLE t (x INTEGER)", ()).await.unwrap();
        drop(bare);

        let ro = Storage::connect_readonly(&StorageTarget::Local(tmp.clone()))
            .await
            .unwrap();
        assert_eq!(ro.get_schema_version().await, 0);
        assert!(ro.list_detections().await.is_err());
        assert!(
            ro.record_detection(WeekIndex::new(2026, 1), "https://reader.example/read/1")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn readonly_missing_file_is_unavailable() {
        let tmp = std::env::temp_dir().join(format!("cw_missing_{}.db", Uuid::now_v7()));
        let result = Storage::open_readonly(&tmp).await;
        assert!(matches!(result, Err(ChapterWatchError::StoreUnavailable(_))));
    }
}
