use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::{EntitlementStore, EntryCreateInput};
use crate::types::{
    LabEntry, DEFAULT_MAX_LAUNCHES, DEFAULT_SESSION_DURATION_HOURS,
};

/// SQLite implementation of EntitlementStore
pub struct SqliteEntitlementStore {
    pool: SqlitePool,
}

impl SqliteEntitlementStore {
    /// Open (creating if needed) a database file and configure the pool
    pub async fn new(database_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}", database_path.display());

        if !sqlx::Sqlite::database_exists(&database_url).await? {
            debug!("Creating database at: {}", database_url);
            sqlx::Sqlite::create_database(&database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&database_url)
            .await?;

        Self::configure(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory store for tests and local dry runs
    pub async fn in_memory() -> StoreResult<Self> {
        // A single connection keeps every query on the same in-memory DB
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::configure(&pool).await?;
        Ok(Self { pool })
    }

    async fn configure(pool: &SqlitePool) -> StoreResult<()> {
        sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
        sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
        sqlx::query("PRAGMA synchronous = NORMAL").execute(pool).await?;
        sqlx::query("PRAGMA temp_store = memory").execute(pool).await?;
        sqlx::query("PRAGMA mmap_size = 268435456").execute(pool).await?;
        Ok(())
    }

    /// Create the schema when missing
    pub async fn initialize(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lab_entries (
                purchase_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                course_id TEXT NOT NULL,
                purchase_date TEXT NOT NULL,
                access_expires_at TEXT,
                launch_count INTEGER NOT NULL DEFAULT 0,
                max_launches INTEGER NOT NULL DEFAULT 10,
                session_duration_hours INTEGER NOT NULL DEFAULT 4,
                namespace TEXT,
                snapshot TEXT,
                active_session TEXT,
                total_time_spent_minutes INTEGER NOT NULL DEFAULT 0,
                last_accessed_at TEXT,
                launch_history TEXT NOT NULL DEFAULT '[]',
                revision INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_lab_entries_user ON lab_entries(user_id)",
        )
        .execute(&self.pool)
        .await?;

        info!("Entitlement store initialized");
        Ok(())
    }

    fn parse_timestamp(raw: &str, column: &str) -> StoreResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| StoreError::InvalidData(format!("Invalid {} timestamp", column)))
    }

    fn row_to_entry(row: &SqliteRow) -> StoreResult<LabEntry> {
        let snapshot_json: Option<String> = row.try_get("snapshot")?;
        let snapshot = snapshot_json
            .map(|json| serde_json::from_str(&json))
            .transpose()?;

        let session_json: Option<String> = row.try_get("active_session")?;
        let active_session = session_json
            .map(|json| serde_json::from_str(&json))
            .transpose()?;

        let history_json: String = row.try_get("launch_history")?;
        let launch_history = serde_json::from_str(&history_json)?;

        let purchase_date_raw: String = row.try_get("purchase_date")?;
        let purchase_date = Self::parse_timestamp(&purchase_date_raw, "purchase_date")?;

        let access_expires_raw: Option<String> = row.try_get("access_expires_at")?;
        let access_expires_at = access_expires_raw
            .map(|raw| Self::parse_timestamp(&raw, "access_expires_at"))
            .transpose()?;

        let last_accessed_raw: Option<String> = row.try_get("last_accessed_at")?;
        let last_accessed_at = last_accessed_raw
            .map(|raw| Self::parse_timestamp(&raw, "last_accessed_at"))
            .transpose()?;

        Ok(LabEntry {
            purchase_id: row.try_get("purchase_id")?,
            user_id: row.try_get("user_id")?,
            course_id: row.try_get("course_id")?,
            purchase_date,
            access_expires_at,
            launch_count: row.try_get("launch_count")?,
            max_launches: row.try_get("max_launches")?,
            session_duration_hours: row.try_get("session_duration_hours")?,
            namespace: row.try_get("namespace")?,
            snapshot,
            active_session,
            total_time_spent_minutes: row.try_get("total_time_spent_minutes")?,
            last_accessed_at,
            launch_history,
            revision: row.try_get("revision")?,
        })
    }
}

#[async_trait]
impl EntitlementStore for SqliteEntitlementStore {
    async fn create_entry(&self, input: EntryCreateInput) -> StoreResult<LabEntry> {
        let purchase_id = input
            .purchase_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now();

        let entry = LabEntry {
            purchase_id: purchase_id.clone(),
            user_id: input.user_id,
            course_id: input.course_id,
            purchase_date: now,
            access_expires_at: None,
            launch_count: 0,
            max_launches: input.max_launches.unwrap_or(DEFAULT_MAX_LAUNCHES),
            session_duration_hours: input
                .session_duration_hours
                .unwrap_or(DEFAULT_SESSION_DURATION_HOURS),
            namespace: None,
            snapshot: None,
            active_session: None,
            total_time_spent_minutes: 0,
            last_accessed_at: None,
            launch_history: Vec::new(),
            revision: 0,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO lab_entries (
                purchase_id, user_id, course_id, purchase_date,
                launch_count, max_launches, session_duration_hours,
                total_time_spent_minutes, launch_history, revision,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, 0, ?, ?, 0, '[]', 0, ?, ?)
            "#,
        )
        .bind(&entry.purchase_id)
        .bind(&entry.user_id)
        .bind(&entry.course_id)
        .bind(entry.purchase_date.to_rfc3339())
        .bind(entry.max_launches)
        .bind(entry.session_duration_hours)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(
                    "Granted seat {} for user {} course {}",
                    entry.purchase_id, entry.user_id, entry.course_id
                );
                Ok(entry)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateEntry(purchase_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_entry(&self, purchase_id: &str) -> StoreResult<Option<LabEntry>> {
        let row = sqlx::query("SELECT * FROM lab_entries WHERE purchase_id = ?")
            .bind(purchase_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::row_to_entry(&r)).transpose()
    }

    async fn save(&self, entry: &mut LabEntry) -> StoreResult<()> {
        let snapshot_json = entry
            .snapshot
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let session_json = entry
            .active_session
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let history_json = serde_json::to_string(&entry.launch_history)?;

        let result = sqlx::query(
            r#"
            UPDATE lab_entries SET
                access_expires_at = ?,
                launch_count = ?,
                max_launches = ?,
                session_duration_hours = ?,
                namespace = ?,
                snapshot = ?,
                active_session = ?,
                total_time_spent_minutes = ?,
                last_accessed_at = ?,
                launch_history = ?,
                revision = revision + 1,
                updated_at = ?
            WHERE purchase_id = ? AND revision = ?
            "#,
        )
        .bind(entry.access_expires_at.map(|dt| dt.to_rfc3339()))
        .bind(entry.launch_count)
        .bind(entry.max_launches)
        .bind(entry.session_duration_hours)
        .bind(&entry.namespace)
        .bind(snapshot_json)
        .bind(session_json)
        .bind(entry.total_time_spent_minutes)
        .bind(entry.last_accessed_at.map(|dt| dt.to_rfc3339()))
        .bind(history_json)
        .bind(Utc::now().to_rfc3339())
        .bind(&entry.purchase_id)
        .bind(entry.revision)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM lab_entries WHERE purchase_id = ?")
                .bind(&entry.purchase_id)
                .fetch_optional(&self.pool)
                .await?;
            return if exists.is_some() {
                Err(StoreError::Conflict(entry.purchase_id.clone()))
            } else {
                Err(StoreError::EntryNotFound(entry.purchase_id.clone()))
            };
        }

        entry.revision += 1;
        Ok(())
    }

    async fn list_entries(&self, user_id: &str) -> StoreResult<Vec<LabEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM lab_entries WHERE user_id = ? ORDER BY purchase_date ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn list_with_active_sessions(&self) -> StoreResult<Vec<LabEntry>> {
        let rows = sqlx::query("SELECT * FROM lab_entries WHERE active_session IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActiveSession, SessionStatus, SnapshotRef};
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;

    async fn store() -> SqliteEntitlementStore {
        let store = SqliteEntitlementStore::in_memory().await.unwrap();
        store.initialize().await.unwrap();
        store
    }

    fn create_input(purchase_id: &str) -> EntryCreateInput {
        EntryCreateInput {
            user_id: "user-1".to_string(),
            course_id: "course-1".to_string(),
            purchase_id: Some(purchase_id.to_string()),
            max_launches: None,
            session_duration_hours: None,
        }
    }

    fn session(namespace: &str) -> ActiveSession {
        ActiveSession {
            namespace: namespace.to_string(),
            instance_name: "vm-abc12".to_string(),
            gateway: None,
            elevated: None,
            status: SessionStatus::Provisioning,
            start_time: Utc::now(),
            expires_at: Utc::now() + ChronoDuration::hours(4),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let store = store().await;
        let created = store.create_entry(create_input("p1")).await.unwrap();
        assert_eq!(created.launch_count, 0);
        assert_eq!(created.max_launches, DEFAULT_MAX_LAUNCHES);

        let loaded = store.get_entry("p1").await.unwrap().unwrap();
        assert_eq!(loaded.purchase_id, "p1");
        assert_eq!(loaded.user_id, "user-1");
        assert!(loaded.namespace.is_none());
        assert!(loaded.active_session.is_none());
        assert!(loaded.launch_history.is_empty());
        assert_eq!(loaded.revision, 0);
    }

    #[tokio::test]
    async fn test_duplicate_purchase_id_rejected() {
        let store = store().await;
        store.create_entry(create_input("p1")).await.unwrap();
        let err = store.create_entry(create_input("p1")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEntry(_)));
    }

    #[tokio::test]
    async fn test_get_unknown_entry() {
        let store = store().await;
        assert!(store.get_entry("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_persists_nested_structures() {
        let store = store().await;
        let mut entry = store.create_entry(create_input("p1")).await.unwrap();

        entry.launch_count = 1;
        entry.namespace = Some("lab-user1-ws25-ab1cd".to_string());
        entry.snapshot = Some(SnapshotRef {
            id: "/disks/snap-1".to_string(),
            name: "snapshot-vm-abc12-1700000000".to_string(),
            created_at: Utc::now(),
        });
        entry.active_session = Some(session("lab-user1-ws25-ab1cd"));
        entry.last_accessed_at = Some(Utc::now());
        store.save(&mut entry).await.unwrap();
        assert_eq!(entry.revision, 1);

        let loaded = store.get_entry("p1").await.unwrap().unwrap();
        assert_eq!(loaded.launch_count, 1);
        assert_eq!(loaded.revision, 1);
        assert_eq!(
            loaded.snapshot.as_ref().unwrap().name,
            "snapshot-vm-abc12-1700000000"
        );
        let session = loaded.active_session.unwrap();
        assert_eq!(session.status, SessionStatus::Provisioning);
        assert_eq!(session.namespace, "lab-user1-ws25-ab1cd");
    }

    #[tokio::test]
    async fn test_save_detects_stale_revision() {
        let store = store().await;
        store.create_entry(create_input("p1")).await.unwrap();

        let mut first = store.get_entry("p1").await.unwrap().unwrap();
        let mut second = store.get_entry("p1").await.unwrap().unwrap();

        first.launch_count = 1;
        store.save(&mut first).await.unwrap();

        second.launch_count = 5;
        let err = store.save(&mut second).await.unwrap_err();
        assert!(err.is_conflict());

        // The first write wins
        let loaded = store.get_entry("p1").await.unwrap().unwrap();
        assert_eq!(loaded.launch_count, 1);
    }

    #[tokio::test]
    async fn test_save_unknown_entry() {
        let store = store().await;
        let mut ghost = store.create_entry(create_input("p1")).await.unwrap();
        ghost.purchase_id = "other".to_string();
        let err = store.save(&mut ghost).await.unwrap_err();
        assert!(matches!(err, StoreError::EntryNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_with_active_sessions_filters() {
        let store = store().await;
        let mut with_session = store.create_entry(create_input("p1")).await.unwrap();
        store.create_entry(create_input("p2")).await.unwrap();

        with_session.active_session = Some(session("lab-x"));
        store.save(&mut with_session).await.unwrap();

        let active = store.list_with_active_sessions().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].purchase_id, "p1");
    }

    #[tokio::test]
    async fn test_list_entries_by_user() {
        let store = store().await;
        store.create_entry(create_input("p1")).await.unwrap();
        let mut other = create_input("p3");
        other.user_id = "user-2".to_string();
        store.create_entry(other).await.unwrap();

        let entries = store.list_entries("user-1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].purchase_id, "p1");
    }

    #[tokio::test]
    async fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labrack.db");
        let store = SqliteEntitlementStore::new(&path).await.unwrap();
        store.initialize().await.unwrap();

        store.create_entry(create_input("p1")).await.unwrap();
        assert!(store.get_entry("p1").await.unwrap().is_some());
        assert!(path.exists());
    }
}
