//! Schedule store
//!
//! The engine talks to persistence through [`ScheduleStore`]: put a record,
//! query every record under a context, delete a record by id. The query is an
//! equality match on context only; filtering by posting time is the caller's job.
//!
//! Two implementations are provided: [`SqliteScheduleStore`] for real use and
//! [`MemoryScheduleStore`] for tests, which can be told to fail on demand.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::types::{Context, ScheduleRecord, ScheduledPost};

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Persist a new record
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Write` if the record could not be stored.
    async fn put(&self, post: &ScheduledPost) -> Result<()>;

    /// All records stored under `context`, in no particular order
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Query` if the store cannot be read.
    async fn query_by_context(&self, context: Context) -> Result<Vec<ScheduleRecord>>;

    /// Remove a record by id
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Delete` if the record could not be removed.
    async fn delete(&self, id: &str) -> Result<()>;
}

// ============================================================================
// SQLite
// ============================================================================

#[derive(Clone)]
pub struct SqliteScheduleStore {
    pool: SqlitePool,
}

impl SqliteScheduleStore {
    /// Open (creating if needed) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::Io)?;
        }

        // mode=rwc creates the file on first use
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::Connection)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::Migration)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ScheduleStore for SqliteScheduleStore {
    async fn put(&self, post: &ScheduledPost) -> Result<()> {
        let record = ScheduleRecord::from(post);

        sqlx::query(
            r#"
            INSERT INTO scheduled_posts
                (id, context, posting_host, posting_token, caption, image_url, posting_time)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.context)
        .bind(&record.posting_host)
        .bind(&record.posting_token)
        .bind(&record.caption)
        .bind(&record.image_url)
        .bind(&record.posting_time)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;

        Ok(())
    }

    async fn query_by_context(&self, context: Context) -> Result<Vec<ScheduleRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, context, posting_host, posting_token, caption, image_url, posting_time
            FROM scheduled_posts
            WHERE context = ?
            "#,
        )
        .bind(context.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query {
            context: context.to_string(),
            message: e.to_string(),
        })?;

        Ok(rows
            .into_iter()
            .map(|r| ScheduleRecord {
                id: r.get("id"),
                context: r.get("context"),
                posting_host: r.get("posting_host"),
                posting_token: r.get("posting_token"),
                caption: r.get("caption"),
                image_url: r.get("image_url"),
                posting_time: r.get("posting_time"),
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM scheduled_posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Delete {
                id: id.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// In-memory store with fault injection
///
/// Records are returned in insertion order.
#[derive(Default)]
pub struct MemoryScheduleStore {
    records: Mutex<Vec<ScheduleRecord>>,
    faults: Mutex<Faults>,
}

#[derive(Default)]
struct Faults {
    writes: bool,
    deletes: bool,
    queries: HashSet<Context>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail
    pub fn fail_writes(&self, fail: bool) {
        self.lock_faults().writes = fail;
    }

    /// Make every subsequent `delete` fail
    pub fn fail_deletes(&self, fail: bool) {
        self.lock_faults().deletes = fail;
    }

    /// Make queries for `context` fail
    pub fn fail_queries_for(&self, context: Context) {
        self.lock_faults().queries.insert(context);
    }

    /// Insert a raw row, bypassing `put` (e.g. to seed malformed data)
    pub fn insert_record(&self, record: ScheduleRecord) {
        self.lock_records().push(record);
    }

    pub fn records(&self) -> Vec<ScheduleRecord> {
        self.lock_records().clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock_records().iter().any(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.lock_records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, Vec<ScheduleRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn put(&self, post: &ScheduledPost) -> Result<()> {
        if self.lock_faults().writes {
            return Err(StoreError::Write("injected write failure".to_string()).into());
        }
        self.lock_records().push(ScheduleRecord::from(post));
        Ok(())
    }

    async fn query_by_context(&self, context: Context) -> Result<Vec<ScheduleRecord>> {
        if self.lock_faults().queries.contains(&context) {
            return Err(StoreError::Query {
                context: context.to_string(),
                message: "injected query failure".to_string(),
            }
            .into());
        }

        Ok(self
            .lock_records()
            .iter()
            .filter(|r| r.context == context.as_str())
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if self.lock_faults().deletes {
            return Err(StoreError::Delete {
                id: id.to_string(),
                message: "injected delete failure".to_string(),
            }
            .into());
        }
        self.lock_records().retain(|r| r.id != id);
        Ok(())
    }
}
