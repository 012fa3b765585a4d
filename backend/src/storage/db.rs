//! SQLite persistence for the points chart.
//!
//! One table per entity: children, the three per-child catalogs, and daily
//! records. Catalog rows carry an explicit `position` column so that reads
//! always return lists in their stored order; daily-record completion maps
//! and redemption lists are stored as JSON text, matching the shape the
//! legacy system kept them in.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{migrate::MigrateDatabase, Executor, Row, Sqlite, SqlitePool, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;

use shared::{Child, DailyRecord, PointTask, Redemption, Reward, ScheduleEntry};

/// DbConnection manages database operations
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection
    pub async fn new(url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let pool = SqlitePool::connect(url).await?;
        Self::setup_schema(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize a test database with a unique name
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        // Generate a unique database name for tests
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS children (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schedule_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                child_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                time TEXT NOT NULL,
                activity TEXT NOT NULL,
                note TEXT
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS point_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                child_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                points INTEGER NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rewards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                child_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                cost INTEGER NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                child_id TEXT NOT NULL,
                date TEXT NOT NULL,
                schedule_data TEXT NOT NULL DEFAULT '{}',
                tasks_data TEXT NOT NULL DEFAULT '{}',
                rewards_data TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT,
                UNIQUE(child_id, date)
            );
            "#,
        )
        .execute(pool)
        .await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_schedule_entries_child ON schedule_entries(child_id, position);",
            "CREATE INDEX IF NOT EXISTS idx_point_tasks_child ON point_tasks(child_id, position);",
            "CREATE INDEX IF NOT EXISTS idx_rewards_child ON rewards(child_id, position);",
            "CREATE INDEX IF NOT EXISTS idx_daily_records_child ON daily_records(child_id, date);",
        ] {
            sqlx::query(index).execute(pool).await?;
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Children
    // -----------------------------------------------------------------------

    /// Insert or replace a child row
    pub async fn store_child(&self, child: &Child) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO children (id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at
            "#,
        )
        .bind(&child.id)
        .bind(&child.name)
        .bind(&child.created_at)
        .bind(&child.updated_at)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_child(&self, child_id: &str) -> Result<Option<Child>> {
        let row = sqlx::query(
            "SELECT id, name, created_at, updated_at FROM children WHERE id = ?",
        )
        .bind(child_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|r| Child {
            id: r.get("id"),
            name: r.get("name"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// List all children in creation order
    pub async fn list_children(&self) -> Result<Vec<Child>> {
        let rows = sqlx::query(
            "SELECT id, name, created_at, updated_at FROM children ORDER BY created_at, id",
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Child {
                id: r.get("id"),
                name: r.get("name"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            })
            .collect())
    }

    pub async fn count_children(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM children")
            .fetch_one(&*self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Delete a child and everything that belongs to it, in one transaction
    pub async fn delete_child_cascade(&self, child_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in [
            "schedule_entries",
            "point_tasks",
            "rewards",
            "daily_records",
        ] {
            sqlx::query(&format!("DELETE FROM {} WHERE child_id = ?", table))
                .bind(child_id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM children WHERE id = ?")
            .bind(child_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Catalogs
    // -----------------------------------------------------------------------

    pub async fn get_schedule_entries(&self, child_id: &str) -> Result<Vec<ScheduleEntry>> {
        fetch_schedule_entries(&*self.pool, child_id).await
    }

    /// Replace a child's schedule list atomically (delete then insert)
    pub async fn replace_schedule_entries(
        &self,
        child_id: &str,
        entries: &[ScheduleEntry],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM schedule_entries WHERE child_id = ?")
            .bind(child_id)
            .execute(&mut *tx)
            .await?;
        for (position, entry) in entries.iter().enumerate() {
            sqlx::query(
                "INSERT INTO schedule_entries (child_id, position, time, activity, note) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(child_id)
            .bind(position as i64)
            .bind(&entry.time)
            .bind(&entry.activity)
            .bind(entry.note.as_deref())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_point_tasks(&self, child_id: &str) -> Result<Vec<PointTask>> {
        fetch_point_tasks(&*self.pool, child_id).await
    }

    /// Replace a child's point-task list atomically (delete then insert)
    pub async fn replace_point_tasks(&self, child_id: &str, tasks: &[PointTask]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM point_tasks WHERE child_id = ?")
            .bind(child_id)
            .execute(&mut *tx)
            .await?;
        for (position, task) in tasks.iter().enumerate() {
            sqlx::query(
                "INSERT INTO point_tasks (child_id, position, name, points) VALUES (?, ?, ?, ?)",
            )
            .bind(child_id)
            .bind(position as i64)
            .bind(&task.name)
            .bind(task.points)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_rewards(&self, child_id: &str) -> Result<Vec<Reward>> {
        fetch_rewards(&*self.pool, child_id).await
    }

    /// Replace a child's reward list atomically (delete then insert)
    pub async fn replace_rewards(&self, child_id: &str, rewards: &[Reward]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM rewards WHERE child_id = ?")
            .bind(child_id)
            .execute(&mut *tx)
            .await?;
        for (position, reward) in rewards.iter().enumerate() {
            sqlx::query(
                "INSERT INTO rewards (child_id, position, name, cost) VALUES (?, ?, ?, ?)",
            )
            .bind(child_id)
            .bind(position as i64)
            .bind(&reward.name)
            .bind(reward.cost)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Daily records
    // -----------------------------------------------------------------------

    /// Get the record for (child, date), or a fresh empty record when none
    /// has been stored yet. Missing records are not an error.
    pub async fn get_daily_record(&self, child_id: &str, date: NaiveDate) -> Result<DailyRecord> {
        fetch_daily_record(&*self.pool, child_id, date).await
    }

    /// Open a read-modify-write session over one daily record.
    ///
    /// The session's first statement writes the record row, so the
    /// transaction holds the database write lock before the record is read:
    /// a concurrent mutation of the same record waits for the commit instead
    /// of reading the same base state and overwriting this session's write.
    /// Dropping the session without committing rolls everything back.
    pub async fn begin_record_mutation(
        &self,
        child_id: &str,
        date: NaiveDate,
    ) -> Result<RecordMutation> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO daily_records (child_id, date, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(child_id, date) DO UPDATE SET updated_at = excluded.updated_at
            "#,
        )
        .bind(child_id)
        .bind(date.to_string())
        .execute(&mut *tx)
        .await?;

        let record = fetch_daily_record(&mut *tx, child_id, date).await?;
        Ok(RecordMutation { tx, record })
    }

    /// Upsert keyed by (child_id, date): the stored payload is fully replaced
    pub async fn upsert_daily_record(&self, record: &DailyRecord) -> Result<()> {
        let schedule_data = serde_json::to_string(&record.schedule)?;
        let tasks_data = serde_json::to_string(&record.tasks)?;
        let rewards_data = serde_json::to_string(&record.redemptions)?;

        sqlx::query(
            r#"
            INSERT INTO daily_records (child_id, date, schedule_data, tasks_data, rewards_data, updated_at)
            VALUES (?, ?, ?, ?, ?, datetime('now'))
            ON CONFLICT(child_id, date) DO UPDATE SET
                schedule_data = excluded.schedule_data,
                tasks_data = excluded.tasks_data,
                rewards_data = excluded.rewards_data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.child_id)
        .bind(record.date.to_string())
        .bind(schedule_data)
        .bind(tasks_data)
        .bind(rewards_data)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// All records for a child, most recent date first
    pub async fn list_daily_records(&self, child_id: &str) -> Result<Vec<DailyRecord>> {
        fetch_daily_records(&*self.pool, child_id).await
    }

    // -----------------------------------------------------------------------
    // Bulk maintenance
    // -----------------------------------------------------------------------

    /// Wipe every table; used by import before rebuilding the dataset
    pub async fn clear_all_data(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in [
            "children",
            "schedule_entries",
            "point_tasks",
            "rewards",
            "daily_records",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// In-flight atomic mutation of one daily record.
///
/// Created by [`DbConnection::begin_record_mutation`]. All reads made
/// through this session run on the session's own transaction, so redemption
/// checks observe the same state the final write lands on.
pub struct RecordMutation {
    tx: Transaction<'static, Sqlite>,
    record: DailyRecord,
}

impl RecordMutation {
    pub fn record(&self) -> &DailyRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut DailyRecord {
        &mut self.record
    }

    pub async fn schedule_entries(&mut self) -> Result<Vec<ScheduleEntry>> {
        fetch_schedule_entries(&mut *self.tx, self.record.child_id.as_str()).await
    }

    pub async fn point_tasks(&mut self) -> Result<Vec<PointTask>> {
        fetch_point_tasks(&mut *self.tx, self.record.child_id.as_str()).await
    }

    pub async fn rewards(&mut self) -> Result<Vec<Reward>> {
        fetch_rewards(&mut *self.tx, self.record.child_id.as_str()).await
    }

    /// All stored records for the child, as visible inside this transaction
    pub async fn all_records(&mut self) -> Result<Vec<DailyRecord>> {
        fetch_daily_records(&mut *self.tx, self.record.child_id.as_str()).await
    }

    /// Persist the mutated record and commit the transaction
    pub async fn commit(mut self) -> Result<()> {
        let schedule_data = serde_json::to_string(&self.record.schedule)?;
        let tasks_data = serde_json::to_string(&self.record.tasks)?;
        let rewards_data = serde_json::to_string(&self.record.redemptions)?;

        sqlx::query(
            r#"
            UPDATE daily_records
            SET schedule_data = ?, tasks_data = ?, rewards_data = ?, updated_at = datetime('now')
            WHERE child_id = ? AND date = ?
            "#,
        )
        .bind(schedule_data)
        .bind(tasks_data)
        .bind(rewards_data)
        .bind(&self.record.child_id)
        .bind(self.record.date.to_string())
        .execute(&mut *self.tx)
        .await?;

        self.tx.commit().await?;
        Ok(())
    }

    /// Abandon the mutation; nothing is written, not even the row seeded
    /// when the session was opened
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Query helpers shared between the pool-backed API and mutation sessions
// ---------------------------------------------------------------------------

async fn fetch_schedule_entries<'e, E>(executor: E, child_id: &str) -> Result<Vec<ScheduleEntry>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT time, activity, note FROM schedule_entries WHERE child_id = ? ORDER BY position",
    )
    .bind(child_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .iter()
        .map(|r| ScheduleEntry {
            time: r.get("time"),
            activity: r.get("activity"),
            note: r.get("note"),
        })
        .collect())
}

async fn fetch_point_tasks<'e, E>(executor: E, child_id: &str) -> Result<Vec<PointTask>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows =
        sqlx::query("SELECT name, points FROM point_tasks WHERE child_id = ? ORDER BY position")
            .bind(child_id)
            .fetch_all(executor)
            .await?;

    Ok(rows
        .iter()
        .map(|r| PointTask {
            name: r.get("name"),
            points: r.get("points"),
        })
        .collect())
}

async fn fetch_rewards<'e, E>(executor: E, child_id: &str) -> Result<Vec<Reward>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT name, cost FROM rewards WHERE child_id = ? ORDER BY position")
        .bind(child_id)
        .fetch_all(executor)
        .await?;

    Ok(rows
        .iter()
        .map(|r| Reward {
            name: r.get("name"),
            cost: r.get("cost"),
        })
        .collect())
}

async fn fetch_daily_record<'e, E>(
    executor: E,
    child_id: &str,
    date: NaiveDate,
) -> Result<DailyRecord>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT schedule_data, tasks_data, rewards_data
        FROM daily_records
        WHERE child_id = ? AND date = ?
        "#,
    )
    .bind(child_id)
    .bind(date.to_string())
    .fetch_optional(executor)
    .await?;

    match row {
        Some(r) => record_from_row(child_id, date, &r),
        None => Ok(DailyRecord::empty(child_id, date)),
    }
}

async fn fetch_daily_records<'e, E>(executor: E, child_id: &str) -> Result<Vec<DailyRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT date, schedule_data, tasks_data, rewards_data
        FROM daily_records
        WHERE child_id = ?
        ORDER BY date DESC
        "#,
    )
    .bind(child_id)
    .fetch_all(executor)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        let date_text: String = row.get("date");
        let date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
            .with_context(|| format!("invalid record date: {}", date_text))?;
        records.push(record_from_row(child_id, date, row)?);
    }
    Ok(records)
}

fn record_from_row(
    child_id: &str,
    date: NaiveDate,
    row: &sqlx::sqlite::SqliteRow,
) -> Result<DailyRecord> {
    let schedule_data: String = row.get("schedule_data");
    let tasks_data: String = row.get("tasks_data");
    let rewards_data: String = row.get("rewards_data");

    let schedule: BTreeMap<usize, bool> =
        serde_json::from_str(&schedule_data).context("corrupt schedule_data in daily record")?;
    let tasks: BTreeMap<usize, bool> =
        serde_json::from_str(&tasks_data).context("corrupt tasks_data in daily record")?;
    let redemptions: Vec<Redemption> =
        serde_json::from_str(&rewards_data).context("corrupt rewards_data in daily record")?;

    Ok(DailyRecord {
        child_id: child_id.to_string(),
        date,
        schedule,
        tasks,
        redemptions,
    })
}
