//! Catalog store: the per-child ordered lists of schedule slots, point tasks
//! and rewards.
//!
//! Writes always replace the full list (delete-then-insert, one transaction)
//! so the stored order is exactly the order the editor submitted. Daily
//! records refer to these lists by position, so that order matters.

use std::sync::Arc;
use tracing::info;

use crate::domain::errors::DomainError;
use crate::storage::DbConnection;
use shared::{PointTask, Reward, ScheduleEntry};

/// Service for reading and replacing a child's catalogs
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }

    pub async fn get_schedule(&self, child_id: &str) -> Result<Vec<ScheduleEntry>, DomainError> {
        Ok(self.db.get_schedule_entries(child_id).await?)
    }

    pub async fn set_schedule(
        &self,
        child_id: &str,
        entries: Vec<ScheduleEntry>,
    ) -> Result<(), DomainError> {
        info!("Replacing schedule for {}: {} entries", child_id, entries.len());
        self.db.replace_schedule_entries(child_id, &entries).await?;
        Ok(())
    }

    pub async fn get_tasks(&self, child_id: &str) -> Result<Vec<PointTask>, DomainError> {
        Ok(self.db.get_point_tasks(child_id).await?)
    }

    /// Replace the point-task list. Task names are unique per child: when the
    /// submitted list repeats a name, only the last occurrence survives, at
    /// the list position where it last appeared.
    pub async fn set_tasks(
        &self,
        child_id: &str,
        tasks: Vec<PointTask>,
    ) -> Result<(), DomainError> {
        let tasks = dedup_tasks_by_name(tasks);
        info!("Replacing point tasks for {}: {} tasks", child_id, tasks.len());
        self.db.replace_point_tasks(child_id, &tasks).await?;
        Ok(())
    }

    pub async fn get_rewards(&self, child_id: &str) -> Result<Vec<Reward>, DomainError> {
        Ok(self.db.get_rewards(child_id).await?)
    }

    pub async fn set_rewards(
        &self,
        child_id: &str,
        rewards: Vec<Reward>,
    ) -> Result<(), DomainError> {
        info!("Replacing rewards for {}: {} rewards", child_id, rewards.len());
        self.db.replace_rewards(child_id, &rewards).await?;
        Ok(())
    }
}

/// Last-write-wins reducer keyed by task name.
///
/// Applied once at this store boundary; nothing else in the system needs to
/// care about duplicate names.
fn dedup_tasks_by_name(tasks: Vec<PointTask>) -> Vec<PointTask> {
    let mut result: Vec<PointTask> = Vec::with_capacity(tasks.len());
    for task in tasks {
        result.retain(|existing| existing.name != task.name);
        result.push(task);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str, points: i64) -> PointTask {
        PointTask {
            name: name.to_string(),
            points,
        }
    }

    async fn setup_test() -> CatalogService {
        let db = Arc::new(
            DbConnection::init_test()
                .await
                .expect("Failed to create test database"),
        );
        CatalogService::new(db)
    }

    #[test]
    fn test_dedup_keeps_last_occurrence_in_write_order() {
        let deduped = dedup_tasks_by_name(vec![
            task("Brush teeth", 1),
            task("Homework", 2),
            task("Brush teeth", 5),
        ]);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].name, "Homework");
        assert_eq!(deduped[1].name, "Brush teeth");
        assert_eq!(deduped[1].points, 5);
    }

    #[test]
    fn test_dedup_no_duplicates_is_identity() {
        let tasks = vec![task("A", 1), task("B", 2)];
        assert_eq!(dedup_tasks_by_name(tasks.clone()), tasks);
    }

    #[tokio::test]
    async fn test_set_tasks_persists_deduplicated_list() {
        let service = setup_test().await;

        service
            .set_tasks(
                "child::1",
                vec![task("Read", 1), task("Chores", 1), task("Read", 3)],
            )
            .await
            .unwrap();

        let stored = service.get_tasks("child::1").await.unwrap();
        assert_eq!(stored, vec![task("Chores", 1), task("Read", 3)]);
    }

    #[tokio::test]
    async fn test_set_schedule_preserves_order() {
        let service = setup_test().await;

        let entries = vec![
            ScheduleEntry {
                time: "07:00".to_string(),
                activity: "Breakfast".to_string(),
                note: Some("Yum!".to_string()),
            },
            ScheduleEntry {
                time: "08:00".to_string(),
                activity: "School".to_string(),
                note: None,
            },
        ];
        service.set_schedule("child::1", entries.clone()).await.unwrap();

        let stored = service.get_schedule("child::1").await.unwrap();
        assert_eq!(stored, entries);
    }
}
