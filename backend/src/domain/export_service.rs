//! Full-dataset export and import.
//!
//! The export document is the same JSON shape the original web client
//! produced, so old backup files import cleanly. Import rebuilds the
//! dataset through the ordinary registry/catalog/record primitives rather
//! than writing rows directly, which keeps the positional-reference
//! semantics identical to data entered by hand.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::domain::errors::DomainError;
use crate::domain::{CatalogService, ChildService, LedgerService};
use crate::storage::DbConnection;
use shared::{
    CreateChildRequest, DailyRecord, ExportChild, ExportChildData, ExportFile, ExportRecord,
};

#[derive(Clone)]
pub struct ExportService {
    db: Arc<DbConnection>,
    children: ChildService,
    catalogs: CatalogService,
    ledger: LedgerService,
}

impl ExportService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            children: ChildService::new(db.clone()),
            catalogs: CatalogService::new(db.clone()),
            ledger: LedgerService::new(db.clone()),
            db,
        }
    }

    /// Serialize every child and all four entity types into one document
    pub async fn export(&self) -> Result<ExportFile, DomainError> {
        let mut file = ExportFile::new();

        for child in self.children.list_children().await? {
            let mut daily_records = BTreeMap::new();
            for record in self.db.list_daily_records(&child.id).await? {
                daily_records.insert(
                    record.date,
                    ExportRecord {
                        schedule: record.schedule,
                        tasks: record.tasks,
                        redemptions: record.redemptions,
                    },
                );
            }

            let data = ExportChildData {
                schedule: self.catalogs.get_schedule(&child.id).await?,
                points_tasks: self.catalogs.get_tasks(&child.id).await?,
                rewards: self.catalogs.get_rewards(&child.id).await?,
                daily_records,
                total_points: self.ledger.compute_balance(&child.id).await?,
            };

            file.insert(
                child.id.clone(),
                ExportChild {
                    name: child.name,
                    data,
                },
            );
        }

        info!("Exported {} children", file.len());
        Ok(file)
    }

    /// Replace the whole dataset with the contents of an export file.
    ///
    /// Everything goes through `create_child` / `set_*` / record upsert, so
    /// imported data obeys the same rules (task name de-dup included) as
    /// live edits.
    pub async fn import(&self, file: ExportFile) -> Result<usize, DomainError> {
        self.db.clear_all_data().await?;

        let count = file.len();
        for (child_id, entry) in file {
            let child = self
                .children
                .create_child(CreateChildRequest {
                    id: Some(child_id),
                    name: entry.name,
                })
                .await?;

            self.catalogs.set_schedule(&child.id, entry.data.schedule).await?;
            self.catalogs.set_tasks(&child.id, entry.data.points_tasks).await?;
            self.catalogs.set_rewards(&child.id, entry.data.rewards).await?;

            for (date, payload) in entry.data.daily_records {
                let record = DailyRecord {
                    child_id: child.id.clone(),
                    date,
                    schedule: payload.schedule,
                    tasks: payload.tasks,
                    redemptions: payload.redemptions,
                };
                self.db.upsert_daily_record(&record).await?;
            }
        }

        info!("Imported {} children", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::{PointTask, Reward};

    async fn setup_test() -> (ExportService, Arc<DbConnection>) {
        let db = Arc::new(
            DbConnection::init_test()
                .await
                .expect("Failed to create test database"),
        );
        (ExportService::new(db.clone()), db)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_export_includes_total_points() {
        let (service, db) = setup_test().await;

        let child = ChildService::new(db.clone())
            .create_child(CreateChildRequest { id: None, name: "Alex".to_string() })
            .await
            .unwrap();
        db.replace_point_tasks(
            &child.id,
            &[PointTask { name: "Brush teeth".to_string(), points: 5 }],
        )
        .await
        .unwrap();
        LedgerService::new(db.clone())
            .toggle_task(&child.id, date(2024, 3, 1), 0)
            .await
            .unwrap();

        let file = service.export().await.unwrap();
        let entry = file.get(&child.id).unwrap();
        assert_eq!(entry.name, "Alex");
        assert_eq!(entry.data.total_points, 5);
        assert_eq!(entry.data.daily_records.len(), 1);
    }

    #[tokio::test]
    async fn test_import_round_trip_preserves_balances() {
        let (service, db) = setup_test().await;
        let ledger = LedgerService::new(db.clone());

        let child = ChildService::new(db.clone())
            .create_child(CreateChildRequest { id: None, name: "Alex".to_string() })
            .await
            .unwrap();
        db.replace_point_tasks(
            &child.id,
            &[
                PointTask { name: "Brush teeth".to_string(), points: 5 },
                PointTask { name: "Homework".to_string(), points: 5 },
            ],
        )
        .await
        .unwrap();
        db.replace_rewards(
            &child.id,
            &[Reward { name: "Sticker".to_string(), cost: 10 }],
        )
        .await
        .unwrap();
        ledger.toggle_task(&child.id, date(2024, 3, 1), 0).await.unwrap();
        ledger.toggle_task(&child.id, date(2024, 3, 2), 1).await.unwrap();
        ledger
            .redeem_reward(&child.id, 0, Some(date(2024, 3, 2)))
            .await
            .unwrap();

        let exported = service.export().await.unwrap();
        service.import(exported.clone()).await.unwrap();

        // Same balance and record count after rebuilding from the file
        assert_eq!(ledger.compute_balance(&child.id).await.unwrap(), 0);
        assert_eq!(db.list_daily_records(&child.id).await.unwrap().len(), 2);

        let re_exported = service.export().await.unwrap();
        assert_eq!(re_exported, exported);
    }

    #[tokio::test]
    async fn test_import_replaces_existing_dataset() {
        let (service, db) = setup_test().await;

        ChildService::new(db.clone())
            .create_child(CreateChildRequest { id: None, name: "Old child".to_string() })
            .await
            .unwrap();

        let mut file = ExportFile::new();
        file.insert(
            "child::42".to_string(),
            ExportChild {
                name: "Imported".to_string(),
                data: ExportChildData {
                    schedule: vec![],
                    points_tasks: vec![],
                    rewards: vec![],
                    daily_records: BTreeMap::new(),
                    total_points: 0,
                },
            },
        );

        service.import(file).await.unwrap();

        let children = db.list_children().await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "child::42");
        // Empty catalog lists from the file win over the creation seeds
        assert!(db.get_point_tasks("child::42").await.unwrap().is_empty());
    }
}
