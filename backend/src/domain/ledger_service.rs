//! The points ledger: completion toggles, reward redemption, and balance
//! aggregation across daily records.
//!
//! Balances are recomputed in full from every stored record on every query.
//! There are no incremental counters to drift when a catalog is edited after
//! historical records already reference it; the cost is O(records) per query,
//! which is fine for a single household.
//!
//! Every mutation runs inside a [`crate::storage::RecordMutation`] session, a write
//! transaction that holds the database write lock from its first statement.
//! Concurrent toggles and redemptions for the same record therefore serialize
//! instead of overwriting each other, and a redemption's balance check sees
//! exactly the state its write lands on.
//!
//! Daily records reference catalog entries by ordinal position into the
//! current list. That mapping is resolved in exactly one place,
//! [`resolve_by_position`]; positions that fall outside the current catalog
//! are ignored rather than treated as errors.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::errors::DomainError;
use crate::storage::DbConnection;
use shared::{DailyRecord, PointTask, Redemption, ToggleResponse};

/// Service implementing the ledger operations over daily records
#[derive(Clone)]
pub struct LedgerService {
    db: Arc<DbConnection>,
}

/// Resolve a positional reference into the current catalog list.
///
/// Compatibility shim for the legacy position-keyed record format: historical
/// records silently change meaning when the list is reordered or shortened,
/// and an out-of-range position resolves to nothing. Swapping the records
/// over to stable entry IDs would replace this function and nothing else.
fn resolve_by_position<T>(catalog: &[T], position: usize) -> Option<&T> {
    catalog.get(position)
}

/// Points earned by one record given the current task catalog
fn earned_points(tasks: &[PointTask], record: &DailyRecord) -> i64 {
    record
        .tasks
        .iter()
        .filter(|(_, completed)| **completed)
        .filter_map(|(position, _)| resolve_by_position(tasks, *position))
        .map(|task| task.points)
        .sum()
}

fn redeemed_cost(record: &DailyRecord) -> i64 {
    record.redemptions.iter().map(|r| r.cost).sum()
}

/// All-time balance over a set of records given the current task catalog
fn balance_from(tasks: &[PointTask], records: &[DailyRecord]) -> i64 {
    records
        .iter()
        .map(|record| earned_points(tasks, record) - redeemed_cost(record))
        .sum()
}

/// Most recent Sunday on or before the given date
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

impl LedgerService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }

    /// Flip the schedule checkbox at `position` for (child, date).
    ///
    /// On a false -> true transition the encouragement note of the entry
    /// currently at that position is returned; a position past the end of
    /// the current schedule still toggles, it just has no note to show.
    pub async fn toggle_schedule(
        &self,
        child_id: &str,
        date: NaiveDate,
        position: usize,
    ) -> Result<ToggleResponse, DomainError> {
        let mut session = self.db.begin_record_mutation(child_id, date).await?;
        let record = session.record_mut();
        let completed = !record.schedule.get(&position).copied().unwrap_or(false);
        record.schedule.insert(position, completed);

        let note = if completed {
            let schedule = session.schedule_entries().await?;
            resolve_by_position(&schedule, position).and_then(|entry| entry.note.clone())
        } else {
            None
        };
        session.commit().await?;

        info!(
            "Toggled schedule[{}] for {} on {}: {}",
            position, child_id, date, completed
        );
        Ok(ToggleResponse { completed, note })
    }

    /// Flip the task checkbox at `position` for (child, date)
    pub async fn toggle_task(
        &self,
        child_id: &str,
        date: NaiveDate,
        position: usize,
    ) -> Result<bool, DomainError> {
        let mut session = self.db.begin_record_mutation(child_id, date).await?;
        let record = session.record_mut();
        let completed = !record.tasks.get(&position).copied().unwrap_or(false);
        record.tasks.insert(position, completed);
        session.commit().await?;

        info!(
            "Toggled task[{}] for {} on {}: {}",
            position, child_id, date, completed
        );
        Ok(completed)
    }

    /// Redeem the reward at `position` in the child's current reward list,
    /// recording it on the record for `date` (today when not given).
    ///
    /// Fails without mutating anything when the position is out of range or
    /// the balance does not cover the cost. Deliberately not idempotent:
    /// each successful call deducts again, and confirmation is the caller's
    /// concern.
    pub async fn redeem_reward(
        &self,
        child_id: &str,
        position: usize,
        date: Option<NaiveDate>,
    ) -> Result<Redemption, DomainError> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let mut session = self.db.begin_record_mutation(child_id, date).await?;

        let rewards = session.rewards().await?;
        let reward = match resolve_by_position(&rewards, position) {
            Some(reward) => reward.clone(),
            None => {
                session.rollback().await?;
                return Err(DomainError::RewardNotFound(position));
            }
        };

        let tasks = session.point_tasks().await?;
        let records = session.all_records().await?;
        let balance = balance_from(&tasks, &records);
        if balance < reward.cost {
            warn!(
                "Redemption refused for {}: balance {} < cost {}",
                child_id, balance, reward.cost
            );
            session.rollback().await?;
            return Err(DomainError::InsufficientPoints {
                balance,
                cost: reward.cost,
            });
        }

        let redemption = Redemption {
            reward_name: reward.name.clone(),
            cost: reward.cost,
            redeemed_at: Utc::now().to_rfc3339(),
        };
        session.record_mut().redemptions.push(redemption.clone());
        session.commit().await?;

        info!(
            "Redeemed '{}' ({} points) for {} on {}",
            redemption.reward_name, redemption.cost, child_id, date
        );
        Ok(redemption)
    }

    /// All-time balance: points of every completed in-range task position
    /// across all records, minus every redemption cost. May be negative.
    pub async fn compute_balance(&self, child_id: &str) -> Result<i64, DomainError> {
        let tasks = self.db.get_point_tasks(child_id).await?;
        let records = self.db.list_daily_records(child_id).await?;
        Ok(balance_from(&tasks, &records))
    }

    /// Points earned in the Sunday-to-`as_of` window, inclusive on both
    /// ends. Redemptions do not reduce this figure.
    pub async fn compute_weekly_balance(
        &self,
        child_id: &str,
        as_of: NaiveDate,
    ) -> Result<i64, DomainError> {
        let tasks = self.db.get_point_tasks(child_id).await?;
        let records = self.db.list_daily_records(child_id).await?;
        let start = week_start(as_of);

        let weekly = records
            .iter()
            .filter(|record| record.date >= start && record.date <= as_of)
            .map(|record| earned_points(&tasks, record))
            .sum();
        Ok(weekly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Reward;

    fn task(name: &str, points: i64) -> PointTask {
        PointTask {
            name: name.to_string(),
            points,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup_test() -> (LedgerService, Arc<DbConnection>) {
        let db = Arc::new(
            DbConnection::init_test()
                .await
                .expect("Failed to create test database"),
        );
        (LedgerService::new(db.clone()), db)
    }

    #[test]
    fn test_week_start_is_most_recent_sunday() {
        // 2024-01-07 is a Sunday
        assert_eq!(week_start(date(2024, 1, 7)), date(2024, 1, 7));
        assert_eq!(week_start(date(2024, 1, 13)), date(2024, 1, 7));
        assert_eq!(week_start(date(2024, 1, 6)), date(2023, 12, 31));
    }

    #[tokio::test]
    async fn test_toggle_task_and_balance() {
        // Scenario: one 5-point task, completed once
        let (ledger, db) = setup_test().await;
        db.replace_point_tasks("child::1", &[task("Brush teeth", 5)])
            .await
            .unwrap();

        let completed = ledger
            .toggle_task("child::1", date(2024, 3, 1), 0)
            .await
            .unwrap();
        assert!(completed);
        assert_eq!(ledger.compute_balance("child::1").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_toggle_task_twice_restores_balance() {
        let (ledger, db) = setup_test().await;
        db.replace_point_tasks("child::1", &[task("Brush teeth", 5)])
            .await
            .unwrap();

        ledger.toggle_task("child::1", date(2024, 3, 1), 0).await.unwrap();
        let completed = ledger
            .toggle_task("child::1", date(2024, 3, 1), 0)
            .await
            .unwrap();

        assert!(!completed);
        assert_eq!(ledger.compute_balance("child::1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_balance_ignores_positions_past_catalog_end() {
        let (ledger, db) = setup_test().await;
        db.replace_point_tasks(
            "child::1",
            &[task("A", 1), task("B", 1), task("C", 1)],
        )
        .await
        .unwrap();

        // Record claims completion of a task that no longer exists
        let mut record = DailyRecord::empty("child::1", date(2024, 3, 1));
        record.tasks.insert(0, true);
        record.tasks.insert(5, true);
        db.upsert_daily_record(&record).await.unwrap();

        assert_eq!(ledger.compute_balance("child::1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_balance_tracks_current_catalog_after_edit() {
        let (ledger, db) = setup_test().await;
        db.replace_point_tasks("child::1", &[task("Old", 2)]).await.unwrap();
        ledger.toggle_task("child::1", date(2024, 3, 1), 0).await.unwrap();
        assert_eq!(ledger.compute_balance("child::1").await.unwrap(), 2);

        // Position 0 now means a different, higher-value task
        db.replace_point_tasks("child::1", &[task("New", 10)]).await.unwrap();
        assert_eq!(ledger.compute_balance("child::1").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_toggle_schedule_returns_note_on_completion_only() {
        let (ledger, db) = setup_test().await;
        db.replace_schedule_entries(
            "child::1",
            &[shared::ScheduleEntry {
                time: "07:00".to_string(),
                activity: "Breakfast".to_string(),
                note: Some("Well done!".to_string()),
            }],
        )
        .await
        .unwrap();

        let on = ledger
            .toggle_schedule("child::1", date(2024, 3, 1), 0)
            .await
            .unwrap();
        assert!(on.completed);
        assert_eq!(on.note.as_deref(), Some("Well done!"));

        let off = ledger
            .toggle_schedule("child::1", date(2024, 3, 1), 0)
            .await
            .unwrap();
        assert!(!off.completed);
        assert!(off.note.is_none());
    }

    #[tokio::test]
    async fn test_toggle_schedule_past_catalog_end_has_no_note() {
        let (ledger, _db) = setup_test().await;

        let outcome = ledger
            .toggle_schedule("child::1", date(2024, 3, 1), 9)
            .await
            .unwrap();
        assert!(outcome.completed);
        assert!(outcome.note.is_none());
    }

    #[tokio::test]
    async fn test_redeem_insufficient_points_leaves_state_unchanged() {
        // Scenario: balance 5, reward costs 10
        let (ledger, db) = setup_test().await;
        db.replace_point_tasks("child::1", &[task("Brush teeth", 5)])
            .await
            .unwrap();
        ledger.toggle_task("child::1", date(2024, 3, 1), 0).await.unwrap();
        db.replace_rewards(
            "child::1",
            &[Reward { name: "Sticker".to_string(), cost: 10 }],
        )
        .await
        .unwrap();

        let result = ledger.redeem_reward("child::1", 0, None).await;
        assert!(matches!(
            result,
            Err(DomainError::InsufficientPoints { balance: 5, cost: 10 })
        ));
        assert_eq!(ledger.compute_balance("child::1").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_redeem_deducts_exactly_cost() {
        // Scenario: balance raised to 10, redemption brings it to 0
        let (ledger, db) = setup_test().await;
        db.replace_point_tasks(
            "child::1",
            &[task("Brush teeth", 5), task("Homework", 5)],
        )
        .await
        .unwrap();
        ledger.toggle_task("child::1", date(2024, 3, 1), 0).await.unwrap();
        ledger.toggle_task("child::1", date(2024, 3, 1), 1).await.unwrap();
        db.replace_rewards(
            "child::1",
            &[Reward { name: "Sticker".to_string(), cost: 10 }],
        )
        .await
        .unwrap();

        let redemption = ledger
            .redeem_reward("child::1", 0, Some(date(2024, 3, 2)))
            .await
            .unwrap();
        assert_eq!(redemption.reward_name, "Sticker");
        assert_eq!(redemption.cost, 10);
        assert_eq!(ledger.compute_balance("child::1").await.unwrap(), 0);

        let record = db.get_daily_record("child::1", date(2024, 3, 2)).await.unwrap();
        assert_eq!(record.redemptions.len(), 1);
    }

    #[tokio::test]
    async fn test_redeem_unknown_position_fails_not_found() {
        let (ledger, db) = setup_test().await;
        db.replace_rewards(
            "child::1",
            &[Reward { name: "Sticker".to_string(), cost: 10 }],
        )
        .await
        .unwrap();

        let result = ledger.redeem_reward("child::1", 3, None).await;
        assert!(matches!(result, Err(DomainError::RewardNotFound(3))));
    }

    #[tokio::test]
    async fn test_redeem_is_not_idempotent() {
        let (ledger, db) = setup_test().await;
        db.replace_point_tasks("child::1", &[task("Big job", 30)])
            .await
            .unwrap();
        ledger.toggle_task("child::1", date(2024, 3, 1), 0).await.unwrap();
        db.replace_rewards(
            "child::1",
            &[Reward { name: "Sticker".to_string(), cost: 10 }],
        )
        .await
        .unwrap();

        for _ in 0..3 {
            ledger
                .redeem_reward("child::1", 0, Some(date(2024, 3, 1)))
                .await
                .unwrap();
        }
        assert_eq!(ledger.compute_balance("child::1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_negative_balance_blocks_all_redemptions() {
        let (ledger, db) = setup_test().await;
        // A stale record redemption with no earnings drives the balance negative
        let mut record = DailyRecord::empty("child::1", date(2024, 3, 1));
        record.redemptions.push(Redemption {
            reward_name: "Old reward".to_string(),
            cost: 20,
            redeemed_at: "2024-03-01T12:00:00+00:00".to_string(),
        });
        db.upsert_daily_record(&record).await.unwrap();
        db.replace_rewards(
            "child::1",
            &[Reward { name: "Sticker".to_string(), cost: 10 }],
        )
        .await
        .unwrap();

        assert_eq!(ledger.compute_balance("child::1").await.unwrap(), -20);
        assert!(matches!(
            ledger.redeem_reward("child::1", 0, None).await,
            Err(DomainError::InsufficientPoints { .. })
        ));
    }

    #[tokio::test]
    async fn test_weekly_balance_sunday_window() {
        let (ledger, db) = setup_test().await;
        db.replace_point_tasks("child::1", &[task("Daily task", 1)])
            .await
            .unwrap();

        // 2024-01-07 (Sunday) through 2024-01-13 (Saturday), 1 point each
        for day in 7..=13 {
            ledger
                .toggle_task("child::1", date(2024, 1, day), 0)
                .await
                .unwrap();
        }

        assert_eq!(
            ledger
                .compute_weekly_balance("child::1", date(2024, 1, 13))
                .await
                .unwrap(),
            7
        );
        // The preceding Saturday belongs to the prior week's window
        assert_eq!(
            ledger
                .compute_weekly_balance("child::1", date(2024, 1, 6))
                .await
                .unwrap(),
            0
        );
        // Mid-week cutoff: only Sunday through Wednesday count
        assert_eq!(
            ledger
                .compute_weekly_balance("child::1", date(2024, 1, 10))
                .await
                .unwrap(),
            4
        );
    }

    #[tokio::test]
    async fn test_weekly_balance_not_reduced_by_redemptions() {
        let (ledger, db) = setup_test().await;
        db.replace_point_tasks("child::1", &[task("Daily task", 10)])
            .await
            .unwrap();
        db.replace_rewards(
            "child::1",
            &[Reward { name: "Sticker".to_string(), cost: 10 }],
        )
        .await
        .unwrap();

        ledger.toggle_task("child::1", date(2024, 1, 8), 0).await.unwrap();
        ledger
            .redeem_reward("child::1", 0, Some(date(2024, 1, 9)))
            .await
            .unwrap();

        assert_eq!(ledger.compute_balance("child::1").await.unwrap(), 0);
        assert_eq!(
            ledger
                .compute_weekly_balance("child::1", date(2024, 1, 13))
                .await
                .unwrap(),
            10
        );
    }

    #[tokio::test]
    async fn test_concurrent_toggles_both_flags_survive() {
        // Two toggles racing on the same record must not overwrite each other
        let (ledger, db) = setup_test().await;
        db.replace_point_tasks("child::1", &[task("A", 1), task("B", 1)])
            .await
            .unwrap();

        for day in 1..=28 {
            let when = date(2024, 2, day);
            let first = ledger.clone();
            let second = ledger.clone();
            let a = tokio::spawn(async move { first.toggle_task("child::1", when, 0).await });
            let b = tokio::spawn(async move { second.toggle_task("child::1", when, 1).await });
            a.await.unwrap().unwrap();
            b.await.unwrap().unwrap();

            let record = db.get_daily_record("child::1", when).await.unwrap();
            assert_eq!(record.tasks.get(&0), Some(&true), "day {}", day);
            assert_eq!(record.tasks.get(&1), Some(&true), "day {}", day);
        }
    }

    #[tokio::test]
    async fn test_concurrent_redeems_cannot_overspend() {
        // Balance covers exactly one redemption; racing a second must fail
        let (ledger, db) = setup_test().await;
        db.replace_point_tasks("child::1", &[task("Big job", 10)])
            .await
            .unwrap();
        ledger.toggle_task("child::1", date(2024, 3, 1), 0).await.unwrap();
        db.replace_rewards(
            "child::1",
            &[Reward { name: "Sticker".to_string(), cost: 10 }],
        )
        .await
        .unwrap();

        let when = date(2024, 3, 2);
        let first = ledger.clone();
        let second = ledger.clone();
        let a = tokio::spawn(async move { first.redeem_reward("child::1", 0, Some(when)).await });
        let b = tokio::spawn(async move { second.redeem_reward("child::1", 0, Some(when)).await });
        let outcomes = [a.await.unwrap(), b.await.unwrap()];

        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        for outcome in &outcomes {
            if let Err(err) = outcome {
                assert!(matches!(err, DomainError::InsufficientPoints { .. }));
            }
        }
        assert_eq!(ledger.compute_balance("child::1").await.unwrap(), 0);
    }
}
