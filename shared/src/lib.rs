//! Domain models and request/response types shared between the points-chart
//! backend and any client.
//!
//! All wire shapes use camelCase field names so that JSON payloads match the
//! legacy API the original web client was written against.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Child ID in format: "child::<epoch_millis>"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub id: String,
    pub name: String,
    /// Creation timestamp (RFC 3339); children list in creation order
    pub created_at: String,
    pub updated_at: String,
}

impl Child {
    /// Generate a child ID from a millisecond timestamp
    pub fn generate_id(timestamp_millis: u64) -> String {
        format!("child::{}", timestamp_millis)
    }
}

/// One slot in a child's daily schedule.
///
/// Schedule entries form an ordered list; daily records refer to them by
/// position in that list, so order is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Display time range, e.g. "06:30-07:00"
    pub time: String,
    pub activity: String,
    /// Encouragement shown when the slot is first checked off
    #[serde(default)]
    pub note: Option<String>,
}

/// A point-earning task. Task names are unique per child; the catalog store
/// de-duplicates by name on write (last occurrence wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointTask {
    pub name: String,
    pub points: i64,
}

/// A reward redeemable for points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub name: String,
    pub cost: i64,
}

/// A single reward redemption recorded on a daily record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    #[serde(rename = "name")]
    pub reward_name: String,
    pub cost: i64,
    /// Redemption timestamp (RFC 3339)
    #[serde(rename = "time")]
    pub redeemed_at: String,
}

/// Per-(child, date) completion and redemption snapshot.
///
/// The `schedule` and `tasks` maps are keyed by ordinal position into the
/// child's *current* catalog lists, not by a stable identifier. Positions
/// beyond the current catalog length are tolerated and simply ignored when
/// points are aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    #[serde(rename = "childId")]
    pub child_id: String,
    pub date: NaiveDate,
    /// schedule position -> completed
    #[serde(default)]
    pub schedule: BTreeMap<usize, bool>,
    /// point-task position -> completed
    #[serde(default)]
    pub tasks: BTreeMap<usize, bool>,
    /// Redemptions made on this date, in redemption order
    #[serde(default, rename = "rewards")]
    pub redemptions: Vec<Redemption>,
}

impl DailyRecord {
    /// A fresh record with nothing completed and nothing redeemed.
    pub fn empty(child_id: &str, date: NaiveDate) -> Self {
        Self {
            child_id: child_id.to_string(),
            date,
            schedule: BTreeMap::new(),
            tasks: BTreeMap::new(),
            redemptions: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateChildRequest {
    /// Caller-supplied ID (import path); generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildListResponse {
    pub children: Vec<Child>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetScheduleRequest {
    pub schedules: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetTasksRequest {
    #[serde(rename = "pointsTasks")]
    pub points_tasks: Vec<PointTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRewardsRequest {
    pub rewards: Vec<Reward>,
}

/// Body for the raw daily-record upsert endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecordRequest {
    pub date: NaiveDate,
    #[serde(default)]
    pub schedule: BTreeMap<usize, bool>,
    #[serde(default)]
    pub tasks: BTreeMap<usize, bool>,
    #[serde(default, rename = "rewards")]
    pub redemptions: Vec<Redemption>,
}

/// Result of flipping a schedule or task checkbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub completed: bool,
    /// Encouragement note, present only on a false -> true schedule toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemRequest {
    /// Date the redemption is recorded under; defaults to today
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub redemption: Redemption,
    #[serde(rename = "totalPoints")]
    pub total_points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalPointsResponse {
    #[serde(rename = "totalPoints")]
    pub total_points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPointsResponse {
    #[serde(rename = "weeklyPoints")]
    pub weekly_points: i64,
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

/// Full-dataset export document, keyed by child ID.
pub type ExportFile = BTreeMap<String, ExportChild>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportChild {
    pub name: String,
    pub data: ExportChildData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportChildData {
    pub schedule: Vec<ScheduleEntry>,
    #[serde(rename = "pointsTasks")]
    pub points_tasks: Vec<PointTask>,
    pub rewards: Vec<Reward>,
    /// Daily records keyed by date
    #[serde(rename = "dailyRecords")]
    pub daily_records: BTreeMap<NaiveDate, ExportRecord>,
    #[serde(rename = "totalPoints")]
    pub total_points: i64,
}

/// Daily-record payload inside an export file (child and date are implied by
/// the surrounding keys).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    #[serde(default)]
    pub schedule: BTreeMap<usize, bool>,
    #[serde(default)]
    pub tasks: BTreeMap<usize, bool>,
    #[serde(default, rename = "rewards")]
    pub redemptions: Vec<Redemption>,
}
