//! REST interface for the points chart.
//!
//! Pure translation layer: JSON in, service call, JSON out, with domain
//! errors mapped to HTTP status codes. No business logic lives here.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::domain::{templates, DomainError};
use crate::AppState;
use shared::{
    Child, ChildListResponse, CreateChildRequest, DailyRecord, ExportFile, RedeemRequest,
    RedeemResponse, SaveRecordRequest, SetRewardsRequest, SetScheduleRequest, SetTasksRequest,
    ToggleResponse, TotalPointsResponse, WeeklyPointsResponse,
};

/// Domain error carrier implementing the HTTP status mapping
pub struct ApiError(DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DomainError::ChildNotFound(_) | DomainError::RewardNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            DomainError::InsufficientPoints { .. } | DomainError::LastChild => {
                StatusCode::CONFLICT
            }
            DomainError::EmptyName => StatusCode::BAD_REQUEST,
            DomainError::Storage(err) => {
                error!("Storage failure: {:#}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the application router with all API routes under `/api`
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/children", get(list_children).post(create_child))
        .route("/children/:id", get(get_child).delete(delete_child))
        .route("/children/:id/schedules", get(get_schedules).post(set_schedules))
        .route(
            "/children/:id/points-tasks",
            get(get_points_tasks).post(set_points_tasks),
        )
        .route("/children/:id/rewards", get(get_rewards).post(set_rewards))
        .route(
            "/children/:id/daily-records",
            get(list_daily_records).post(save_daily_record),
        )
        .route("/children/:id/daily-records/:date", get(get_daily_record))
        .route(
            "/children/:id/daily-records/:date/schedule/:position/toggle",
            post(toggle_schedule),
        )
        .route(
            "/children/:id/daily-records/:date/tasks/:position/toggle",
            post(toggle_task),
        )
        .route("/children/:id/rewards/:position/redeem", post(redeem_reward))
        .route("/children/:id/total-points", get(total_points))
        .route("/children/:id/weekly-points", get(weekly_points))
        .route("/templates/schedules", get(template_schedules))
        .route("/templates/points-tasks", get(template_points_tasks))
        .route("/templates/rewards", get(template_rewards))
        .route("/export", get(export_data))
        .route("/import", post(import_data));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Children
// ---------------------------------------------------------------------------

async fn list_children(State(state): State<AppState>) -> ApiResult<Json<ChildListResponse>> {
    let children = state.children.list_children().await?;
    Ok(Json(ChildListResponse { children }))
}

async fn get_child(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Child>> {
    let child = state
        .children
        .get_child(&id)
        .await?
        .ok_or(DomainError::ChildNotFound(id))?;
    Ok(Json(child))
}

async fn create_child(
    State(state): State<AppState>,
    Json(request): Json<CreateChildRequest>,
) -> ApiResult<(StatusCode, Json<Child>)> {
    info!("POST /api/children - name: {}", request.name);
    let child = state.children.create_child(request).await?;
    Ok((StatusCode::CREATED, Json(child)))
}

async fn delete_child(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    info!("DELETE /api/children/{}", id);
    state.children.delete_child(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Catalogs
// ---------------------------------------------------------------------------

async fn get_schedules(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<shared::ScheduleEntry>>> {
    Ok(Json(state.catalogs.get_schedule(&id).await?))
}

async fn set_schedules(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetScheduleRequest>,
) -> ApiResult<StatusCode> {
    state.catalogs.set_schedule(&id, request.schedules).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_points_tasks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<shared::PointTask>>> {
    Ok(Json(state.catalogs.get_tasks(&id).await?))
}

async fn set_points_tasks(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetTasksRequest>,
) -> ApiResult<StatusCode> {
    state.catalogs.set_tasks(&id, request.points_tasks).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_rewards(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<shared::Reward>>> {
    Ok(Json(state.catalogs.get_rewards(&id).await?))
}

async fn set_rewards(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetRewardsRequest>,
) -> ApiResult<StatusCode> {
    state.catalogs.set_rewards(&id, request.rewards).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Daily records
// ---------------------------------------------------------------------------

async fn list_daily_records(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<DailyRecord>>> {
    let records = state.db.list_daily_records(&id).await.map_err(DomainError::from)?;
    Ok(Json(records))
}

async fn get_daily_record(
    State(state): State<AppState>,
    Path((id, date)): Path<(String, NaiveDate)>,
) -> ApiResult<Json<DailyRecord>> {
    let record = state
        .db
        .get_daily_record(&id, date)
        .await
        .map_err(DomainError::from)?;
    Ok(Json(record))
}

async fn save_daily_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SaveRecordRequest>,
) -> ApiResult<Json<DailyRecord>> {
    let record = DailyRecord {
        child_id: id,
        date: request.date,
        schedule: request.schedule,
        tasks: request.tasks,
        redemptions: request.redemptions,
    };
    state
        .db
        .upsert_daily_record(&record)
        .await
        .map_err(DomainError::from)?;
    Ok(Json(record))
}

// ---------------------------------------------------------------------------
// Ledger operations
// ---------------------------------------------------------------------------

async fn toggle_schedule(
    State(state): State<AppState>,
    Path((id, date, position)): Path<(String, NaiveDate, usize)>,
) -> ApiResult<Json<ToggleResponse>> {
    let outcome = state.ledger.toggle_schedule(&id, date, position).await?;
    Ok(Json(outcome))
}

async fn toggle_task(
    State(state): State<AppState>,
    Path((id, date, position)): Path<(String, NaiveDate, usize)>,
) -> ApiResult<Json<ToggleResponse>> {
    let completed = state.ledger.toggle_task(&id, date, position).await?;
    Ok(Json(ToggleResponse {
        completed,
        note: None,
    }))
}

async fn redeem_reward(
    State(state): State<AppState>,
    Path((id, position)): Path<(String, usize)>,
    body: Option<Json<RedeemRequest>>,
) -> ApiResult<Json<RedeemResponse>> {
    let date = body.and_then(|Json(request)| request.date);
    let redemption = state.ledger.redeem_reward(&id, position, date).await?;
    let total_points = state.ledger.compute_balance(&id).await?;
    Ok(Json(RedeemResponse {
        redemption,
        total_points,
    }))
}

async fn total_points(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TotalPointsResponse>> {
    let total_points = state.ledger.compute_balance(&id).await?;
    Ok(Json(TotalPointsResponse { total_points }))
}

#[derive(Debug, Deserialize)]
struct WeeklyPointsQuery {
    date: Option<NaiveDate>,
}

async fn weekly_points(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<WeeklyPointsQuery>,
) -> ApiResult<Json<WeeklyPointsResponse>> {
    let as_of = query.date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let weekly_points = state.ledger.compute_weekly_balance(&id, as_of).await?;
    Ok(Json(WeeklyPointsResponse { weekly_points }))
}

// ---------------------------------------------------------------------------
// Templates, export / import
// ---------------------------------------------------------------------------

async fn template_schedules() -> Json<Vec<shared::ScheduleEntry>> {
    Json(templates::default_schedule())
}

async fn template_points_tasks() -> Json<Vec<shared::PointTask>> {
    Json(templates::default_point_tasks())
}

async fn template_rewards() -> Json<Vec<shared::Reward>> {
    Json(templates::default_rewards())
}

async fn export_data(State(state): State<AppState>) -> ApiResult<Json<ExportFile>> {
    Ok(Json(state.export.export().await?))
}

async fn import_data(
    State(state): State<AppState>,
    Json(file): Json<ExportFile>,
) -> ApiResult<Json<serde_json::Value>> {
    let imported = state.export.import(file).await?;
    Ok(Json(json!({ "imported": imported })))
}
