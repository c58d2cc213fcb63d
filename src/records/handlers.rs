use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    pace::calculate_pace,
    records::{dto::CreateRecordRequest, repo::TrainingRecord},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/records", get(list_records))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/records", post(create_record))
        .route("/records/:id", delete(delete_record))
}

/// The caller's records, newest date first.
#[instrument(skip(state))]
pub async fn list_records(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<TrainingRecord>>, ApiError> {
    let records = TrainingRecord::list_by_user(&state.db, user_id).await?;
    Ok(Json(records))
}

#[instrument(skip(state, payload))]
pub async fn create_record(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<TrainingRecord>), ApiError> {
    // Pace is recomputed here on every submission; this also validates
    // distance and duration before the row is written.
    let pace = calculate_pace(payload.distance_km, &payload.duration)?;

    let record = TrainingRecord::create(&state.db, user_id, &payload, &pace).await?;
    info!(user_id = %user_id, record_id = %record.id, "record created");

    Ok((StatusCode::CREATED, Json(record)))
}

/// Deleting a record the caller does not own matches no rows and responds
/// 204 all the same, mirroring the row-visibility rule of the store policy.
#[instrument(skip(state))]
pub async fn delete_record(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let rows = TrainingRecord::delete_by_owner(&state.db, user_id, id).await?;
    if rows == 0 {
        debug!(user_id = %user_id, record_id = %id, "delete matched no visible rows");
    } else {
        info!(user_id = %user_id, record_id = %id, "record deleted");
    }
    Ok(StatusCode::NO_CONTENT)
}
