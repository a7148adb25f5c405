use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::normalize::normalize_maintenance_row;
use crate::repository::table_service::{create_row, delete_row, get_row, list_rows, update_row};
use crate::schemas::{
    parse_id, remove_nulls, serialize_to_map, CreateMaintenanceTaskInput,
    UpdateMaintenanceTaskInput,
};
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/maintenance",
            axum::routing::get(list_tasks).post(create_task),
        )
        .route(
            "/maintenance/{id}",
            axum::routing::patch(update_task).delete(delete_task),
        )
}

async fn list_tasks(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let rows = list_rows(pool, "maintenance_tasks", None, 10000, 0, "created_at", false).await?;
    Ok(Json(Value::Array(
        rows.iter().map(normalize_maintenance_row).collect(),
    )))
}

async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<CreateMaintenanceTaskInput>,
) -> AppResult<impl IntoResponse> {
    let pool = db_pool(&state)?;
    let has_task = payload
        .task
        .as_deref()
        .is_some_and(|value| !value.trim().is_empty());
    if !has_task {
        return Err(AppError::BadRequest("Task description is required.".to_string()));
    }

    let record = remove_nulls(serialize_to_map(&payload));
    let created = create_row(pool, "maintenance_tasks", &record).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(normalize_maintenance_row(&created)),
    ))
}

/// Partial update: only the fields present in the body are written.
async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateMaintenanceTaskInput>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let task_id = parse_id(&id)?;

    let patch = remove_nulls(serialize_to_map(&payload));
    if patch.is_empty() {
        let existing = get_row(pool, "maintenance_tasks", task_id).await?;
        return Ok(Json(normalize_maintenance_row(&existing)));
    }

    let updated = update_row(pool, "maintenance_tasks", task_id, &patch).await?;
    Ok(Json(normalize_maintenance_row(&updated)))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let task_id = parse_id(&id)?;
    delete_row(pool, "maintenance_tasks", task_id).await?;
    Ok(Json(json!({ "success": true })))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state
        .db_pool
        .as_ref()
        .ok_or_else(|| AppError::Dependency("Database is not configured.".to_string()))
}
