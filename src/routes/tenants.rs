use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::normalize::normalize_tenant_row;
use crate::repository::table_service::{create_row, delete_row, list_rows, update_row};
use crate::schemas::{
    parse_id, remove_nulls, serialize_to_map, validate_input, CreateTenantInput, UpdateTenantInput,
};
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/tenants",
            axum::routing::get(list_tenants).post(create_tenant),
        )
        .route(
            "/tenants/{id}",
            axum::routing::put(update_tenant).delete(delete_tenant),
        )
}

async fn list_tenants(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let rows = list_rows(pool, "tenants", None, 10000, 0, "created_at", false).await?;
    Ok(Json(Value::Array(
        rows.iter().map(normalize_tenant_row).collect(),
    )))
}

async fn create_tenant(
    State(state): State<AppState>,
    Json(payload): Json<CreateTenantInput>,
) -> AppResult<impl IntoResponse> {
    let pool = db_pool(&state)?;
    require_tenant_fields(&payload)?;
    validate_input(&payload)?;

    let record = remove_nulls(serialize_to_map(&payload));
    let created = create_row(pool, "tenants", &record).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(normalize_tenant_row(&created)),
    ))
}

/// Full replace: notes absent from the body are cleared to NULL.
async fn update_tenant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTenantInput>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let tenant_id = parse_id(&id)?;
    require_tenant_fields(&payload)?;
    validate_input(&payload)?;

    let patch = serialize_to_map(&payload);
    let updated = update_row(pool, "tenants", tenant_id, &patch).await?;
    Ok(Json(normalize_tenant_row(&updated)))
}

/// Downstream effects are the migration's foreign-key policies: properties
/// referencing the tenant get tenant_id set to NULL, payments cascade.
async fn delete_tenant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let tenant_id = parse_id(&id)?;
    delete_row(pool, "tenants", tenant_id).await?;
    Ok(Json(json!({ "success": true })))
}

fn require_tenant_fields(payload: &CreateTenantInput) -> Result<(), AppError> {
    let has_name = payload
        .full_name
        .as_deref()
        .is_some_and(|value| !value.trim().is_empty());
    let has_phone = payload
        .phone
        .as_deref()
        .is_some_and(|value| !value.trim().is_empty());
    let has_email = payload
        .email
        .as_deref()
        .is_some_and(|value| !value.trim().is_empty());
    if !(has_name && has_phone && has_email) {
        return Err(AppError::BadRequest(
            "Full name, phone and email are required.".to_string(),
        ));
    }
    if payload.move_in.is_none() || payload.move_out.is_none() {
        return Err(AppError::BadRequest(
            "Move-in and move-out dates are required.".to_string(),
        ));
    }
    Ok(())
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state
        .db_pool
        .as_ref()
        .ok_or_else(|| AppError::Dependency("Database is not configured.".to_string()))
}
