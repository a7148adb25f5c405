use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::normalize::normalize_payment_row;
use crate::repository::table_service::{create_row, list_rows};
use crate::schemas::{remove_nulls, require_field, serialize_to_map, CreatePaymentInput};
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/payments",
        axum::routing::get(list_payments).post(record_payment),
    )
}

async fn list_payments(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let rows = list_rows(pool, "payments", None, 20000, 0, "date_paid", false).await?;
    Ok(Json(Value::Array(
        rows.iter().map(normalize_payment_row).collect(),
    )))
}

async fn record_payment(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentInput>,
) -> AppResult<impl IntoResponse> {
    let pool = db_pool(&state)?;
    require_field(payload.tenant_id, "tenantId and amount are required.")?;
    require_field(payload.amount, "tenantId and amount are required.")?;

    let mut record = remove_nulls(serialize_to_map(&payload));
    // Written explicitly rather than left to the column default so the
    // response row carries the date that was actually persisted.
    record.entry("date_paid".to_string()).or_insert_with(|| {
        Value::String(Utc::now().date_naive().to_string())
    });

    let created = create_row(pool, "payments", &record).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(normalize_payment_row(&created)),
    ))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state
        .db_pool
        .as_ref()
        .ok_or_else(|| AppError::Dependency("Database is not configured.".to_string()))
}
