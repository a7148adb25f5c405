use std::collections::{HashMap, HashSet};

use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Map, Value};

use crate::error::{AppError, AppResult};
use crate::normalize::{int_from_value, number_from_value};
use crate::repository::table_service::{count_rows, list_rows, sum_column};
use crate::schemas::{clamp_limit_in_range, MonthQuery, ProfitQuery};
use crate::services::months::{trailing_months, MonthRange};
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/dashboard-stats", axum::routing::get(dashboard_stats))
        .route("/profit", axum::routing::get(profit))
        .route(
            "/revenue-by-property",
            axum::routing::get(revenue_by_property),
        )
}

/// Dashboard statistics for one calendar month. Each figure is an
/// independent query; empty result sets coerce to zero.
///
/// totalTenants is the raw tenant count, the canonical definition for this
/// metric (not the distinct-tenants-linked-to-a-property variant).
async fn dashboard_stats(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let range = MonthRange::resolve(query.month.as_deref())?;

    let total_rent = sum_column(pool, "payments", "amount", Some(&date_paid_filters(&range))).await?;
    let total_properties = count_rows(pool, "properties", None).await?;
    let occupied_properties =
        count_rows(pool, "properties", Some(&status_filter("occupied"))).await?;
    let total_tenants = count_rows(pool, "tenants", None).await?;
    let new_tenants = count_rows(pool, "tenants", Some(&move_in_filters(&range))).await?;

    // Pending payments is a set difference: tenants minus tenants with at
    // least one payment dated inside the month.
    let tenants = list_rows(pool, "tenants", None, 10000, 0, "created_at", false).await?;
    let payments = list_rows(
        pool,
        "payments",
        Some(&date_paid_filters(&range)),
        20000,
        0,
        "date_paid",
        false,
    )
    .await?;
    let pending_payments = pending_payment_count(&tenants, &payments);

    Ok(Json(json!({
        "totalRent": round2(total_rent),
        "totalProperties": total_properties,
        "occupiedProperties": occupied_properties,
        "totalTenants": total_tenants,
        "newTenants": new_tenants,
        "pendingPayments": pending_payments,
    })))
}

/// Monthly payment totals for the trailing N months, oldest first. Months
/// with no payments are present with a zero total.
async fn profit(
    State(state): State<AppState>,
    Query(query): Query<ProfitQuery>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let months = clamp_limit_in_range(query.months, 1, 24) as u32;
    let buckets = trailing_months(Utc::now().date_naive(), months)?;

    let mut filters = Map::new();
    if let (Some(first), Some(last)) = (buckets.first(), buckets.last()) {
        filters.insert(
            "date_paid__gte".to_string(),
            Value::String(first.start.to_string()),
        );
        filters.insert(
            "date_paid__lte".to_string(),
            Value::String(last.end.to_string()),
        );
    }
    let payments = list_rows(pool, "payments", Some(&filters), 20000, 0, "date_paid", true).await?;

    Ok(Json(Value::Array(bucket_totals(&buckets, &payments))))
}

/// Payments summed per the property linked to the paying tenant. Payments
/// whose tenant has no linked property roll up under "Unknown".
async fn revenue_by_property(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let payments = list_rows(pool, "payments", None, 20000, 0, "date_paid", false).await?;
    let properties = list_rows(pool, "properties", None, 10000, 0, "created_at", false).await?;

    Ok(Json(Value::Array(revenue_rollup(&payments, &properties))))
}

fn date_paid_filters(range: &MonthRange) -> Map<String, Value> {
    let mut filters = Map::new();
    filters.insert(
        "date_paid__gte".to_string(),
        Value::String(range.start.to_string()),
    );
    filters.insert(
        "date_paid__lte".to_string(),
        Value::String(range.end.to_string()),
    );
    filters
}

fn move_in_filters(range: &MonthRange) -> Map<String, Value> {
    let mut filters = Map::new();
    filters.insert(
        "move_in__gte".to_string(),
        Value::String(range.start.to_string()),
    );
    filters.insert(
        "move_in__lte".to_string(),
        Value::String(range.end.to_string()),
    );
    filters
}

fn status_filter(status: &str) -> Map<String, Value> {
    let mut filters = Map::new();
    filters.insert("status".to_string(), Value::String(status.to_string()));
    filters
}

fn pending_payment_count(tenants: &[Value], payments_in_range: &[Value]) -> i64 {
    let paying = payments_in_range
        .iter()
        .filter_map(|payment| {
            payment
                .as_object()
                .and_then(|obj| int_from_value(obj.get("tenant_id")))
        })
        .collect::<HashSet<i64>>();

    tenants
        .iter()
        .filter_map(|tenant| {
            tenant
                .as_object()
                .and_then(|obj| int_from_value(obj.get("id")))
        })
        .filter(|id| !paying.contains(id))
        .count() as i64
}

fn bucket_totals(buckets: &[MonthRange], payments: &[Value]) -> Vec<Value> {
    buckets
        .iter()
        .map(|bucket| {
            let total = payments
                .iter()
                .filter(|payment| {
                    payment_date(payment).is_some_and(|date| bucket.contains(date))
                })
                .map(|payment| {
                    number_from_value(payment.as_object().and_then(|obj| obj.get("amount")))
                })
                .sum::<f64>();
            json!({ "month": bucket.label, "total": round2(total) })
        })
        .collect()
}

fn revenue_rollup(payments: &[Value], properties: &[Value]) -> Vec<Value> {
    // tenant -> property name via the FK on the property side; when two
    // properties share a tenant, the first one listed wins.
    let mut property_by_tenant: HashMap<i64, String> = HashMap::new();
    for property in properties {
        let Some(obj) = property.as_object() else {
            continue;
        };
        let Some(tenant_id) = int_from_value(obj.get("tenant_id")) else {
            continue;
        };
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or("Unknown");
        property_by_tenant
            .entry(tenant_id)
            .or_insert_with(|| name.to_string());
    }

    let mut totals: HashMap<String, f64> = HashMap::new();
    for payment in payments {
        let Some(obj) = payment.as_object() else {
            continue;
        };
        let amount = number_from_value(obj.get("amount"));
        let property_name = int_from_value(obj.get("tenant_id"))
            .and_then(|tenant_id| property_by_tenant.get(&tenant_id).cloned())
            .unwrap_or_else(|| "Unknown".to_string());
        *totals.entry(property_name).or_insert(0.0) += amount;
    }

    let mut rows = totals.into_iter().collect::<Vec<_>>();
    rows.sort_by(|left, right| left.0.cmp(&right.0));
    rows.into_iter()
        .map(|(name, total)| json!({ "propertyName": name, "totalRevenue": round2(total) }))
        .collect()
}

fn payment_date(payment: &Value) -> Option<NaiveDate> {
    payment
        .as_object()
        .and_then(|obj| obj.get("date_paid"))
        .and_then(Value::as_str)
        .and_then(|text| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state
        .db_pool
        .as_ref()
        .ok_or_else(|| AppError::Dependency("Database is not configured.".to_string()))
}
