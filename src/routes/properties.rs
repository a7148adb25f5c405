use std::collections::{HashMap, HashSet};

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::error::{AppError, AppResult};
use crate::normalize::{int_from_value, normalize_property_row};
use crate::repository::table_service::{create_row, delete_row, get_row, list_rows, update_row};
use crate::schemas::{
    parse_id, remove_nulls, serialize_to_map, CreatePropertyInput, MonthQuery, UpdatePropertyInput,
};
use crate::services::months::MonthRange;
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/properties",
            axum::routing::get(list_properties).post(create_property),
        )
        .route(
            "/properties/{id}",
            axum::routing::put(update_property).delete(delete_property),
        )
}

/// Lists properties with the tenant name joined in and a derived
/// paid/unpaid status for the requested month. The status is computed at
/// query time from the payments table, never stored.
async fn list_properties(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let range = MonthRange::resolve(query.month.as_deref())?;

    let properties = list_rows(pool, "properties", None, 10000, 0, "created_at", false).await?;
    let tenants = list_rows(pool, "tenants", None, 10000, 0, "created_at", false).await?;
    let payments = list_rows(
        pool,
        "payments",
        Some(&month_payment_filters(&range)),
        20000,
        0,
        "date_paid",
        false,
    )
    .await?;

    let names = tenant_name_index(&tenants);
    let paid = paying_tenant_ids(&payments);
    let rows = annotate_properties(&properties, &names, &paid);

    Ok(Json(Value::Array(rows)))
}

async fn create_property(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
    Json(payload): Json<CreatePropertyInput>,
) -> AppResult<impl IntoResponse> {
    let pool = db_pool(&state)?;
    let range = MonthRange::resolve(query.month.as_deref())?;
    require_name_and_address(&payload)?;

    let record = remove_nulls(serialize_to_map(&payload));
    let created = create_row(pool, "properties", &record).await?;

    let row = annotate_single(&state, &created, &range).await?;
    Ok((axum::http::StatusCode::CREATED, Json(row)))
}

/// Full replace: optional columns absent from the body are written as NULL.
async fn update_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<MonthQuery>,
    Json(payload): Json<UpdatePropertyInput>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let property_id = parse_id(&id)?;
    let range = MonthRange::resolve(query.month.as_deref())?;
    require_name_and_address(&payload)?;

    let mut patch = serialize_to_map(&payload);
    patch.insert(
        "updated_at".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    let updated = update_row(pool, "properties", property_id, &patch).await?;

    let row = annotate_single(&state, &updated, &range).await?;
    Ok(Json(row))
}

async fn delete_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let property_id = parse_id(&id)?;
    delete_row(pool, "properties", property_id).await?;
    Ok(Json(json!({ "success": true })))
}

fn require_name_and_address(payload: &CreatePropertyInput) -> Result<(), AppError> {
    let has_name = payload
        .name
        .as_deref()
        .is_some_and(|value| !value.trim().is_empty());
    let has_address = payload
        .address
        .as_deref()
        .is_some_and(|value| !value.trim().is_empty());
    if has_name && has_address {
        return Ok(());
    }
    Err(AppError::BadRequest(
        "Name and address are required.".to_string(),
    ))
}

fn month_payment_filters(range: &MonthRange) -> Map<String, Value> {
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

fn tenant_name_index(tenants: &[Value]) -> HashMap<i64, String> {
    tenants
        .iter()
        .filter_map(|tenant| {
            let obj = tenant.as_object()?;
            let id = int_from_value(obj.get("id"))?;
            let name = obj
                .get("full_name")
                .or_else(|| obj.get("fullName"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some((id, name.to_string()))
        })
        .collect()
}

fn paying_tenant_ids(payments: &[Value]) -> HashSet<i64> {
    payments
        .iter()
        .filter_map(|payment| {
            payment
                .as_object()
                .and_then(|obj| int_from_value(obj.get("tenant_id")))
        })
        .collect()
}

fn annotate_properties(
    properties: &[Value],
    names: &HashMap<i64, String>,
    paying_tenants: &HashSet<i64>,
) -> Vec<Value> {
    properties
        .iter()
        .map(|property| annotate_property(property, names, paying_tenants))
        .collect()
}

fn annotate_property(
    property: &Value,
    names: &HashMap<i64, String>,
    paying_tenants: &HashSet<i64>,
) -> Value {
    let mut row = normalize_property_row(property);
    let tenant_id = int_from_value(row.get("tenantId"));

    if let Some(obj) = row.as_object_mut() {
        match tenant_id {
            Some(id) => {
                if let Some(name) = names.get(&id) {
                    obj.insert("tenantName".to_string(), Value::String(name.clone()));
                }
                let status = if paying_tenants.contains(&id) {
                    "paid"
                } else {
                    "unpaid"
                };
                obj.insert(
                    "paymentStatus".to_string(),
                    Value::String(status.to_string()),
                );
            }
            None => {
                // A property with no assigned tenant is always unpaid.
                obj.insert(
                    "paymentStatus".to_string(),
                    Value::String("unpaid".to_string()),
                );
            }
        }
    }
    row
}

/// Derives tenantName and paymentStatus for one freshly written row without
/// re-reading the property itself (the write already returned it).
async fn annotate_single(
    state: &AppState,
    property: &Value,
    range: &MonthRange,
) -> AppResult<Value> {
    let pool = db_pool(state)?;
    let tenant_id = property
        .as_object()
        .and_then(|obj| int_from_value(obj.get("tenant_id")));

    let mut names = HashMap::new();
    let mut paying = HashSet::new();
    if let Some(id) = tenant_id {
        if let Ok(tenant) = get_row(pool, "tenants", id).await {
            if let Some(name) = tenant.get("full_name").and_then(Value::as_str) {
                names.insert(id, name.to_string());
            }
        }
        let mut filters = month_payment_filters(range);
        filters.insert("tenant_id".to_string(), Value::from(id));
        let payments = list_rows(pool, "payments", Some(&filters), 1, 0, "date_paid", false).await?;
        if !payments.is_empty() {
            paying.insert(id);
        }
    }

    Ok(annotate_property(property, &names, &paying))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state
        .db_pool
        .as_ref()
        .ok_or_else(|| AppError::Dependency("Database is not configured.".to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use serde_json::json;

    use super::{
        annotate_properties, month_payment_filters, paying_tenant_ids, require_name_and_address,
        tenant_name_index,
    };
    use crate::schemas::CreatePropertyInput;
    use crate::services::months::MonthRange;

    #[test]
    fn property_without_tenant_is_always_unpaid() {
        let properties = vec![json!({ "id": 1, "name": "Unit 1", "tenant_id": null })];
        let rows = annotate_properties(&properties, &HashMap::new(), &HashSet::new());
        assert_eq!(rows[0]["paymentStatus"], "unpaid");
        assert_eq!(rows[0]["tenantName"], "");
    }

    #[test]
    fn payment_in_month_marks_property_paid() {
        let properties = vec![
            json!({ "id": 1, "name": "Unit 1", "tenant_id": 3 }),
            json!({ "id": 2, "name": "Unit 2", "tenant_id": 4 }),
        ];
        let names = HashMap::from([(3, "Ada Diaz".to_string()), (4, "Ben Okafor".to_string())]);
        let paying = HashSet::from([3]);

        let rows = annotate_properties(&properties, &names, &paying);
        assert_eq!(rows[0]["paymentStatus"], "paid");
        assert_eq!(rows[0]["tenantName"], "Ada Diaz");
        assert_eq!(rows[1]["paymentStatus"], "unpaid");
        assert_eq!(rows[1]["tenantName"], "Ben Okafor");
    }

    #[test]
    fn payment_filters_span_whole_month() {
        let range = MonthRange::resolve(Some("2024-02")).expect("valid month");
        let filters = month_payment_filters(&range);
        assert_eq!(filters["date_paid__gte"], "2024-02-01");
        assert_eq!(filters["date_paid__lte"], "2024-02-29");
    }

    #[test]
    fn missing_name_or_address_is_rejected() {
        let missing_address: CreatePropertyInput =
            serde_json::from_value(json!({ "name": "Unit 1" })).expect("valid payload");
        assert!(require_name_and_address(&missing_address).is_err());

        let blank_name: CreatePropertyInput =
            serde_json::from_value(json!({ "name": "  ", "address": "12 High St" }))
                .expect("valid payload");
        assert!(require_name_and_address(&blank_name).is_err());

        let complete: CreatePropertyInput =
            serde_json::from_value(json!({ "name": "Unit 1", "address": "12 High St" }))
                .expect("valid payload");
        assert!(require_name_and_address(&complete).is_ok());
    }

    #[test]
    fn collects_paying_tenants_and_names() {
        let payments = vec![
            json!({ "id": 1, "tenant_id": 3, "amount": "100.00" }),
            json!({ "id": 2, "tenant_id": 3, "amount": "50.00" }),
            json!({ "id": 3, "tenant_id": null }),
        ];
        assert_eq!(paying_tenant_ids(&payments), HashSet::from([3]));

        let tenants = vec![json!({ "id": 3, "full_name": "Ada Diaz" })];
        assert_eq!(tenant_name_index(&tenants)[&3], "Ada Diaz");
    }
}
