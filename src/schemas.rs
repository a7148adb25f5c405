use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

/// Path ids arrive as strings; a malformed id is a client error, not a
/// routing miss.
pub fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest("Invalid or missing ID.".to_string()))
}

pub fn require_field<T>(value: Option<T>, message: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::BadRequest(message.to_string()))
}

pub fn serialize_to_map<T>(value: &T) -> serde_json::Map<String, serde_json::Value>
where
    T: serde::Serialize,
{
    let json = serde_json::to_value(value)
        .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()));
    json.as_object().cloned().unwrap_or_default()
}

pub fn remove_nulls(
    mut map: serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    map.retain(|_, value| !value.is_null());
    map
}

pub fn clamp_limit_in_range(limit: i64, minimum: i64, maximum: i64) -> i64 {
    limit.clamp(minimum, maximum)
}

fn default_property_status() -> String {
    "available".to_string()
}
fn default_tenant_status() -> String {
    "active".to_string()
}
fn default_maintenance_status() -> String {
    "Pending".to_string()
}
fn default_profit_months() -> i64 {
    6
}

// Inputs accept both the canonical camelCase wire names and their historical
// snake_case variants, and serialize straight to database column names. The
// alias collapse happens here, once, not in every caller.

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
#[serde(rename_all(serialize = "snake_case", deserialize = "camelCase"))]
pub struct CreateTenantInput {
    #[serde(alias = "full_name")]
    pub full_name: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub rent: i64,
    #[serde(default = "default_tenant_status")]
    pub status: String,
    #[serde(alias = "move_in")]
    pub move_in: Option<NaiveDate>,
    #[serde(alias = "move_out")]
    pub move_out: Option<NaiveDate>,
    pub notes: Option<String>,
}

pub type UpdateTenantInput = CreateTenantInput;

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(rename_all(serialize = "snake_case", deserialize = "camelCase"))]
pub struct CreatePropertyInput {
    pub name: Option<String>,
    pub address: Option<String>,
    #[serde(default, alias = "rent_amount")]
    pub rent_amount: f64,
    #[serde(default = "default_property_status")]
    pub status: String,
    #[serde(alias = "tenant_id")]
    pub tenant_id: Option<i64>,
    pub notes: Option<String>,
}

pub type UpdatePropertyInput = CreatePropertyInput;

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(rename_all(serialize = "snake_case", deserialize = "camelCase"))]
pub struct CreatePaymentInput {
    #[serde(alias = "tenant_id")]
    pub tenant_id: Option<i64>,
    pub amount: Option<f64>,
    #[serde(alias = "date_paid")]
    pub date_paid: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(rename_all(serialize = "snake_case", deserialize = "camelCase"))]
pub struct CreateMaintenanceTaskInput {
    pub task: Option<String>,
    #[serde(alias = "task_type", alias = "type", alias = "category")]
    pub task_type: Option<String>,
    #[serde(default = "default_maintenance_status")]
    pub status: String,
    #[serde(alias = "due_date")]
    pub due_date: Option<NaiveDate>,
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(rename_all(serialize = "snake_case", deserialize = "camelCase"))]
pub struct UpdateMaintenanceTaskInput {
    pub task: Option<String>,
    #[serde(alias = "task_type", alias = "type", alias = "category")]
    pub task_type: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "due_date")]
    pub due_date: Option<NaiveDate>,
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfitQuery {
    #[serde(default = "default_profit_months")]
    pub months: i64,
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{
        parse_id, remove_nulls, serialize_to_map, CreatePaymentInput, CreatePropertyInput,
        CreateTenantInput,
    };

    #[test]
    fn accepts_camel_case_and_snake_case_payloads() {
        let camel: CreateTenantInput = serde_json::from_value(json!({
            "fullName": "Ada Diaz",
            "phone": "555-0100",
            "email": "ada@example.com",
            "moveIn": "2025-01-01",
            "moveOut": "2026-01-01"
        }))
        .expect("camelCase payload");
        let snake: CreateTenantInput = serde_json::from_value(json!({
            "full_name": "Ada Diaz",
            "phone": "555-0100",
            "email": "ada@example.com",
            "move_in": "2025-01-01",
            "move_out": "2026-01-01"
        }))
        .expect("snake_case payload");

        assert_eq!(camel.full_name.as_deref(), Some("Ada Diaz"));
        assert_eq!(camel.full_name, snake.full_name);
        assert_eq!(camel.move_in, snake.move_in);
        assert_eq!(camel.status, "active");
        assert_eq!(camel.rent, 0);
    }

    #[test]
    fn serializes_to_database_column_names() {
        let input: CreatePropertyInput = serde_json::from_value(json!({
            "name": "Unit 4",
            "address": "12 High St",
            "rentAmount": 1250.5,
            "tenantId": 7
        }))
        .expect("valid payload");

        let map = serialize_to_map(&input);
        assert_eq!(map.get("rent_amount"), Some(&json!(1250.5)));
        assert_eq!(map.get("tenant_id"), Some(&json!(7)));
        assert_eq!(map.get("status"), Some(&json!("available")));
        assert!(!map.contains_key("rentAmount"));
    }

    #[test]
    fn remove_nulls_drops_absent_optionals() {
        let input: CreatePaymentInput =
            serde_json::from_value(json!({ "tenantId": 3, "amount": 100 })).expect("valid payload");
        let map = remove_nulls(serialize_to_map(&input));
        assert!(!map.contains_key("date_paid"));
        assert!(!map.contains_key("notes"));
        assert_eq!(map.get("tenant_id"), Some(&Value::from(3)));
    }

    #[test]
    fn parses_path_ids() {
        assert_eq!(parse_id(" 42 ").expect("valid id"), 42);
        assert!(parse_id("abc").is_err());
        assert!(parse_id("").is_err());
    }
}
