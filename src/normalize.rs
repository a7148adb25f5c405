//! Canonical row shapes for the JSON API.
//!
//! Rows reach this layer in whatever shape history left them: snake_case
//! database output, camelCase client echoes, and a few legacy field names
//! (`rent`, `addr`, `title`, ...). Each `normalize_*_row` function collapses
//! those variants into one canonical camelCase row with defaults for missing
//! fields, and is idempotent: normalizing a canonical row changes nothing.

use serde_json::{json, Map, Value};

pub fn normalize_property_row(raw: &Value) -> Value {
    let obj = as_object(raw);
    json!({
        "id": int_field(&obj, &["id"], 0),
        "name": text_field(&obj, &["name", "title"]),
        "address": text_field(&obj, &["address", "addr"]),
        "rentAmount": number_field(&obj, &["rentAmount", "rent_amount", "rent"]),
        "status": text_field_or(&obj, &["status", "state"], "available"),
        "tenantId": nullable_int_field(&obj, &["tenantId", "tenant_id"]),
        "tenantName": text_field(&obj, &["tenantName", "tenant_name", "tenant"]),
        "notes": text_field(&obj, &["notes", "note"]),
        "createdAt": text_field(&obj, &["createdAt", "created_at", "created"]),
        "updatedAt": text_field(&obj, &["updatedAt", "updated_at", "updated"]),
        "paymentStatus": text_field_or(&obj, &["paymentStatus", "payment_status"], "unpaid"),
    })
}

pub fn normalize_tenant_row(raw: &Value) -> Value {
    let obj = as_object(raw);
    json!({
        "id": int_field(&obj, &["id"], 0),
        "fullName": text_field(&obj, &["fullName", "full_name"]),
        "phone": text_field(&obj, &["phone"]),
        "email": text_field(&obj, &["email"]),
        "rent": int_field(&obj, &["rent"], 0),
        "status": text_field_or(&obj, &["status"], "active"),
        "moveIn": text_field(&obj, &["moveIn", "move_in"]),
        "moveOut": text_field(&obj, &["moveOut", "move_out"]),
        "notes": text_field(&obj, &["notes", "note"]),
        "createdAt": text_field(&obj, &["createdAt", "created_at", "created"]),
    })
}

pub fn normalize_payment_row(raw: &Value) -> Value {
    let obj = as_object(raw);
    json!({
        "id": int_field(&obj, &["id"], 0),
        "tenantId": nullable_int_field(&obj, &["tenantId", "tenant_id"]),
        "amount": number_field(&obj, &["amount"]),
        "datePaid": text_field(&obj, &["datePaid", "date_paid"]),
        "notes": text_field(&obj, &["notes", "note"]),
        "createdAt": text_field(&obj, &["createdAt", "created_at", "created"]),
    })
}

pub fn normalize_maintenance_row(raw: &Value) -> Value {
    let obj = as_object(raw);
    json!({
        "id": int_field(&obj, &["id"], 0),
        "task": text_field(&obj, &["task", "title"]),
        "taskType": text_field(&obj, &["taskType", "task_type", "type", "category"]),
        "status": text_field_or(&obj, &["status"], "Pending"),
        "dueDate": nullable_text_field(&obj, &["dueDate", "due_date"]),
        "assignee": nullable_text_field(&obj, &["assignee", "assigned_to"]),
        "createdAt": text_field(&obj, &["createdAt", "created_at", "created"]),
    })
}

/// Parses a numeric JSON value that may be transported as a string, as
/// fixed-decimal columns are after `row_to_json`.
pub fn number_from_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn int_from_value(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_object(raw: &Value) -> Map<String, Value> {
    raw.as_object().cloned().unwrap_or_default()
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    first_present(obj, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

fn text_field_or(obj: &Map<String, Value>, keys: &[&str], default: &str) -> String {
    let value = text_field(obj, keys);
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

fn nullable_text_field(obj: &Map<String, Value>, keys: &[&str]) -> Value {
    match first_present(obj, keys).and_then(Value::as_str).map(str::trim) {
        Some(text) if !text.is_empty() => Value::String(text.to_string()),
        _ => Value::Null,
    }
}

fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> f64 {
    number_from_value(first_present(obj, keys))
}

fn int_field(obj: &Map<String, Value>, keys: &[&str], default: i64) -> i64 {
    int_from_value(first_present(obj, keys)).unwrap_or(default)
}

fn nullable_int_field(obj: &Map<String, Value>, keys: &[&str]) -> Value {
    match int_from_value(first_present(obj, keys)) {
        Some(value) => Value::from(value),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        normalize_maintenance_row, normalize_payment_row, normalize_property_row,
        normalize_tenant_row, number_from_value,
    };

    #[test]
    fn property_normalization_collapses_field_variants() {
        let row = normalize_property_row(&json!({
            "id": "7",
            "title": "Unit 4",
            "addr": "12 High St",
            "rent_amount": "1250.50",
            "state": "occupied",
            "tenant_id": 3,
            "tenant": "Ada Diaz",
            "created_at": "2025-01-01T00:00:00Z"
        }));

        assert_eq!(row["id"], 7);
        assert_eq!(row["name"], "Unit 4");
        assert_eq!(row["address"], "12 High St");
        assert_eq!(row["rentAmount"], 1250.5);
        assert_eq!(row["status"], "occupied");
        assert_eq!(row["tenantId"], 3);
        assert_eq!(row["tenantName"], "Ada Diaz");
        assert_eq!(row["paymentStatus"], "unpaid");
        assert_eq!(row["updatedAt"], "");
    }

    #[test]
    fn property_defaults_for_empty_input() {
        let row = normalize_property_row(&json!({}));
        assert_eq!(row["id"], 0);
        assert_eq!(row["name"], "");
        assert_eq!(row["rentAmount"], 0.0);
        assert_eq!(row["status"], "available");
        assert!(row["tenantId"].is_null());
    }

    #[test]
    fn normalization_is_idempotent() {
        let loose = json!({
            "id": 1,
            "full_name": "Ada Diaz",
            "rent": "900",
            "move_in": "2025-01-01",
            "move_out": "2026-01-01"
        });
        let once = normalize_tenant_row(&loose);
        assert_eq!(normalize_tenant_row(&once), once);

        let property = normalize_property_row(&json!({ "rent": 800, "tenant_id": null }));
        assert_eq!(normalize_property_row(&property), property);

        let payment = normalize_payment_row(&json!({ "tenantId": 2, "amount": "30.00" }));
        assert_eq!(normalize_payment_row(&payment), payment);

        let task = normalize_maintenance_row(&json!({ "task": "Fix sink", "type": "plumbing" }));
        assert_eq!(normalize_maintenance_row(&task), task);
    }

    #[test]
    fn maintenance_keeps_nullable_fields_null() {
        let row = normalize_maintenance_row(&json!({ "task": "Repaint hallway" }));
        assert_eq!(row["status"], "Pending");
        assert!(row["dueDate"].is_null());
        assert!(row["assignee"].is_null());
    }

    #[test]
    fn numeric_strings_parse_without_loss() {
        assert_eq!(number_from_value(Some(&json!("1234567.89"))), 1234567.89);
        assert_eq!(number_from_value(Some(&json!(150))), 150.0);
        assert_eq!(number_from_value(Some(&json!("not-a-number"))), 0.0);
        assert_eq!(number_from_value(None), 0.0);
    }
}
