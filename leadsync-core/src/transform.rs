//! Snapshot diff and the fixed lead field mapping.
//!
//! Both functions are pure. [`diff`] decides *which* rows are new;
//! [`transform`] decides *what* the CRM sees for each of them.

use serde_json::{Map, Value};

use crate::types::{RawRecord, TransformedRecord};

// ---------------------------------------------------------------------------
// 1. Static mapping
// ---------------------------------------------------------------------------

/// Source field -> CRM contact property.
pub const FIELD_RENAMES: &[(&str, &str)] = &[
    ("Monthly Income", "faixa_de_faturamento"),
    ("Email", "email"),
    ("Created At", "data_de_mql_pro"),
    ("Shop ID", "bgstoreid"),
    ("Utm Campaign", "oficial_utm_campaign"),
    ("Utm Source", "oficial_utm_source"),
    ("Utm Medium", "oficial_utm_medium"),
    ("Erp Discounts - Discount → Code", "bg_discountcoupon"),
    ("Phone", "phone"),
    ("Name", "firstname"),
    ("Erp Partners - Partner → Name", "partner_id"),
    ("Erp Plans - Campaign → Name", "bg_subscriptionplanname"),
];

/// Source fields that never reach the CRM.
pub const DROPPED_FIELDS: &[&str] = &[
    "ID",
    "Updated At",
    "Converted At",
    "Campaign ID",
    "Erp Plans - Campaign → Price",
];

/// Tag identifying this integration on every contact it touches.
pub const INTEGRATION_TAG: (&str, &str) = ("formulario_integracao", "MetabaseHubsPipeline");

/// Lead origin stamped on every contact.
pub const LEAD_ORIGIN_TAG: (&str, &str) = ("origem_do_lead", "Checkout");

fn renamed(key: &str) -> Option<&'static str> {
    FIELD_RENAMES
        .iter()
        .find(|(source, _)| *source == key)
        .map(|(_, dest)| *dest)
}

fn is_dropped(key: &str) -> bool {
    DROPPED_FIELDS.contains(&key)
}

// ---------------------------------------------------------------------------
// 2. Diff
// ---------------------------------------------------------------------------

/// Records in `current` that are not structurally equal to any record in
/// `previous`, in `current` order.
///
/// Equality is over the whole record. A row whose fields changed since the
/// last run shows up here as new; a row that only disappeared does not.
pub fn diff(current: &[RawRecord], previous: &[RawRecord]) -> Vec<RawRecord> {
    current
        .iter()
        .filter(|record| !previous.contains(record))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// 3. Transform
// ---------------------------------------------------------------------------

/// Apply the rename/drop/tag rules to each record, preserving order.
pub fn transform(records: &[RawRecord]) -> Vec<TransformedRecord> {
    records.iter().map(transform_record).collect()
}

/// Apply the rename/drop/tag rules to a single record.
///
/// Unmapped, undropped fields pass through under their source name. Renamed
/// fields are written after them and win over a pass-through field that
/// already carries the destination name. The two constant tags are written
/// last and win over everything.
pub fn transform_record(record: &RawRecord) -> TransformedRecord {
    let mut out = Map::new();
    for (key, value) in record {
        if renamed(key).is_none() && !is_dropped(key) {
            out.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in record {
        if let Some(dest) = renamed(key) {
            out.insert(dest.to_string(), value.clone());
        }
    }

    for (key, value) in [INTEGRATION_TAG, LEAD_ORIGIN_TAG] {
        out.insert(key.to_string(), Value::String(value.to_string()));
    }
    TransformedRecord(out)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().expect("object literal")
    }

    fn lead(id: &str, email: &str, income: &str) -> RawRecord {
        record(json!({"ID": id, "Email": email, "Monthly Income": income}))
    }

    #[test]
    fn diff_against_itself_is_empty() {
        let all = vec![lead("1", "a@x.com", "10k"), lead("2", "b@x.com", "20k")];
        assert!(diff(&all, &all).is_empty());
    }

    #[test]
    fn diff_against_empty_is_everything() {
        let all = vec![lead("1", "a@x.com", "10k"), lead("2", "b@x.com", "20k")];
        assert_eq!(diff(&all, &[]), all);
    }

    #[test]
    fn diff_keeps_current_order() {
        let previous = vec![lead("2", "b@x.com", "20k")];
        let current = vec![
            lead("3", "c@x.com", "30k"),
            lead("2", "b@x.com", "20k"),
            lead("1", "a@x.com", "10k"),
        ];
        let new = diff(&current, &previous);
        assert_eq!(new, vec![lead("3", "c@x.com", "30k"), lead("1", "a@x.com", "10k")]);
    }

    #[test]
    fn diff_treats_field_change_as_new_record() {
        let previous = vec![lead("1", "a@x.com", "10k")];
        let current = vec![lead("1", "a@x.com", "15k")];
        assert_eq!(diff(&current, &previous).len(), 1);
    }

    #[test]
    fn diff_ignores_key_order() {
        let previous = vec![record(json!({"Email": "a@x.com", "ID": "1"}))];
        let current = vec![record(json!({"ID": "1", "Email": "a@x.com"}))];
        assert!(diff(&current, &previous).is_empty());
    }

    #[test]
    fn transform_renames_drops_and_tags() {
        let out = transform_record(&lead("2", "b@x.com", "20k"));
        let expected = record(json!({
            "email": "b@x.com",
            "faixa_de_faturamento": "20k",
            "formulario_integracao": "MetabaseHubsPipeline",
            "origem_do_lead": "Checkout",
        }));
        assert_eq!(out.0, expected);
    }

    #[test]
    fn transform_passes_unknown_fields_through() {
        let out = transform_record(&record(json!({"Email": "a@x.com", "Segment": "retail"})));
        assert_eq!(out.get("Segment"), Some(&json!("retail")));
    }

    #[test]
    fn transform_keeps_null_values() {
        let out = transform_record(&record(json!({"Email": "a@x.com", "Phone": null})));
        assert_eq!(out.get("phone"), Some(&Value::Null));
    }

    #[test]
    fn constant_tags_override_source_fields() {
        let out = transform_record(&record(json!({"origem_do_lead": "Organic"})));
        assert_eq!(out.get("origem_do_lead"), Some(&json!("Checkout")));
    }

    #[test]
    fn transform_preserves_order_and_length() {
        let input = vec![lead("1", "a@x.com", "10k"), lead("2", "b@x.com", "20k")];
        let out = transform(&input);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].email(), Some("a@x.com"));
        assert_eq!(out[1].email(), Some("b@x.com"));
    }

    #[test]
    fn mapping_tables_do_not_overlap() {
        for (source, _) in FIELD_RENAMES {
            assert!(!is_dropped(source), "{source} is both renamed and dropped");
        }
    }
}
