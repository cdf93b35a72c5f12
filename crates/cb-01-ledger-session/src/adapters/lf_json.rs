//! # LF-JSON Value Encoding
//!
//! Maps [`Value`] to and from the JSON encoding used by the JSON ledger API.
//!
//! The encoding is not self-describing: numerics, parties, contract ids and
//! timestamps are all JSON strings, and records and text maps are both
//! objects. Decoding therefore produces the structural shape only (`Text`,
//! `Record`, `List`, ...) and relies on the lenient typed accessors of
//! [`Record`] to recover scalars.

use crate::domain::{Record, RecordField, Value};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value as Json};

/// Encode a ledger value.
pub fn encode_value(value: &Value) -> Json {
    match value {
        Value::Unit => Json::Object(Map::new()),
        Value::Bool(b) => Json::Bool(*b),
        Value::Int64(n) => Json::String(n.to_string()),
        Value::Numeric(s)
        | Value::Text(s)
        | Value::Party(s)
        | Value::ContractId(s)
        | Value::Enum(s) => Json::String(s.clone()),
        Value::Timestamp(micros) => Json::String(
            DateTime::from_timestamp_micros(*micros)
                .unwrap_or_default()
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        ),
        Value::Date(days) => {
            let date = NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(*days as i64)));
            Json::String(
                date.map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "1970-01-01".to_string()),
            )
        }
        Value::Record(record) => encode_record(record),
        Value::Variant { constructor, value } => {
            let mut map = Map::new();
            map.insert("tag".into(), Json::String(constructor.clone()));
            map.insert("value".into(), encode_value(value));
            Json::Object(map)
        }
        Value::Optional(None) => Json::Null,
        Value::Optional(Some(inner)) => match inner.as_ref() {
            Value::Optional(None) => Json::Array(Vec::new()),
            Value::Optional(Some(nested)) => Json::Array(vec![encode_value(nested)]),
            other => encode_value(other),
        },
        Value::List(items) => Json::Array(items.iter().map(encode_value).collect()),
        Value::TextMap(map) => Json::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect(),
        ),
        Value::GenMap(entries) => Json::Array(
            entries
                .iter()
                .map(|(k, v)| Json::Array(vec![encode_value(k), encode_value(v)]))
                .collect(),
        ),
    }
}

/// Encode a record as a JSON object keyed by label.
pub fn encode_record(record: &Record) -> Json {
    Json::Object(
        record
            .fields
            .iter()
            .map(|f| (f.label.clone(), encode_value(&f.value)))
            .collect(),
    )
}

/// Decode an untyped JSON value.
pub fn decode_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Optional(None),
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int64(i),
            None => Value::Numeric(n.to_string()),
        },
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(decode_value).collect()),
        Json::Object(map) => {
            if map.len() == 2 {
                if let (Some(Json::String(tag)), Some(value)) = (map.get("tag"), map.get("value")) {
                    return Value::variant(tag.clone(), decode_value(value));
                }
            }
            Value::Record(decode_object(map))
        }
    }
}

/// Decode a JSON object as a record; anything else is an empty record.
pub fn decode_record(json: &Json) -> Record {
    match json {
        Json::Object(map) => decode_object(map),
        _ => Record::default(),
    }
}

fn decode_object(map: &Map<String, Json>) -> Record {
    Record {
        fields: map
            .iter()
            .map(|(label, value)| RecordField {
                label: label.clone(),
                value: decode_value(value),
            })
            .collect(),
    }
}

/// Parse an RFC 3339 timestamp, Unix epoch on failure.
pub fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Metadata;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_encode_scalars_as_strings() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let record = Record::new()
            .with("owner", Value::party("alice::1220"))
            .with("amount", Value::Numeric("10.5".into()))
            .with("count", Value::Int64(3))
            .with("at", Value::timestamp(at))
            .with("holdings", Value::contract_id_list(["c1", "c2"]))
            .with("lock", Value::optional(None))
            .with("meta", Metadata::with_symbol("DEMO").to_value());

        assert_eq!(
            encode_record(&record),
            json!({
                "owner": "alice::1220",
                "amount": "10.5",
                "count": "3",
                "at": "2025-01-02T03:04:05.000000Z",
                "holdings": ["c1", "c2"],
                "lock": null,
                "meta": { "values": { "symbol": "DEMO" } }
            })
        );
    }

    #[test]
    fn test_encode_variant_and_nested_optional() {
        assert_eq!(
            encode_value(&Value::variant("Completed", Value::Unit)),
            json!({ "tag": "Completed", "value": {} })
        );
        assert_eq!(
            encode_value(&Value::optional(Some(Value::optional(None)))),
            json!([])
        );
        assert_eq!(
            encode_value(&Value::optional(Some(Value::text("x")))),
            json!("x")
        );
    }

    #[test]
    fn test_decode_recovers_typed_fields() {
        let record = decode_record(&json!({
            "issuer": "issuer::1220",
            "amount": "12.0000000000",
            "locked": false,
            "status": { "tag": "Pending", "value": {} },
            "observers": ["a", "b"],
            "meta": { "values": { "symbol": "DEMO" } },
            "createdAt": "2025-01-02T03:04:05.123456Z",
            "lock": null
        }));

        assert_eq!(record.party("issuer"), "issuer::1220");
        assert_eq!(record.numeric("amount"), "12.0000000000");
        assert!(!record.bool("locked"));
        assert_eq!(
            record.field("status").and_then(Value::as_variant).map(|(c, _)| c),
            Some("Pending")
        );
        assert_eq!(record.party_list("observers"), vec!["a", "b"]);
        assert_eq!(record.metadata("meta").symbol(), "DEMO");
        assert_eq!(
            record.timestamp("createdAt"),
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
                + chrono::Duration::microseconds(123456)
        );
        assert!(record.optional("lock").is_none());
    }

    #[test]
    fn test_decode_non_object_record_is_empty() {
        assert!(decode_record(&json!("x")).fields.is_empty());
    }
}
