//! # Value Codec
//!
//! The ledger's generic structured value as a closed sum type, plus typed
//! accessors and constructors used by the identity, token and bridge
//! subsystems.
//!
//! Accessors never fail: an absent or mistyped field yields the zero value of
//! the requested type (`""`, `"0"`, `0`, `false`, the Unix epoch, an empty
//! collection). Callers treat a zero value as "field not present" unless zero
//! is itself meaningful.
//!
//! Scalars that the wire format renders as strings (party, numeric, contract
//! id, timestamp, int64) are accepted from `Text` as well as from their own
//! variant.

use chrono::{DateTime, NaiveDate, Utc};
use shared_types::Amount;
use std::collections::BTreeMap;

/// Ledger value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The unit value.
    Unit,
    /// Boolean.
    Bool(bool),
    /// 64-bit integer.
    Int64(i64),
    /// Fixed-point decimal, kept as its string form.
    Numeric(String),
    /// UTF-8 text.
    Text(String),
    /// Party identifier.
    Party(String),
    /// Contract identifier.
    ContractId(String),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
    /// Days since the Unix epoch.
    Date(i32),
    /// Labelled record.
    Record(Record),
    /// Tagged variant.
    Variant {
        /// Constructor name.
        constructor: String,
        /// Payload.
        value: Box<Value>,
    },
    /// Enum constructor.
    Enum(String),
    /// Optional value.
    Optional(Option<Box<Value>>),
    /// Homogeneous list.
    List(Vec<Value>),
    /// Map keyed by text.
    TextMap(BTreeMap<String, Value>),
    /// Map keyed by arbitrary values.
    GenMap(Vec<(Value, Value)>),
}

/// A single labelled field.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordField {
    /// Field label.
    pub label: String,
    /// Field value.
    pub value: Value,
}

/// Labelled record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    /// Fields in declaration order.
    pub fields: Vec<RecordField>,
}

fn zero_time() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

impl Value {
    /// Text value.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Party value.
    pub fn party(p: impl Into<String>) -> Self {
        Value::Party(p.into())
    }

    /// Numeric value from an exact amount.
    pub fn numeric(amount: &Amount) -> Self {
        Value::Numeric(amount.to_string())
    }

    /// Contract id value.
    pub fn contract_id(cid: impl Into<String>) -> Self {
        Value::ContractId(cid.into())
    }

    /// Timestamp value (microsecond precision).
    pub fn timestamp(at: DateTime<Utc>) -> Self {
        Value::Timestamp(at.timestamp_micros())
    }

    /// List of parties.
    pub fn party_list<I, S>(parties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(parties.into_iter().map(|p| Value::Party(p.into())).collect())
    }

    /// List of contract ids.
    pub fn contract_id_list<I, S>(cids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(cids.into_iter().map(|c| Value::ContractId(c.into())).collect())
    }

    /// Optional value.
    pub fn optional(inner: Option<Value>) -> Self {
        Value::Optional(inner.map(Box::new))
    }

    /// Text map from string pairs.
    pub fn text_map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Value::TextMap(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), Value::Text(v.into())))
                .collect(),
        )
    }

    /// Variant value.
    pub fn variant(constructor: impl Into<String>, value: Value) -> Self {
        Value::Variant {
            constructor: constructor.into(),
            value: Box::new(value),
        }
    }

    /// Look through `Optional(Some(_))`; `Optional(None)` is absent.
    pub fn unwrap_optional(&self) -> Option<&Value> {
        match self {
            Value::Optional(None) => None,
            Value::Optional(Some(inner)) => inner.unwrap_optional(),
            other => Some(other),
        }
    }

    /// Text-like scalar.
    pub fn as_text(&self) -> Option<&str> {
        match self.unwrap_optional()? {
            Value::Text(s) | Value::Party(s) | Value::ContractId(s) | Value::Enum(s) => Some(s),
            Value::Numeric(s) => Some(s),
            _ => None,
        }
    }

    /// Party scalar.
    pub fn as_party(&self) -> Option<&str> {
        match self.unwrap_optional()? {
            Value::Party(s) | Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Contract id scalar.
    pub fn as_contract_id(&self) -> Option<&str> {
        match self.unwrap_optional()? {
            Value::ContractId(s) | Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric scalar as its decimal string.
    pub fn as_numeric(&self) -> Option<String> {
        match self.unwrap_optional()? {
            Value::Numeric(s) | Value::Text(s) => Some(s.clone()),
            Value::Int64(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// 64-bit integer.
    pub fn as_int64(&self) -> Option<i64> {
        match self.unwrap_optional()? {
            Value::Int64(n) => Some(*n),
            Value::Text(s) | Value::Numeric(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self.unwrap_optional()? {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Timestamp.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self.unwrap_optional()? {
            Value::Timestamp(micros) => DateTime::from_timestamp_micros(*micros),
            Value::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Date(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(*days as i64)))
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
            _ => None,
        }
    }

    /// Nested record.
    pub fn as_record(&self) -> Option<&Record> {
        match self.unwrap_optional()? {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// List elements.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self.unwrap_optional()? {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Variant constructor and payload.
    pub fn as_variant(&self) -> Option<(&str, &Value)> {
        match self.unwrap_optional()? {
            Value::Variant { constructor, value } => Some((constructor, value)),
            Value::Enum(constructor) => Some((constructor, &Value::Unit)),
            _ => None,
        }
    }

    /// Text map entries. Records are accepted as maps keyed by label.
    pub fn as_text_map(&self) -> Option<BTreeMap<String, &Value>> {
        match self.unwrap_optional()? {
            Value::TextMap(map) => Some(map.iter().map(|(k, v)| (k.clone(), v)).collect()),
            Value::Record(r) => Some(
                r.fields
                    .iter()
                    .map(|f| (f.label.clone(), &f.value))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl Record {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a field.
    pub fn with(mut self, label: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push(RecordField {
            label: label.into(),
            value: value.into(),
        });
        self
    }

    /// Raw field lookup.
    pub fn field(&self, label: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| &f.value)
    }

    /// Field present and not `None`.
    pub fn optional(&self, label: &str) -> Option<&Value> {
        self.field(label).and_then(Value::unwrap_optional)
    }

    /// Text field, `""` when absent.
    pub fn text(&self, label: &str) -> String {
        self.field(label)
            .and_then(Value::as_text)
            .unwrap_or_default()
            .to_string()
    }

    /// Party field, `""` when absent.
    pub fn party(&self, label: &str) -> String {
        self.field(label)
            .and_then(Value::as_party)
            .unwrap_or_default()
            .to_string()
    }

    /// Contract id field, `""` when absent.
    pub fn contract_id(&self, label: &str) -> String {
        self.field(label)
            .and_then(Value::as_contract_id)
            .unwrap_or_default()
            .to_string()
    }

    /// Numeric field as decimal string, `"0"` when absent.
    pub fn numeric(&self, label: &str) -> String {
        self.field(label)
            .and_then(Value::as_numeric)
            .unwrap_or_else(|| "0".to_string())
    }

    /// Int64 field, `0` when absent.
    pub fn int64(&self, label: &str) -> i64 {
        self.field(label).and_then(Value::as_int64).unwrap_or(0)
    }

    /// Bool field, `false` when absent.
    pub fn bool(&self, label: &str) -> bool {
        self.field(label).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Timestamp field, Unix epoch when absent.
    pub fn timestamp(&self, label: &str) -> DateTime<Utc> {
        self.field(label)
            .and_then(Value::as_timestamp)
            .unwrap_or_else(zero_time)
    }

    /// Party list field, empty when absent.
    pub fn party_list(&self, label: &str) -> Vec<String> {
        self.field(label)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_party)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nested record field, empty when absent.
    pub fn record(&self, label: &str) -> Record {
        self.field(label)
            .and_then(Value::as_record)
            .cloned()
            .unwrap_or_default()
    }

    /// Text map field flattened to strings, empty when absent.
    pub fn text_map(&self, label: &str) -> BTreeMap<String, String> {
        self.field(label)
            .and_then(Value::as_text_map)
            .map(|map| {
                map.into_iter()
                    .filter_map(|(k, v)| v.as_text().map(|s| (k, s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Metadata field, empty when absent.
    pub fn metadata(&self, label: &str) -> Metadata {
        Metadata {
            values: self.record(label).text_map("values"),
        }
    }
}

/// Token metadata: a text map carried as `{ values: TextMap Text }`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Key/value pairs.
    pub values: BTreeMap<String, String>,
}

/// Metadata key holding the token symbol.
pub const METADATA_SYMBOL_KEY: &str = "symbol";

impl Metadata {
    /// Metadata with only a symbol.
    pub fn with_symbol(symbol: impl Into<String>) -> Self {
        let mut values = BTreeMap::new();
        values.insert(METADATA_SYMBOL_KEY.to_string(), symbol.into());
        Self { values }
    }

    /// Value for `key`, `""` when absent.
    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or_default()
    }

    /// Token symbol, `""` when absent.
    pub fn symbol(&self) -> &str {
        self.get(METADATA_SYMBOL_KEY)
    }

    /// Encode as a ledger value.
    pub fn to_value(&self) -> Value {
        Record::new()
            .with("values", Value::text_map(self.values.clone()))
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn holding_record() -> Record {
        Record::new()
            .with("issuer", Value::party("issuer::1220"))
            .with("owner", Value::text("alice::1220"))
            .with("amount", Value::Numeric("12.5000000000".into()))
            .with(
                "instrumentId",
                Record::new()
                    .with("admin", Value::party("issuer::1220"))
                    .with("id", Value::text("DEMO")),
            )
            .with("meta", Metadata::with_symbol("DEMO").to_value())
            .with("lock", Value::optional(None))
            .with("observers", Value::party_list(["a", "b"]))
    }

    #[test]
    fn test_typed_accessors() {
        let rec = holding_record();
        assert_eq!(rec.party("issuer"), "issuer::1220");
        // Text is accepted where a party is expected.
        assert_eq!(rec.party("owner"), "alice::1220");
        assert_eq!(rec.numeric("amount"), "12.5000000000");
        assert_eq!(rec.record("instrumentId").text("id"), "DEMO");
        assert_eq!(rec.metadata("meta").symbol(), "DEMO");
        assert_eq!(rec.party_list("observers"), vec!["a", "b"]);
        assert!(rec.optional("lock").is_none());
    }

    #[test]
    fn test_absent_and_mistyped_fields_are_zero() {
        let rec = holding_record();
        assert_eq!(rec.text("missing"), "");
        assert_eq!(rec.numeric("missing"), "0");
        assert_eq!(rec.int64("missing"), 0);
        assert!(!rec.bool("amount"));
        assert_eq!(rec.timestamp("issuer"), DateTime::<Utc>::default());
        assert!(rec.party_list("issuer").is_empty());
        assert!(rec.record("amount").fields.is_empty());
        assert_eq!(rec.metadata("missing").symbol(), "");
    }

    #[test]
    fn test_timestamp_round_trip_micros() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
            + chrono::Duration::microseconds(123);
        let rec = Record::new().with("t", Value::timestamp(at));
        assert_eq!(rec.timestamp("t"), at);

        let rec = Record::new().with("t", Value::text("2024-05-01T12:30:00.000123Z"));
        assert_eq!(rec.timestamp("t"), at);
    }

    #[test]
    fn test_optional_unwrapping() {
        let some = Value::optional(Some(Value::text("x")));
        assert_eq!(some.as_text(), Some("x"));
        let none = Value::optional(None);
        assert_eq!(none.as_text(), None);
    }

    #[test]
    fn test_variant_and_enum() {
        let v = Value::variant("Completed", Value::Unit);
        assert_eq!(v.as_variant().map(|(c, _)| c), Some("Completed"));
        let e = Value::Enum("Pending".into());
        assert_eq!(e.as_variant().map(|(c, _)| c), Some("Pending"));
    }

    #[test]
    fn test_numeric_from_amount() {
        let amount = Amount::parse("0.1").unwrap();
        assert_eq!(Value::numeric(&amount), Value::Numeric("0.1".into()));
    }
}
