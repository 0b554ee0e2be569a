//! # Field Conversion
//!
//! Pure transforms over `serde_json::Value` used at the edge between callers and the wire.
//!
//! * **Key translation**: callers write camelCase keys (`pageToken`), the wire expects
//!   the proto field names (`page_token`). [`snakeize`] and [`camelize`] rewrite every
//!   object key recursively, descending into arrays. Values are never touched.
//! * **Control fields**: [`strip_control_fields`] removes the pagination options that only
//!   matter to the pagination adapter.
//! * **Structured values**: [`value_to_struct`], [`struct_to_value`], [`encode_value`] and
//!   [`decode_value`] convert between JSON and `google.protobuf.Struct` / `Value`, the
//!   generic payload type used by APIs such as Logging (`jsonPayload`) or Datastore.
use prost_types::{ListValue, Struct, value::Kind};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Fields consumed by the pagination adapter that must never reach the wire.
pub const CONTROL_FIELDS: &[&str] = &[
    "autoPaginate",
    "autoPaginateVal",
    "maxApiCalls",
    "maxResults",
];

/// Largest integer an IEEE-754 double represents exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Errors raised while converting values between representations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("A google.protobuf.Struct can only be built from a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("Integer {0} cannot be represented exactly as a double")]
    UnsafeInteger(Number),
    #[error("Number {0} is not finite and has no JSON representation")]
    NonFiniteNumber(f64),
    #[error("google.protobuf.Value has no kind set")]
    MissingKind,
}

/// Converts a camelCase identifier to snake_case.
///
/// Acronyms are kept together: `instanceID` becomes `instance_id`, `HTTPServer` becomes
/// `http_server`. Identifiers already in snake_case are returned unchanged.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

/// Converts a snake_case identifier to camelCase.
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;

    for c in name.chars() {
        if c == '_' && !out.is_empty() {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }

    out
}

/// Rewrites every object key of `value` to snake_case, recursively.
pub fn snakeize(value: Value) -> Value {
    rename_keys(value, &to_snake_case)
}

/// Rewrites every object key of `value` to camelCase, recursively.
pub fn camelize(value: Value) -> Value {
    rename_keys(value, &to_camel_case)
}

fn rename_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (rename(&k), rename_keys(v, rename)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| rename_keys(v, rename)).collect())
        }
        other => other,
    }
}

/// Removes the pagination control fields from the top level of `fields`.
///
/// Both naming conventions are matched, so `maxResults` and `max_results` are removed alike.
pub fn strip_control_fields(fields: &mut Map<String, Value>) {
    fields.retain(|key, _| {
        !CONTROL_FIELDS
            .iter()
            .any(|control| key.as_str() == *control || *key == to_snake_case(control))
    });
}

/// Converts a JSON object into a `google.protobuf.Struct`.
pub fn value_to_struct(value: &Value) -> Result<Struct, ConversionError> {
    match value {
        Value::Object(map) => object_to_struct(map),
        other => Err(ConversionError::NotAnObject(kind_name(other))),
    }
}

fn object_to_struct(map: &Map<String, Value>) -> Result<Struct, ConversionError> {
    let fields = map
        .iter()
        .map(|(k, v)| Ok((k.clone(), encode_value(v)?)))
        .collect::<Result<BTreeMap<_, _>, ConversionError>>()?;
    Ok(Struct { fields })
}

/// Converts any JSON value into a `google.protobuf.Value`.
pub fn encode_value(value: &Value) -> Result<prost_types::Value, ConversionError> {
    let kind = match value {
        Value::Null => Kind::NullValue(0),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => Kind::NumberValue(number_to_f64(n)?),
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(ListValue {
            values: items.iter().map(encode_value).collect::<Result<_, _>>()?,
        }),
        Value::Object(map) => Kind::StructValue(object_to_struct(map)?),
    };
    Ok(prost_types::Value { kind: Some(kind) })
}

fn number_to_f64(n: &Number) -> Result<f64, ConversionError> {
    let exact = n.is_f64()
        || n.as_i64().is_some_and(|i| (i.unsigned_abs() as f64) <= MAX_SAFE_INTEGER)
        || n.as_u64().is_some_and(|u| (u as f64) <= MAX_SAFE_INTEGER);

    match n.as_f64() {
        Some(f) if exact => Ok(f),
        _ => Err(ConversionError::UnsafeInteger(n.clone())),
    }
}

/// Converts a `google.protobuf.Struct` back into a JSON object.
pub fn struct_to_value(value: &Struct) -> Result<Value, ConversionError> {
    value
        .fields
        .iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect::<Result<Map<_, _>, ConversionError>>()
        .map(Value::Object)
}

/// Converts a `google.protobuf.Value` back into JSON.
pub fn decode_value(value: &prost_types::Value) -> Result<Value, ConversionError> {
    match &value.kind {
        None => Err(ConversionError::MissingKind),
        Some(Kind::NullValue(_)) => Ok(Value::Null),
        Some(Kind::BoolValue(b)) => Ok(Value::Bool(*b)),
        Some(Kind::NumberValue(n)) => Number::from_f64(*n)
            .map(Value::Number)
            .ok_or(ConversionError::NonFiniteNumber(*n)),
        Some(Kind::StringValue(s)) => Ok(Value::String(s.clone())),
        Some(Kind::ListValue(list)) => list
            .values
            .iter()
            .map(decode_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Some(Kind::StructValue(s)) => struct_to_value(s),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
