//! Ranked conversion strategies between database values and member values.
//!
//! Strategy selection happens once, while a mapping routine is compiled; the
//! winning strategy is baked into the routine so no lookup happens per row.
//! The ranking follows the member/column matching rules: identity first,
//! then the member's own declared operator, then the value kind's widening,
//! then generic coercion.

use crate::schema::{EnumRepr, FieldDef, FieldKind, FromValueFn};
use crate::value::{Value, ValueKind};

/// A conversion strategy selected at compile time. Immutable, cheap to copy,
/// applied per row without further dispatch decisions.
#[derive(Debug, Clone, Copy)]
pub enum Conv {
    Identity,
    Declared(FromValueFn),
    Coerce(CoerceFn),
    EnumByValue(&'static EnumRepr),
    EnumByName(&'static EnumRepr),
    EnumToName(&'static EnumRepr),
}

pub type CoerceFn = fn(&Value) -> Result<Value, String>;

impl Conv {
    /// Applies the strategy. Errors carry only the reason; the caller owns
    /// column and member context.
    pub fn apply(&self, v: &Value) -> Result<Value, String> {
        match self {
            Conv::Identity => Ok(v.clone()),
            Conv::Declared(f) => f(v).map_err(|e| e.to_string()),
            Conv::Coerce(f) => f(v),
            Conv::EnumByValue(repr) => match v {
                Value::Int(i) => repr
                    .by_value(*i)
                    .map(Value::Int)
                    .ok_or_else(|| format!("{} has no variant with value {}", repr.name, i)),
                other => Err(format!("expected integer for enum {}, got {:?}", repr.name, other.kind())),
            },
            Conv::EnumByName(repr) => match v {
                Value::Text(s) => repr
                    .by_name(s)
                    .or_else(|| s.parse::<i64>().ok().and_then(|i| repr.by_value(i)))
                    .map(Value::Int)
                    .ok_or_else(|| format!("{} has no variant named '{}'", repr.name, s)),
                other => Err(format!("expected text for enum {}, got {:?}", repr.name, other.kind())),
            },
            Conv::EnumToName(repr) => match v {
                Value::Int(i) => repr
                    .name_of(*i)
                    .map(|n| Value::Text(n.to_string()))
                    .ok_or_else(|| format!("{} has no variant with value {}", repr.name, i)),
                other => Err(format!("expected enum value for {}, got {:?}", repr.name, other.kind())),
            },
        }
    }
}

/// Selects the strategy for reading a column value into a member.
/// Returns `None` when no conversion exists between the two kinds.
pub fn for_read(column: ValueKind, field: &FieldDef) -> Option<Conv> {
    if !matches!(field.kind, FieldKind::Enum(_)) && column == field.kind.value_kind() {
        return Some(Conv::Identity);
    }
    if let Some(f) = field.from_value {
        return Some(Conv::Declared(f));
    }
    match field.kind {
        FieldKind::Enum(repr) => match column {
            ValueKind::Int => Some(Conv::EnumByValue(repr)),
            ValueKind::Text => Some(Conv::EnumByName(repr)),
            _ => None,
        },
        _ => {
            let target = field.kind.value_kind();
            widen(column, target).or_else(|| coerce(column, target)).map(Conv::Coerce)
        }
    }
}

/// Selects the strategy for writing a member value out to a column of the
/// given kind, the reverse of [`for_read`].
pub fn for_write(field: &FieldDef, column: ValueKind) -> Option<Conv> {
    if let FieldKind::Enum(repr) = field.kind {
        return match column {
            ValueKind::Int => Some(Conv::Identity),
            ValueKind::Text => Some(Conv::EnumToName(repr)),
            _ => None,
        };
    }
    let source = field.kind.value_kind();
    if source == column {
        return Some(Conv::Identity);
    }
    widen(source, column).or_else(|| coerce(source, column)).map(Conv::Coerce)
}

/// The value kind's own declared widening to the target kind.
fn widen(source: ValueKind, target: ValueKind) -> Option<CoerceFn> {
    match (source, target) {
        (ValueKind::Int, ValueKind::Float) => Some(int_to_float),
        (ValueKind::Int, ValueKind::Bool) => Some(int_to_bool),
        (ValueKind::Bool, ValueKind::Int) => Some(bool_to_int),
        (ValueKind::Float, ValueKind::Int) => Some(float_to_int),
        _ => None,
    }
}

/// General textual/numeric coercion fallback.
fn coerce(source: ValueKind, target: ValueKind) -> Option<CoerceFn> {
    match (source, target) {
        (ValueKind::Text, ValueKind::Int) => Some(text_to_int),
        (ValueKind::Text, ValueKind::Float) => Some(text_to_float),
        (ValueKind::Text, ValueKind::Bool) => Some(text_to_bool),
        (ValueKind::Text, ValueKind::Timestamp) => Some(text_to_timestamp),
        (ValueKind::Text, ValueKind::Uuid) => Some(text_to_uuid),
        (ValueKind::Text, ValueKind::Blob) => Some(text_to_blob),
        (ValueKind::Int, ValueKind::Text)
        | (ValueKind::Float, ValueKind::Text)
        | (ValueKind::Bool, ValueKind::Text)
        | (ValueKind::Timestamp, ValueKind::Text)
        | (ValueKind::Uuid, ValueKind::Text) => Some(to_text),
        (ValueKind::Blob, ValueKind::Text) => Some(blob_to_text),
        (ValueKind::Blob, ValueKind::Uuid) => Some(blob_to_uuid),
        (ValueKind::Uuid, ValueKind::Blob) => Some(uuid_to_blob),
        (ValueKind::Int, ValueKind::Timestamp) => Some(int_to_timestamp),
        (ValueKind::Timestamp, ValueKind::Int) => Some(timestamp_to_int),
        _ => None,
    }
}

fn int_to_float(v: &Value) -> Result<Value, String> {
    match v {
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        other => Err(format!("expected integer, got {:?}", other.kind())),
    }
}

fn bool_to_int(v: &Value) -> Result<Value, String> {
    match v {
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        other => Err(format!("expected boolean, got {:?}", other.kind())),
    }
}

fn int_to_bool(v: &Value) -> Result<Value, String> {
    match v {
        Value::Int(0) => Ok(Value::Bool(false)),
        Value::Int(1) => Ok(Value::Bool(true)),
        Value::Int(i) => Err(format!("{} is not a boolean value", i)),
        other => Err(format!("expected integer, got {:?}", other.kind())),
    }
}

fn float_to_int(v: &Value) -> Result<Value, String> {
    match v {
        Value::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 => {
            Ok(Value::Int(*f as i64))
        }
        Value::Float(f) => Err(format!("{} has no exact integer representation", f)),
        other => Err(format!("expected float, got {:?}", other.kind())),
    }
}

fn text_to_int(v: &Value) -> Result<Value, String> {
    match v {
        Value::Text(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|e| e.to_string()),
        other => Err(format!("expected text, got {:?}", other.kind())),
    }
}

fn text_to_float(v: &Value) -> Result<Value, String> {
    match v {
        Value::Text(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|e| e.to_string()),
        other => Err(format!("expected text, got {:?}", other.kind())),
    }
}

fn text_to_bool(v: &Value) -> Result<Value, String> {
    match v {
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            other => Err(format!("'{}' is not a boolean value", other)),
        },
        other => Err(format!("expected text, got {:?}", other.kind())),
    }
}

fn text_to_timestamp(v: &Value) -> Result<Value, String> {
    match v {
        Value::Text(s) => chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
            .map(Value::Timestamp)
            .map_err(|e| e.to_string()),
        other => Err(format!("expected text, got {:?}", other.kind())),
    }
}

fn text_to_uuid(v: &Value) -> Result<Value, String> {
    match v {
        Value::Text(s) => uuid::Uuid::parse_str(s.trim()).map(Value::Uuid).map_err(|e| e.to_string()),
        other => Err(format!("expected text, got {:?}", other.kind())),
    }
}

fn text_to_blob(v: &Value) -> Result<Value, String> {
    match v {
        Value::Text(s) => Ok(Value::Blob(s.clone().into_bytes())),
        other => Err(format!("expected text, got {:?}", other.kind())),
    }
}

fn to_text(v: &Value) -> Result<Value, String> {
    match v {
        Value::Int(i) => Ok(Value::Text(i.to_string())),
        Value::Float(f) => Ok(Value::Text(f.to_string())),
        Value::Bool(b) => Ok(Value::Text(b.to_string())),
        Value::Timestamp(t) => Ok(Value::Text(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        Value::Uuid(u) => Ok(Value::Text(u.to_string())),
        other => Err(format!("no textual form for {:?}", other.kind())),
    }
}

fn blob_to_text(v: &Value) -> Result<Value, String> {
    match v {
        Value::Blob(b) => String::from_utf8(b.clone()).map(Value::Text).map_err(|e| e.to_string()),
        other => Err(format!("expected blob, got {:?}", other.kind())),
    }
}

fn blob_to_uuid(v: &Value) -> Result<Value, String> {
    match v {
        Value::Blob(b) => uuid::Uuid::from_slice(b).map(Value::Uuid).map_err(|e| e.to_string()),
        other => Err(format!("expected blob, got {:?}", other.kind())),
    }
}

fn uuid_to_blob(v: &Value) -> Result<Value, String> {
    match v {
        Value::Uuid(u) => Ok(Value::Blob(u.as_bytes().to_vec())),
        other => Err(format!("expected uuid, got {:?}", other.kind())),
    }
}

fn int_to_timestamp(v: &Value) -> Result<Value, String> {
    match v {
        Value::Int(i) => chrono::DateTime::from_timestamp(*i, 0)
            .map(|dt| Value::Timestamp(dt.naive_utc()))
            .ok_or_else(|| format!("{} is out of timestamp range", i)),
        other => Err(format!("expected integer, got {:?}", other.kind())),
    }
}

fn timestamp_to_int(v: &Value) -> Result<Value, String> {
    match v {
        Value::Timestamp(t) => Ok(Value::Int(t.and_utc().timestamp())),
        other => Err(format!("expected timestamp, got {:?}", other.kind())),
    }
}
