use crate::error::MapError;
use crate::value::{Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::any::TypeId;

/// Static description of an enum member type: variant names and their
/// underlying values. Lets generic coercion resolve an enum column by name
/// or by discriminant.
#[derive(Debug)]
pub struct EnumRepr {
    pub name: &'static str,
    pub variants: &'static [(&'static str, i64)],
}

impl EnumRepr {
    pub fn by_name(&self, name: &str) -> Option<i64> {
        self.variants.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| *v)
    }

    pub fn by_value(&self, value: i64) -> Option<i64> {
        self.variants.iter().find(|(_, v)| *v == value).map(|(_, v)| *v)
    }

    pub fn name_of(&self, value: i64) -> Option<&'static str> {
        self.variants.iter().find(|(_, v)| *v == value).map(|(n, _)| *n)
    }
}

/// Declared type of one shape member.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Text,
    Blob,
    Timestamp,
    Uuid,
    Enum(&'static EnumRepr),
}

impl FieldKind {
    /// The canonical [`ValueKind`] a member of this kind holds. Enums are
    /// carried as their underlying integer value.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            FieldKind::Bool => ValueKind::Bool,
            FieldKind::Int => ValueKind::Int,
            FieldKind::Float => ValueKind::Float,
            FieldKind::Text => ValueKind::Text,
            FieldKind::Blob => ValueKind::Blob,
            FieldKind::Timestamp => ValueKind::Timestamp,
            FieldKind::Uuid => ValueKind::Uuid,
            FieldKind::Enum(_) => ValueKind::Int,
        }
    }

    pub fn of(kind: ValueKind) -> Option<FieldKind> {
        match kind {
            ValueKind::Bool => Some(FieldKind::Bool),
            ValueKind::Int => Some(FieldKind::Int),
            ValueKind::Float => Some(FieldKind::Float),
            ValueKind::Text => Some(FieldKind::Text),
            ValueKind::Blob => Some(FieldKind::Blob),
            ValueKind::Timestamp => Some(FieldKind::Timestamp),
            ValueKind::Uuid => Some(FieldKind::Uuid),
            ValueKind::Null => None,
        }
    }
}

/// The member type's own conversion operator, tried right after identity
/// when the compiler selects a conversion strategy.
pub type FromValueFn = fn(&Value) -> Result<Value, MapError>;

/// One public member of a shape.
#[derive(Debug)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    pub from_value: Option<FromValueFn>,
}

impl FieldDef {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        FieldDef { name, kind, nullable: false, from_value: None }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn with_from_value(mut self, f: FromValueFn) -> Self {
        self.from_value = Some(f);
        self
    }
}

/// Structural descriptor of a target type's public members. One static
/// instance per mapped type, handed out by [`Shaped::shape`].
#[derive(Debug)]
pub struct Shape {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
}

impl Shape {
    /// Case-insensitive member lookup, the column matching rule.
    pub fn field_index(&self, column: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name.eq_ignore_ascii_case(column))
    }
}

/// Implemented by any type the engine can map rows into and parameters out
/// of. `set` always receives a value already converted to the member's
/// declared kind, so implementations stay branch-free per field.
pub trait Shaped: Default + Send + 'static {
    fn shape() -> &'static Shape;
    fn get(&self, field: usize) -> Value;
    fn set(&mut self, field: usize, value: Value);
}

/// One column of a result set or bulk-load table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ValueKind,
}

/// Ordered (name, declared kind) pairs describing a result set's columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ColumnSignature {
    pub cols: Vec<Column>,
}

impl ColumnSignature {
    pub fn new(cols: Vec<Column>) -> Self {
        ColumnSignature { cols }
    }

    pub fn of(cols: &[(&str, ValueKind)]) -> Self {
        ColumnSignature { cols: cols.iter().map(|(n, k)| Column { name: n.to_string(), kind: *k }).collect() }
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.cols.iter()
    }
}

/// Cache key pairing a target shape with the column signature it was
/// compiled against. Equality is structural: the same shape queried against
/// a differently shaped result set gets its own compiled routine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    pub type_id: TypeId,
    pub shape: &'static str,
    pub columns: ColumnSignature,
}

impl SchemaKey {
    pub fn of<T: Shaped>(columns: &ColumnSignature) -> Self {
        SchemaKey { type_id: TypeId::of::<T>(), shape: T::shape().name, columns: columns.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Probe {
        a: i64,
    }

    static PROBE_SHAPE: Shape = Shape { name: "Probe", fields: &[FieldDef::new("a", FieldKind::Int)] };

    impl Shaped for Probe {
        fn shape() -> &'static Shape {
            &PROBE_SHAPE
        }
        fn get(&self, _field: usize) -> Value {
            Value::Int(self.a)
        }
        fn set(&mut self, _field: usize, value: Value) {
            if let Value::Int(v) = value {
                self.a = v;
            }
        }
    }

    #[test]
    fn field_lookup_is_case_insensitive() {
        assert_eq!(PROBE_SHAPE.field_index("A"), Some(0));
        assert_eq!(PROBE_SHAPE.field_index("a"), Some(0));
        assert_eq!(PROBE_SHAPE.field_index("b"), None);
    }

    #[test]
    fn schema_keys_are_structural() {
        let wide = ColumnSignature::of(&[("a", ValueKind::Int), ("extra", ValueKind::Text)]);
        let narrow = ColumnSignature::of(&[("a", ValueKind::Int)]);
        let k1 = SchemaKey::of::<Probe>(&wide);
        let k2 = SchemaKey::of::<Probe>(&wide);
        let k3 = SchemaKey::of::<Probe>(&narrow);
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn enum_repr_lookups() {
        static REPR: EnumRepr = EnumRepr { name: "Status", variants: &[("active", 0), ("banned", 1)] };
        assert_eq!(REPR.by_name("ACTIVE"), Some(0));
        assert_eq!(REPR.by_name("gone"), None);
        assert_eq!(REPR.by_value(1), Some(1));
        assert_eq!(REPR.name_of(1), Some("banned"));
    }
}
