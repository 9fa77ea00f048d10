//! The mapping compiler: inspects a (shape, column signature) pair once and
//! emits an immutable routine that is reused for every subsequent row.

use crate::convert::{self, Conv};
use crate::driver::Command;
use crate::error::MapError;
use crate::schema::{ColumnSignature, FieldDef, SchemaKey, Shape, Shaped};
use crate::value::Value;
use std::any::TypeId;
use std::sync::Arc;

/// Mapping policy carried by a [`crate::query::Mapper`]. Lenient mode leaves
/// members with no matching column at their default; strict mode rejects a
/// missing column for any non-nullable member at compile time.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapPolicy {
    pub strict: bool,
}

/// Supplies cached compiled row readers. Implemented by
/// [`crate::query::Mapper`]; materializers depend on this seam instead of
/// the mapper itself.
pub trait ReaderSource {
    fn reader_for<T: Shaped>(&self, columns: &ColumnSignature) -> Result<Arc<RowReader>, MapError>;
}

#[derive(Debug)]
struct Slot {
    field: usize,
    field_name: &'static str,
    nullable: bool,
    conv: Conv,
}

/// Compiled row-to-object routine, bound to exactly one [`SchemaKey`].
/// Immutable and thread-safe once built; applying it performs no name
/// matching and no strategy lookup.
#[derive(Debug)]
pub struct RowReader {
    key: SchemaKey,
    slots: Vec<Option<Slot>>,
}

impl RowReader {
    pub fn key(&self) -> &SchemaKey {
        &self.key
    }

    pub fn read<T: Shaped>(&self, row: &[Value]) -> Result<T, MapError> {
        let mut out = T::default();
        self.read_into(row, &mut out)?;
        Ok(out)
    }

    pub fn read_into<T: Shaped>(&self, row: &[Value], target: &mut T) -> Result<(), MapError> {
        if TypeId::of::<T>() != self.key.type_id {
            return Err(MapError::Internal(format!(
                "row reader compiled for shape '{}' applied to a different type",
                self.key.shape
            )));
        }
        for (i, slot) in self.slots.iter().enumerate() {
            let Some(slot) = slot else { continue };
            let value = row.get(i).ok_or_else(|| {
                MapError::Operation(format!("row has {} values but the signature declares {}", row.len(), self.slots.len()))
            })?;
            if value.is_null() {
                if slot.nullable {
                    continue;
                }
                return Err(MapError::Mapping {
                    column: self.key.columns.cols[i].name.clone(),
                    source_kind: value.kind(),
                    target: format!("{}.{}", self.key.shape, slot.field_name),
                    reason: "null value for a non-nullable member".to_string(),
                });
            }
            let converted = slot.conv.apply(value).map_err(|reason| MapError::Mapping {
                column: self.key.columns.cols[i].name.clone(),
                source_kind: value.kind(),
                target: format!("{}.{}", self.key.shape, slot.field_name),
                reason,
            })?;
            target.set(slot.field, converted);
        }
        Ok(())
    }
}

/// Compiles the row-to-object routine for `T` against a column signature.
/// Columns with no matching member are ignored; members with no matching
/// column stay at their default unless the policy is strict.
pub fn compile_reader<T: Shaped>(columns: &ColumnSignature, policy: MapPolicy) -> Result<RowReader, MapError> {
    let shape = T::shape();
    if shape.fields.is_empty() {
        return Err(MapError::Compilation(format!("shape '{}' has no public members", shape.name)));
    }
    let mut slots = Vec::with_capacity(columns.len());
    let mut matched = vec![false; shape.fields.len()];
    for column in columns.iter() {
        let Some(field_idx) = shape.field_index(&column.name) else {
            slots.push(None);
            continue;
        };
        let field = &shape.fields[field_idx];
        let conv = convert::for_read(column.kind, field).ok_or_else(|| MapError::Mapping {
            column: column.name.clone(),
            source_kind: column.kind,
            target: format!("{}.{}", shape.name, field.name),
            reason: "no conversion strategy between the declared kinds".to_string(),
        })?;
        matched[field_idx] = true;
        slots.push(Some(Slot { field: field_idx, field_name: field.name, nullable: field.nullable, conv }));
    }
    if policy.strict {
        for (idx, field) in shape.fields.iter().enumerate() {
            if !matched[idx] && !field.nullable {
                return Err(MapError::SchemaMismatch { shape: shape.name, member: field.name.to_string() });
            }
        }
    }
    Ok(RowReader { key: SchemaKey::of::<T>(columns), slots })
}

/// Compiled object-to-parameter routine: every public member binds to a
/// same-named command parameter, nulls bind as database nulls.
#[derive(Debug)]
pub struct ParamBinder {
    type_id: TypeId,
    shape: &'static Shape,
}

impl ParamBinder {
    pub fn shape(&self) -> &'static Shape {
        self.shape
    }

    /// Reads every member of `obj` as a (parameter name, value) pair.
    pub fn bind_all<T: Shaped>(&self, obj: &T) -> Result<Vec<(&'static str, Value)>, MapError> {
        if TypeId::of::<T>() != self.type_id {
            return Err(MapError::Internal(format!(
                "parameter binder compiled for shape '{}' applied to a different type",
                self.shape.name
            )));
        }
        Ok(self.shape.fields.iter().enumerate().map(|(i, f)| (f.name, obj.get(i))).collect())
    }

    /// Binds every member of `obj` onto a prepared command.
    pub fn apply<T: Shaped>(&self, obj: &T, cmd: &mut dyn Command) -> Result<(), MapError> {
        for (name, value) in self.bind_all(obj)? {
            cmd.bind(name, value)?;
        }
        Ok(())
    }
}

pub fn compile_binder<T: Shaped>() -> Result<ParamBinder, MapError> {
    let shape = T::shape();
    if shape.fields.is_empty() {
        return Err(MapError::Compilation(format!("shape '{}' has no public members", shape.name)));
    }
    Ok(ParamBinder { type_id: TypeId::of::<T>(), shape })
}

/// Compiled object-to-row projection for bulk ingest: for every target
/// column, the source member index and the reverse conversion selected once.
#[derive(Debug)]
pub struct RowProjection {
    type_id: TypeId,
    shape: &'static str,
    columns: ColumnSignature,
    fields: Vec<(usize, &'static str, Conv)>,
}

impl RowProjection {
    pub fn columns(&self) -> &ColumnSignature {
        &self.columns
    }

    pub fn project<T: Shaped>(&self, obj: &T) -> Result<Vec<Value>, MapError> {
        if TypeId::of::<T>() != self.type_id {
            return Err(MapError::Internal(format!(
                "row projection compiled for shape '{}' applied to a different type",
                self.shape
            )));
        }
        let mut row = Vec::with_capacity(self.fields.len());
        for (i, (field, field_name, conv)) in self.fields.iter().enumerate() {
            let value = obj.get(*field);
            if value.is_null() {
                row.push(Value::Null);
                continue;
            }
            let converted = conv.apply(&value).map_err(|reason| MapError::Mapping {
                column: self.columns.cols[i].name.clone(),
                source_kind: value.kind(),
                target: format!("{}.{}", self.shape, field_name),
                reason,
            })?;
            row.push(converted);
        }
        Ok(row)
    }
}

/// Compiles the projection of `T` onto a bulk-load column signature. Bulk
/// targets have no lenient mode: every target column must resolve a member.
pub fn compile_projection<T: Shaped>(columns: &ColumnSignature) -> Result<RowProjection, MapError> {
    let shape = T::shape();
    if shape.fields.is_empty() {
        return Err(MapError::Compilation(format!("shape '{}' has no public members", shape.name)));
    }
    let mut fields = Vec::with_capacity(columns.len());
    for column in columns.iter() {
        let field_idx = shape
            .field_index(&column.name)
            .ok_or_else(|| MapError::SchemaMismatch { shape: shape.name, member: column.name.clone() })?;
        let field: &FieldDef = &shape.fields[field_idx];
        let conv = convert::for_write(field, column.kind).ok_or_else(|| MapError::Mapping {
            column: column.name.clone(),
            source_kind: field.kind.value_kind(),
            target: format!("column '{}'", column.name),
            reason: "no conversion strategy between the declared kinds".to_string(),
        })?;
        fields.push((field_idx, field.name, conv));
    }
    Ok(RowProjection { type_id: TypeId::of::<T>(), shape: shape.name, columns: columns.clone(), fields })
}
