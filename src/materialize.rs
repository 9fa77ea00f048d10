//! Object graph materializer: turns a forward-only cursor into typed
//! objects, one-to-many graphs and multi-result-set batches, driving the
//! compiled routines supplied by a [`ReaderSource`].

use crate::compile::{ReaderSource, RowReader};
use crate::driver::Cursor;
use crate::error::MapError;
use crate::schema::{Column, ColumnSignature, Shaped};
use crate::value::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Lazy, single-pass iterator over one result set. Each element is read from
/// the cursor exactly once; the sequence cannot be restarted.
pub struct RowIter<'c, T: Shaped> {
    cursor: &'c mut dyn Cursor,
    reader: Arc<RowReader>,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<'c, T: Shaped> RowIter<'c, T> {
    pub fn new(cursor: &'c mut dyn Cursor, reader: Arc<RowReader>) -> Self {
        RowIter { cursor, reader, done: false, _marker: PhantomData }
    }
}

impl<T: Shaped> Iterator for RowIter<'_, T> {
    type Item = Result<T, MapError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.next_row() {
            Ok(Some(row)) => Some(self.reader.read::<T>(&row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Multi-result-set reader. Sets are mapped in positional order, each
/// against its own shape. Advancing past a set whose iterator was dropped
/// early discards that set's remaining rows; overlapping set iterators are
/// impossible because each one mutably borrows the batch.
pub struct Batch<'c, 's, S> {
    cursor: &'c mut dyn Cursor,
    source: &'s S,
    first: bool,
}

impl<'c, 's, S: ReaderSource> Batch<'c, 's, S> {
    pub fn new(cursor: &'c mut dyn Cursor, source: &'s S) -> Self {
        Batch { cursor, source, first: true }
    }

    /// Positions the cursor on the next result set and returns its typed
    /// iterator, or `None` when the batch is exhausted.
    pub fn next_set<T: Shaped>(&mut self) -> Result<Option<RowIter<'_, T>>, MapError> {
        if self.first {
            self.first = false;
        } else {
            // Drain whatever the previous set's iterator left behind.
            while self.cursor.next_row()?.is_some() {}
            if !self.cursor.next_result_set()? {
                return Ok(None);
            }
        }
        let reader = self.source.reader_for::<T>(self.cursor.columns())?;
        Ok(Some(RowIter::new(&mut *self.cursor, reader)))
    }

    /// Collects the next result set eagerly.
    pub fn collect_set<T: Shaped>(&mut self) -> Result<Option<Vec<T>>, MapError> {
        match self.next_set::<T>()? {
            Some(iter) => Ok(Some(iter.collect::<Result<Vec<T>, MapError>>()?)),
            None => Ok(None),
        }
    }
}

/// Describes a parent/child graph materialized from joined rows: which
/// column prefix belongs to which shape, which parent columns form the
/// association key, and how a child attaches to its parent.
pub struct OneToMany<P: Shaped, C: Shaped> {
    pub parent_prefix: &'static str,
    pub child_prefix: &'static str,
    /// Key column names as they appear after the parent prefix is stripped.
    pub parent_key: &'static [&'static str],
    pub attach: fn(&mut P, C),
}

struct Partition {
    indexes: Vec<usize>,
    signature: ColumnSignature,
}

/// Case-insensitive prefix strip. A prefix length that falls inside a
/// multi-byte character is a non-match, never a slicing panic.
fn strip_prefix_ci<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let head = name.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        name.get(prefix.len()..)
    } else {
        None
    }
}

fn partition(columns: &ColumnSignature, prefix: &str, exclude: Option<&str>) -> Partition {
    let mut indexes = Vec::new();
    let mut cols = Vec::new();
    for (i, col) in columns.iter().enumerate() {
        if exclude.is_some_and(|excluded| strip_prefix_ci(&col.name, excluded).is_some()) {
            continue;
        }
        if let Some(stripped) = strip_prefix_ci(&col.name, prefix) {
            indexes.push(i);
            cols.push(Column { name: stripped.to_string(), kind: col.kind });
        }
    }
    Partition { indexes, signature: ColumnSignature::new(cols) }
}

fn slice_row(row: &[Value], indexes: &[usize], declared: usize) -> Result<Vec<Value>, MapError> {
    indexes
        .iter()
        .map(|&i| {
            row.get(i).cloned().ok_or_else(|| {
                MapError::Operation(format!("row has {} values but the signature declares {}", row.len(), declared))
            })
        })
        .collect()
}

/// Materializes a one-to-many graph from pre-sorted joined rows.
///
/// Precondition: rows arrive sorted by parent key. Only *consecutive* rows
/// with an equal parent key fold into one parent; an out-of-order repeat
/// creates a duplicate parent. A child partition whose columns are all null
/// (a left-join miss) attaches nothing.
pub fn materialize_graph<P, C, S>(
    cursor: &mut dyn Cursor,
    desc: &OneToMany<P, C>,
    source: &S,
) -> Result<Vec<P>, MapError>
where
    P: Shaped,
    C: Shaped,
    S: ReaderSource,
{
    if desc.child_prefix.is_empty() {
        return Err(MapError::Compilation("a one-to-many descriptor requires a non-empty child prefix".to_string()));
    }
    let columns = cursor.columns().clone();
    let child = partition(&columns, desc.child_prefix, None);
    let parent = partition(&columns, desc.parent_prefix, Some(desc.child_prefix));
    if parent.signature.is_empty() || child.signature.is_empty() {
        return Err(MapError::Compilation(format!(
            "joined columns partition into {} parent and {} child columns",
            parent.signature.len(),
            child.signature.len()
        )));
    }
    let mut key_positions = Vec::with_capacity(desc.parent_key.len());
    for key in desc.parent_key {
        let pos = parent
            .signature
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(key))
            .ok_or_else(|| MapError::SchemaMismatch { shape: P::shape().name, member: key.to_string() })?;
        key_positions.push(pos);
    }

    let parent_reader = source.reader_for::<P>(&parent.signature)?;
    let child_reader = source.reader_for::<C>(&child.signature)?;

    let mut parents: Vec<P> = Vec::new();
    let mut last_key: Option<Vec<Value>> = None;
    while let Some(row) = cursor.next_row()? {
        let parent_values = slice_row(&row, &parent.indexes, columns.len())?;
        let child_values = slice_row(&row, &child.indexes, columns.len())?;
        let key: Vec<Value> = key_positions.iter().map(|&i| parent_values[i].clone()).collect();

        if last_key.as_ref() != Some(&key) {
            parents.push(parent_reader.read::<P>(&parent_values)?);
            last_key = Some(key);
        }
        if child_values.iter().all(Value::is_null) {
            continue;
        }
        let child_obj = child_reader.read::<C>(&child_values)?;
        if let Some(current) = parents.last_mut() {
            (desc.attach)(current, child_obj);
        }
    }
    Ok(parents)
}
