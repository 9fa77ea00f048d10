//! Row-streaming adapter for bulk ingest: exposes a cursor-like view over an
//! arbitrary object sequence so a bulk transport can pull converted rows
//! without depending on the object type.

use crate::compile::RowProjection;
use crate::driver::Cursor;
use crate::error::MapError;
use crate::schema::{ColumnSignature, Shaped};
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A [`Cursor`] over a sequence of objects, projecting each one through the
/// compiled object-to-row routine onto the target column signature.
pub struct ObjectRows<T, I> {
    iter: I,
    projection: Arc<RowProjection>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, I> ObjectRows<T, I>
where
    T: Shaped,
    I: Iterator<Item = T>,
{
    pub(crate) fn new(iter: I, projection: Arc<RowProjection>) -> Self {
        ObjectRows { iter, projection, _marker: PhantomData }
    }
}

impl<T, I> fmt::Debug for ObjectRows<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRows").field("projection", &self.projection).finish_non_exhaustive()
    }
}

impl<T, I> Cursor for ObjectRows<T, I>
where
    T: Shaped,
    I: Iterator<Item = T>,
{
    fn columns(&self) -> &ColumnSignature {
        self.projection.columns()
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, MapError> {
        match self.iter.next() {
            Some(obj) => Ok(Some(self.projection.project(&obj)?)),
            None => Ok(None),
        }
    }

    fn next_result_set(&mut self) -> Result<bool, MapError> {
        Ok(false)
    }
}
