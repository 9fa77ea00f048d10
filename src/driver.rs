//! Boundary traits the engine requires from a database driver. The engine
//! owns no wire format; anything that can prepare a parametrized statement,
//! execute it and report column metadata can sit behind these traits.

use crate::error::MapError;
use crate::schema::ColumnSignature;
use crate::value::Value;

/// Forward-only view over one or more result sets. Each row is read exactly
/// once; a cursor cannot be rewound. Owned exclusively by the call that
/// created it and released before that call returns.
pub trait Cursor {
    /// Column metadata of the current result set.
    fn columns(&self) -> &ColumnSignature;

    /// Reads the next row of the current result set, `None` when drained.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, MapError>;

    /// Advances to the next result set, refreshing the column metadata.
    /// Returns `false` when the batch is exhausted.
    fn next_result_set(&mut self) -> Result<bool, MapError>;
}

/// A prepared, parametrized statement.
pub trait Command {
    fn bind(&mut self, name: &str, value: Value) -> Result<(), MapError>;

    /// Parameter names the statement declares, in declaration order.
    fn param_names(&self) -> Vec<String>;

    fn execute_query(&mut self) -> Result<Box<dyn Cursor + '_>, MapError>;

    /// Executes a non-query, returning the affected row count.
    fn execute(&mut self) -> Result<u64, MapError>;

    fn execute_scalar(&mut self) -> Result<Value, MapError>;
}

/// A database connection. Transactions are the driver's concern and pass
/// through this layer untouched.
pub trait Connection {
    /// Identifies the connection kind; dispatchers are cached per
    /// (contract, kind) pair because execution strategy may differ by kind.
    fn kind(&self) -> &'static str;

    fn is_open(&self) -> bool;

    fn open(&mut self) -> Result<(), MapError>;

    fn close(&mut self);

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Command + '_>, MapError>;
}
