//! rowbit maps relational rows to plain Rust structs at runtime: it derives
//! a structural key from the (target shape, result-set columns) pair,
//! compiles an immutable mapping routine for that key exactly once per
//! process, and reuses it for every subsequent operation. On top of that
//! core it offers one-to-many graph materialization, multi-result-set
//! batches, bulk row streaming, contract-based dispatch tables and a
//! connection lifecycle wrapper that auto-opens and auto-closes around each
//! unit of work.

pub mod bulk;
pub mod cache;
pub mod compile;
pub mod convert;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod logger;
pub mod materialize;
pub mod query;
pub mod schema;
pub mod testing;
pub mod value;

pub use bulk::ObjectRows;
pub use cache::FlightCache;
pub use chrono;
pub use compile::{MapPolicy, ReaderSource, RowReader};
pub use dispatch::{Contract, Dispatcher, Outcome, Returns};
pub use driver::{Command, Connection, Cursor};
pub use error::MapError;
pub use futures;
pub use lifecycle::CloseMode;
pub use materialize::{Batch, OneToMany, RowIter};
pub use once_cell;
pub use query::{Bind, Mapper, Params};
pub use schema::{Column, ColumnSignature, EnumRepr, FieldDef, FieldKind, SchemaKey, Shape, Shaped};
pub use serde;
pub use tokio;
pub use uuid;
pub use value::{Value, ValueKind};
