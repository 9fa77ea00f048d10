//! Typed convenience surface tying the engine together: every operation is
//! one lifecycle-wrapped unit of work, with the compiled routines coming out
//! of the mapper's single-flight caches.

use crate::bulk::ObjectRows;
use crate::cache::FlightCache;
use crate::compile::{
    self, MapPolicy, ParamBinder, ReaderSource, RowProjection, RowReader,
};
use crate::dispatch::{Contract, DispatchKey, Dispatcher, Outcome};
use crate::driver::{Command, Connection};
use crate::error::MapError;
use crate::info;
use crate::lifecycle::{self, CloseMode};
use crate::materialize::{materialize_graph, Batch, OneToMany, RowIter};
use crate::schema::{ColumnSignature, SchemaKey, Shaped};
use crate::value::Value;
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::sync::Arc;

static GLOBAL: Lazy<Mapper> = Lazy::new(Mapper::default);

/// Owns the mapping policy and the process-wide compiled-routine caches.
/// All compiled state is immutable after construction; the caches are the
/// only synchronization point.
#[derive(Default)]
pub struct Mapper {
    policy: MapPolicy,
    readers: FlightCache<SchemaKey, RowReader>,
    binders: FlightCache<TypeId, ParamBinder>,
    projections: FlightCache<SchemaKey, RowProjection>,
    dispatchers: FlightCache<DispatchKey, Dispatcher>,
}

impl Mapper {
    pub fn new(policy: MapPolicy) -> Self {
        Mapper { policy, ..Mapper::default() }
    }

    /// The process-wide default mapper (lenient policy).
    pub fn global() -> &'static Mapper {
        &GLOBAL
    }

    pub fn policy(&self) -> MapPolicy {
        self.policy
    }

    fn binder_for<T: Shaped>(&self) -> Result<Arc<ParamBinder>, MapError> {
        self.binders.get_or_compile(TypeId::of::<T>(), || compile::compile_binder::<T>())
    }

    fn projection_for<T: Shaped>(&self, columns: &ColumnSignature) -> Result<Arc<RowProjection>, MapError> {
        let key = SchemaKey::of::<T>(columns);
        self.projections.get_or_compile(key, || compile::compile_projection::<T>(columns))
    }

    /// Reads every member of `obj` as named parameters, via the cached
    /// object-to-parameter routine.
    pub fn params_of<T: Shaped>(&self, obj: &T) -> Result<Vec<(String, Value)>, MapError> {
        let binder = self.binder_for::<T>()?;
        Ok(binder.bind_all(obj)?.into_iter().map(|(n, v)| (n.to_string(), v)).collect())
    }

    /// Runs a query and collects every row of the first result set.
    pub fn query<T: Shaped, P: Params>(
        &self,
        conn: &mut dyn Connection,
        sql: &str,
        params: P,
    ) -> Result<Vec<T>, MapError> {
        self.query_iter(conn, sql, params, |iter| iter.collect::<Result<Vec<T>, MapError>>())
    }

    /// Runs a query and hands the caller a lazy row iterator, scoped to the
    /// lifecycle-wrapped unit of work.
    pub fn query_iter<T: Shaped, P: Params, R, F>(
        &self,
        conn: &mut dyn Connection,
        sql: &str,
        params: P,
        translate: F,
    ) -> Result<R, MapError>
    where
        F: FnOnce(&mut RowIter<'_, T>) -> Result<R, MapError>,
    {
        lifecycle::run(conn, CloseMode::Auto, |c| {
            let mut cmd = c.prepare(sql)?;
            params.bind(self, cmd.as_mut())?;
            let mut cursor = cmd.execute_query()?;
            let reader = self.reader_for::<T>(cursor.columns())?;
            let mut iter = RowIter::new(cursor.as_mut(), reader);
            translate(&mut iter)
        })
    }

    /// Runs a query and returns the first row, if any. The remainder of the
    /// result set is discarded.
    pub fn single<T: Shaped, P: Params>(
        &self,
        conn: &mut dyn Connection,
        sql: &str,
        params: P,
    ) -> Result<Option<T>, MapError> {
        self.query_iter(conn, sql, params, |iter| iter.next().transpose())
    }

    /// Executes a non-query, returning the affected row count.
    pub fn execute<P: Params>(&self, conn: &mut dyn Connection, sql: &str, params: P) -> Result<u64, MapError> {
        lifecycle::run(conn, CloseMode::Auto, |c| {
            let mut cmd = c.prepare(sql)?;
            params.bind(self, cmd.as_mut())?;
            cmd.execute()
        })
    }

    /// Executes a statement and returns its single scalar result.
    pub fn scalar<P: Params>(&self, conn: &mut dyn Connection, sql: &str, params: P) -> Result<Value, MapError> {
        lifecycle::run(conn, CloseMode::Auto, |c| {
            let mut cmd = c.prepare(sql)?;
            params.bind(self, cmd.as_mut())?;
            cmd.execute_scalar()
        })
    }

    /// Runs a query over joined rows and folds them into parent objects with
    /// attached children. Rows must arrive pre-sorted by parent key.
    pub fn query_graph<PA: Shaped, CH: Shaped, P: Params>(
        &self,
        conn: &mut dyn Connection,
        sql: &str,
        params: P,
        desc: &OneToMany<PA, CH>,
    ) -> Result<Vec<PA>, MapError> {
        lifecycle::run(conn, CloseMode::Auto, |c| {
            let mut cmd = c.prepare(sql)?;
            params.bind(self, cmd.as_mut())?;
            let mut cursor = cmd.execute_query()?;
            materialize_graph(cursor.as_mut(), desc, self)
        })
    }

    /// Runs a multi-statement batch, handing the caller a positional
    /// result-set reader.
    pub fn query_multi<P: Params, R, F>(
        &self,
        conn: &mut dyn Connection,
        sql: &str,
        params: P,
        translate: F,
    ) -> Result<R, MapError>
    where
        F: FnOnce(&mut Batch<'_, '_, Mapper>) -> Result<R, MapError>,
    {
        lifecycle::run(conn, CloseMode::Auto, |c| {
            let mut cmd = c.prepare(sql)?;
            params.bind(self, cmd.as_mut())?;
            let mut cursor = cmd.execute_query()?;
            let mut batch = Batch::new(cursor.as_mut(), self);
            translate(&mut batch)
        })
    }

    /// Eagerly runs a query and exposes the rows as a stream, for callers
    /// composing with async pipelines.
    pub fn query_stream<T: Shaped, P: Params>(
        &self,
        conn: &mut dyn Connection,
        sql: &str,
        params: P,
    ) -> Result<futures::stream::Iter<std::vec::IntoIter<Result<T, MapError>>>, MapError> {
        let rows = self.query::<T, P>(conn, sql, params)?;
        Ok(futures::stream::iter(rows.into_iter().map(Ok).collect::<Vec<_>>().into_iter()))
    }

    /// Adapts an object sequence into a row cursor for a bulk transport,
    /// projecting onto the target table's column signature.
    pub fn bulk_rows<T, I>(&self, objects: I, columns: &ColumnSignature) -> Result<ObjectRows<T, I>, MapError>
    where
        T: Shaped,
        I: Iterator<Item = T>,
    {
        let projection = self.projection_for::<T>(columns)?;
        Ok(ObjectRows::new(objects, projection))
    }

    /// Returns the dispatcher for a contract on this connection kind,
    /// building it on first use with the single-flight discipline.
    pub fn dispatcher(&self, contract: &Contract, kind: &'static str) -> Result<Arc<Dispatcher>, MapError> {
        let key = DispatchKey::of(contract, kind);
        self.dispatchers.get_or_compile(key, || Dispatcher::build(contract, kind))
    }

    /// Invokes a contract method against a connection.
    pub fn invoke(
        &self,
        conn: &mut dyn Connection,
        contract: &Contract,
        method: &str,
        args: &[Value],
    ) -> Result<Outcome, MapError> {
        let dispatcher = self.dispatcher(contract, conn.kind())?;
        dispatcher.call(self, conn, method, args)
    }
}

impl ReaderSource for Mapper {
    fn reader_for<T: Shaped>(&self, columns: &ColumnSignature) -> Result<Arc<RowReader>, MapError> {
        let key = SchemaKey::of::<T>(columns);
        let policy = self.policy;
        self.readers.get_or_compile(key, || {
            info!("compiling row reader for shape '{}' against {} columns", T::shape().name, columns.len());
            compile::compile_reader::<T>(columns, policy)
        })
    }
}

/// Anything that can bind itself onto a prepared command: nothing, explicit
/// named values, a shaped object, or a bare scalar for single-parameter
/// statements.
pub trait Params {
    fn bind(&self, mapper: &Mapper, cmd: &mut dyn Command) -> Result<(), MapError>;
}

impl Params for () {
    fn bind(&self, _mapper: &Mapper, _cmd: &mut dyn Command) -> Result<(), MapError> {
        Ok(())
    }
}

impl Params for &[(&str, Value)] {
    fn bind(&self, _mapper: &Mapper, cmd: &mut dyn Command) -> Result<(), MapError> {
        for (name, value) in self.iter() {
            cmd.bind(name, value.clone())?;
        }
        Ok(())
    }
}

impl Params for &[(String, Value)] {
    fn bind(&self, _mapper: &Mapper, cmd: &mut dyn Command) -> Result<(), MapError> {
        for (name, value) in self.iter() {
            cmd.bind(name, value.clone())?;
        }
        Ok(())
    }
}

impl Params for Vec<(String, Value)> {
    fn bind(&self, mapper: &Mapper, cmd: &mut dyn Command) -> Result<(), MapError> {
        self.as_slice().bind(mapper, cmd)
    }
}

/// A bare scalar binds to the statement's single declared parameter.
impl Params for Value {
    fn bind(&self, _mapper: &Mapper, cmd: &mut dyn Command) -> Result<(), MapError> {
        let names = cmd.param_names();
        if names.len() != 1 {
            return Err(MapError::Operation(format!(
                "a bare scalar binds to exactly one parameter, the statement declares {}",
                names.len()
            )));
        }
        cmd.bind(&names[0], self.clone())
    }
}

/// Binds every public member of a shaped object as a same-named parameter.
pub struct Bind<'a, T: Shaped>(pub &'a T);

impl<T: Shaped> Params for Bind<'_, T> {
    fn bind(&self, mapper: &Mapper, cmd: &mut dyn Command) -> Result<(), MapError> {
        let binder = mapper.binder_for::<T>()?;
        binder.apply(self.0, cmd)
    }
}
