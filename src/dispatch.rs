//! Dynamic dispatch proxy, redesigned as an explicit registration/build
//! step: a contract describes a set of callable operations, and building it
//! against a connection kind produces a concrete dispatch table of
//! method-name to bound-operation closures. Configuration problems surface
//! at build time, never at invocation time.

use crate::driver::Connection;
use crate::error::MapError;
use crate::info;
use crate::query::Mapper;
use crate::schema::{Shape, Shaped};
use crate::value::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

pub type NamingFn = fn(&str) -> String;

fn direct_naming(method: &str) -> String {
    method.to_string()
}

/// Abstract description of a set of callable operations: names, parameter
/// lists and return shapes. Supplied by the surrounding API layer.
#[derive(Debug, Clone)]
pub struct Contract {
    pub name: &'static str,
    naming: NamingFn,
    methods: Vec<MethodDecl>,
}

#[derive(Debug, Clone)]
struct MethodDecl {
    name: &'static str,
    params: Vec<&'static str>,
    returns: Returns,
}

impl Contract {
    /// A contract whose statement names are the method names verbatim
    /// (direct stored-procedure naming).
    pub fn new(name: &'static str) -> Self {
        Contract { name, naming: direct_naming, methods: Vec::new() }
    }

    /// Overrides how a method name turns into a statement identifier.
    pub fn with_naming(mut self, naming: NamingFn) -> Self {
        self.naming = naming;
        self
    }

    pub fn method(mut self, name: &'static str, params: &[&'static str], returns: Returns) -> Self {
        self.methods.push(MethodDecl { name, params: params.to_vec(), returns });
        self
    }

    /// Structural hash over the naming transform and every method
    /// declaration. Two contracts sharing a name but differing in content
    /// get distinct cache keys.
    pub fn fingerprint(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut h = std::collections::hash_map::DefaultHasher::new();
        (self.naming as usize).hash(&mut h);
        for m in &self.methods {
            m.name.hash(&mut h);
            m.params.hash(&mut h);
            match m.returns.decl {
                Decl::Unit(run) => (0u8, run as usize).hash(&mut h),
                Decl::RowCount(run) => (1u8, run as usize).hash(&mut h),
                Decl::Scalar(run) => (2u8, run as usize).hash(&mut h),
                Decl::Single { shape, run } => (3u8, shape.name, run as usize).hash(&mut h),
                Decl::Many { shape, run } => (4u8, shape.name, run as usize).hash(&mut h),
            }
        }
        h.finish()
    }
}

/// Declared return shape of a contract method. The typed constructors
/// monomorphize the materialization path once, at declaration.
#[derive(Debug, Clone, Copy)]
pub struct Returns {
    decl: Decl,
}

#[derive(Debug, Clone, Copy)]
enum Decl {
    Unit(RunFn),
    RowCount(RunFn),
    Scalar(RunFn),
    Single { shape: &'static Shape, run: RunFn },
    Many { shape: &'static Shape, run: RunFn },
}

type RunFn = fn(&Mapper, &mut dyn Connection, &str, &[(String, Value)]) -> Result<Outcome, MapError>;

impl Returns {
    pub fn unit() -> Self {
        Returns { decl: Decl::Unit(run_unit) }
    }

    pub fn row_count() -> Self {
        Returns { decl: Decl::RowCount(run_row_count) }
    }

    pub fn scalar() -> Self {
        Returns { decl: Decl::Scalar(run_scalar) }
    }

    pub fn single<T: Shaped>() -> Self {
        Returns { decl: Decl::Single { shape: T::shape(), run: run_single::<T> } }
    }

    pub fn many<T: Shaped>() -> Self {
        Returns { decl: Decl::Many { shape: T::shape(), run: run_many::<T> } }
    }
}

fn run_unit(mapper: &Mapper, conn: &mut dyn Connection, stmt: &str, params: &[(String, Value)]) -> Result<Outcome, MapError> {
    mapper.execute(conn, stmt, params)?;
    Ok(Outcome::Unit)
}

fn run_row_count(mapper: &Mapper, conn: &mut dyn Connection, stmt: &str, params: &[(String, Value)]) -> Result<Outcome, MapError> {
    Ok(Outcome::RowCount(mapper.execute(conn, stmt, params)?))
}

fn run_scalar(mapper: &Mapper, conn: &mut dyn Connection, stmt: &str, params: &[(String, Value)]) -> Result<Outcome, MapError> {
    Ok(Outcome::Scalar(mapper.scalar(conn, stmt, params)?))
}

fn run_single<T: Shaped>(mapper: &Mapper, conn: &mut dyn Connection, stmt: &str, params: &[(String, Value)]) -> Result<Outcome, MapError> {
    let row: Option<T> = mapper.single(conn, stmt, params)?;
    Ok(Outcome::Single(row.map(|r| Box::new(r) as Box<dyn Any + Send>)))
}

fn run_many<T: Shaped>(mapper: &Mapper, conn: &mut dyn Connection, stmt: &str, params: &[(String, Value)]) -> Result<Outcome, MapError> {
    let rows: Vec<T> = mapper.query(conn, stmt, params)?;
    Ok(Outcome::Many(Box::new(rows)))
}

/// Result of a dispatched call, extracted by the typed accessors.
pub enum Outcome {
    Unit,
    RowCount(u64),
    Scalar(Value),
    Single(Option<Box<dyn Any + Send>>),
    Many(Box<dyn Any + Send>),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Unit => f.write_str("Unit"),
            Outcome::RowCount(n) => f.debug_tuple("RowCount").field(n).finish(),
            Outcome::Scalar(v) => f.debug_tuple("Scalar").field(v).finish(),
            Outcome::Single(Some(_)) => f.write_str("Single(Some(..))"),
            Outcome::Single(None) => f.write_str("Single(None)"),
            Outcome::Many(_) => f.write_str("Many(..)"),
        }
    }
}

impl Outcome {
    pub fn rows_affected(self) -> Result<u64, MapError> {
        match self {
            Outcome::RowCount(n) => Ok(n),
            _ => Err(MapError::Internal("outcome is not a row count".to_string())),
        }
    }

    pub fn scalar(self) -> Result<Value, MapError> {
        match self {
            Outcome::Scalar(v) => Ok(v),
            _ => Err(MapError::Internal("outcome is not a scalar".to_string())),
        }
    }

    pub fn one<T: 'static>(self) -> Result<Option<T>, MapError> {
        match self {
            Outcome::Single(None) => Ok(None),
            Outcome::Single(Some(boxed)) => boxed
                .downcast::<T>()
                .map(|b| Some(*b))
                .map_err(|_| MapError::Internal("outcome holds a different row type".to_string())),
            _ => Err(MapError::Internal("outcome is not a single row".to_string())),
        }
    }

    pub fn many<T: 'static>(self) -> Result<Vec<T>, MapError> {
        match self {
            Outcome::Many(boxed) => boxed
                .downcast::<Vec<T>>()
                .map(|b| *b)
                .map_err(|_| MapError::Internal("outcome holds a different row type".to_string())),
            _ => Err(MapError::Internal("outcome is not a row sequence".to_string())),
        }
    }
}

/// Cache key: one dispatcher per (contract, connection kind) pairing. The
/// fingerprint keeps same-named contracts with different declarations apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub contract: &'static str,
    pub kind: &'static str,
    pub fingerprint: u64,
}

impl DispatchKey {
    pub fn of(contract: &Contract, kind: &'static str) -> Self {
        DispatchKey { contract: contract.name, kind, fingerprint: contract.fingerprint() }
    }
}

#[derive(Debug)]
struct BoundMethod {
    statement: String,
    params: Vec<&'static str>,
    run: RunFn,
}

/// Compiled dispatch table for one (contract, connection kind) pair.
#[derive(Debug)]
pub struct Dispatcher {
    contract: &'static str,
    kind: &'static str,
    table: HashMap<&'static str, BoundMethod>,
}

impl Dispatcher {
    pub(crate) fn build(contract: &Contract, kind: &'static str) -> Result<Dispatcher, MapError> {
        let config_err = |method: &str, reason: String| MapError::DispatchConfiguration {
            contract: contract.name.to_string(),
            method: method.to_string(),
            reason,
        };
        if contract.methods.is_empty() {
            return Err(config_err("", "contract declares no methods".to_string()));
        }
        let mut table: HashMap<&'static str, BoundMethod> = HashMap::with_capacity(contract.methods.len());
        for m in &contract.methods {
            if table.contains_key(m.name) {
                return Err(config_err(m.name, "duplicate method name".to_string()));
            }
            for (i, p) in m.params.iter().enumerate() {
                if m.params[..i].contains(p) {
                    return Err(config_err(m.name, format!("duplicate parameter '{}'", p)));
                }
            }
            let statement = (contract.naming)(m.name);
            if statement.is_empty() {
                return Err(config_err(m.name, "naming transform produced an empty statement".to_string()));
            }
            let run = match m.returns.decl {
                Decl::Unit(run) | Decl::RowCount(run) | Decl::Scalar(run) => run,
                Decl::Single { shape, run } | Decl::Many { shape, run } => {
                    if shape.fields.is_empty() {
                        return Err(config_err(
                            m.name,
                            format!("return shape '{}' has no public members", shape.name),
                        ));
                    }
                    run
                }
            };
            table.insert(m.name, BoundMethod { statement, params: m.params.clone(), run });
        }
        info!("built dispatcher for contract '{}' on connection kind '{}'", contract.name, kind);
        Ok(Dispatcher { contract: contract.name, kind, table })
    }

    /// Invokes a contract method: arguments bind positionally to the declared
    /// parameter names, execution runs through the lifecycle wrapper and the
    /// result materializes per the declared return shape.
    pub fn call(
        &self,
        mapper: &Mapper,
        conn: &mut dyn Connection,
        method: &str,
        args: &[Value],
    ) -> Result<Outcome, MapError> {
        let config_err = |reason: String| MapError::DispatchConfiguration {
            contract: self.contract.to_string(),
            method: method.to_string(),
            reason,
        };
        if conn.kind() != self.kind {
            return Err(config_err(format!(
                "dispatcher built for connection kind '{}' invoked on '{}'",
                self.kind,
                conn.kind()
            )));
        }
        let bound = self.table.get(method).ok_or_else(|| config_err("unknown method".to_string()))?;
        if args.len() != bound.params.len() {
            return Err(config_err(format!("expected {} arguments, got {}", bound.params.len(), args.len())));
        }
        let params: Vec<(String, Value)> =
            bound.params.iter().zip(args.iter()).map(|(n, v)| (n.to_string(), v.clone())).collect();
        (bound.run)(mapper, conn, &bound.statement, &params)
    }
}
