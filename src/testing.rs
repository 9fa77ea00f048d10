//! Scripted in-memory driver. Every test in this crate runs against these
//! doubles: a connection replays a fixed script of result sets and records
//! open/close traffic so lifecycle behavior is observable.

use crate::driver::{Command, Connection, Cursor};
use crate::error::MapError;
use crate::schema::ColumnSignature;
use crate::value::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One scripted result set: a column signature plus its rows.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: ColumnSignature,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: ColumnSignature, rows: Vec<Vec<Value>>) -> Self {
        ResultSet { columns, rows }
    }
}

/// What the connection replays, independent of the statement text.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub sets: Vec<ResultSet>,
    pub affected: u64,
    pub scalar: Value,
    /// Parameter names the prepared statement declares.
    pub params: Vec<String>,
}

impl Script {
    pub fn of_sets(sets: Vec<ResultSet>) -> Self {
        Script { sets, ..Script::default() }
    }

    pub fn of_set(set: ResultSet) -> Self {
        Script::of_sets(vec![set])
    }
}

/// Scripted connection. Starts closed unless built with [`MemConnection::open_new`].
pub struct MemConnection {
    script: Script,
    open: bool,
    pub opens: usize,
    pub closes: usize,
    pub bound: Vec<(String, Value)>,
    pub statements: Vec<String>,
    pub cursors_open: Arc<AtomicUsize>,
    fail_on: Option<String>,
}

impl MemConnection {
    pub fn new(script: Script) -> Self {
        MemConnection {
            script,
            open: false,
            opens: 0,
            closes: 0,
            bound: Vec::new(),
            statements: Vec::new(),
            cursors_open: Arc::new(AtomicUsize::new(0)),
            fail_on: None,
        }
    }

    pub fn open_new(script: Script) -> Self {
        let mut conn = MemConnection::new(script);
        conn.open = true;
        conn
    }

    /// Makes any command prepared from the given statement fail at execution.
    pub fn fail_on(mut self, statement: &str) -> Self {
        self.fail_on = Some(statement.to_string());
        self
    }
}

impl Connection for MemConnection {
    fn kind(&self) -> &'static str {
        "mem"
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self) -> Result<(), MapError> {
        self.open = true;
        self.opens += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.closes += 1;
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Command + '_>, MapError> {
        if !self.open {
            return Err(MapError::Operation("connection is closed".to_string()));
        }
        self.statements.push(sql.to_string());
        let fail = self.fail_on.as_deref() == Some(sql);
        Ok(Box::new(MemCommand { conn: self, fail }))
    }
}

struct MemCommand<'a> {
    conn: &'a mut MemConnection,
    fail: bool,
}

impl MemCommand<'_> {
    fn check_fail(&self) -> Result<(), MapError> {
        if self.fail {
            Err(MapError::Operation("scripted execution failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Command for MemCommand<'_> {
    fn bind(&mut self, name: &str, value: Value) -> Result<(), MapError> {
        self.conn.bound.push((name.to_string(), value));
        Ok(())
    }

    fn param_names(&self) -> Vec<String> {
        self.conn.script.params.clone()
    }

    fn execute_query(&mut self) -> Result<Box<dyn Cursor + '_>, MapError> {
        self.check_fail()?;
        self.conn.cursors_open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemCursor {
            sets: self.conn.script.sets.clone(),
            set: 0,
            row: 0,
            open_count: Arc::clone(&self.conn.cursors_open),
        }))
    }

    fn execute(&mut self) -> Result<u64, MapError> {
        self.check_fail()?;
        Ok(self.conn.script.affected)
    }

    fn execute_scalar(&mut self) -> Result<Value, MapError> {
        self.check_fail()?;
        Ok(self.conn.script.scalar.clone())
    }
}

struct MemCursor {
    sets: Vec<ResultSet>,
    set: usize,
    row: usize,
    open_count: Arc<AtomicUsize>,
}

static EMPTY_SIGNATURE: ColumnSignature = ColumnSignature { cols: Vec::new() };

impl Cursor for MemCursor {
    fn columns(&self) -> &ColumnSignature {
        match self.sets.get(self.set) {
            Some(set) => &set.columns,
            None => &EMPTY_SIGNATURE,
        }
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, MapError> {
        match self.sets.get(self.set) {
            Some(set) if self.row < set.rows.len() => {
                let row = set.rows[self.row].clone();
                self.row += 1;
                Ok(Some(row))
            }
            _ => Ok(None),
        }
    }

    fn next_result_set(&mut self) -> Result<bool, MapError> {
        if self.set + 1 < self.sets.len() {
            self.set += 1;
            self.row = 0;
            Ok(true)
        } else {
            self.set = self.sets.len();
            Ok(false)
        }
    }
}

impl Drop for MemCursor {
    fn drop(&mut self) {
        self.open_count.fetch_sub(1, Ordering::SeqCst);
    }
}
