//! Connection/command lifecycle wrapper. Every mapping operation runs as a
//! unit of work inside [`run`]: the connection is opened when the caller
//! left it closed, the unit executes, and on every exit path the cursor is
//! released before the connection is closed. A caller-managed open
//! connection is never closed here.

use crate::driver::{Connection, Cursor};
use crate::error::MapError;
use crate::value::Value;

/// Connection close behavior on unit completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CloseMode {
    /// Close iff this call opened the connection.
    #[default]
    Auto,
    /// Never close, even when this call opened the connection.
    KeepOpen,
    /// Always close, even a caller-managed connection.
    ForceClose,
}

struct CloseGuard<'a, C: Connection + ?Sized> {
    conn: &'a mut C,
    close_now: bool,
}

impl<C: Connection + ?Sized> Drop for CloseGuard<'_, C> {
    fn drop(&mut self) {
        if self.close_now {
            self.conn.close();
        }
    }
}

/// Runs one unit of work against a connection, auto-opening and auto-closing
/// around it. Cursors created inside the unit are dropped before the
/// connection close decision, so release order is cursor first, connection
/// second, on every exit path including an unwinding unit.
pub fn run<C, T, F>(conn: &mut C, close: CloseMode, unit: F) -> Result<T, MapError>
where
    C: Connection + ?Sized,
    F: FnOnce(&mut C) -> Result<T, MapError>,
{
    let opened_here = if conn.is_open() {
        false
    } else {
        conn.open()?;
        true
    };
    let close_now = match close {
        CloseMode::Auto => opened_here,
        CloseMode::KeepOpen => false,
        CloseMode::ForceClose => true,
    };
    let mut guard = CloseGuard { conn, close_now };
    unit(&mut *guard.conn)
}

/// Prepares and executes a query inside [`run`], handing the cursor to
/// `translate`. The cursor is scoped to this call and released before the
/// close decision regardless of the translate outcome.
pub fn run_query<C, T, F>(
    conn: &mut C,
    close: CloseMode,
    sql: &str,
    params: &[(String, Value)],
    translate: F,
) -> Result<T, MapError>
where
    C: Connection + ?Sized,
    F: FnOnce(&mut dyn Cursor) -> Result<T, MapError>,
{
    run(conn, close, |c| {
        let mut cmd = c.prepare(sql)?;
        for (name, value) in params {
            cmd.bind(name, value.clone())?;
        }
        let mut cursor = cmd.execute_query()?;
        translate(cursor.as_mut())
    })
}

/// Asynchronous form over an owned connection. The blocking unit runs on the
/// runtime's blocking pool with open/execute/translate ordering preserved.
/// Dropping the returned future does not retry or duplicate an operation the
/// database may already be performing; it only stops further work from being
/// observed.
pub async fn run_owned<C, T, F>(mut conn: C, close: CloseMode, unit: F) -> Result<(C, T), MapError>
where
    C: Connection + Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut C) -> Result<T, MapError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let out = run(&mut conn, close, unit)?;
        Ok((conn, out))
    })
    .await?
}
