mod common;

use common::{user_columns, user_row, User};
use rowbit::driver::Connection;
use rowbit::error::MapError;
use rowbit::lifecycle::{self, CloseMode};
use rowbit::query::Mapper;
use rowbit::testing::{MemConnection, ResultSet, Script};
use rowbit::value::Value;
use std::sync::atomic::Ordering;

fn one_user_script() -> Script {
    Script::of_set(ResultSet::new(user_columns(), vec![user_row(1, "alice", true, None, 0)]))
}

#[test]
fn closed_connection_is_opened_for_the_call_and_closed_after() {
    let mut conn = MemConnection::new(one_user_script());
    assert!(!conn.is_open());

    let users: Vec<User> = Mapper::global().query(&mut conn, "select_users", ()).unwrap();

    assert_eq!(users.len(), 1);
    assert!(!conn.is_open());
    assert_eq!(conn.opens, 1);
    assert_eq!(conn.closes, 1);
}

#[test]
fn caller_managed_connection_stays_open() {
    let mut conn = MemConnection::open_new(one_user_script());

    let _: Vec<User> = Mapper::global().query(&mut conn, "select_users", ()).unwrap();

    assert!(conn.is_open());
    assert_eq!(conn.opens, 0);
    assert_eq!(conn.closes, 0);
}

#[test]
fn failure_still_closes_what_the_call_opened() {
    let mut conn = MemConnection::new(one_user_script()).fail_on("select_users");

    let err = Mapper::global().query::<User, _>(&mut conn, "select_users", ()).unwrap_err();

    assert!(matches!(err, MapError::Operation(_)));
    assert!(!conn.is_open());
    assert_eq!(conn.closes, 1);
}

#[test]
fn cursor_is_released_before_the_connection_close_decision() {
    let mut conn = MemConnection::new(one_user_script());
    let cursors = conn.cursors_open.clone();

    let _: Vec<User> = Mapper::global().query(&mut conn, "select_users", ()).unwrap();
    assert_eq!(cursors.load(Ordering::SeqCst), 0);

    // The cursor is also released when the translate step fails.
    let err: Result<Vec<User>, MapError> =
        Mapper::global().query_iter::<User, _, _, _>(&mut conn, "select_users", (), |_iter| {
            Err(MapError::Operation("translate gave up".to_string()))
        });
    assert!(err.is_err());
    assert_eq!(cursors.load(Ordering::SeqCst), 0);
    assert!(!conn.is_open());
}

#[test]
fn panicking_unit_still_closes_an_auto_opened_connection() {
    let mut conn = MemConnection::new(Script::default());

    let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        lifecycle::run(&mut conn, CloseMode::Auto, |_c| -> Result<(), MapError> {
            panic!("unit blew up");
        })
    }));

    assert!(unwound.is_err());
    assert!(!conn.is_open());
    assert_eq!(conn.opens, 1);
    assert_eq!(conn.closes, 1);
}

#[test]
fn keep_open_leaves_an_auto_opened_connection_open() {
    let mut conn = MemConnection::new(Script { affected: 2, ..Script::default() });

    let n = lifecycle::run(&mut conn, CloseMode::KeepOpen, |c| {
        let mut cmd = c.prepare("update_rows")?;
        cmd.execute()
    })
    .unwrap();

    assert_eq!(n, 2);
    assert!(conn.is_open());
    assert_eq!(conn.closes, 0);
}

#[test]
fn force_close_closes_a_caller_managed_connection() {
    let mut conn = MemConnection::open_new(Script::default());

    lifecycle::run(&mut conn, CloseMode::ForceClose, |_c| Ok(())).unwrap();

    assert!(!conn.is_open());
    assert_eq!(conn.closes, 1);
}

#[test]
fn run_query_scopes_the_cursor_to_the_translate_step() {
    let mut conn = MemConnection::new(one_user_script());
    let cursors = conn.cursors_open.clone();

    let names = lifecycle::run_query(&mut conn, CloseMode::Auto, "select_users", &[], |cursor| {
        let mut names = Vec::new();
        while let Some(row) = cursor.next_row()? {
            if let Some(Value::Text(name)) = row.get(1).cloned() {
                names.push(name);
            }
        }
        Ok(names)
    })
    .unwrap();

    assert_eq!(names, vec!["alice".to_string()]);
    assert_eq!(cursors.load(Ordering::SeqCst), 0);
    assert!(!conn.is_open());
}

#[tokio::test]
async fn owned_connection_runs_on_the_blocking_pool_and_comes_back() {
    let conn = MemConnection::new(one_user_script());

    let (conn, users) = lifecycle::run_owned(conn, CloseMode::Auto, |c| {
        let mapper = Mapper::global();
        mapper.query::<User, _>(c, "select_users", ())
    })
    .await
    .unwrap();

    assert_eq!(users.len(), 1);
    assert!(!conn.is_open());
    assert_eq!(conn.opens, 1);
    assert_eq!(conn.closes, 1);
}
