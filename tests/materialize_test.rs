mod common;

use common::{order_join_columns, order_join_row, user_columns, user_row, Order, OrderLine, User};
use rowbit::error::MapError;
use rowbit::materialize::OneToMany;
use rowbit::query::Mapper;
use rowbit::testing::{MemConnection, ResultSet, Script};
use rowbit::value::{Value, ValueKind};
use rowbit::ColumnSignature;

fn attach_line(order: &mut Order, line: OrderLine) {
    order.lines.push(line);
}

const ORDER_LINES: OneToMany<Order, OrderLine> = OneToMany {
    parent_prefix: "order_",
    child_prefix: "line_",
    parent_key: &["id"],
    attach: attach_line,
};

#[test]
fn folds_consecutive_rows_into_one_parent() {
    let rows = vec![
        order_join_row(1, "alice", Some(("apple", 2))),
        order_join_row(1, "alice", Some(("pear", 1))),
        order_join_row(2, "bob", Some(("plum", 5))),
    ];
    let mut conn = MemConnection::new(Script::of_set(ResultSet::new(order_join_columns(), rows)));

    let orders = Mapper::global().query_graph(&mut conn, "select_orders", (), &ORDER_LINES).unwrap();

    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].customer, "alice");
    assert_eq!(
        orders[0].lines,
        vec![OrderLine { sku: "apple".into(), qty: 2 }, OrderLine { sku: "pear".into(), qty: 1 }]
    );
    assert_eq!(orders[1].lines, vec![OrderLine { sku: "plum".into(), qty: 5 }]);
}

#[test]
fn left_join_miss_attaches_no_child() {
    let rows = vec![order_join_row(1, "alice", None), order_join_row(2, "bob", Some(("plum", 5)))];
    let mut conn = MemConnection::new(Script::of_set(ResultSet::new(order_join_columns(), rows)));

    let orders = Mapper::global().query_graph(&mut conn, "select_orders_left", (), &ORDER_LINES).unwrap();

    assert_eq!(orders.len(), 2);
    assert!(orders[0].lines.is_empty());
    assert_eq!(orders[1].lines.len(), 1);
}

#[test]
fn out_of_order_parent_key_creates_a_duplicate_parent() {
    let rows = vec![
        order_join_row(1, "alice", Some(("apple", 2))),
        order_join_row(2, "bob", Some(("plum", 5))),
        order_join_row(1, "alice", Some(("pear", 1))),
    ];
    let mut conn = MemConnection::new(Script::of_set(ResultSet::new(order_join_columns(), rows)));

    let orders = Mapper::global().query_graph(&mut conn, "select_orders_unsorted", (), &ORDER_LINES).unwrap();

    assert_eq!(orders.len(), 3);
    assert_eq!(orders[0].id, 1);
    assert_eq!(orders[2].id, 1);
    assert_eq!(orders[2].lines, vec![OrderLine { sku: "pear".into(), qty: 1 }]);
}

#[test]
fn non_ascii_column_names_are_a_prefix_non_match() {
    // "orderé" splits mid-character at the prefix length of "order_".
    let columns = ColumnSignature::of(&[
        ("order_id", ValueKind::Int),
        ("order_customer", ValueKind::Text),
        ("line_sku", ValueKind::Text),
        ("line_qty", ValueKind::Int),
        ("orderé", ValueKind::Int),
    ]);
    let mut row = order_join_row(1, "alice", Some(("apple", 2)));
    row.push(Value::Int(99));
    let mut conn = MemConnection::new(Script::of_set(ResultSet::new(columns, vec![row])));

    let orders = Mapper::global().query_graph(&mut conn, "select_orders_accented", (), &ORDER_LINES).unwrap();

    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].lines, vec![OrderLine { sku: "apple".into(), qty: 2 }]);
}

#[test]
fn short_row_in_the_graph_path_is_an_operation_error() {
    let short = vec![Value::Int(1), Value::Text("alice".into())];
    let mut conn = MemConnection::new(Script::of_set(ResultSet::new(order_join_columns(), vec![short])));

    let err = Mapper::global().query_graph(&mut conn, "select_orders_short", (), &ORDER_LINES).unwrap_err();
    assert!(matches!(err, MapError::Operation(_)));
}

#[test]
fn graph_over_unpartitionable_columns_is_rejected() {
    let columns = ColumnSignature::of(&[("other_id", ValueKind::Int)]);
    let rows = vec![vec![Value::Int(1)]];
    let mut conn = MemConnection::new(Script::of_set(ResultSet::new(columns, rows)));

    let err = Mapper::global().query_graph(&mut conn, "select_badly_joined", (), &ORDER_LINES).unwrap_err();
    assert!(matches!(err, MapError::Compilation(_)));
}

#[test]
fn batch_reads_result_sets_positionally() {
    let users = ResultSet::new(user_columns(), vec![user_row(1, "alice", true, None, 0)]);
    let lines = ResultSet::new(
        ColumnSignature::of(&[("sku", ValueKind::Text), ("qty", ValueKind::Int)]),
        vec![vec![Value::Text("apple".into()), Value::Int(2)], vec![Value::Text("pear".into()), Value::Int(1)]],
    );
    let orders = ResultSet::new(
        ColumnSignature::of(&[("id", ValueKind::Int), ("customer", ValueKind::Text)]),
        vec![vec![Value::Int(9), Value::Text("alice".into())]],
    );
    let mut conn = MemConnection::new(Script::of_sets(vec![users, lines, orders]));

    let (got_users, got_lines, got_orders) = Mapper::global()
        .query_multi(&mut conn, "three_sets", (), |batch| {
            let users: Vec<User> = batch.collect_set().unwrap().unwrap();
            let lines: Vec<OrderLine> = batch.collect_set().unwrap().unwrap();
            let orders: Vec<Order> = batch.collect_set().unwrap().unwrap();
            assert!(batch.collect_set::<OrderLine>().unwrap().is_none());
            Ok((users, lines, orders))
        })
        .unwrap();

    assert_eq!(got_users.len(), 1);
    assert_eq!(got_lines.len(), 2);
    assert_eq!(got_orders[0].customer, "alice");
}

#[test]
fn advancing_past_a_partially_read_set_discards_its_rows() {
    let first = ResultSet::new(
        user_columns(),
        vec![user_row(1, "alice", true, None, 0), user_row(2, "bob", false, None, 0), user_row(3, "carol", true, None, 0)],
    );
    let second = ResultSet::new(
        ColumnSignature::of(&[("sku", ValueKind::Text), ("qty", ValueKind::Int)]),
        vec![vec![Value::Text("apple".into()), Value::Int(2)]],
    );
    let mut conn = MemConnection::new(Script::of_sets(vec![first, second]));

    let lines = Mapper::global()
        .query_multi(&mut conn, "partial_then_advance", (), |batch| {
            {
                let mut users = batch.next_set::<User>().unwrap().unwrap();
                let first = users.next().unwrap().unwrap();
                assert_eq!(first.name, "alice");
                // Two unread rows remain when this iterator drops.
            }
            Ok(batch.collect_set::<OrderLine>().unwrap().unwrap())
        })
        .unwrap();

    assert_eq!(lines, vec![OrderLine { sku: "apple".into(), qty: 2 }]);
}

#[test]
fn row_iterator_is_lazy_and_single_pass() {
    let script = Script::of_set(ResultSet::new(
        user_columns(),
        vec![user_row(1, "alice", true, None, 0), user_row(2, "bob", false, None, 0)],
    ));
    let mut conn = MemConnection::new(script);

    let first_only: Option<User> = Mapper::global()
        .query_iter(&mut conn, "select_users", (), |iter| Ok(iter.next().transpose().unwrap()))
        .unwrap();

    assert_eq!(first_only.unwrap().name, "alice");
}

#[test]
fn stream_yields_the_mapped_rows() {
    let script = Script::of_set(ResultSet::new(
        user_columns(),
        vec![user_row(1, "alice", true, None, 0), user_row(2, "bob", false, None, 0)],
    ));
    let mut conn = MemConnection::new(script);
    let stream = Mapper::global().query_stream::<User, _>(&mut conn, "select_users", ()).unwrap();

    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let users: Vec<User> = rt.block_on(async {
        use futures::StreamExt;
        stream.map(|r| r.unwrap()).collect().await
    });

    assert_eq!(users.len(), 2);
    assert_eq!(users[1].name, "bob");
}
