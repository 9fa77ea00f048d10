//! Shared shapes and scripts for the integration tests.
#![allow(dead_code)]

use rowbit::schema::{EnumRepr, FieldDef, FieldKind, Shape, Shaped};
use rowbit::value::{Value, ValueKind};
use rowbit::ColumnSignature;

pub static STATUS_REPR: EnumRepr =
    EnumRepr { name: "Status", variants: &[("active", 0), ("suspended", 1), ("deleted", 2)] };

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Active,
    Suspended,
    Deleted,
}

impl Status {
    pub fn from_i64(v: i64) -> Status {
        match v {
            1 => Status::Suspended,
            2 => Status::Deleted,
            _ => Status::Active,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Status::Active => 0,
            Status::Suspended => 1,
            Status::Deleted => 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub score: Option<f64>,
    pub status: Status,
}

static USER_SHAPE: Shape = Shape {
    name: "User",
    fields: &[
        FieldDef::new("id", FieldKind::Int),
        FieldDef::new("name", FieldKind::Text),
        FieldDef::new("active", FieldKind::Bool),
        FieldDef::new("score", FieldKind::Float).nullable(),
        FieldDef::new("status", FieldKind::Enum(&STATUS_REPR)),
    ],
};

impl Shaped for User {
    fn shape() -> &'static Shape {
        &USER_SHAPE
    }
    fn get(&self, field: usize) -> Value {
        match field {
            0 => Value::Int(self.id),
            1 => Value::Text(self.name.clone()),
            2 => Value::Bool(self.active),
            3 => self.score.map(Value::Float).unwrap_or(Value::Null),
            4 => Value::Int(self.status.as_i64()),
            _ => Value::Null,
        }
    }
    fn set(&mut self, field: usize, value: Value) {
        match (field, value) {
            (0, Value::Int(v)) => self.id = v,
            (1, Value::Text(v)) => self.name = v,
            (2, Value::Bool(v)) => self.active = v,
            (3, Value::Float(v)) => self.score = Some(v),
            (4, Value::Int(v)) => self.status = Status::from_i64(v),
            _ => {}
        }
    }
}

pub fn user_columns() -> ColumnSignature {
    ColumnSignature::of(&[
        ("id", ValueKind::Int),
        ("name", ValueKind::Text),
        ("active", ValueKind::Bool),
        ("score", ValueKind::Float),
        ("status", ValueKind::Int),
    ])
}

pub fn user_row(id: i64, name: &str, active: bool, score: Option<f64>, status: i64) -> Vec<Value> {
    vec![
        Value::Int(id),
        Value::Text(name.to_string()),
        Value::Bool(active),
        score.map(Value::Float).unwrap_or(Value::Null),
        Value::Int(status),
    ]
}

/// One member per scalar kind, for round-trip coverage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllKinds {
    pub flag: bool,
    pub count: i64,
    pub ratio: f64,
    pub label: String,
    pub payload: Vec<u8>,
    pub seen_at: Option<chrono::NaiveDateTime>,
    pub token: uuid::Uuid,
    pub status: Status,
}

static ALL_KINDS_SHAPE: Shape = Shape {
    name: "AllKinds",
    fields: &[
        FieldDef::new("flag", FieldKind::Bool),
        FieldDef::new("count", FieldKind::Int),
        FieldDef::new("ratio", FieldKind::Float),
        FieldDef::new("label", FieldKind::Text),
        FieldDef::new("payload", FieldKind::Blob),
        FieldDef::new("seen_at", FieldKind::Timestamp).nullable(),
        FieldDef::new("token", FieldKind::Uuid),
        FieldDef::new("status", FieldKind::Enum(&STATUS_REPR)),
    ],
};

impl Shaped for AllKinds {
    fn shape() -> &'static Shape {
        &ALL_KINDS_SHAPE
    }
    fn get(&self, field: usize) -> Value {
        match field {
            0 => Value::Bool(self.flag),
            1 => Value::Int(self.count),
            2 => Value::Float(self.ratio),
            3 => Value::Text(self.label.clone()),
            4 => Value::Blob(self.payload.clone()),
            5 => self.seen_at.map(Value::Timestamp).unwrap_or(Value::Null),
            6 => Value::Uuid(self.token),
            7 => Value::Int(self.status.as_i64()),
            _ => Value::Null,
        }
    }
    fn set(&mut self, field: usize, value: Value) {
        match (field, value) {
            (0, Value::Bool(v)) => self.flag = v,
            (1, Value::Int(v)) => self.count = v,
            (2, Value::Float(v)) => self.ratio = v,
            (3, Value::Text(v)) => self.label = v,
            (4, Value::Blob(v)) => self.payload = v,
            (5, Value::Timestamp(v)) => self.seen_at = Some(v),
            (6, Value::Uuid(v)) => self.token = v,
            (7, Value::Int(v)) => self.status = Status::from_i64(v),
            _ => {}
        }
    }
}

pub fn all_kinds_columns() -> ColumnSignature {
    ColumnSignature::of(&[
        ("flag", ValueKind::Bool),
        ("count", ValueKind::Int),
        ("ratio", ValueKind::Float),
        ("label", ValueKind::Text),
        ("payload", ValueKind::Blob),
        ("seen_at", ValueKind::Timestamp),
        ("token", ValueKind::Uuid),
        ("status", ValueKind::Int),
    ])
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer: String,
    pub lines: Vec<OrderLine>,
}

static ORDER_SHAPE: Shape = Shape {
    name: "Order",
    fields: &[FieldDef::new("id", FieldKind::Int), FieldDef::new("customer", FieldKind::Text)],
};

impl Shaped for Order {
    fn shape() -> &'static Shape {
        &ORDER_SHAPE
    }
    fn get(&self, field: usize) -> Value {
        match field {
            0 => Value::Int(self.id),
            1 => Value::Text(self.customer.clone()),
            _ => Value::Null,
        }
    }
    fn set(&mut self, field: usize, value: Value) {
        match (field, value) {
            (0, Value::Int(v)) => self.id = v,
            (1, Value::Text(v)) => self.customer = v,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderLine {
    pub sku: String,
    pub qty: i64,
}

static ORDER_LINE_SHAPE: Shape = Shape {
    name: "OrderLine",
    fields: &[FieldDef::new("sku", FieldKind::Text), FieldDef::new("qty", FieldKind::Int)],
};

impl Shaped for OrderLine {
    fn shape() -> &'static Shape {
        &ORDER_LINE_SHAPE
    }
    fn get(&self, field: usize) -> Value {
        match field {
            0 => Value::Text(self.sku.clone()),
            1 => Value::Int(self.qty),
            _ => Value::Null,
        }
    }
    fn set(&mut self, field: usize, value: Value) {
        match (field, value) {
            (0, Value::Text(v)) => self.sku = v,
            (1, Value::Int(v)) => self.qty = v,
            _ => {}
        }
    }
}

/// Joined order/line columns the graph tests read from.
pub fn order_join_columns() -> ColumnSignature {
    ColumnSignature::of(&[
        ("order_id", ValueKind::Int),
        ("order_customer", ValueKind::Text),
        ("line_sku", ValueKind::Text),
        ("line_qty", ValueKind::Int),
    ])
}

pub fn order_join_row(id: i64, customer: &str, line: Option<(&str, i64)>) -> Vec<Value> {
    match line {
        Some((sku, qty)) => {
            vec![Value::Int(id), Value::Text(customer.to_string()), Value::Text(sku.to_string()), Value::Int(qty)]
        }
        None => vec![Value::Int(id), Value::Text(customer.to_string()), Value::Null, Value::Null],
    }
}
