#![allow(dead_code)]

use produce::Value;
use serde_json::json;

pub fn user() -> Value {
    Value::from(json!({
        "name": "Taro",
        "age": 30,
        "address": {"city": "Tokyo", "street": "Aoyama 1-1-1"},
        "hobbies": ["reading", "travel"]
    }))
}

pub fn app_state() -> Value {
    Value::from(json!({
        "users": [
            {"id": 1, "name": "user1"},
            {"id": 2, "name": "user2"}
        ],
        "settings": {"theme": "light"}
    }))
}

pub fn items() -> Value {
    Value::from(json!([
        {"id": 1, "count": 5},
        {"id": 2, "count": 3}
    ]))
}

pub fn tree() -> Value {
    Value::from(json!({
        "id": 1,
        "name": "root",
        "children": [
            {"id": 2, "name": "child1", "children": [{"id": 4, "name": "grandchild1"}]},
            {"id": 3, "name": "child2"}
        ]
    }))
}

pub fn account() -> Value {
    Value::from(json!({"id": 1, "balance": 1000, "transactions": []}))
}

/// A record holding an ordered map and an ordered set.
pub fn inventory() -> Value {
    Value::record([
        ("stock", Value::map([("apple", 1), ("banana", 2)])),
        ("colors", Value::set(["red", "blue"])),
    ])
}
