use proptest::prelude::*;
use rig_vars::{Value, Variables};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        "\\PC*".prop_map(Value::String),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_set(inner.clone(), 0..4).prop_map(Value::Set),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

proptest! {
    #[test]
    fn fetch_returns_what_was_set(key in "[a-z_]{1,12}", v in value()) {
        let mut vars = Variables::new();
        vars.set(&key, v.clone()).unwrap();
        prop_assert_eq!(vars.fetch_value(&key).unwrap(), v);
    }
}
