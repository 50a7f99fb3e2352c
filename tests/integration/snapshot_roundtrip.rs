//! Property tests: whatever setup produces comes back equal after a record,
//! a JSON round trip and a restore.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use proptest::prelude::*;
use scope_once::codec::{restore, Snapshot};
use scope_once::record::Action;
use scope_once::{
    Configuration, Fixture, NullResource, Object, RecordEnv, Recorder, Recording, Value,
};

/// Plain description of a value graph; built into a `Value` inside the test
#[derive(Debug, Clone)]
enum Shape {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Shape>),
    Map(BTreeMap<String, Shape>),
    Object(String, BTreeMap<String, Shape>),
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        Just(Shape::Nil),
        any::<bool>().prop_map(Shape::Bool),
        any::<i64>().prop_map(Shape::Int),
        any::<f64>().prop_map(Shape::Float),
        prop_oneof![Just(f64::NAN), Just(f64::INFINITY), Just(f64::NEG_INFINITY)]
            .prop_map(Shape::Float),
        "[a-z ]{0,8}".prop_map(Shape::Str),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Shape::List),
            prop::collection::btree_map("[a-z]{1,4}", inner.clone(), 0..4).prop_map(Shape::Map),
            ("[A-Z][a-z]{0,6}", prop::collection::btree_map("[a-z]{1,4}", inner, 0..4))
                .prop_map(|(class, fields)| Shape::Object(class, fields)),
        ]
    })
}

fn build(shape: &Shape) -> Value {
    match shape {
        Shape::Nil => Value::Nil,
        Shape::Bool(b) => Value::Bool(*b),
        Shape::Int(n) => Value::Int(*n),
        Shape::Float(n) => Value::Float(*n),
        Shape::Str(s) => Value::str(s.as_str()),
        Shape::List(items) => Value::list(items.iter().map(build)),
        Shape::Map(entries) => {
            Value::map(entries.iter().map(|(k, v)| (Value::str(k.as_str()), build(v))))
        }
        Shape::Object(class, fields) => {
            let object = fields
                .iter()
                .fold(Object::new(class.as_str()), |object, (name, field)| {
                    object.with(name.as_str(), build(field))
                });
            Value::object(object)
        }
    }
}

fn record(value: Value) -> (Recorder, RecordEnv) {
    let env = RecordEnv::new(
        Arc::new(Configuration::new()),
        Arc::new(NullResource::new()),
    );
    let action: Action = Rc::new(move |fx: &mut dyn Fixture| {
        fx.set_field("alias", value.clone());
        Ok(value.clone())
    });
    let mut recorder = Recorder::new("roundtrip");
    recorder
        .declare(Recording::named("value", Some(action)).unwrap())
        .unwrap();
    recorder.record(&[], &[], &env).unwrap();
    (recorder, env)
}

proptest! {
    #[test]
    fn replay_restores_an_equal_graph(shape in shape()) {
        let expected = build(&shape);
        let (recorder, env) = record(build(&shape));

        let restored = recorder.replay(&[], &env).unwrap();
        let value = &restored.named_results["value"];
        prop_assert_eq!(value, &expected);
        prop_assert!(restored.fields["alias"].same(value));
    }

    #[test]
    fn json_round_trip_restores_an_equal_graph(shape in shape()) {
        let expected = build(&shape);
        let (recorder, env) = record(build(&shape));

        let json = recorder.snapshot().unwrap().to_json().unwrap();
        let decoded = Snapshot::from_json(&json).unwrap();
        let restored = restore(&[&decoded], env.config.classes()).unwrap();
        prop_assert_eq!(&restored.named_results["value"], &expected);
        prop_assert!(restored.fields["alias"].same(&restored.named_results["value"]));
    }
}
