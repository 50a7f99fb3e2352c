//! Integration tests for ambitious scopes, per-example values and subjects

use std::sync::Arc;

use scope_once::{Configuration, Fixture, Settings, Suite, Value};

use super::common::counters::Counter;

fn counting(counter: &Counter, value: i64) -> impl Fn(&mut dyn Fixture) -> anyhow::Result<Value> {
    let counter = counter.clone();
    move |_: &mut dyn Fixture| {
        counter.bump();
        Ok(Value::Int(value))
    }
}

#[test]
fn test_ambitious_scope_turns_let_into_once() {
    let once_calls = Counter::new();
    let each_calls = Counter::new();
    let mut suite = Suite::new("ambitious").with_config(Arc::new(Configuration::new()));
    let root = suite.root();

    let eager = suite.add_scope(root, "eager");
    suite.scope(eager).ambitious();
    suite.scope(eager).let_value("n", counting(&once_calls, 1)).unwrap();
    let nested = suite.add_scope(eager, "nested");

    let plain = suite.add_scope(root, "plain");
    suite.scope(plain).let_value("n", counting(&each_calls, 2)).unwrap();

    for scope in [eager, nested, plain] {
        for name in ["a", "b"] {
            suite.scope(scope).example(name, |ex| {
                let n = ex.value("n")?;
                anyhow::ensure!(n == ex.value("n")?, "value changed within one example");
                Ok(())
            });
        }
    }

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(once_calls.get(), 1);
    assert_eq!(each_calls.get(), 2);
}

#[test]
fn test_scopes_added_under_an_ambitious_scope_inherit_it() {
    let mut suite = Suite::new("ambitious").with_config(Arc::new(Configuration::new()));
    let root = suite.root();
    let before = suite.add_scope(root, "added before");
    suite.scope(root).ambitious();
    let after = suite.add_scope(root, "added after");
    assert!(!suite.tree().scope(before).is_ambitious());
    assert!(suite.tree().scope(after).is_ambitious());
}

#[test]
fn test_ambitious_setting_applies_to_the_whole_suite() {
    let calls = Counter::new();
    let config = Configuration::with_settings(Settings {
        ambitious: true,
        ..Settings::default()
    });
    let mut suite = Suite::new("ambitious").with_config(Arc::new(config));
    let root = suite.root();
    let counter = calls.clone();
    suite
        .scope(root)
        .before(move |fx| {
            counter.bump();
            fx.set_field("ready", true.into());
            Ok(())
        })
        .unwrap();
    for name in ["a", "b", "c"] {
        suite.scope(root).example(name, |ex| {
            anyhow::ensure!(ex.field("ready") == Some(Value::Bool(true)));
            Ok(())
        });
    }

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_let_each_shadows_once_value_in_nested_scope() {
    let mut suite = Suite::new("shadowing").with_config(Arc::new(Configuration::new()));
    let root = suite.root();
    suite
        .scope(root)
        .declare_once_value("user", |_| Ok(Value::str("once")))
        .unwrap();
    let child = suite.add_scope(root, "child");
    suite
        .scope(child)
        .let_each("user", |_| Ok(Value::str("each")))
        .unwrap();
    suite.scope(child).example("nearest wins", |ex| {
        anyhow::ensure!(ex.value("user")? == Value::str("each"));
        anyhow::ensure!(ex.once_value("user")? == Value::str("once"));
        Ok(())
    });

    let grandchild = suite.add_scope(child, "grandchild");
    suite
        .scope(grandchild)
        .declare_once_value("user", |_| Ok(Value::str("deeper once")))
        .unwrap();
    suite.scope(grandchild).example("deeper once wins", |ex| {
        anyhow::ensure!(ex.value("user")? == Value::str("deeper once"));
        Ok(())
    });

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
}

#[test]
fn test_subject_once() {
    let calls = Counter::new();
    let mut suite = Suite::new("subject").with_config(Arc::new(Configuration::new()));
    let root = suite.root();
    suite
        .scope(root)
        .declare_subject_once(Some("user"), {
            let counter = calls.clone();
            move |_: &mut dyn Fixture| {
                counter.bump();
                Ok(Value::object(scope_once::Object::new("User").with("name", "bob")))
            }
        })
        .unwrap();
    suite.scope(root).example("subject is user", |ex| {
        let subject = ex.value("subject")?;
        anyhow::ensure!(subject.same(&ex.value("user")?));
        Ok(())
    });

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(calls.get(), 1);
}
