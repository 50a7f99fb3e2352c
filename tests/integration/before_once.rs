//! Integration tests for anonymous once setup
//!
//! Every example gets its own copy of what the setup produced, so mutations
//! made by one example are invisible to the next.

use std::sync::Arc;

use anyhow::Context;
use scope_once::{Configuration, Fixture, Object, Suite, Value};

use super::common::counters::Counter;

fn tags(ex: &scope_once::Example) -> anyhow::Result<Value> {
    ex.field("tags").context("tags were not replayed")
}

#[test]
fn test_examples_get_isolated_copies() {
    let mut suite = Suite::new("tags").with_config(Arc::new(Configuration::new()));
    let root = suite.root();
    suite
        .scope(root)
        .declare_once_setup(|fx| {
            fx.set_field("tags", Value::list([Value::str("a")]));
            fx.set_field(
                "user",
                Value::object(Object::new("User").with("name", "bob")),
            );
            Ok(())
        })
        .unwrap();

    suite
        .scope(root)
        .example("mutates", |ex| {
            let tags = tags(ex)?;
            tags.as_list().context("not a list")?.borrow_mut().push(Value::str("b"));
            anyhow::ensure!(tags.as_list().context("not a list")?.borrow().len() == 2);
            let user = ex.field("user").context("user missing")?;
            user.set_field("name", "mallory");
            ex.set_field("user", Value::Nil);
            Ok(())
        })
        .example("sees pristine state", |ex| {
            let tags = tags(ex)?;
            anyhow::ensure!(tags == Value::list([Value::str("a")]));
            let user = ex.field("user").context("user missing")?;
            anyhow::ensure!(user.get_field("name") == Some(Value::str("bob")));
            Ok(())
        });

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
}

#[test]
fn test_setup_runs_in_declaration_order_once() {
    let calls = Counter::new();
    let mut suite = Suite::new("ordering").with_config(Arc::new(Configuration::new()));
    let root = suite.root();

    suite
        .scope(root)
        .declare_once_setup(|fx| {
            fx.set_field("steps", Value::list([Value::str("first")]));
            Ok(())
        })
        .unwrap();
    let counter = calls.clone();
    suite
        .scope(root)
        .declare_once_setup(move |fx| {
            counter.bump();
            let steps = fx.field("steps").context("first step did not run")?;
            steps
                .as_list()
                .context("not a list")?
                .borrow_mut()
                .push(Value::str("second"));
            Ok(())
        })
        .unwrap();
    for name in ["one", "two"] {
        suite.scope(root).example(name, |ex| {
            let steps = ex.field("steps").context("steps missing")?;
            anyhow::ensure!(steps == Value::list([Value::str("first"), Value::str("second")]));
            Ok(())
        });
    }

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_before_each_runs_after_replay_root_first() {
    let mut suite = Suite::new("before_each").with_config(Arc::new(Configuration::new()));
    let root = suite.root();
    suite
        .scope(root)
        .declare_once_setup(|fx| {
            fx.set_field("log", Value::list([Value::str("once")]));
            Ok(())
        })
        .unwrap();
    suite.scope(root).before_each(|fx| {
        let log = fx.field("log").context("once setup not replayed")?;
        log.as_list().context("not a list")?.borrow_mut().push(Value::str("root each"));
        Ok(())
    });
    let child = suite.add_scope(root, "child");
    suite.scope(child).before_each(|fx| {
        let log = fx.field("log").context("once setup not replayed")?;
        log.as_list().context("not a list")?.borrow_mut().push(Value::str("child each"));
        Ok(())
    });
    suite.scope(child).example("sees the order", |ex| {
        let log = ex.field("log").context("log missing")?;
        let expected = Value::list([
            Value::str("once"),
            Value::str("root each"),
            Value::str("child each"),
        ]);
        anyhow::ensure!(log == expected, "unexpected order: {log:?}");
        Ok(())
    });

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
}
