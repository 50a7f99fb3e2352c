//! Integration tests for once values
//!
//! Once values run a single time per scope, are inherited by nested scopes
//! and can be overridden there; the database work behind them is rolled back
//! when the suite is done.

use std::sync::Arc;

use anyhow::Context;
use scope_once::{Configuration, Fixture, Outcome, Suite, Value};

use super::common::counters::Counter;
use super::common::fixtures::fixture_db;

fn suite(description: &str) -> Suite {
    Suite::new(description).with_config(Arc::new(Configuration::new()))
}

#[test]
fn test_once_value_runs_once_per_scope() {
    let calls = Counter::new();
    let mut suite = suite("answer");
    let root = suite.root();

    let counter = calls.clone();
    suite
        .scope(root)
        .declare_once_value("answer", move |_| {
            counter.bump();
            Ok(Value::Int(42))
        })
        .unwrap();
    for name in ["first", "second", "third"] {
        suite.scope(root).example(name, |ex| {
            anyhow::ensure!(ex.value("answer")? == Value::Int(42));
            Ok(())
        });
    }

    let nested = suite.add_scope(root, "nested");
    suite
        .scope(nested)
        .declare_once_value("double", |fx| {
            let answer = fx.value("answer")?.as_int().context("answer is not an int")?;
            Ok(Value::Int(answer * 2))
        })
        .unwrap();
    suite.scope(nested).example("sees both", |ex| {
        anyhow::ensure!(ex.value("answer")? == Value::Int(42));
        anyhow::ensure!(ex.value("double")? == Value::Int(84));
        Ok(())
    });

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.passed(), 4);
    assert_eq!(calls.get(), 1, "the nested scope must not re-run the parent's setup");
}

#[test]
fn test_sibling_scopes_start_from_a_blank_slate() {
    let mut suite = suite("siblings");
    let root = suite.root();
    let left = suite.add_scope(root, "left");
    let right = suite.add_scope(root, "right");

    suite
        .scope(left)
        .declare_once_setup(|fx| {
            fx.set_field("left_only", Value::str("here"));
            Ok(())
        })
        .unwrap();
    suite.scope(left).example("left sees its field", |ex| {
        anyhow::ensure!(ex.field("left_only") == Some(Value::str("here")));
        Ok(())
    });

    suite
        .scope(right)
        .declare_once_setup(|fx| {
            anyhow::ensure!(fx.field("left_only").is_none(), "leaked from sibling");
            Ok(())
        })
        .unwrap();
    suite.scope(right).example("right does not", |ex| {
        anyhow::ensure!(ex.field("left_only").is_none());
        anyhow::ensure!(matches!(
            ex.value("nothing"),
            Err(scope_once::OnceError::UnknownValue(_))
        ));
        Ok(())
    });

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
}

#[test]
fn test_override_keeps_ancestor_rows_and_rolls_everything_back() {
    let db = fixture_db();
    let mut suite = suite("User").with_resource(db.resource.clone());
    let root = suite.root();

    let users = db.users.clone();
    suite
        .scope(root)
        .declare_once_value("user", move |_| Ok(users.create_user("bob")?))
        .unwrap();
    let users = db.users.clone();
    suite.scope(root).example("has bob", move |ex| {
        anyhow::ensure!(users.count_users()? == 1);
        anyhow::ensure!(ex.value("user")?.get_field("name") == Some(Value::str("bob")));
        Ok(())
    });

    let child = suite.add_scope(root, "with billy");
    let users = db.users.clone();
    suite
        .scope(child)
        .declare_once_value("user", move |_| Ok(users.create_user("billy")?))
        .unwrap();
    let users = db.users.clone();
    suite.scope(child).example("sees the override", move |ex| {
        anyhow::ensure!(users.count_users()? == 2, "bob's row must still exist");
        anyhow::ensure!(ex.value("user")?.get_field("name") == Some(Value::str("billy")));
        Ok(())
    });

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(db.users.count_users().unwrap(), 0);
    assert_eq!(db.resource.depth(), 0);
}

#[test]
fn test_failing_once_value_skips_the_scope() {
    let db = fixture_db();
    let mut suite = suite("User").with_resource(db.resource.clone());
    let root = suite.root();
    let broken = suite.add_scope(root, "duplicate names");

    let users = db.users.clone();
    suite
        .scope(broken)
        .declare_once_setup(move |_| {
            users.create_user("bob")?;
            users.create_user("bob")?;
            Ok(())
        })
        .unwrap();
    suite.scope(broken).example("never runs", |_| Ok(()));
    let nested = suite.add_scope(broken, "nested");
    suite.scope(nested).example("never runs either", |_| Ok(()));
    suite.scope(root).example("still runs", |_| Ok(()));

    let report = suite.run();
    assert_eq!(report.passed(), 1);
    assert_eq!(report.not_run(), 2);
    assert!(matches!(
        report.outcome("never runs"),
        Some(Outcome::NotRun(reason)) if reason.contains("UNIQUE constraint failed")
    ));
    assert!(matches!(
        report.errors.as_slice(),
        [scope_once::OnceError::SetupFailure { .. }]
    ));
    assert_eq!(db.users.count_users().unwrap(), 0);
}

#[test]
fn test_declaration_errors() {
    let mut suite = suite("User");
    let root = suite.root();
    suite
        .scope(root)
        .declare_once_value("user", |_| Ok(Value::Nil))
        .unwrap();
    let duplicate = suite
        .scope(root)
        .declare_once_value("user", |_| Ok(Value::Nil))
        .unwrap_err();
    assert!(matches!(duplicate, scope_once::OnceError::Configuration(_)));

    let blank = suite
        .scope(root)
        .declare_once_value(" ", |_| Ok(Value::Nil))
        .unwrap_err();
    assert!(matches!(blank, scope_once::OnceError::Configuration(_)));
}
