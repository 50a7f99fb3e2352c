//! Integration tests for record and reset hooks

use std::sync::Arc;

use anyhow::Context;
use scope_once::{Configuration, Fixture, OnceError, Outcome, Suite, Value};

use super::common::counters::EventLog;

fn logging_config(log: &EventLog) -> Configuration {
    let mut config = Configuration::new();
    let (a, b, c, d) = (log.clone(), log.clone(), log.clone(), log.clone());
    config
        .before_record(move |_| {
            a.push("config before_record");
            Ok(())
        })
        .after_record(move |_| {
            b.push("config after_record");
            Ok(())
        })
        .before_reset(move || {
            c.push("config before_reset");
            Ok(())
        })
        .after_reset(move || {
            d.push("config after_reset");
            Ok(())
        });
    config
}

#[test]
fn test_hook_order_across_nested_scopes() {
    let log = EventLog::new();
    let mut suite = Suite::new("hooks").with_config(Arc::new(logging_config(&log)));
    let root = suite.root();
    let child = suite.add_scope(root, "child");

    let (a, b, c, d) = (log.clone(), log.clone(), log.clone(), log.clone());
    suite
        .scope(root)
        .before_record(move |_| {
            a.push("root before_record");
            Ok(())
        })
        .after_record(move |_| {
            b.push("root after_record");
            Ok(())
        })
        .around_record(move |run| {
            c.push("root around in");
            run()?;
            c.push("root around out");
            Ok(())
        })
        .example("root example", |_| Ok(()));
    suite
        .scope(root)
        .declare_once_setup(move |_| {
            d.push("root setup");
            Ok(())
        })
        .unwrap();

    let (e, f, g) = (log.clone(), log.clone(), log.clone());
    suite
        .scope(child)
        .before_record(move |_| {
            e.push("child before_record");
            Ok(())
        })
        .after_record(move |_| {
            f.push("child after_record");
            Ok(())
        })
        .example("child example", |_| Ok(()));
    suite
        .scope(child)
        .declare_once_setup(move |_| {
            g.push("child setup");
            Ok(())
        })
        .unwrap();

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(
        log.events(),
        vec![
            "config before_record",
            "root before_record",
            "root around in",
            "root setup",
            "root around out",
            "root after_record",
            "config after_record",
            "config before_record",
            "root before_record",
            "child before_record",
            "root around in",
            "child setup",
            "root around out",
            "child after_record",
            "root after_record",
            "config after_record",
            "config before_reset",
            "config after_reset",
            "config before_reset",
            "config after_reset",
        ]
    );
}

#[test]
fn test_fields_set_by_record_hooks_are_replayed() {
    let mut config = Configuration::new();
    config.before_record(|fx| {
        fx.set_field("request_id", Value::str("req-1"));
        Ok(())
    });
    let mut suite = Suite::new("hooks").with_config(Arc::new(config));
    let root = suite.root();
    suite
        .scope(root)
        .after_record(|fx| {
            let owner = fx.value("owner")?;
            fx.set_field("owner_name", owner.get_field("name").unwrap_or_default());
            Ok(())
        })
        .declare_once_value("owner", |fx| {
            let request = fx.field("request_id").context("hook did not run first")?;
            Ok(Value::object(
                scope_once::Object::new("User")
                    .with("name", "bob")
                    .with("request", request),
            ))
        })
        .unwrap();
    suite.scope(root).example("sees hook fields", |ex| {
        anyhow::ensure!(ex.field("request_id") == Some(Value::str("req-1")));
        anyhow::ensure!(ex.field("owner_name") == Some(Value::str("bob")));
        Ok(())
    });

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
}

#[test]
fn test_around_hook_that_skips_recordings_fails_the_scope() {
    let mut suite = Suite::new("hooks").with_config(Arc::new(Configuration::new()));
    let root = suite.root();
    suite
        .scope(root)
        .around_record(|_run| Ok(()))
        .example("never runs", |_| Ok(()));
    suite.scope(root).declare_once_setup(|_| Ok(())).unwrap();

    let report = suite.run();
    assert!(matches!(report.outcome("never runs"), Some(Outcome::NotRun(_))));
    match report.errors.as_slice() {
        [OnceError::SetupFailure { message, .. }] => {
            assert!(message.contains("never ran the recordings"), "{message}");
        }
        other => panic!("unexpected errors: {other:?}"),
    }
}

#[test]
fn test_failing_reset_hook_is_reported_after_rollback() {
    let mut config = Configuration::new();
    config.before_reset(|| anyhow::bail!("cache flush failed"));
    let resource = Arc::new(scope_once::NullResource::new());
    let mut suite = Suite::new("hooks")
        .with_config(Arc::new(config))
        .with_resource(resource.clone());
    let root = suite.root();
    suite.scope(root).declare_once_setup(|_| Ok(())).unwrap();
    suite.scope(root).example("passes", |_| Ok(()));

    let report = suite.run();
    assert_eq!(report.passed(), 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].to_string().contains("cache flush failed"));
    assert_eq!(resource.depth(), 0);
}
