//! Integration tests for the scope lifecycle: transactional examples, aborted
//! runs and abandoned scopes.

use std::rc::Rc;
use std::sync::Arc;

use scope_once::host::{Runner, ScopeTree};
use scope_once::{Configuration, LifecycleAdapter, RecordEnv, RecorderPhase, Settings, Suite};

use super::common::fixtures::fixture_db;

#[test]
fn test_transactional_examples_roll_back_between_examples() {
    let db = fixture_db();
    let config = Configuration::with_settings(Settings {
        transactional_examples: true,
        ..Settings::default()
    });
    let mut suite = Suite::new("User")
        .with_config(Arc::new(config))
        .with_resource(db.resource.clone());
    let root = suite.root();

    let users = db.users.clone();
    suite
        .scope(root)
        .declare_once_setup(move |_| {
            users.create_user("bob")?;
            Ok(())
        })
        .unwrap();
    for name in ["first", "second"] {
        let users = db.users.clone();
        suite.scope(root).example(name, move |_| {
            anyhow::ensure!(users.count_users()? == 1, "rows leaked from a previous example");
            users.create_user("temp")?;
            anyhow::ensure!(users.count_users()? == 2);
            Ok(())
        });
    }

    let report = suite.run();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(db.users.count_users().unwrap(), 0);
    assert_eq!(db.resource.depth(), 0);
}

#[test]
fn test_aborted_run_still_releases_every_savepoint() {
    let db = fixture_db();
    let mut suite = Suite::new("User")
        .with_config(Arc::new(Configuration::new()))
        .with_resource(db.resource.clone())
        .fail_fast(true);
    let root = suite.root();
    let users = db.users.clone();
    suite
        .scope(root)
        .declare_once_setup(move |_| {
            users.create_user("bob")?;
            Ok(())
        })
        .unwrap();
    let child = suite.add_scope(root, "child");
    let users = db.users.clone();
    suite
        .scope(child)
        .declare_once_setup(move |_| {
            users.create_user("billy")?;
            Ok(())
        })
        .unwrap();
    suite
        .scope(child)
        .example("fails", |_| anyhow::bail!("boom"))
        .example("skipped", |_| Ok(()));
    let sibling = suite.add_scope(root, "sibling");
    suite.scope(sibling).example("never reached", |_| Ok(()));

    let report = suite.run();
    assert!(report.aborted);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.not_run(), 2);
    assert_eq!(db.users.user_names().unwrap(), Vec::<String>::new());
    assert_eq!(db.resource.depth(), 0);
}

#[test]
fn test_abandoned_scopes_are_reset_innermost_first() {
    let db = fixture_db();
    let mut tree = ScopeTree::new("User", false);
    let root = tree.root();
    let users = db.users.clone();
    tree.scope_mut(root)
        .declare_once_setup(move |_| {
            users.create_user("bob")?;
            Ok(())
        })
        .unwrap();
    let child = tree.add_scope(root, "child");
    let users = db.users.clone();
    tree.scope_mut(child)
        .declare_once_setup(move |_| {
            users.create_user("billy")?;
            Ok(())
        })
        .unwrap();
    let tree = Rc::new(tree);

    let env = RecordEnv::new(Arc::new(Configuration::new()), db.resource.clone());
    let mut host = Runner::new(tree.clone());
    {
        let adapter = LifecycleAdapter::install(&mut host, env);
        adapter.enter(&tree, root).unwrap();
        adapter.enter(&tree, child).unwrap();
        assert_eq!(adapter.outstanding(), vec![root, child]);
        assert_eq!(db.users.count_users().unwrap(), 2);
        // The run is cancelled here: no scope-exit ever fires.
    }

    assert_eq!(db.users.count_users().unwrap(), 0);
    assert_eq!(db.resource.depth(), 0);
    for scope in [root, child] {
        assert_eq!(
            tree.scope(scope).recorder().unwrap().phase(),
            RecorderPhase::Closed
        );
    }
}

#[test]
fn test_settings_load_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scope-once.toml");
    std::fs::write(&path, "transactional-examples = true\nambitious = false\n").unwrap();
    let settings = Settings::load(&path).unwrap();
    assert!(settings.transactional_examples);
    assert!(!settings.ambitious);
}
