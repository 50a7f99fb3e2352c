use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::settings::Settings;
use crate::codec::{ClassCodec, ClassRegistry};
use crate::record::Fixture;

/// Hook run with the recording Tape as its context
pub type RecordHook = Arc<dyn Fn(&mut dyn Fixture) -> anyhow::Result<()> + Send + Sync>;
/// Hook run around rolling back a scope
pub type ResetHook = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Suite-wide hooks, custom class codecs and settings.
///
/// One global instance lives behind [`configure`] / [`configuration`]; a
/// suite takes its copy when it is built and never looks at the global again.
#[derive(Clone, Default)]
pub struct Configuration {
    settings: Settings,
    before_record: Vec<RecordHook>,
    after_record: Vec<RecordHook>,
    before_reset: Vec<ResetHook>,
    after_reset: Vec<ResetHook>,
    classes: ClassRegistry,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Runs before every record pass, ahead of scope-level hooks
    pub fn before_record<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut dyn Fixture) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before_record.push(Arc::new(hook));
        self
    }

    /// Runs after every record pass, behind scope-level hooks
    pub fn after_record<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut dyn Fixture) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.after_record.push(Arc::new(hook));
        self
    }

    pub fn before_reset<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before_reset.push(Arc::new(hook));
        self
    }

    pub fn after_reset<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.after_reset.push(Arc::new(hook));
        self
    }

    /// Encode objects of `class` through `codec` instead of field by field
    pub fn register_class(
        &mut self,
        class: impl Into<String>,
        codec: Arc<dyn ClassCodec>,
    ) -> &mut Self {
        self.classes.register(class, codec);
        self
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub(crate) fn before_record_hooks(&self) -> &[RecordHook] {
        &self.before_record
    }

    pub(crate) fn after_record_hooks(&self) -> &[RecordHook] {
        &self.after_record
    }

    pub(crate) fn before_reset_hooks(&self) -> &[ResetHook] {
        &self.before_reset
    }

    pub(crate) fn after_reset_hooks(&self) -> &[ResetHook] {
        &self.after_reset
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("settings", &self.settings)
            .field("before_record", &self.before_record.len())
            .field("after_record", &self.after_record.len())
            .field("before_reset", &self.before_reset.len())
            .field("after_reset", &self.after_reset.len())
            .field("classes", &self.classes)
            .finish()
    }
}

fn global_cell() -> &'static Mutex<Arc<Configuration>> {
    static CELL: OnceLock<Mutex<Arc<Configuration>>> = OnceLock::new();
    CELL.get_or_init(|| Mutex::new(Arc::new(Configuration::default())))
}

/// Current global configuration
pub fn configuration() -> Arc<Configuration> {
    global_cell().lock().clone()
}

/// Edit the global configuration.
///
/// Suites already built keep the configuration they were built with.
pub fn configure(edit: impl FnOnce(&mut Configuration)) {
    let mut guard = global_cell().lock();
    let mut next = Configuration::clone(&guard);
    edit(&mut next);
    *guard = Arc::new(next);
}

/// Restore the global configuration to its defaults
pub fn reset_configuration() {
    *global_cell().lock() = Arc::new(Configuration::default());
}
