mod configuration;
mod settings;

pub use configuration::{
    configuration, configure, reset_configuration, Configuration, RecordHook, ResetHook,
};
pub use settings::{Settings, SettingsError};
