mod settings;

pub use settings::{Config, ExecConfig, ServerSettings, SessionSettings, EXAMPLE_CONFIG};
