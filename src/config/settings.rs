use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::util::paths::{config_path, resolve_against};

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory new sessions start in
    pub working_dir: PathBuf,
    pub server: ServerSettings,
    pub exec: ExecConfig,
    pub session: SessionSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_permissive: bool,
}

#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Wall-clock limit for one script run
    pub timeout: Duration,
    /// Destination for captured files (relative to `working_dir` unless absolute)
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub max_tokens: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 7825,
                cors_permissive: false,
            },
            exec: ExecConfig {
                timeout: Duration::from_secs(300),
                output_path: PathBuf::from("generated"),
            },
            session: SessionSettings { max_tokens: 20 },
        }
    }
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
struct TomlConfig {
    server: Option<TomlServerConfig>,
    exec: Option<TomlExecConfig>,
    session: Option<TomlSessionConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TomlServerConfig {
    host: Option<String>,
    port: Option<u16>,
    cors_permissive: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TomlExecConfig {
    timeout_secs: Option<u64>,
    output_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TomlSessionConfig {
    max_tokens: Option<usize>,
}

impl Config {
    /// Load configuration from the default config path, merging user values
    /// over the defaults. Creates the example config on first run.
    pub fn load() -> Self {
        let config_file = config_path();

        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::load_from(&config_file)
    }

    /// Load configuration from an explicit path. A missing or malformed file
    /// leaves the defaults in place.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Config::default();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return config,
        };

        match toml::from_str::<TomlConfig>(&contents) {
            Ok(toml_config) => config.merge(toml_config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed config file");
            }
        }

        config
    }

    fn merge(&mut self, toml_config: TomlConfig) {
        if let Some(server) = toml_config.server {
            if let Some(host) = server.host {
                self.server.host = host;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(cors_permissive) = server.cors_permissive {
                self.server.cors_permissive = cors_permissive;
            }
        }

        if let Some(exec) = toml_config.exec {
            match exec.timeout_secs {
                Some(0) => {
                    tracing::warn!(
                        default_secs = self.exec.timeout.as_secs(),
                        "Ignoring exec.timeout_secs = 0, keeping default"
                    );
                }
                Some(secs) => self.exec.timeout = Duration::from_secs(secs),
                None => {}
            }
            if let Some(output_path) = exec.output_path {
                self.exec.output_path = output_path;
            }
        }

        if let Some(session) = toml_config.session {
            if let Some(max_tokens) = session.max_tokens {
                self.session.max_tokens = max_tokens.max(1);
            }
        }
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    eprintln!("Failed to create config directory: {}", e);
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            eprintln!("Failed to write default config: {}", e);
        }
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_output_path(mut self, path: PathBuf) -> Self {
        self.exec.output_path = path;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Override the script timeout. A zero timeout is ignored.
    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            tracing::warn!("Ignoring zero exec timeout, keeping {:?}", self.exec.timeout);
        } else {
            self.exec.timeout = timeout;
        }
        self
    }

    /// Absolute destination for captured files
    pub fn resolved_output_path(&self) -> PathBuf {
        resolve_against(&self.working_dir, &self.exec.output_path)
    }
}
