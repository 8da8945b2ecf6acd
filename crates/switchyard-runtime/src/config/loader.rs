//! Layered configuration loading.
//!
//! Sources are merged in this order, later ones winning key by key:
//!
//! 1. `SwitchyardConfig::default()`
//! 2. `switchyard.<profile>.toml` next to the main file
//! 3. the main file: `switchyard.toml` or `config.toml` (YAML variants with
//!    the `yaml-config` feature)
//! 4. `SWITCHYARD_*` environment variables, `__` separating nested keys
//!    (`SWITCHYARD_SERVER__PORT=8080`, `SWITCHYARD_APP__STRICT_ROUTING=true`)
//! 5. values given to [`ConfigLoader::merge`] and [`ConfigLoader::set`]
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("staging")
//!     .with_current_dir()
//!     .set("server.port", 8081)
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::SwitchyardConfig;

const PROFILE_VAR: &str = "SWITCHYARD_PROFILE";
const ENV_PREFIX: &str = "SWITCHYARD_";

/// Selects the `switchyard.<profile>.*` overlay file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Case-insensitive; `dev` and `prod` are accepted.
    pub fn parse(name: &str) -> Self {
        let lowered = name.to_lowercase();
        match lowered.as_str() {
            "dev" | "development" => Self::Development,
            "prod" | "production" => Self::Production,
            _ => Self::Custom(lowered),
        }
    }

    /// The profile named by `SWITCHYARD_PROFILE`, or development.
    pub fn from_env() -> Self {
        match std::env::var(PROFILE_VAR) {
            Ok(name) => Self::parse(&name),
            Err(_) => Self::default(),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Toml,
    Yaml,
}

impl FileFormat {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    fn is_enabled(self) -> bool {
        match self {
            Self::Toml => cfg!(feature = "toml-config"),
            Self::Yaml => cfg!(feature = "yaml-config"),
        }
    }

    /// Main file names, most preferred first.
    fn main_files(self) -> &'static [&'static str] {
        match self {
            Self::Toml => &["switchyard.toml", "config.toml"],
            Self::Yaml => &[
                "switchyard.yaml",
                "switchyard.yml",
                "config.yaml",
                "config.yml",
            ],
        }
    }

    #[allow(unused_variables)]
    fn provide(self, figment: Figment, path: &Path) -> Option<Figment> {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => Some(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => Some(figment.merge(Yaml::file(path))),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

/// Builds a [`SwitchyardConfig`] from defaults, files, the environment and
/// programmatic overrides.
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    read_env: bool,
    explicit_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// A loader reading the environment, with the profile from
    /// `SWITCHYARD_PROFILE`.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            read_env: true,
            explicit_file: None,
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Directories searched for the main file, in order. Without any, the
    /// current directory and the user config directory are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.search_paths.push(dir.as_ref().into());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(dir) => self.search_path(dir),
            Err(_) => self,
        }
    }

    /// `~/.config/switchyard` on Linux.
    pub fn with_user_config_dir(self) -> Self {
        match user_config_dir() {
            Some(dir) => self.search_path(dir),
            None => self,
        }
    }

    /// Reads exactly this file; searching is skipped and a missing file is
    /// an error.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.explicit_file = Some(path.as_ref().into());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.read_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Overrides every key with `config`.
    pub fn merge(mut self, config: SwitchyardConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Overrides one dotted key, e.g. `set("server.port", 8080)`.
    pub fn set<V: serde::Serialize>(mut self, key: &str, value: V) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    pub fn load(self) -> ConfigResult<SwitchyardConfig> {
        let profile = self.profile.clone();
        let config: SwitchyardConfig = self.into_figment()?.extract()?;
        debug!(
            %profile,
            port = config.server.port,
            level = %config.logging.level,
            "Configuration resolved"
        );
        Ok(config)
    }

    fn into_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(SwitchyardConfig::default()));

        figment = match &self.explicit_file {
            Some(path) => read_explicit(figment, path)?,
            None => self.read_discovered(figment),
        };

        if self.read_env {
            trace!(prefix = ENV_PREFIX, "Reading environment overrides");
            figment = figment.merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["PROFILE"])
                    .map(|key| key.as_str().replace("__", ".").into()),
            );
        }

        Ok(figment.merge(self.overrides))
    }

    /// Per enabled format: the first main file found across the search
    /// directories, preceded by every profile overlay seen on the way.
    fn read_discovered(&self, mut figment: Figment) -> Figment {
        let dirs = if self.search_paths.is_empty() {
            default_search_paths()
        } else {
            self.search_paths.clone()
        };

        let mut found_main = false;
        for format in [FileFormat::Toml, FileFormat::Yaml] {
            if !format.is_enabled() {
                continue;
            }
            let (files, main) = self.discover(format, &dirs);
            found_main |= main;
            for file in files {
                if let Some(next) = format.provide(figment.clone(), &file) {
                    figment = next;
                }
            }
        }

        if !found_main {
            warn!("No configuration file found, using defaults");
        }
        figment
    }

    fn discover(&self, format: FileFormat, dirs: &[PathBuf]) -> (Vec<PathBuf>, bool) {
        let mut files = Vec::new();
        for dir in dirs {
            for name in format.main_files() {
                if let Some((stem, ext)) = name.rsplit_once('.') {
                    let overlay = dir.join(format!("{stem}.{}.{ext}", self.profile));
                    if overlay.is_file() {
                        debug!(path = %overlay.display(), "Profile overlay found");
                        files.push(overlay);
                    }
                }
                let main = dir.join(name);
                if main.is_file() {
                    info!(path = %main.display(), "Configuration file found");
                    files.push(main);
                    return (files, true);
                }
            }
        }
        (files, false)
    }
}

fn user_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("switchyard"))
}

fn default_search_paths() -> Vec<PathBuf> {
    std::env::current_dir()
        .ok()
        .into_iter()
        .chain(user_config_dir())
        .collect()
}

fn read_explicit(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let merged = FileFormat::from_extension(ext).and_then(|format| {
        info!(path = %path.display(), "Reading configuration file");
        format.provide(figment, path)
    });
    merged.ok_or_else(|| ConfigError::UnknownFormat(ext.to_string()))
}

/// [`ConfigLoader::new`] with the default search paths.
pub fn load_config() -> ConfigResult<SwitchyardConfig> {
    ConfigLoader::new().load()
}

/// [`ConfigLoader::new`] reading exactly `path`.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<SwitchyardConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogFormat, LogLevel};
    use figment::Jail;
    use switchyard_core::Environment;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config, SwitchyardConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("Development"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("SWITCHYARD_PROFILE", "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }

    #[test]
    fn test_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "switchyard.toml",
                r#"
                [server]
                port = 8080

                [logging]
                level = "debug"
                format = "pretty"

                [logging.filters]
                switchyard_framework = "trace"

                [app]
                env = "production"
                strict_routing = true
                middleware = ["query"]
                "#,
            )?;
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.server.host, "127.0.0.1");
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.logging.format, LogFormat::Pretty);
            assert_eq!(
                config.logging.filters.get("switchyard_framework"),
                Some(&LogLevel::Trace)
            );
            assert_eq!(config.app.env, Environment::Production);
            assert!(config.app.strict_routing);
            assert_eq!(config.app.middleware, vec!["query".to_string()]);
            Ok(())
        });
    }

    #[test]
    fn test_profile_file_is_overridden_by_base_file() {
        Jail::expect_with(|jail| {
            jail.create_file("switchyard.toml", "[server]\nport = 4000\n")?;
            jail.create_file(
                "switchyard.production.toml",
                "[server]\nport = 5000\nhost = \"0.0.0.0\"\n",
            )?;
            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.server.port, 4000);
            assert_eq!(config.server.host, "0.0.0.0");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("switchyard.toml", "[server]\nport = 4000\n")?;
            jail.set_env("SWITCHYARD_SERVER__PORT", "9000");
            jail.set_env("SWITCHYARD_APP__CASE_SENSITIVE_ROUTING", "true");
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert_eq!(config.server.port, 9000);
            assert!(config.app.case_sensitive_routing);
            Ok(())
        });
    }

    #[test]
    fn test_programmatic_values() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .set("server.max_body_bytes", 42)
                .set("app.title", "demo")
                .load()
                .unwrap();
            assert_eq!(config.server.max_body_bytes, 42);
            assert_eq!(
                config.app.custom.get("title"),
                Some(&serde_json::Value::from("demo"))
            );
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new()
            .file("/definitely/not/here/switchyard.toml")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_unsupported_format() {
        Jail::expect_with(|jail| {
            jail.create_file("switchyard.ini", "port = 1")?;
            let err = ConfigLoader::new()
                .file(jail.directory().join("switchyard.ini"))
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::UnknownFormat(ext) if ext == "ini"));
            Ok(())
        });
    }

    #[test]
    fn test_bad_value_is_extract_error() {
        Jail::expect_with(|jail| {
            jail.create_file("switchyard.toml", "[server]\nport = \"many\"\n")?;
            let result = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load();
            assert!(matches!(result, Err(ConfigError::Extract(_))));
            Ok(())
        });
    }
}
