//! Application settings.
//!
//! [`Settings`] is both the `app` section of the configuration file and the
//! live settings table an application exposes through `set`/`get`. Known keys
//! are typed fields; anything else is kept verbatim in [`Settings::custom`].
//!
//! Keys are accepted in the familiar spaced form (`"case sensitive routing"`),
//! kebab case (`"x-powered-by"`) or snake case (`"strict_routing"`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Deployment environment of the application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Error details are exposed by default.
    #[default]
    Development,
    /// Error details are hidden by default.
    Production,
    /// Behaves like development.
    Test,
}

impl Environment {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    /// Returns `true` for [`Environment::Production`].
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(SettingsError::invalid("env", other)),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the query string is decoded into `Query` params.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryParserMode {
    /// `application/x-www-form-urlencoded` decoding, last value wins.
    #[default]
    Simple,
    /// The query string is left undecoded.
    Disabled,
}

/// Errors raised when a setting is assigned a value of the wrong shape.
#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    /// The value cannot be used for the key.
    #[error("invalid value for setting '{key}': {value}")]
    InvalidValue {
        /// Normalised key.
        key: String,
        /// Offending value, rendered.
        value: String,
    },
}

impl SettingsError {
    fn invalid(key: &str, value: impl fmt::Display) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Settings of one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Deployment environment.
    pub env: Environment,

    /// Whether `/Foo` and `/foo` are different paths for the root router.
    pub case_sensitive_routing: bool,

    /// Whether a trailing slash is significant for the root router.
    pub strict_routing: bool,

    /// Whether the root router merges params from its parent (only relevant
    /// when the application itself is dispatched from another router).
    pub merge_params: bool,

    /// Send an `X-Powered-By` header.
    pub x_powered_by: bool,

    /// Expose error details in default error responses. Defaults to
    /// `true` outside production.
    pub expose_errors: Option<bool>,

    /// Query string decoding.
    pub query_parser: QueryParserMode,

    /// Named built-in middleware registered when the application is built
    /// from settings.
    pub middleware: Vec<String>,

    /// Any other key set through [`Settings::set`].
    #[serde(flatten)]
    pub custom: BTreeMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Environment::default(),
            case_sensitive_routing: false,
            strict_routing: false,
            merge_params: false,
            x_powered_by: true,
            expose_errors: None,
            query_parser: QueryParserMode::default(),
            middleware: Vec::new(),
            custom: BTreeMap::new(),
        }
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace([' ', '-'], "_")
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, SettingsError> {
    value
        .as_bool()
        .ok_or_else(|| SettingsError::invalid(key, value))
}

impl Settings {
    /// Returns whether default error responses include error details.
    pub fn exposes_errors(&self) -> bool {
        self.expose_errors.unwrap_or(!self.env.is_production())
    }

    /// Assigns a setting.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), SettingsError> {
        let value = value.into();
        let normalized = normalize_key(key);
        match normalized.as_str() {
            "env" => {
                let s = value
                    .as_str()
                    .ok_or_else(|| SettingsError::invalid("env", &value))?;
                self.env = s.parse()?;
            }
            "case_sensitive_routing" => {
                self.case_sensitive_routing = expect_bool(&normalized, &value)?;
            }
            "strict_routing" => self.strict_routing = expect_bool(&normalized, &value)?,
            "merge_params" => self.merge_params = expect_bool(&normalized, &value)?,
            "x_powered_by" => self.x_powered_by = expect_bool(&normalized, &value)?,
            "expose_errors" => {
                self.expose_errors = match value {
                    Value::Null => None,
                    ref v => Some(expect_bool(&normalized, v)?),
                };
            }
            "query_parser" => {
                self.query_parser = match &value {
                    Value::Bool(true) => QueryParserMode::Simple,
                    Value::Bool(false) | Value::Null => QueryParserMode::Disabled,
                    Value::String(s) if s == "simple" => QueryParserMode::Simple,
                    Value::String(s) if s == "disabled" => QueryParserMode::Disabled,
                    other => return Err(SettingsError::invalid(&normalized, other)),
                };
            }
            "middleware" => {
                self.middleware = serde_json::from_value(value.clone())
                    .map_err(|_| SettingsError::invalid(&normalized, &value))?;
            }
            _ => {
                self.custom.insert(key.to_string(), value);
            }
        }
        Ok(())
    }

    /// Reads a setting.
    pub fn get(&self, key: &str) -> Option<Value> {
        match normalize_key(key).as_str() {
            "env" => Some(Value::from(self.env.as_str())),
            "case_sensitive_routing" => Some(Value::from(self.case_sensitive_routing)),
            "strict_routing" => Some(Value::from(self.strict_routing)),
            "merge_params" => Some(Value::from(self.merge_params)),
            "x_powered_by" => Some(Value::from(self.x_powered_by)),
            "expose_errors" => Some(Value::from(self.exposes_errors())),
            "query_parser" => Some(Value::from(match self.query_parser {
                QueryParserMode::Simple => "simple",
                QueryParserMode::Disabled => "disabled",
            })),
            "middleware" => Some(Value::from(self.middleware.clone())),
            _ => self.custom.get(key).cloned(),
        }
    }

    /// Sets a setting to `true`.
    pub fn enable(&mut self, key: &str) -> Result<(), SettingsError> {
        self.set(key, true)
    }

    /// Sets a setting to `false`.
    pub fn disable(&mut self, key: &str) -> Result<(), SettingsError> {
        self.set(key, false)
    }

    /// Returns `true` if the setting holds a truthy value.
    pub fn enabled(&self, key: &str) -> bool {
        match self.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    /// Negation of [`Settings::enabled`].
    pub fn disabled(&self, key: &str) -> bool {
        !self.enabled(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.env, Environment::Development);
        assert!(settings.x_powered_by);
        assert!(settings.exposes_errors());
        assert!(settings.disabled("strict routing"));
    }

    #[test]
    fn test_key_aliases() {
        let mut settings = Settings::default();
        settings.enable("case sensitive routing").unwrap();
        settings.enable("strict-routing").unwrap();
        settings.disable("x-powered-by").unwrap();

        assert!(settings.case_sensitive_routing);
        assert!(settings.strict_routing);
        assert!(!settings.x_powered_by);
        assert!(settings.enabled("Case Sensitive Routing"));
    }

    #[test]
    fn test_production_hides_errors() {
        let mut settings = Settings::default();
        settings.set("env", "production").unwrap();
        assert!(!settings.exposes_errors());

        settings.set("expose errors", true).unwrap();
        assert!(settings.exposes_errors());
    }

    #[test]
    fn test_custom_values_round_trip() {
        let mut settings = Settings::default();
        settings.set("title", "My Site").unwrap();
        assert_eq!(settings.get("title"), Some(Value::from("My Site")));
        assert!(settings.enabled("title"));
        assert!(settings.disabled("missing"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut settings = Settings::default();
        assert!(settings.set("strict routing", "yes").is_err());
        assert!(settings.set("env", "staging").is_err());
        assert!(settings.set("query parser", 3).is_err());
    }

    #[test]
    fn test_deserialize_with_custom_keys() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "env": "production",
            "strict_routing": true,
            "middleware": ["query"],
            "title": "custom"
        }))
        .unwrap();

        assert!(settings.env.is_production());
        assert!(settings.strict_routing);
        assert_eq!(settings.middleware, vec!["query".to_string()]);
        assert_eq!(settings.custom.get("title"), Some(&Value::from("custom")));
    }
}
