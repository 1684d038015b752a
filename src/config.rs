//! Typed settings loaded into the registry.
//!
//! Settings are plain `serde` structs registered as singletons, so factories
//! read them like any other dependency.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{Binding, DiError, DiResult, ServiceRegistry};

/// Where settings come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    /// JSON document text
    Json(String),
    /// YAML document text
    Yaml(String),
    /// A `.json`, `.yaml` or `.yml` file
    File(PathBuf),
    /// Environment variables named `{PREFIX}_{FIELD}`, with the field part
    /// lowercased. Values that parse as JSON scalars are read as such,
    /// everything else as strings.
    Env {
        /// Variable prefix, without the trailing underscore
        prefix: String,
    },
}

impl SettingsSource {
    pub fn json(text: impl Into<String>) -> Self {
        SettingsSource::Json(text.into())
    }

    pub fn yaml(text: impl Into<String>) -> Self {
        SettingsSource::Yaml(text.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        SettingsSource::File(path.into())
    }

    pub fn env(prefix: impl Into<String>) -> Self {
        SettingsSource::Env {
            prefix: prefix.into(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            SettingsSource::Json(_) => "json",
            SettingsSource::Yaml(_) => "yaml",
            SettingsSource::File(_) => "file",
            SettingsSource::Env { .. } => "env",
        }
    }
}

fn config_error(what: impl std::fmt::Display, error: impl std::fmt::Display) -> DiError {
    DiError::Configuration(format!("{}: {}", what, error))
}

fn from_json<S: DeserializeOwned>(text: &str) -> DiResult<S> {
    serde_json::from_str(text).map_err(|e| config_error("invalid JSON settings", e))
}

fn from_yaml<S: DeserializeOwned>(text: &str) -> DiResult<S> {
    serde_yaml::from_str(text).map_err(|e| config_error("invalid YAML settings", e))
}

fn from_file<S: DeserializeOwned>(path: &Path) -> DiResult<S> {
    let parse: fn(&str) -> DiResult<S> = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => from_json,
        Some("yaml") | Some("yml") => from_yaml,
        _ => {
            return Err(DiError::Configuration(format!(
                "unsupported settings file format: {}",
                path.display()
            )))
        }
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| config_error(format_args!("cannot read {}", path.display()), e))?;
    parse(&text)
}

fn env_value(raw: String) -> Value {
    match serde_json::from_str::<Value>(&raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => value,
        _ => Value::String(raw),
    }
}

fn from_env<S: DeserializeOwned>(prefix: &str) -> DiResult<S> {
    let prefix = format!("{}_", prefix.to_uppercase());
    let fields: Map<String, Value> = std::env::vars()
        .filter_map(|(key, raw)| {
            key.strip_prefix(&prefix)
                .filter(|field| !field.is_empty())
                .map(|field| (field.to_lowercase(), env_value(raw)))
        })
        .collect();
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| config_error(format_args!("invalid settings in {}* variables", prefix), e))
}

/// Loads `S` from `source`.
///
/// ```rust
/// use ferrous_wire::{load_settings, SettingsSource};
///
/// #[derive(serde::Deserialize)]
/// struct Settings { punctuation: String }
///
/// let settings: Settings = load_settings(&SettingsSource::yaml("punctuation: '!!'")).unwrap();
/// assert_eq!(settings.punctuation, "!!");
/// ```
pub fn load_settings<S: DeserializeOwned>(source: &SettingsSource) -> DiResult<S> {
    let settings = match source {
        SettingsSource::Json(text) => from_json(text),
        SettingsSource::Yaml(text) => from_yaml(text),
        SettingsSource::File(path) => from_file(path),
        SettingsSource::Env { prefix } => from_env(prefix),
    };
    match &settings {
        Ok(_) => tracing::debug!(
            settings = std::any::type_name::<S>(),
            source = source.kind(),
            "loaded settings"
        ),
        Err(error) => tracing::warn!(
            settings = std::any::type_name::<S>(),
            source = source.kind(),
            %error,
            "failed to load settings"
        ),
    }
    settings
}

impl ServiceRegistry {
    /// Loads `S` from `source` and registers it as a singleton for `S`.
    ///
    /// ```rust
    /// use ferrous_wire::{Resolver, ServiceRegistry, SettingsSource};
    ///
    /// #[derive(serde::Deserialize)]
    /// struct Settings { punctuation: String }
    ///
    /// let mut registry = ServiceRegistry::new();
    /// registry
    ///     .register_settings::<Settings>(&SettingsSource::json(r#"{"punctuation": "!!"}"#))
    ///     .unwrap();
    /// let container = registry.create_container();
    /// assert_eq!(container.get::<Settings>().unwrap().punctuation, "!!");
    /// ```
    pub fn register_settings<S>(&mut self, source: &SettingsSource) -> DiResult<&mut Self>
    where
        S: DeserializeOwned + Send + Sync + 'static,
    {
        let settings: S = load_settings(source)?;
        Ok(self.register_singleton(Binding::of::<S>(), settings))
    }
}
