//! Configuration loading and typed access to check sections.

use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use toml::Table;
use toml::Value;

use crate::error::ConfigurationError;

/// Options every section may carry regardless of its class.
const COMMON_OPTIONS: &[&str] = &["class", "enabled"];

/// Main configuration for activity-probe.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Check sections keyed by check name, in file order.
    #[serde(rename = "check")]
    pub checks: Table,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("activity-probe").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }

    /// All check sections in file order.
    pub fn sections(&self) -> Result<Vec<CheckSection>, ConfigurationError> {
        self.checks
            .iter()
            .map(|(name, value)| match value {
                Value::Table(values) => Ok(CheckSection::new(name, values.clone())),
                _ => Err(ConfigurationError::NotATable(name.clone())),
            })
            .collect()
    }
}

/// The options of a single `[check.<name>]` table.
#[derive(Debug, Clone, Default)]
pub struct CheckSection {
    name: String,
    values: Table,
}

impl CheckSection {
    pub fn new(name: impl Into<String>, values: Table) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Parse a section body written in TOML. Mostly useful in tests.
    pub fn parse(name: &str, body: &str) -> Result<Self, toml::de::Error> {
        Ok(Self::new(name, toml::from_str(body)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The check class, defaulting to the section name.
    pub fn class(&self) -> Result<String, ConfigurationError> {
        self.string_or("class", &self.name)
    }

    /// Sections are disabled unless they say otherwise.
    pub fn enabled(&self) -> Result<bool, ConfigurationError> {
        match self.values.get("enabled") {
            None => Ok(false),
            Some(Value::Boolean(b)) => Ok(*b),
            Some(_) => Err(wrong_type("enabled", "a boolean")),
        }
    }

    /// Reject options that the check class does not understand.
    pub fn expect_options(&self, known: &[&str]) -> Result<(), ConfigurationError> {
        match self
            .values
            .keys()
            .find(|key| !known.contains(&key.as_str()) && !COMMON_OPTIONS.contains(&key.as_str()))
        {
            Some(key) => Err(ConfigurationError::UnknownOption(key.clone())),
            None => Ok(()),
        }
    }

    pub fn string(&self, key: &str) -> Result<Option<String>, ConfigurationError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(_) => Err(wrong_type(key, "a string")),
        }
    }

    pub fn string_or(&self, key: &str, default: &str) -> Result<String, ConfigurationError> {
        Ok(self.string(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn required_string(&self, key: &str) -> Result<String, ConfigurationError> {
        self.string(key)?
            .ok_or_else(|| ConfigurationError::MissingOption(key.to_string()))
    }

    pub fn integer_or(&self, key: &str, default: i64) -> Result<i64, ConfigurationError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(Value::Integer(i)) => Ok(*i),
            Some(_) => Err(wrong_type(key, "an integer")),
        }
    }

    /// A non-negative integer, typically a number of seconds.
    pub fn unsigned_or(&self, key: &str, default: u64) -> Result<u64, ConfigurationError> {
        let value = self.integer_or(key, i64::try_from(default).unwrap_or(i64::MAX))?;
        u64::try_from(value).map_err(|_| ConfigurationError::invalid(key, "must not be negative"))
    }

    /// A float; integers are accepted as well.
    #[allow(clippy::cast_precision_loss)]
    pub fn float_or(&self, key: &str, default: f64) -> Result<f64, ConfigurationError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(Value::Float(f)) => Ok(*f),
            Some(Value::Integer(i)) => Ok(*i as f64),
            Some(_) => Err(wrong_type(key, "a number")),
        }
    }

    /// A list given either as a comma separated string or as an array.
    ///
    /// Blank entries are dropped.
    pub fn list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigurationError> {
        let items = match self.values.get(key) {
            None => return Ok(None),
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect::<Vec<_>>(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|value| match value {
                    Value::String(s) => Ok(s.clone()),
                    Value::Integer(i) => Ok(i.to_string()),
                    _ => Err(wrong_type(key, "a list of strings")),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(wrong_type(key, "a list or a comma separated string")),
        };

        Ok(Some(
            items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        ))
    }

    pub fn list_or(&self, key: &str, default: &[&str]) -> Result<Vec<String>, ConfigurationError> {
        Ok(self
            .list(key)?
            .unwrap_or_else(|| default.iter().map(|s| (*s).to_string()).collect()))
    }

    /// A list that must be present and non-empty.
    pub fn required_list(&self, key: &str) -> Result<Vec<String>, ConfigurationError> {
        let items = self
            .list(key)?
            .ok_or_else(|| ConfigurationError::MissingOption(key.to_string()))?;
        if items.is_empty() {
            return Err(ConfigurationError::invalid(key, "must not be empty"));
        }
        Ok(items)
    }

    /// A regular expression that has to match the whole input.
    pub fn regex_or(&self, key: &str, default: &str) -> Result<Regex, ConfigurationError> {
        let pattern = self.string_or(key, default)?;
        full_match_regex(&pattern).map_err(|source| ConfigurationError::InvalidRegex {
            key: key.to_string(),
            source,
        })
    }
}

/// Compile `pattern` so that it only matches complete strings.
pub fn full_match_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(pattern)?;
    Regex::new(&format!("^(?:{pattern})$"))
}

fn wrong_type(key: &str, expected: &'static str) -> ConfigurationError {
    ConfigurationError::WrongType {
        key: key.to_string(),
        expected,
    }
}
