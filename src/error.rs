//! Error taxonomy shared by all activity checks.
//!
//! Construction problems are [`ConfigurationError`]s and abort loading the
//! whole configuration. Evaluation problems are [`CheckError`]s and come in
//! two severities.

use thiserror::Error;

/// A check section could not be turned into a check.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("missing option `{0}`")]
    MissingOption(String),

    #[error("option `{key}` must be {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("option `{key}` is invalid: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("option `{key}` is not a valid regular expression: {source}")]
    InvalidRegex {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown option `{0}`")]
    UnknownOption(String),

    #[error("unknown check class `{0}`")]
    UnknownClass(String),

    #[error("check section `{0}` is not a table")]
    NotATable(String),

    #[error("no checks are enabled")]
    NoChecks,

    #[error("check `{name}`: {source}")]
    Check {
        name: String,
        #[source]
        source: Box<ConfigurationError>,
    },
}

impl ConfigurationError {
    /// Shorthand for [`ConfigurationError::InvalidValue`].
    pub fn invalid(key: &str, reason: impl ToString) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Attach the name of the check section this error belongs to.
    pub fn in_check(self, name: &str) -> Self {
        Self::Check {
            name: name.to_string(),
            source: Box::new(self),
        }
    }
}

/// Evaluating a check failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// Transient failure. The check counts as inactive for this cycle and is
    /// retried on the next one.
    #[error("temporary check failure: {0}")]
    Temporary(String),

    /// The environment can no longer report activity reliably. Callers should
    /// abort the suspend decision.
    #[error("severe check failure: {0}")]
    Severe(String),
}

impl CheckError {
    pub fn temporary(message: impl ToString) -> Self {
        Self::Temporary(message.to_string())
    }

    pub fn severe(message: impl ToString) -> Self {
        Self::Severe(message.to_string())
    }

    pub fn is_severe(&self) -> bool {
        matches!(self, Self::Severe(_))
    }
}
