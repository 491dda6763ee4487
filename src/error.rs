use std::{fmt, io};

use thiserror::Error;

/// Fatal, cross-component failures.
///
/// Per-file parse and postprocess problems are never represented here —
/// they accumulate as [`crate::diagnostic::Diagnostic`] values and never
/// abort a build. `CoreError` is reserved for conditions that make the
/// whole project unusable: a malformed spec resource, an unreadable
/// project config, a cache file that cannot be written, or a genuine
/// inheritance/constant cycle detected at load time.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("spec registry error: {0}")]
    Spec(String),

    #[error("inheritance cycle detected while resolving '{0}'")]
    InheritanceCycle(String),

    #[error("giza inheritance cycle detected while resolving '{0}'")]
    CyclicInheritance(String),

    #[error("constant substitution cycle detected while resolving '{0}'")]
    ConstantCycle(String),

    #[error("project config error: {0}")]
    Config(String),

    #[error("cache I/O error: {0}")]
    Cache(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("(de)serialization error: {0}")]
    Serialization(String),
}

impl From<io::Error> for CoreError {
    fn from(x: io::Error) -> Self {
        CoreError::Io(format!("{x}"))
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(x: toml::de::Error) -> Self {
        CoreError::Serialization(format!("toml deserialization error: {x}"))
    }
}

impl From<toml::ser::Error> for CoreError {
    fn from(x: toml::ser::Error) -> Self {
        CoreError::Serialization(format!("toml serialization error: {x}"))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(x: serde_json::Error) -> Self {
        CoreError::Serialization(format!("json (de)serialization error: {x}"))
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(x: serde_yaml::Error) -> Self {
        CoreError::Serialization(format!("yaml (de)serialization error: {x}"))
    }
}

impl From<fmt::Error> for CoreError {
    fn from(x: fmt::Error) -> Self {
        CoreError::Serialization(format!("{x}"))
    }
}
