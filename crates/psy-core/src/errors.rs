//! Structured error types shared across the psychophysics crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`PsyError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (axis names, sizes, offending values).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for adaptive procedures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum PsyError {
    /// Invalid configuration detected at construction time.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Parameter grid construction or lookup errors.
    #[error("grid error: {0}")]
    Grid(ErrorInfo),
    /// Psychometric model evaluation errors.
    #[error("model error: {0}")]
    Model(ErrorInfo),
    /// Non-finite or degenerate numeric results.
    #[error("numeric error: {0}")]
    Numeric(ErrorInfo),
    /// Design selection errors.
    #[error("selector error: {0}")]
    Selector(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl PsyError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            PsyError::Config(info)
            | PsyError::Grid(info)
            | PsyError::Model(info)
            | PsyError::Numeric(info)
            | PsyError::Selector(info)
            | PsyError::Serde(info) => info,
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        PsyError::Config(ErrorInfo::new(code, message))
    }

    /// Shorthand for a numeric error.
    pub fn numeric(code: impl Into<String>, message: impl Into<String>) -> Self {
        PsyError::Numeric(ErrorInfo::new(code, message))
    }

    /// Returns true when the error should abort construction rather than degrade.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PsyError::Config(_) | PsyError::Grid(_))
    }
}
