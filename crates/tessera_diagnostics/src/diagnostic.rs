//! Structured diagnostic messages.

use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single diagnostic finding.
///
/// Diagnostics name the physical or logical entity they concern (a node,
/// pin, net, or cluster) rather than a source location, since the core
/// operates on netlists, not text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of this finding.
    pub severity: Severity,
    /// The main diagnostic message.
    pub message: String,
    /// The entity this diagnostic concerns, if any.
    pub entity: Option<String>,
}

impl Diagnostic {
    /// Creates a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            entity: None,
        }
    }

    /// Creates an error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            entity: None,
        }
    }

    /// Attaches the name of the entity this diagnostic concerns.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity {
            Some(entity) => write!(f, "{}: {} ({entity})", self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}
