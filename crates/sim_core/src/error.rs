//! Error types for state store operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The kind of record held by a [`crate::StateStore`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Trading strategy status and performance
    Strategy,
    /// Model accuracy metrics
    Model,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Strategy => write!(f, "strategy"),
            RecordKind::Model => write!(f, "model"),
        }
    }
}

/// Errors returned by the state store.
///
/// # Examples
/// ```
/// use sim_core::{RecordKind, StoreError};
///
/// let err = StoreError::not_found(RecordKind::Model, "doesnotexist");
/// assert_eq!(err.to_string(), "model not found: doesnotexist");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record with the given identifier exists
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Table that was queried
        kind: RecordKind,
        /// Identifier that was requested
        id: String,
    },
}

impl StoreError {
    /// Create a not-found error
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Kind of record the failed lookup targeted
    pub fn kind(&self) -> RecordKind {
        match self {
            StoreError::NotFound { kind, .. } => *kind,
        }
    }
}
