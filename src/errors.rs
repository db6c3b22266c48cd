// Copyright 2025 Cowboy AI, LLC.

//! Error types for the transition engine

use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur while applying events to workflow instances
#[derive(Debug, Clone, Error)]
pub enum StateError {
    /// The target workflow instance has no active run state
    #[error("workflow instance is not active: {0}")]
    NotActive(String),

    /// A fresh run state was requested for an instance that is already active
    #[error("workflow instance is already active: {0}")]
    AlreadyActive(String),

    /// Optimistic concurrency check failed
    #[error("counter conflict: expected counter {expected}, but current counter is {current}")]
    CounterConflict {
        /// The counter the submitter expected
        expected: u64,
        /// The counter currently persisted for the instance
        current: u64,
    },

    /// Persisting the transitioned state failed
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for transition-engine operations
pub type StateResult<T> = Result<T, StateError>;

impl From<StorageError> for StateError {
    fn from(err: StorageError) -> Self {
        StateError::Storage(err.to_string())
    }
}

impl StateError {
    /// Check if this is a concurrency error
    pub fn is_counter_conflict(&self) -> bool {
        matches!(self, StateError::CounterConflict { .. })
    }

    /// Check if this error means the instance was gone or stale
    ///
    /// These are the conditions the best-effort submission path maps to a
    /// silent no-op.
    pub fn is_stale_instance(&self) -> bool {
        matches!(
            self,
            StateError::NotActive(_) | StateError::CounterConflict { .. }
        )
    }
}
