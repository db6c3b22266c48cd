// Copyright 2025 Cowboy AI, LLC.

//! Storage collaborator contract and an in-memory implementation
//!
//! The transition engine only depends on this read/write contract; the
//! durable engine behind it is somebody else's concern. The in-memory
//! implementation backs tests and single-process embeddings.

use crate::identifiers::WorkflowId;
use crate::instance::WorkflowInstance;
use crate::run_state::RunState;
use crate::workflow::Workflow;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur when talking to the storage engine
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Failed to reach the storage engine
    #[error("connection error: {0}")]
    Connection(String),

    /// Failed to serialize or deserialize stored data
    #[error("serialization error: {0}")]
    Serialization(String),

    /// General storage operation failure
    #[error("storage error: {0}")]
    Backend(String),
}

/// Read/write contract the transition engine requires from storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Look up a workflow definition
    async fn lookup_workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>, StorageError>;

    /// Store or replace a workflow definition
    async fn store_workflow(&self, workflow: Workflow) -> Result<(), StorageError>;

    /// Persist the current state of an active instance
    async fn write_active_state(
        &self,
        instance: &WorkflowInstance,
        state: &RunState,
    ) -> Result<(), StorageError>;

    /// Remove an instance from the active set
    async fn delete_active_state(&self, instance: &WorkflowInstance) -> Result<(), StorageError>;

    /// Append a state to the instance's permanent history
    async fn write_state_history(
        &self,
        instance: &WorkflowInstance,
        state: &RunState,
    ) -> Result<(), StorageError>;

    /// All currently active states, for registry recovery
    async fn read_active_states(&self) -> Result<Vec<RunState>, StorageError>;
}

/// Storage over process-local maps
#[derive(Default)]
pub struct InMemoryStorage {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
    active: RwLock<HashMap<WorkflowInstance, RunState>>,
    history: RwLock<HashMap<WorkflowInstance, Vec<RunState>>>,
}

impl InMemoryStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded history of an instance, oldest first
    pub async fn state_history(&self, instance: &WorkflowInstance) -> Vec<RunState> {
        self.history
            .read()
            .await
            .get(instance)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn lookup_workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>, StorageError> {
        Ok(self.workflows.read().await.get(id).cloned())
    }

    async fn store_workflow(&self, workflow: Workflow) -> Result<(), StorageError> {
        self.workflows
            .write()
            .await
            .insert(workflow.id.clone(), workflow);
        Ok(())
    }

    async fn write_active_state(
        &self,
        instance: &WorkflowInstance,
        state: &RunState,
    ) -> Result<(), StorageError> {
        self.active
            .write()
            .await
            .insert(instance.clone(), state.clone());
        Ok(())
    }

    async fn delete_active_state(&self, instance: &WorkflowInstance) -> Result<(), StorageError> {
        self.active.write().await.remove(instance);
        Ok(())
    }

    async fn write_state_history(
        &self,
        instance: &WorkflowInstance,
        state: &RunState,
    ) -> Result<(), StorageError> {
        self.history
            .write()
            .await
            .entry(instance.clone())
            .or_default()
            .push(state.clone());
        Ok(())
    }

    async fn read_active_states(&self) -> Result<Vec<RunState>, StorageError> {
        Ok(self.active.read().await.values().cloned().collect())
    }
}
