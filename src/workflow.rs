// Copyright 2025 Cowboy AI, LLC.

//! Workflow definitions and their execution configuration
//!
//! A workflow is the recurring unit of work; its configuration carries the
//! schedule and everything needed to run one occurrence in a container.

use crate::identifiers::WorkflowId;
use crate::schedule::Schedule;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A secret mounted into the execution container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Secret {
    /// Name of the secret in the backing secret store
    pub name: String,
    /// Path the secret is mounted at inside the container
    pub mount_path: String,
}

impl Secret {
    /// Create a secret reference
    pub fn new(name: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
        }
    }
}

/// Everything needed to schedule and execute occurrences of a workflow
///
/// The embedded `id` must match the id in the owning [`Workflow`]'s
/// [`WorkflowId`]; the validator reports "workflow id mismatch" otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowConfiguration {
    /// The workflow's own id
    pub id: String,
    /// When occurrences of this workflow happen
    pub schedule: Schedule,
    /// Optional ISO-8601 period shifting the processed partition relative to
    /// the schedule occurrence
    pub offset: Option<String>,
    /// Container image to execute
    pub docker_image: Option<String>,
    /// Arguments passed to the container; the literal `{}` is replaced with
    /// the instance parameter at submission time
    pub docker_args: Vec<String>,
    /// Whether the backend should capture termination logs for the container
    pub docker_termination_logging: bool,
    /// Optional secret mounted into the container
    pub secret: Option<Secret>,
    /// Optional service account the execution runs as
    pub service_account: Option<String>,
    /// Resources the execution counts against
    pub resources: Vec<String>,
    /// Environment variables for the container
    pub env: IndexMap<String, String>,
    /// Upper bound on how long one execution may stay running
    pub running_timeout: Option<Duration>,
    /// Commit the workflow definition was deployed from
    pub commit_sha: Option<String>,
}

impl WorkflowConfiguration {
    /// Create a configuration with the given id and schedule; all optional
    /// fields start empty
    pub fn new(id: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            id: id.into(),
            schedule,
            offset: None,
            docker_image: None,
            docker_args: Vec::new(),
            docker_termination_logging: false,
            secret: None,
            service_account: None,
            resources: Vec::new(),
            env: IndexMap::new(),
            running_timeout: None,
            commit_sha: None,
        }
    }
}

/// A workflow: its identity plus its configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Workflow {
    /// The workflow's identity
    pub id: WorkflowId,
    /// The workflow's configuration
    pub configuration: WorkflowConfiguration,
}

impl Workflow {
    /// Create a workflow owned by the given component
    ///
    /// The workflow part of the id is taken from the configuration's embedded
    /// id, so workflows built this way cannot have an id mismatch.
    pub fn create(component_id: impl Into<String>, configuration: WorkflowConfiguration) -> Self {
        Self {
            id: WorkflowId::new(component_id, configuration.id.clone()),
            configuration,
        }
    }

    /// The id of the owning component
    pub fn component_id(&self) -> &str {
        self.id.component_id()
    }

    /// The workflow's own id as declared in its identity
    pub fn workflow_id(&self) -> &str {
        self.id.id()
    }
}
