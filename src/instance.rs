// Copyright 2025 Cowboy AI, LLC.

//! Workflow instances: one parameterized occurrence of a recurring workflow

use crate::identifiers::WorkflowId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One schedulable occurrence of a workflow
///
/// The parameter identifies the occurrence within the schedule, typically a
/// partition label such as `2024-01-01T06` for an hourly workflow. Together
/// with the workflow id it uniquely keys the instance's run state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowInstance {
    workflow_id: WorkflowId,
    parameter: String,
}

impl WorkflowInstance {
    /// Create an instance of the given workflow for one schedule occurrence
    pub fn new(workflow_id: WorkflowId, parameter: impl Into<String>) -> Self {
        Self {
            workflow_id,
            parameter: parameter.into(),
        }
    }

    /// The workflow this instance belongs to
    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    /// The schedule occurrence parameter
    pub fn parameter(&self) -> &str {
        &self.parameter
    }
}

impl fmt::Display for WorkflowInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.workflow_id, self.parameter)
    }
}
