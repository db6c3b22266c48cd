//! Identifier types for workflows and their scheduled instances

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a workflow: the owning component plus the workflow's own id
///
/// The component id is the deployment/service that owns the workflow; the
/// workflow id is unique within that component. The `#` character is reserved
/// as the separator in the rendered form, which is why component ids must not
/// contain it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowId {
    component_id: String,
    id: String,
}

impl WorkflowId {
    /// Create a workflow id from its component and workflow parts
    pub fn new(component_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            id: id.into(),
        }
    }

    /// The id of the component that owns the workflow
    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    /// The workflow's own id, unique within the component
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.component_id, self.id)
    }
}
