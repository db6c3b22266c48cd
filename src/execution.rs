//! Execution descriptions: the validated request handed to the execution backend

use crate::instance::WorkflowInstance;
use crate::workflow::{Secret, WorkflowConfiguration};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of every generated execution id
pub const EXECUTION_ID_PREFIX: &str = "styx-run-";

/// Placeholder in docker args that is replaced with the instance parameter
const PARAMETER_PLACEHOLDER: &str = "{}";

/// A fully resolved request for the container-execution backend
///
/// Built by the submission-preparation handler from a validated workflow
/// configuration and one workflow instance; all placeholders are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionDescription {
    /// Container image to run
    pub docker_image: String,
    /// Arguments with the instance parameter substituted in
    pub docker_args: Vec<String>,
    /// Whether termination logs should be captured
    pub docker_termination_logging: bool,
    /// Secret mounted into the container
    pub secret: Option<Secret>,
    /// Service account the execution runs as
    pub service_account: Option<String>,
    /// Commit the workflow definition was deployed from
    pub commit_sha: Option<String>,
}

impl ExecutionDescription {
    /// Resolve a configuration into an execution description for one instance
    ///
    /// Returns `None` when the configuration has no docker image. Every
    /// `{}` argument is replaced with the instance parameter; all other
    /// arguments pass through verbatim and in order.
    pub fn from_configuration(
        configuration: &WorkflowConfiguration,
        instance: &WorkflowInstance,
    ) -> Option<Self> {
        let docker_image = configuration.docker_image.clone()?;
        let docker_args = configuration
            .docker_args
            .iter()
            .map(|arg| {
                if arg == PARAMETER_PLACEHOLDER {
                    instance.parameter().to_string()
                } else {
                    arg.clone()
                }
            })
            .collect();
        Some(Self {
            docker_image,
            docker_args,
            docker_termination_logging: configuration.docker_termination_logging,
            secret: configuration.secret.clone(),
            service_account: configuration.service_account.clone(),
            commit_sha: configuration.commit_sha.clone(),
        })
    }
}

/// Generate a fresh execution id, `styx-run-` followed by a unique suffix
pub fn fresh_execution_id() -> String {
    format!("{}{}", EXECUTION_ID_PREFIX, Uuid::new_v4())
}
