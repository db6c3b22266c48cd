//! Submission preparation for instances entering the prepare phase

use crate::errors::StateResult;
use crate::events::Event;
use crate::execution::{fresh_execution_id, ExecutionDescription};
use crate::handlers::OutputHandler;
use crate::run_state::{RunState, State};
use crate::state_manager::EventSink;
use crate::storage::Storage;
use crate::validation::WorkflowValidator;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Resolves a prepared instance into a concrete execution request
///
/// No-op unless the new state is `Prepare`. Looks the workflow up, validates
/// its configuration, and either submits a fully resolved
/// [`ExecutionDescription`] or abandons the instance:
///
/// - storage lookup failure becomes a `runError` on the strict path (a stale
///   instance here is a genuine error, not an expected race),
/// - a deleted workflow, an invalid configuration, or a missing docker image
///   halt the instance on the best-effort path.
pub struct ExecutionDescriptionHandler {
    storage: Arc<dyn Storage>,
    validator: Arc<WorkflowValidator>,
}

impl ExecutionDescriptionHandler {
    /// Create a handler resolving workflows from the given storage
    pub fn new(storage: Arc<dyn Storage>, validator: Arc<WorkflowValidator>) -> Self {
        Self { storage, validator }
    }
}

#[async_trait]
impl OutputHandler for ExecutionDescriptionHandler {
    async fn transition_into(&self, state: &RunState, sink: &dyn EventSink) -> StateResult<()> {
        if state.state != State::Prepare {
            return Ok(());
        }
        let instance = &state.workflow_instance;

        let workflow = match self.storage.lookup_workflow(instance.workflow_id()).await {
            Ok(Some(workflow)) => workflow,
            Ok(None) => {
                info!(instance = %instance, "workflow not found, halting instance");
                return sink
                    .submit_best_effort(Event::halt(instance.clone()), state.counter)
                    .await;
            }
            Err(err) => {
                return sink
                    .submit_strict(
                        Event::run_error(instance.clone(), err.to_string()),
                        state.counter,
                    )
                    .await;
            }
        };

        let violations = self.validator.validate_workflow(&workflow);
        if !violations.is_empty() {
            warn!(
                instance = %instance,
                violations = violations.join("; "),
                "workflow configuration is invalid, halting instance"
            );
            return sink
                .submit_best_effort(Event::halt(instance.clone()), state.counter)
                .await;
        }

        let Some(description) =
            ExecutionDescription::from_configuration(&workflow.configuration, instance)
        else {
            info!(instance = %instance, "workflow has no docker image, halting instance");
            return sink
                .submit_best_effort(Event::halt(instance.clone()), state.counter)
                .await;
        };

        sink.submit_strict(
            Event::submit(instance.clone(), description, fresh_execution_id()),
            state.counter,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker_image::MockImageReferenceChecker;
    use crate::execution::EXECUTION_ID_PREFIX;
    use crate::handlers::test_support::{Path, RecordingSink};
    use crate::identifiers::WorkflowId;
    use crate::instance::WorkflowInstance;
    use crate::run_state::StateData;
    use crate::schedule::Schedule;
    use crate::storage::{MockStorage, StorageError};
    use crate::workflow::{Workflow, WorkflowConfiguration};

    const COMMIT_SHA: &str = "71d70fca99e29812e81d1ed0a5c9d3559f4118e9";
    const COUNTER: u64 = 17;

    fn configuration(args: &[&str]) -> WorkflowConfiguration {
        let mut config = WorkflowConfiguration::new("report", Schedule::hourly());
        config.docker_image = Some("busybox:1.36".to_string());
        config.docker_args = args.iter().map(|a| a.to_string()).collect();
        config.commit_sha = Some(COMMIT_SHA.to_string());
        config
    }

    fn instance() -> WorkflowInstance {
        WorkflowInstance::new(WorkflowId::new("styx", "report"), "2016-03-14")
    }

    fn prepare_state() -> RunState {
        RunState::create(instance(), State::Prepare, COUNTER, StateData::default())
    }

    fn validator() -> Arc<WorkflowValidator> {
        let mut checker = MockImageReferenceChecker::new();
        checker
            .expect_check_image_reference()
            .returning(|_| Vec::new());
        Arc::new(WorkflowValidator::builder(Arc::new(checker)).build())
    }

    fn storage_with(workflow: Option<Workflow>) -> Arc<MockStorage> {
        let mut storage = MockStorage::new();
        storage
            .expect_lookup_workflow()
            .returning(move |_| Ok(workflow.clone()));
        Arc::new(storage)
    }

    async fn run(storage: Arc<MockStorage>) -> Vec<(Event, u64, Path)> {
        let handler = ExecutionDescriptionHandler::new(storage, validator());
        let sink = RecordingSink::new();
        handler
            .transition_into(&prepare_state(), &sink)
            .await
            .unwrap();
        sink.submissions().await
    }

    #[tokio::test]
    async fn test_submits_resolved_description() {
        let workflow = Workflow::create("styx", configuration(&["--date", "{}", "--bar"]));
        let submissions = run(storage_with(Some(workflow))).await;

        assert_eq!(submissions.len(), 1);
        let (event, counter, path) = &submissions[0];
        assert_eq!(*counter, COUNTER);
        assert_eq!(*path, Path::Strict);

        let Event::Submit {
            execution_description,
            execution_id,
            ..
        } = event
        else {
            panic!("expected submit, got {}", event.name());
        };
        assert!(execution_id.starts_with(EXECUTION_ID_PREFIX));
        assert_eq!(execution_description.docker_image, "busybox:1.36");
        assert_eq!(
            execution_description.docker_args,
            vec!["--date", "2016-03-14", "--bar"]
        );
        assert_eq!(
            execution_description.commit_sha.as_deref(),
            Some(COMMIT_SHA)
        );
    }

    #[tokio::test]
    async fn test_submits_with_empty_args() {
        let workflow = Workflow::create("styx", configuration(&[]));
        let submissions = run(storage_with(Some(workflow))).await;

        assert_eq!(submissions.len(), 1);
        let Event::Submit {
            execution_description,
            ..
        } = &submissions[0].0
        else {
            panic!("expected submit");
        };
        assert!(execution_description.docker_args.is_empty());
    }

    #[tokio::test]
    async fn test_storage_error_becomes_strict_run_error() {
        let mut storage = MockStorage::new();
        storage
            .expect_lookup_workflow()
            .returning(|_| Err(StorageError::Connection("TEST".to_string())));

        let submissions = run(Arc::new(storage)).await;
        assert_eq!(
            submissions,
            vec![(
                Event::run_error(instance(), "connection error: TEST"),
                COUNTER,
                Path::Strict
            )]
        );
    }

    #[tokio::test]
    async fn test_missing_workflow_halts_best_effort() {
        let submissions = run(storage_with(None)).await;
        assert_eq!(
            submissions,
            vec![(Event::halt(instance()), COUNTER, Path::BestEffort)]
        );
    }

    #[tokio::test]
    async fn test_missing_docker_image_halts() {
        let mut config = configuration(&["foo", "bar"]);
        config.docker_image = None;
        let workflow = Workflow::create("styx", config);

        let submissions = run(storage_with(Some(workflow))).await;
        assert_eq!(
            submissions,
            vec![(Event::halt(instance()), COUNTER, Path::BestEffort)]
        );
    }

    #[tokio::test]
    async fn test_invalid_configuration_halts() {
        let mut checker = MockImageReferenceChecker::new();
        checker
            .expect_check_image_reference()
            .returning(|_| vec!["foo".to_string(), "bar".to_string()]);
        let validator = Arc::new(WorkflowValidator::builder(Arc::new(checker)).build());

        let workflow = Workflow::create("styx", configuration(&[]));
        let handler = ExecutionDescriptionHandler::new(storage_with(Some(workflow)), validator);
        let sink = RecordingSink::new();
        handler
            .transition_into(&prepare_state(), &sink)
            .await
            .unwrap();

        assert_eq!(
            sink.submissions().await,
            vec![(Event::halt(instance()), COUNTER, Path::BestEffort)]
        );
    }

    #[tokio::test]
    async fn test_other_states_are_ignored() {
        let storage = MockStorage::new();
        let handler = ExecutionDescriptionHandler::new(Arc::new(storage), validator());
        let sink = RecordingSink::new();

        for s in [State::Queued, State::Running, State::Terminated, State::Done] {
            let state = RunState::create(instance(), s, COUNTER, StateData::default());
            handler.transition_into(&state, &sink).await.unwrap();
        }
        assert!(sink.submissions().await.is_empty());
    }
}
