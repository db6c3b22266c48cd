//! # Styx Core
//!
//! The state-machine core of a workflow orchestrator: it tracks per-instance
//! execution state for scheduled, parameterized units of recurring work,
//! decides when to retry failed executions, and prepares validated execution
//! requests for a downstream container-execution backend.
//!
//! The crate provides the fundamental building blocks of that engine:
//! - **Workflows and instances**: the recurring unit of work and its
//!   individually schedulable occurrences
//! - **Events**: immutable facts submitted against one instance
//! - **RunState**: the pure transition function mapping (state, event) to the
//!   next state
//! - **StateManager**: per-instance serialized event application with
//!   optimistic concurrency, persistence, and handler dispatch
//! - **Output handlers**: reactive components emitting follow-up events after
//!   each accepted transition
//! - **RetryPolicy**: bounded, monotone backoff for retried executions
//! - **WorkflowValidator**: a composable rule chain over workflow
//!   configurations
//!
//! ## Design Principles
//!
//! 1. **Immutability**: run states are values; a transition produces a new
//!    state and never mutates in place
//! 2. **Total dispatch**: events form a closed sum type and every dispatch
//!    site handles all variants; events that do not apply degrade to no-ops
//! 3. **Last accepted event wins**: cancellation is structural, stale writers
//!    are fenced by the per-instance counter rather than interrupted
//! 4. **Commit before react**: output handlers run only after the transition
//!    is durably persisted, so handler latency never risks committed progress

#![warn(missing_docs)]

mod docker_image;
mod errors;
mod events;
mod execution;
pub mod handlers;
mod identifiers;
mod instance;
mod retry;
mod run_state;
mod schedule;
mod state_manager;
mod storage;
mod validation;
mod workflow;

pub use docker_image::{DockerImageChecker, ImageReferenceChecker};
pub use errors::{StateError, StateResult};
pub use events::Event;
pub use execution::{fresh_execution_id, ExecutionDescription, EXECUTION_ID_PREFIX};
pub use handlers::{
    ExecutionDescriptionHandler, OutputHandler, TerminationHandler, FAIL_FAST_EXIT_CODE,
    MAX_RETRY_COST, MISSING_DEPS_RETRY_DELAY,
};
pub use identifiers::WorkflowId;
pub use instance::WorkflowInstance;
pub use retry::{ExponentialBackoff, RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
pub use run_state::{
    Message, MessageLevel, RunState, State, StateData, FAILURE_COST, MISSING_DEPS_COST,
    MISSING_DEPS_EXIT_CODE,
};
pub use schedule::{
    parse_offset, validate_cron, Period, Schedule, ScheduleError, WellKnownSchedule,
};
pub use state_manager::{EventSink, StateManager};
pub use storage::{InMemoryStorage, Storage, StorageError};
pub use validation::{
    WorkflowValidator, WorkflowValidatorBuilder, MAX_COMMIT_SHA_LENGTH, MAX_ENV_SIZE,
    MAX_ENV_VARS, MAX_ID_LENGTH, MAX_RESOURCES, MAX_RESOURCE_LENGTH,
    MAX_SECRET_MOUNT_PATH_LENGTH, MAX_SECRET_NAME_LENGTH, MAX_SERVICE_ACCOUNT_LENGTH,
    MIN_RUNNING_TIMEOUT,
};
pub use workflow::{Secret, Workflow, WorkflowConfiguration};
