// Copyright 2025 Cowboy AI, LLC.

//! Per-instance run state and the transition function
//!
//! `RunState` is an immutable value: applying an event produces a new state,
//! never a mutation. The transition function is total over the event enum and
//! returns `None` for (state, event) pairs that do not apply, so stale or
//! duplicate events degrade to no-ops instead of errors.

use crate::events::Event;
use crate::execution::ExecutionDescription;
use crate::instance::WorkflowInstance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Retry-budget cost charged for a failed execution
pub const FAILURE_COST: f64 = 1.0;

/// Retry-budget cost charged for a missing-dependency termination
///
/// Missing input data is expected to resolve itself, so it is charged an
/// order of magnitude less than a real failure.
pub const MISSING_DEPS_COST: f64 = 0.1;

/// Exit code conventionally meaning "input data not ready yet"
pub const MISSING_DEPS_EXIT_CODE: i32 = 20;

/// Execution phases of a workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// Waiting for the dequeuing scheduler to pick the instance up
    Queued,
    /// Being resolved into an execution description
    Prepare,
    /// Submission handed to the execution backend, not yet accepted
    Submitting,
    /// Accepted by the execution backend
    Submitted,
    /// Container running
    Running,
    /// Container exited; retry decision pending
    Terminated,
    /// Attempt failed with an infrastructure error; retry decision pending
    Failed,
    /// Finished successfully
    Done,
    /// Given up after failures
    Error,
    /// Abandoned permanently
    Halted,
}

impl State {
    /// Whether this is a terminal outcome
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Done | State::Error | State::Halted)
    }

    /// The state's name, for logs
    pub fn name(&self) -> &'static str {
        match self {
            State::Queued => "QUEUED",
            State::Prepare => "PREPARE",
            State::Submitting => "SUBMITTING",
            State::Submitted => "SUBMITTED",
            State::Running => "RUNNING",
            State::Terminated => "TERMINATED",
            State::Failed => "FAILED",
            State::Done => "DONE",
            State::Error => "ERROR",
            State::Halted => "HALTED",
        }
    }
}

/// Severity of a message attached to the run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageLevel {
    /// Informational
    Info,
    /// Something unexpected but not fatal
    Warning,
    /// A failure
    Error,
}

/// A message describing the most recent notable occurrence for an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Severity of the message
    pub level: MessageLevel,
    /// The message text
    pub line: String,
}

impl Message {
    /// An info-level message
    pub fn info(line: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            line: line.into(),
        }
    }

    /// A warning-level message
    pub fn warning(line: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            line: line.into(),
        }
    }

    /// An error-level message
    pub fn error(line: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            line: line.into(),
        }
    }
}

/// Retry bookkeeping and execution references accumulated across attempts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateData {
    /// Number of execution attempts so far
    pub tries: u32,
    /// Failures since the last successful exit
    pub consecutive_failures: u32,
    /// Accumulated retry-budget consumption; monotonically non-decreasing
    /// while the instance is active
    pub retry_cost: f64,
    /// Advisory delay from the most recent retry decision, for the scheduler
    pub retry_delay_millis: Option<i64>,
    /// Exit code of the most recent execution
    pub last_exit: Option<i32>,
    /// Id of the current or most recent execution
    pub execution_id: Option<String>,
    /// The resolved request for the current or most recent execution
    pub execution_description: Option<ExecutionDescription>,
    /// Most recent notable occurrence
    pub message: Option<Message>,
}

/// The execution status of one workflow instance
///
/// The counter is the optimistic-concurrency version of the instance: it is
/// issued by the state manager and increases by exactly one per accepted
/// event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// The instance this state belongs to
    pub workflow_instance: WorkflowInstance,
    /// Current execution phase
    pub state: State,
    /// When this state was produced
    pub timestamp: DateTime<Utc>,
    /// Optimistic-concurrency counter
    pub counter: u64,
    /// Accumulated bookkeeping
    pub data: StateData,
}

impl RunState {
    /// The initial state of a freshly triggered instance
    pub fn fresh(workflow_instance: WorkflowInstance) -> Self {
        Self {
            workflow_instance,
            state: State::Queued,
            timestamp: Utc::now(),
            counter: 0,
            data: StateData::default(),
        }
    }

    /// Construct a state at a specific phase and counter
    pub fn create(
        workflow_instance: WorkflowInstance,
        state: State,
        counter: u64,
        data: StateData,
    ) -> Self {
        Self {
            workflow_instance,
            state,
            timestamp: Utc::now(),
            counter,
            data,
        }
    }

    /// Apply an event, producing the next state
    ///
    /// Returns `None` when the event does not apply to the current phase; the
    /// caller must treat that as a no-op. An accepted transition carries
    /// `counter + 1` and a fresh timestamp. Only the state manager applies
    /// accepted transitions, which is what keeps the counter an exclusive,
    /// gapless sequence.
    pub fn transition(&self, event: &Event) -> Option<RunState> {
        use State::*;

        let (next, data) = match event {
            // Instance creation goes through the state manager's trigger;
            // a trigger against a live instance does not apply.
            Event::TriggerExecution { .. } => return None,

            Event::Dequeue { .. } => match self.state {
                Queued => {
                    let mut data = self.data.clone();
                    data.retry_delay_millis = None;
                    (Prepare, data)
                }
                _ => return None,
            },

            Event::Submit {
                execution_description,
                execution_id,
                ..
            } => match self.state {
                Prepare => {
                    let mut data = self.data.clone();
                    data.execution_description = Some(execution_description.clone());
                    data.execution_id = Some(execution_id.clone());
                    (Submitting, data)
                }
                _ => return None,
            },

            Event::Submitted { execution_id, .. } => match self.state {
                Submitting => {
                    let mut data = self.data.clone();
                    data.execution_id = Some(execution_id.clone());
                    (Submitted, data)
                }
                _ => return None,
            },

            Event::Started { .. } => match self.state {
                Submitted => (Running, self.data.clone()),
                _ => return None,
            },

            Event::Terminate { exit_code, .. } => match self.state {
                Running => {
                    let mut data = self.data.clone();
                    data.tries += 1;
                    data.last_exit = *exit_code;
                    if *exit_code == Some(0) {
                        data.consecutive_failures = 0;
                    } else {
                        data.consecutive_failures += 1;
                    }
                    data.retry_cost += if *exit_code == Some(MISSING_DEPS_EXIT_CODE) {
                        MISSING_DEPS_COST
                    } else {
                        FAILURE_COST
                    };
                    (Terminated, data)
                }
                _ => return None,
            },

            Event::RunError { message, .. } => match self.state {
                Queued | Prepare | Submitting | Submitted | Running => {
                    let mut data = self.data.clone();
                    data.tries += 1;
                    data.consecutive_failures += 1;
                    data.retry_cost += FAILURE_COST;
                    data.message = Some(Message::error(message.clone()));
                    (Failed, data)
                }
                _ => return None,
            },

            Event::RetryAfter { delay_millis, .. } => match self.state {
                Terminated | Failed => {
                    let mut data = self.data.clone();
                    data.retry_delay_millis = Some(*delay_millis);
                    (Queued, data)
                }
                _ => return None,
            },

            Event::Success { .. } => match self.state {
                Terminated => (Done, self.data.clone()),
                _ => return None,
            },

            Event::Stop { .. } => match self.state {
                Terminated | Failed => (Error, self.data.clone()),
                _ => return None,
            },

            Event::Halt { .. } => {
                if self.state.is_terminal() {
                    return None;
                }
                (Halted, self.data.clone())
            }
        };

        Some(RunState {
            workflow_instance: self.workflow_instance.clone(),
            state: next,
            timestamp: Utc::now(),
            counter: self.counter + 1,
            data,
        })
    }
}
