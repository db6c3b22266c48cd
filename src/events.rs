// Copyright 2025 Cowboy AI, LLC.

//! State-transition events
//!
//! Events are facts submitted against one workflow instance. They are
//! immutable data; the run-state transition function is the only place that
//! interprets them. The enum is closed so every dispatch site is forced to
//! handle all variants.

use crate::execution::ExecutionDescription;
use crate::instance::WorkflowInstance;
use serde::{Deserialize, Serialize};

/// A state-transition event targeting one workflow instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// A schedule occurrence is due; the instance enters the queue
    TriggerExecution {
        /// Target instance
        instance: WorkflowInstance,
    },
    /// The dequeuing scheduler picked the instance up for preparation
    Dequeue {
        /// Target instance
        instance: WorkflowInstance,
    },
    /// A prepared execution is handed to the execution backend
    Submit {
        /// Target instance
        instance: WorkflowInstance,
        /// The resolved execution request
        execution_description: ExecutionDescription,
        /// Generated id for this execution attempt
        execution_id: String,
    },
    /// The execution backend accepted the submission
    Submitted {
        /// Target instance
        instance: WorkflowInstance,
        /// Id of the accepted execution
        execution_id: String,
    },
    /// The container started running
    Started {
        /// Target instance
        instance: WorkflowInstance,
    },
    /// The container exited
    Terminate {
        /// Target instance
        instance: WorkflowInstance,
        /// Exit code, when the backend reported one
        exit_code: Option<i32>,
    },
    /// An infrastructure error interrupted the attempt
    RunError {
        /// Target instance
        instance: WorkflowInstance,
        /// What went wrong
        message: String,
    },
    /// Re-queue the instance; the scheduler should wait before dequeuing
    RetryAfter {
        /// Target instance
        instance: WorkflowInstance,
        /// Advisory delay before the next dequeue, in milliseconds
        delay_millis: i64,
    },
    /// The attempt succeeded; the instance is finished
    Success {
        /// Target instance
        instance: WorkflowInstance,
    },
    /// Give up permanently after failures
    Stop {
        /// Target instance
        instance: WorkflowInstance,
    },
    /// Abandon the instance permanently, e.g. its workflow is gone
    Halt {
        /// Target instance
        instance: WorkflowInstance,
    },
}

impl Event {
    /// Event for a due schedule occurrence
    pub fn trigger_execution(instance: WorkflowInstance) -> Self {
        Event::TriggerExecution { instance }
    }

    /// Event for the scheduler picking the instance up
    pub fn dequeue(instance: WorkflowInstance) -> Self {
        Event::Dequeue { instance }
    }

    /// Event carrying a prepared execution to the backend
    pub fn submit(
        instance: WorkflowInstance,
        execution_description: ExecutionDescription,
        execution_id: impl Into<String>,
    ) -> Self {
        Event::Submit {
            instance,
            execution_description,
            execution_id: execution_id.into(),
        }
    }

    /// Event for the backend accepting a submission
    pub fn submitted(instance: WorkflowInstance, execution_id: impl Into<String>) -> Self {
        Event::Submitted {
            instance,
            execution_id: execution_id.into(),
        }
    }

    /// Event for the container starting
    pub fn started(instance: WorkflowInstance) -> Self {
        Event::Started { instance }
    }

    /// Event for the container exiting with the given code
    pub fn terminate(instance: WorkflowInstance, exit_code: Option<i32>) -> Self {
        Event::Terminate {
            instance,
            exit_code,
        }
    }

    /// Event for an infrastructure error
    pub fn run_error(instance: WorkflowInstance, message: impl Into<String>) -> Self {
        Event::RunError {
            instance,
            message: message.into(),
        }
    }

    /// Event re-queuing the instance with an advisory delay
    pub fn retry_after(instance: WorkflowInstance, delay_millis: i64) -> Self {
        Event::RetryAfter {
            instance,
            delay_millis,
        }
    }

    /// Event finishing the instance successfully
    pub fn success(instance: WorkflowInstance) -> Self {
        Event::Success { instance }
    }

    /// Event stopping the instance permanently
    pub fn stop(instance: WorkflowInstance) -> Self {
        Event::Stop { instance }
    }

    /// Event abandoning the instance permanently
    pub fn halt(instance: WorkflowInstance) -> Self {
        Event::Halt { instance }
    }

    /// The instance this event targets
    pub fn workflow_instance(&self) -> &WorkflowInstance {
        match self {
            Event::TriggerExecution { instance }
            | Event::Dequeue { instance }
            | Event::Submit { instance, .. }
            | Event::Submitted { instance, .. }
            | Event::Started { instance }
            | Event::Terminate { instance, .. }
            | Event::RunError { instance, .. }
            | Event::RetryAfter { instance, .. }
            | Event::Success { instance }
            | Event::Stop { instance }
            | Event::Halt { instance } => instance,
        }
    }

    /// The event kind as a name, for logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::TriggerExecution { .. } => "triggerExecution",
            Event::Dequeue { .. } => "dequeue",
            Event::Submit { .. } => "submit",
            Event::Submitted { .. } => "submitted",
            Event::Started { .. } => "started",
            Event::Terminate { .. } => "terminate",
            Event::RunError { .. } => "runError",
            Event::RetryAfter { .. } => "retryAfter",
            Event::Success { .. } => "success",
            Event::Stop { .. } => "stop",
            Event::Halt { .. } => "halt",
        }
    }
}
