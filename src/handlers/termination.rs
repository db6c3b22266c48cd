//! Retry and backoff decisions for terminated and failed instances

use crate::errors::StateResult;
use crate::events::Event;
use crate::handlers::OutputHandler;
use crate::retry::RetryPolicy;
use crate::run_state::{RunState, State, MISSING_DEPS_EXIT_CODE};
use crate::state_manager::EventSink;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Retry budget an instance may consume before it is stopped permanently
///
/// The budget is loosely related to the longest period an instance keeps
/// being retried; failures and missing dependencies consume it at different
/// rates.
pub const MAX_RETRY_COST: f64 = 50.0;

/// Exit code signalling that retrying is pointless
pub const FAIL_FAST_EXIT_CODE: i32 = 50;

/// Fixed wait before retrying a missing-dependency termination
pub const MISSING_DEPS_RETRY_DELAY: Duration = Duration::from_secs(10 * 60);

/// Decides what happens after an execution terminates or fails
///
/// No-op unless the new state is `Terminated` or `Failed`. A clean exit
/// produces `success`; everything else goes through the retry decision:
/// exhausted budget or a fail-fast exit stops the instance, a
/// missing-dependency exit waits a fixed ten minutes, and any other failure
/// backs off according to the retry policy. All emissions use the
/// best-effort path so a concurrently halted instance never turns into a
/// handler failure.
pub struct TerminationHandler {
    retry_policy: Arc<dyn RetryPolicy>,
}

impl TerminationHandler {
    /// Create a handler deciding retries with the given policy
    pub fn new(retry_policy: Arc<dyn RetryPolicy>) -> Self {
        Self { retry_policy }
    }

    async fn check_retry(&self, state: &RunState, sink: &dyn EventSink) -> StateResult<()> {
        let instance = state.workflow_instance.clone();

        if state.data.retry_cost >= MAX_RETRY_COST {
            debug!(instance = %instance, retry_cost = state.data.retry_cost, "retry budget exhausted, stopping");
            return sink
                .submit_best_effort(Event::stop(instance), state.counter)
                .await;
        }

        if state.data.last_exit == Some(FAIL_FAST_EXIT_CODE) {
            debug!(instance = %instance, "fail-fast exit code, stopping");
            return sink
                .submit_best_effort(Event::stop(instance), state.counter)
                .await;
        }

        let delay = if state.data.last_exit == Some(MISSING_DEPS_EXIT_CODE) {
            MISSING_DEPS_RETRY_DELAY
        } else {
            self.retry_policy.delay_for(state.data.consecutive_failures)
        };
        sink.submit_best_effort(
            Event::retry_after(instance, delay.as_millis() as i64),
            state.counter,
        )
        .await
    }
}

#[async_trait]
impl OutputHandler for TerminationHandler {
    async fn transition_into(&self, state: &RunState, sink: &dyn EventSink) -> StateResult<()> {
        match state.state {
            State::Terminated => {
                if state.data.last_exit == Some(0) {
                    sink.submit_best_effort(
                        Event::success(state.workflow_instance.clone()),
                        state.counter,
                    )
                    .await
                } else {
                    self.check_retry(state, sink).await
                }
            }
            State::Failed => self.check_retry(state, sink).await,
            _ => Ok(()),
        }
    }
}
