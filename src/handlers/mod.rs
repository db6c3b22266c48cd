// Copyright 2025 Cowboy AI, LLC.

//! Output handlers: reactive components driving instances toward an outcome
//!
//! Each handler is invoked once per accepted transition, after the new state
//! is persisted, and no-ops on states it does not care about. Handlers emit
//! further events through the [`EventSink`] they are handed, which feeds the
//! same per-instance queue the transition came from.

mod execution_description;
mod termination;

pub use execution_description::ExecutionDescriptionHandler;
pub use termination::{
    TerminationHandler, FAIL_FAST_EXIT_CODE, MAX_RETRY_COST, MISSING_DEPS_RETRY_DELAY,
};

use crate::errors::StateResult;
use crate::run_state::RunState;
use crate::state_manager::EventSink;
use async_trait::async_trait;

/// A component invoked after every accepted state transition
#[async_trait]
pub trait OutputHandler: Send + Sync {
    /// React to an instance having transitioned into `state`
    ///
    /// Returning an error is reported by the state manager but never blocks
    /// the committed transition or other instances.
    async fn transition_into(&self, state: &RunState, sink: &dyn EventSink) -> StateResult<()>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::events::Event;
    use tokio::sync::Mutex;

    /// Which submission path an event arrived through
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Path {
        Strict,
        BestEffort,
    }

    /// An [`EventSink`] that records submissions instead of applying them
    #[derive(Default)]
    pub struct RecordingSink {
        submissions: Mutex<Vec<(Event, u64, Path)>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn submissions(&self) -> Vec<(Event, u64, Path)> {
            self.submissions.lock().await.clone()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn submit_strict(&self, event: Event, expected_counter: u64) -> StateResult<()> {
            self.submissions
                .lock()
                .await
                .push((event, expected_counter, Path::Strict));
            Ok(())
        }

        async fn submit_best_effort(&self, event: Event, expected_counter: u64) -> StateResult<()> {
            self.submissions
                .lock()
                .await
                .push((event, expected_counter, Path::BestEffort));
            Ok(())
        }
    }
}
