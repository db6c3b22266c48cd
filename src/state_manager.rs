// Copyright 2025 Cowboy AI, LLC.

//! Per-instance serialized event application with optimistic concurrency
//!
//! The state manager owns the active-instance registry and the counters that
//! version each instance. Events are applied through a per-instance queue
//! with a single drainer, so at most one transition is in flight per instance
//! while distinct instances proceed fully in parallel. Output handlers run
//! after the transitioned state is persisted and may submit further events;
//! those land on the same queue and are processed by the already-running
//! drain, which is what makes the reactive loop deadlock-free.

use crate::errors::{StateError, StateResult};
use crate::events::Event;
use crate::handlers::OutputHandler;
use crate::instance::WorkflowInstance;
use crate::run_state::RunState;
use crate::storage::Storage;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, warn};

/// Event submission surface handed to output handlers
///
/// Both paths share the same apply-if-current primitive; they differ only in
/// how a stale or missing instance is reported. Strict fails the caller,
/// best-effort logs and succeeds.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Submit an event, failing on a missing instance or counter mismatch
    async fn submit_strict(&self, event: Event, expected_counter: u64) -> StateResult<()>;

    /// Submit an event, treating a missing or progressed instance as a no-op
    async fn submit_best_effort(&self, event: Event, expected_counter: u64) -> StateResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmissionMode {
    Strict,
    BestEffort,
}

struct PendingEvent {
    event: Event,
    expected_counter: u64,
    mode: SubmissionMode,
}

/// Queue and current state of one active instance
struct InstanceSlot {
    inner: Mutex<SlotInner>,
}

struct SlotInner {
    state: RunState,
    pending: VecDeque<PendingEvent>,
    draining: bool,
    /// Set when the instance reached a terminal outcome; late submissions
    /// see the slot as gone
    closed: bool,
}

/// The event-sourced transition engine for workflow instances
///
/// Holds the registry of active instances, applies events through the pure
/// [`RunState::transition`] function, persists every accepted transition, and
/// dispatches the output-handler pipeline after the commit boundary.
pub struct StateManager {
    storage: Arc<dyn Storage>,
    handlers: Vec<Arc<dyn OutputHandler>>,
    instances: RwLock<HashMap<WorkflowInstance, Arc<InstanceSlot>>>,
}

impl StateManager {
    /// Create a state manager over the given storage and handler pipeline
    ///
    /// Handlers are invoked in the given order after every accepted
    /// transition.
    pub fn new(storage: Arc<dyn Storage>, handlers: Vec<Arc<dyn OutputHandler>>) -> Self {
        Self {
            storage,
            handlers,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Register a fresh instance and persist its initial queued state
    ///
    /// Fails when the instance is already active. Returns the initial state
    /// at counter 0.
    pub async fn trigger(&self, instance: WorkflowInstance) -> StateResult<RunState> {
        let fresh = RunState::fresh(instance.clone());
        {
            let mut instances = self.instances.write().await;
            if instances.contains_key(&instance) {
                return Err(StateError::AlreadyActive(instance.to_string()));
            }
            instances.insert(
                instance.clone(),
                Arc::new(InstanceSlot {
                    inner: Mutex::new(SlotInner {
                        state: fresh.clone(),
                        pending: VecDeque::new(),
                        draining: false,
                        closed: false,
                    }),
                }),
            );
        }

        if let Err(err) = self.storage.write_active_state(&instance, &fresh).await {
            self.instances.write().await.remove(&instance);
            return Err(err.into());
        }

        debug!(instance = %instance, "triggered workflow instance");
        self.dispatch_handlers(&fresh).await;
        Ok(fresh)
    }

    /// The current state of an active instance
    pub async fn get_run_state(&self, instance: &WorkflowInstance) -> Option<RunState> {
        let slot = self.instances.read().await.get(instance).cloned()?;
        let inner = slot.inner.lock().await;
        if inner.closed {
            None
        } else {
            Some(inner.state.clone())
        }
    }

    /// Current states of all active instances
    pub async fn active_states(&self) -> Vec<RunState> {
        let slots: Vec<Arc<InstanceSlot>> =
            self.instances.read().await.values().cloned().collect();
        let mut states = Vec::with_capacity(slots.len());
        for slot in slots {
            let inner = slot.inner.lock().await;
            if !inner.closed {
                states.push(inner.state.clone());
            }
        }
        states
    }

    /// The shared apply-if-current primitive behind both submission paths
    async fn submit(
        &self,
        event: Event,
        expected_counter: u64,
        mode: SubmissionMode,
    ) -> StateResult<()> {
        let instance = event.workflow_instance().clone();
        let slot = self.instances.read().await.get(&instance).cloned();
        let Some(slot) = slot else {
            return stale_result(mode, &event, StateError::NotActive(instance.to_string()));
        };

        {
            let mut inner = slot.inner.lock().await;
            if inner.closed {
                return stale_result(mode, &event, StateError::NotActive(instance.to_string()));
            }
            // A queue that is not draining is empty, so the current counter
            // is authoritative and a mismatch can be rejected synchronously.
            // During a drain the counter may still advance; queue the event
            // and let the drain re-check, unless it is already unreachable.
            if inner.state.counter != expected_counter
                && (!inner.draining || inner.state.counter > expected_counter)
            {
                return stale_result(
                    mode,
                    &event,
                    StateError::CounterConflict {
                        expected: expected_counter,
                        current: inner.state.counter,
                    },
                );
            }
            inner.pending.push_back(PendingEvent {
                event,
                expected_counter,
                mode,
            });
            if inner.draining {
                return Ok(());
            }
            inner.draining = true;
        }

        self.drain(&instance, &slot).await;
        Ok(())
    }

    /// Apply queued events for one instance until the queue is empty
    ///
    /// The slot lock is never held across persistence or handler dispatch,
    /// so handlers can re-enter `submit` without deadlocking.
    async fn drain(&self, instance: &WorkflowInstance, slot: &InstanceSlot) {
        loop {
            let (pending, current) = {
                let mut inner = slot.inner.lock().await;
                match inner.pending.pop_front() {
                    Some(pending) => (pending, inner.state.clone()),
                    None => {
                        inner.draining = false;
                        return;
                    }
                }
            };

            if current.counter != pending.expected_counter {
                log_stale(&pending, current.counter);
                continue;
            }

            let Some(next) = current.transition(&pending.event) else {
                debug!(
                    instance = %instance,
                    event = pending.event.name(),
                    state = current.state.name(),
                    "event does not apply to current state, ignoring"
                );
                continue;
            };

            // Persist before updating the in-memory state or running
            // handlers; a failed write leaves the instance untouched and the
            // counter unconsumed.
            let terminal = next.state.is_terminal();
            let persisted = if terminal {
                self.storage.write_state_history(instance, &next).await
            } else {
                self.storage.write_active_state(instance, &next).await
            };
            if let Err(err) = persisted {
                error!(
                    instance = %instance,
                    event = pending.event.name(),
                    %err,
                    "failed to persist transition, dropping event"
                );
                continue;
            }

            {
                let mut inner = slot.inner.lock().await;
                inner.state = next.clone();
                if terminal {
                    inner.closed = true;
                }
            }

            if terminal {
                if let Err(err) = self.storage.delete_active_state(instance).await {
                    warn!(instance = %instance, %err, "failed to delete active state");
                }
                self.instances.write().await.remove(instance);
                debug!(
                    instance = %instance,
                    state = next.state.name(),
                    "instance reached terminal outcome"
                );
            }

            self.dispatch_handlers(&next).await;
        }
    }

    async fn dispatch_handlers(&self, state: &RunState) {
        for handler in &self.handlers {
            if let Err(err) = handler.transition_into(state, self).await {
                error!(
                    instance = %state.workflow_instance,
                    state = state.state.name(),
                    %err,
                    "output handler failed"
                );
            }
        }
    }
}

#[async_trait]
impl EventSink for StateManager {
    async fn submit_strict(&self, event: Event, expected_counter: u64) -> StateResult<()> {
        self.submit(event, expected_counter, SubmissionMode::Strict)
            .await
    }

    async fn submit_best_effort(&self, event: Event, expected_counter: u64) -> StateResult<()> {
        self.submit(event, expected_counter, SubmissionMode::BestEffort)
            .await
    }
}

fn stale_result(mode: SubmissionMode, event: &Event, err: StateError) -> StateResult<()> {
    match mode {
        SubmissionMode::Strict => Err(err),
        SubmissionMode::BestEffort => {
            debug!(
                instance = %event.workflow_instance(),
                event = event.name(),
                %err,
                "ignoring event for stale or inactive instance"
            );
            Ok(())
        }
    }
}

fn log_stale(pending: &PendingEvent, current: u64) {
    match pending.mode {
        SubmissionMode::Strict => error!(
            instance = %pending.event.workflow_instance(),
            event = pending.event.name(),
            expected = pending.expected_counter,
            current,
            "queued strict event went stale before it could be applied"
        ),
        SubmissionMode::BestEffort => debug!(
            instance = %pending.event.workflow_instance(),
            event = pending.event.name(),
            expected = pending.expected_counter,
            current,
            "dropping stale queued event"
        ),
    }
}
