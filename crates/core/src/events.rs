//! Progress events for inter-crate communication
//!
//! The scheduler publishes task lifecycle events and the run-level tally on
//! an `EventBus` so reporting sinks (console output, machine consumers) can
//! observe execution without influencing it. The bus is constructed at the
//! outermost composition point and passed down explicitly; there is no
//! process-global instance.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

/// Default buffer capacity for the broadcast channel backing an [`EventBus`]
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Task execution events
///
/// The `id` is the scheduler's task identifier; `label` is a human-readable
/// rendering of the task's context (`pkg:script`, a command line, …).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    /// A task has entered its running state
    Started { id: usize, label: String },
    /// A task reached a terminal state
    Completed {
        id: usize,
        label: String,
        failed: bool,
        duration_ms: u64,
    },
    /// A line of task stdout
    Output { id: usize, label: String, line: String },
    /// A line of task stderr
    ErrorOutput { id: usize, label: String, line: String },
}

/// Aggregate success/failure tally for one run, in task weight units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTally {
    pub success: u32,
    pub failed: u32,
}

impl RunTally {
    /// True if nothing tracked by the run failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Run-level events for overall execution tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// A run started scheduling its tasks
    RunStarted { total_tasks: usize },
    /// Every task in the run completed or became unreachable
    RunFinished { tally: RunTally },
}

/// All events published during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Task(TaskEvent),
    Run(RunEvent),
}

/// Broadcast-backed event bus
///
/// Cloning the bus shares the underlying channel; `subscribe` hands out
/// independent receivers. Publishing never blocks and never fails the
/// publisher: a bus with no subscribers simply drops events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: Event) {
        if let Err(e) = self.sender.send(event) {
            // Only worth noting when receivers exist but the send failed
            if self.sender.receiver_count() > 0 {
                warn!("failed to broadcast event: {e}");
            }
        }
    }

    /// Publish a task event
    pub fn task(&self, event: TaskEvent) {
        self.publish(Event::Task(event));
    }

    /// Publish a run event
    pub fn run(&self, event: RunEvent) {
        self.publish(Event::Run(event));
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Get the number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
