use std::fmt;

/// Lifecycle state of a [`Task`](crate::Task).
///
/// Transitions are forward-only: `Pending → Running → Finished`.
/// Cancellation is tracked separately and does not change the state by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Created, not started yet.
    Pending,
    /// Handed to an executor; the outcome has not been dispatched yet.
    Running,
    /// The outcome was dispatched on the delivery context.
    Finished,
}

impl TaskState {
    /// Returns a short stable label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Finished => "finished",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal delivery path owed to a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminal {
    /// Normal completion: `on_post_execute`.
    Completed,
    /// Cancellation: `on_cancelled` (advanced listeners only).
    Cancelled,
}
