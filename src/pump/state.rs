//! Pump session state

/// Lifecycle state of a pump session
///
/// ```text
/// Idle ──► Running ◄──► Paused
///             │           │
///             ▼           │
///          Draining ◄─────┘
///             │
///             ▼
///          Completed
///
/// Idle | Running | Paused | Draining ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    /// Created, not started
    Idle,
    /// Moving data from source to sink
    Running,
    /// Sink is saturated, source paused
    Paused,
    /// Source ended, flushing and closing the sink
    Draining,
    /// Sink closed after all data was written
    Completed,
    /// Terminated by an error or cancellation
    Failed,
}

impl PumpState {
    /// Check if the session has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, PumpState::Completed | PumpState::Failed)
    }
}
