use serde::Serialize;

/// Current state of the managed MongoDB process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// No process exists
    Stopped,
    /// Launch checks and spawn in progress
    Starting,
    /// Process spawned and being monitored
    Running,
    /// Process is being shut down and its handle released
    Stopping,
}

impl ServerState {
    /// Valid edges: Stopped -> Starting -> Running -> Stopping -> Stopped,
    /// plus Starting -> Stopped when a start attempt fails.
    pub fn can_transition_to(self, next: ServerState) -> bool {
        matches!(
            (self, next),
            (Self::Stopped, Self::Starting)
                | (Self::Starting, Self::Running)
                | (Self::Starting, Self::Stopped)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}
