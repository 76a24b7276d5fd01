//! State machine for a capture session
//!
//! Idle → Recording → Stopping → Idle. A session is reusable: after a stop
//! it is back in Idle and can start a new recording.

/// Capture session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No capture thread is running
    #[default]
    Idle,

    /// Capture thread is appending chunks
    Recording,

    /// Stop was requested, waiting for the capture thread to exit
    Stopping,
}

impl SessionState {
    /// Check if in idle state
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    /// Check if in recording state
    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording)
    }

    /// Lowercase name, as written to status output
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
