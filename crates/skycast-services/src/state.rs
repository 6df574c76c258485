//! Session lifecycle states.
//!
//! `Idle → Fetching → {Ready, Failed}`; a new city or a refresh moves
//! `Ready`/`Failed` back to `Fetching`.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No city chosen yet
    #[default]
    Idle,
    /// A fetch is in flight
    Fetching,
    /// Last fetch succeeded
    Ready,
    /// Last fetch failed, or the city is empty
    Failed,
}

impl SessionState {
    /// True if a refresh of the current city can be started.
    pub fn can_refresh(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Failed)
    }

    /// State after a fetch has been issued.
    pub fn on_fetch_started(self) -> Self {
        SessionState::Fetching
    }

    /// State after an accepted successful fetch.
    pub fn on_fetch_succeeded(self) -> Self {
        SessionState::Ready
    }

    /// State after an accepted failed fetch or rejected input.
    pub fn on_fetch_failed(self) -> Self {
        SessionState::Failed
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Fetching => "fetching",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
