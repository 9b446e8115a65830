//! Lifecycle state of a crawl engine.
//!
//! An engine runs exactly once: it is created `Stopped`, becomes `Running`
//! when `start_crawl` is called and ends `Closed` after its downloader and
//! item sinks have been shut down.

use std::fmt;

/// Lifecycle of a crawler: `Stopped`, then `Running`, then `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
    Closed,
}

impl EngineState {
    /// Whether `start_crawl` may be called in this state.
    pub fn can_start(self) -> bool {
        self == EngineState::Stopped
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Stopped => "stopped",
            EngineState::Running => "running",
            EngineState::Closed => "closed",
        };
        f.write_str(name)
    }
}
