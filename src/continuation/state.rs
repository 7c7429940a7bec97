use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one long-running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    /// Operation accepted and queued; no work done yet.
    Initialized,
    /// Work has not begun (also the state a retried step resumes from when
    /// no previous status exists).
    NotStarted,
    /// At least one step has run and more remain.
    InProgress,
    /// Operation finished successfully.
    Succeeded,
    /// Operation finished with an error.
    Failed,
    /// Operation was cancelled.
    Cancelled,
    /// Operation was handed off to another region; the local side is done.
    Triggered,
}

impl OperationState {
    /// Final states end the continuation chain; nothing is re-enqueued.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Finality check for an optional state: an absent state means no further
/// continuation, so it counts as final.
pub trait FinalStatus {
    fn is_final(&self) -> bool;
}

impl FinalStatus for Option<OperationState> {
    fn is_final(&self) -> bool {
        self.map_or(true, |state| state.is_final())
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Triggered => write!(f, "triggered"),
        }
    }
}

impl std::str::FromStr for OperationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialized" => Ok(Self::Initialized),
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "triggered" => Ok(Self::Triggered),
            _ => Err(format!("Unknown operation state: {s}")),
        }
    }
}
