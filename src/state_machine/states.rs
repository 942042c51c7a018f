use serde::{Deserialize, Serialize};
use std::fmt;

/// Consultation lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    /// Initial state for a farmer-created request awaiting an expert
    Pending,
    /// An expert has claimed the request and is assigned
    Scheduled,
    /// The live session is running
    InProgress,
    /// The session ended normally
    Completed,
    /// The request was cancelled before or during the session
    Cancelled,
}

impl ConsultationStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Check if this is an active state (a live session is running)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Check if the consultation is still visible in the unassigned pool
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ConsultationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "scheduled" => Ok(Self::Scheduled),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid consultation status: {s}")),
        }
    }
}

/// Default state for new consultation requests
impl Default for ConsultationStatus {
    fn default() -> Self {
        Self::Pending
    }
}
