use std::fmt;

use crate::error::{Result, RunError};

/// Lifecycle state of a remote run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Queued,
    Starting,
    Running,
    Success,
    Error,
    Cancelled,
}

/// Status codes reported by the API and the status each one maps to.
pub const RUN_STATUS_CODES: &[(i64, RunStatus)] = &[
    (1, RunStatus::Queued),
    (2, RunStatus::Starting),
    (3, RunStatus::Running),
    (10, RunStatus::Success),
    (20, RunStatus::Error),
    (30, RunStatus::Cancelled),
];

impl RunStatus {
    /// Looks a numeric code up in [`RUN_STATUS_CODES`].
    ///
    /// Codes outside the table are reported as [`RunError::UnknownStatus`]
    /// instead of being coerced to some default.
    pub fn from_code(code: i64) -> Result<Self> {
        RUN_STATUS_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, status)| *status)
            .ok_or(RunError::UnknownStatus(code))
    }

    pub fn code(self) -> i64 {
        RUN_STATUS_CODES
            .iter()
            .find(|(_, status)| *status == self)
            .map(|(c, _)| *c)
            .unwrap_or_default()
    }

    pub fn label(self) -> &'static str {
        match self {
            RunStatus::Queued => "Queued",
            RunStatus::Starting => "Starting",
            RunStatus::Running => "Running",
            RunStatus::Success => "Success",
            RunStatus::Error => "Error",
            RunStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Success | RunStatus::Error | RunStatus::Cancelled
        )
    }

    /// True for terminal statuses that mean the run did not succeed.
    pub fn is_failure(self) -> bool {
        matches!(self, RunStatus::Error | RunStatus::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
