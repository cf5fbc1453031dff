//! Acknowledgment verdicts

use std::fmt;

use crate::dispatcher::DispatchFault;
use crate::interpreter::CommandRejected;

/// Outcome reported back to the platform for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    SuccessWithNote(String),
    Failed(String),
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        !matches!(self, Verdict::Failed(_))
    }

    /// Message sent alongside the acknowledgment status
    pub fn message(&self) -> &str {
        match self {
            Verdict::Success => "",
            Verdict::SuccessWithNote(note) => note,
            Verdict::Failed(reason) => reason,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Success => f.write_str("success"),
            Verdict::SuccessWithNote(note) => write!(f, "success ({note})"),
            Verdict::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

impl From<CommandRejected> for Verdict {
    fn from(rejected: CommandRejected) -> Self {
        Verdict::Failed(rejected.to_string())
    }
}

impl From<DispatchFault> for Verdict {
    fn from(fault: DispatchFault) -> Self {
        Verdict::Failed(fault.to_string())
    }
}
