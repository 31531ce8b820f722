use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of post-processing a pipeline performs.
///
/// Each kind has its own allow-list, poll loop and ledger action tag, so a
/// file can be stamped and mailed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    Logo,
    Mail,
}

impl ProcessKind {
    pub const ALL: [ProcessKind; 2] = [ProcessKind::Logo, ProcessKind::Mail];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessKind::Logo => "logo",
            ProcessKind::Mail => "mail",
        }
    }

    /// Action tag written to the ledger when a run of this kind completes.
    pub fn ledger_action(&self) -> &'static str {
        match self {
            ProcessKind::Logo => "PROCESSED - LOGO",
            ProcessKind::Mail => "PROCESSED - MAIL",
        }
    }

    pub fn from_ledger_action(action: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.ledger_action() == action)
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown process kind: {0}")]
pub struct UnknownProcessKind(pub String);

impl FromStr for ProcessKind {
    type Err = UnknownProcessKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logo" => Ok(ProcessKind::Logo),
            "mail" => Ok(ProcessKind::Mail),
            other => Err(UnknownProcessKind(other.to_string())),
        }
    }
}
