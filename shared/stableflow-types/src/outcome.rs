use core::fmt;

use alloy_primitives::B256;
use serde::Serialize;

/// Why the gate declined an intent. Not an error: the intent is intentionally left alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Unauthorized,
    Paused,
    Disabled,
    BelowThreshold,
    Demo,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "skipped-unauthorized",
            Self::Paused => "skipped-paused",
            Self::Disabled => "skipped-disabled",
            Self::BelowThreshold => "skipped-below-threshold",
            Self::Demo => "skipped-demo",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal, non-error result of processing one intent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ExecutionOutcome {
    Skipped { reason: SkipReason },
    /// `registry_tx` is `None` for a settle-only replay.
    Settled {
        registry_tx: Option<B256>,
        vault_tx: B256,
    },
    /// The registry already recorded this intent id.
    AlreadyExecuted,
}

impl ExecutionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped { reason } => reason.as_str(),
            Self::Settled { .. } => "settled",
            Self::AlreadyExecuted => "already-executed",
        }
    }
}

impl From<SkipReason> for ExecutionOutcome {
    fn from(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
