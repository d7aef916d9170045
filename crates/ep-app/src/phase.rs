//! Model-wide phase state.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Which computation phases have completed.
///
/// Phases only move forward within one model instance. `Failed` is terminal:
/// a failed model must be replaced, or resumed from a checkpoint, before it
/// runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Unconfigured,
    DemandSolved,
    SupplySolved,
    Combined,
    Failed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Unconfigured => "unconfigured",
            Phase::DemandSolved => "demand_solved",
            Phase::SupplySolved => "supply_solved",
            Phase::Combined => "combined",
            Phase::Failed => "failed",
        }
    }

    /// True when `self` has reached `other` and has not failed.
    pub fn at_least(self, other: Phase) -> bool {
        self != Phase::Failed && self >= other
    }

    /// Move forward to `to`; reaching an earlier phase again is a no-op.
    pub fn advance(&mut self, to: Phase) -> AppResult<()> {
        if *self == Phase::Failed {
            return Err(AppError::Precondition {
                what: format!("cannot advance a failed model to {to}"),
            });
        }
        if to == Phase::Failed {
            return Err(AppError::InvalidInput(
                "use fail() to mark a model as failed".to_string(),
            ));
        }
        if to > *self {
            *self = to;
        }
        Ok(())
    }

    pub fn fail(&mut self) {
        *self = Phase::Failed;
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_monotonically() {
        let mut phase = Phase::Unconfigured;
        phase.advance(Phase::SupplySolved).unwrap();
        phase.advance(Phase::DemandSolved).unwrap();
        assert_eq!(phase, Phase::SupplySolved);
        assert!(phase.at_least(Phase::DemandSolved));
        assert!(!phase.at_least(Phase::Combined));
    }

    #[test]
    fn failed_is_terminal() {
        let mut phase = Phase::Combined;
        phase.fail();
        assert!(!phase.at_least(Phase::DemandSolved));
        assert!(matches!(
            phase.advance(Phase::Combined),
            Err(AppError::Precondition { .. })
        ));
        assert_eq!(phase, Phase::Failed);
    }
}
