//! Run state machine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{StageFatalError, StageResult};

/// Lifecycle state of one pipeline run
///
/// `Idle → Ingesting → Conforming → FactBuilding → Aggregating → Completed`,
/// with `Failed` reachable from any stage before completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Ingesting,
    Conforming,
    FactBuilding,
    Aggregating,
    Completed,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Ingesting => "ingesting",
            RunState::Conforming => "conforming",
            RunState::FactBuilding => "fact_building",
            RunState::Aggregating => "aggregating",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// Stage that follows this one on success
    pub fn next(&self) -> Option<RunState> {
        match self {
            RunState::Idle => Some(RunState::Ingesting),
            RunState::Ingesting => Some(RunState::Conforming),
            RunState::Conforming => Some(RunState::FactBuilding),
            RunState::FactBuilding => Some(RunState::Aggregating),
            RunState::Aggregating => Some(RunState::Completed),
            RunState::Completed | RunState::Failed => None,
        }
    }

    pub fn can_transition_to(&self, to: RunState) -> bool {
        match to {
            RunState::Failed => !self.is_terminal(),
            _ => self.next() == Some(to),
        }
    }

    /// Validated transition
    pub fn transition(self, to: RunState) -> StageResult<RunState> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(StageFatalError::IllegalTransition { from: self, to })
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
