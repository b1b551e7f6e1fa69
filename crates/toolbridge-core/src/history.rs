//! Bounding how much prior dialogue is forwarded to the model.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{Role, Turn};

/// Text of the synthetic turn injected to carry context. Never counted as a
/// user turn.
pub const CONTEXT_SENTINEL: &str = "For context:";

/// How many previous user turns a request may carry.
///
/// Configured as an integer where `-1` disables trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TrimBudget {
    #[default]
    Disabled,
    PreviousUserTurns(usize),
}

impl TryFrom<i64> for TrimBudget {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Disabled),
            n => usize::try_from(n).map(Self::PreviousUserTurns).map_err(|_| {
                Error::InvalidInput(format!(
                    "max previous user turns must be -1 or non-negative, got {n}"
                ))
            }),
        }
    }
}

impl From<TrimBudget> for i64 {
    fn from(budget: TrimBudget) -> Self {
        match budget {
            TrimBudget::Disabled => -1,
            TrimBudget::PreviousUserTurns(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }
}

impl std::str::FromStr for TrimBudget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|e| Error::InvalidInput(format!("invalid max previous user turns '{s}': {e}")))?;
        Self::try_from(value)
    }
}

/// Whether a turn counts against the budget: a user turn whose first part
/// has non-empty text other than the context sentinel.
fn counts_toward_budget(turn: &Turn) -> bool {
    turn.role == Role::User
        && turn
            .first_text()
            .is_some_and(|text| !text.is_empty() && text != CONTEXT_SENTINEL)
}

/// Index of the oldest turn to keep, or `None` when the history fits.
///
/// Walking back from the newest turn, the turn that pushes the user-turn
/// count past the budget is the first one retained, so a trimmed history
/// holds `budget + 1` counted user turns.
#[must_use]
pub fn first_retained_turn(history: &[Turn], budget: TrimBudget) -> Option<usize> {
    let TrimBudget::PreviousUserTurns(max) = budget else {
        return None;
    };

    let mut user_turns = 0usize;
    for (index, turn) in history.iter().enumerate().rev() {
        if counts_toward_budget(turn) {
            user_turns += 1;
        }
        if user_turns > max {
            return Some(index);
        }
    }
    None
}

/// Drop the turns older than the budget allows. Returns `history` untouched
/// when trimming is disabled or the history already fits.
#[must_use]
pub fn trim_history(mut history: Vec<Turn>, budget: TrimBudget) -> Vec<Turn> {
    let Some(start) = first_retained_turn(&history, budget) else {
        return history;
    };

    if start > 0 {
        tracing::debug!(
            dropped = start,
            kept = history.len() - start,
            "Trimmed conversation history"
        );
    }
    history.split_off(start)
}
