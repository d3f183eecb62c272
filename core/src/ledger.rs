//! Bonus ledger — pure balance arithmetic.
//!
//! RULE: Nothing in this module mutates state. Callers project, inspect
//! the result, and decide whether to commit through the store.

use crate::{
    agent_subsystem::AgentRecord,
    error::{DeskError, DeskResult},
    rank::{AgentRank, RankDefaults},
};

/// Total cost of a competition: winners times prize per winner.
/// Both inputs must be non-negative.
pub fn creation_cost(winners_count: i64, prize_per_winner: f64) -> DeskResult<f64> {
    if winners_count < 0 {
        return Err(DeskError::Validation(format!(
            "winners_count must be non-negative, got {winners_count}"
        )));
    }
    if prize_per_winner < 0.0 {
        return Err(DeskError::Validation(format!(
            "prize_per_winner must be non-negative, got {prize_per_winner}"
        )));
    }
    Ok(winners_count as f64 * prize_per_winner)
}

/// What the agent's balances would look like after a creation commits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceProjection {
    pub remaining_balance: f64,
    pub remaining_deposit_bonus: f64,
}

pub fn project_balances(
    agent: &AgentRecord,
    total_cost: f64,
    deposit_winners: i64,
) -> BalanceProjection {
    BalanceProjection {
        remaining_balance: agent.remaining_balance - total_cost,
        remaining_deposit_bonus: agent.remaining_deposit_bonus - deposit_winners as f64,
    }
}

/// A single violated sufficiency constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SufficiencyViolation {
    Balance { required: f64, available: f64 },
    DepositBonus { required: f64, available: f64 },
}

impl From<SufficiencyViolation> for DeskError {
    fn from(v: SufficiencyViolation) -> Self {
        match v {
            SufficiencyViolation::Balance {
                required,
                available,
            } => DeskError::InsufficientBalance {
                required,
                available,
            },
            SufficiencyViolation::DepositBonus {
                required,
                available,
            } => DeskError::InsufficientDepositBonus {
                required,
                available,
            },
        }
    }
}

/// Checks whether the agent can afford a creation. Returns every violated
/// constraint, not just the first, so the operator sees all problems at
/// once. Exact equality passes: a cost that consumes the remaining balance
/// to zero is allowed. A zero-cost, zero-deposit-winner competition is
/// always valid.
pub fn validate_sufficiency(
    agent: &AgentRecord,
    total_cost: f64,
    deposit_winners: i64,
) -> Vec<SufficiencyViolation> {
    let mut violations = Vec::new();
    if total_cost > agent.remaining_balance {
        violations.push(SufficiencyViolation::Balance {
            required: total_cost,
            available: agent.remaining_balance,
        });
    }
    let deposit_required = deposit_winners as f64;
    if deposit_required > agent.remaining_deposit_bonus {
        violations.push(SufficiencyViolation::DepositBonus {
            required: deposit_required,
            available: agent.remaining_deposit_bonus,
        });
    }
    violations
}

/// Static rank-table lookup.
pub fn rank_defaults(rank: AgentRank) -> RankDefaults {
    rank.defaults()
}
