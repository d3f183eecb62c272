//! Agent accounts — the partner entities that run competitions against a
//! bonus balance.
//!
//! Balances come in two pairs that must stay consistent:
//!   remaining_balance       = competition_bonus    - consumed_balance
//!   remaining_deposit_bonus = deposit_bonus_count  - used_deposit_bonus
//! Creation and renewal derive both pairs from the rank defaults; manual
//! edits to the consumed side recompute the remaining side here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{DeskError, DeskResult},
    rank::{AgentRank, Classification},
    types::EntityId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalPeriod {
    None,
    Weekly,
    Biweekly,
    Monthly,
}

impl RenewalPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            RenewalPeriod::None => "none",
            RenewalPeriod::Weekly => "weekly",
            RenewalPeriod::Biweekly => "biweekly",
            RenewalPeriod::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(RenewalPeriod::None),
            "weekly" => Some(RenewalPeriod::Weekly),
            "biweekly" => Some(RenewalPeriod::Biweekly),
            "monthly" => Some(RenewalPeriod::Monthly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: EntityId,
    /// Operator-facing account code. Unique across the desk.
    pub agent_code: String,
    pub name: String,
    pub classification: Classification,
    pub rank: AgentRank,
    pub competition_bonus: f64,
    pub consumed_balance: f64,
    pub remaining_balance: f64,
    pub deposit_bonus_percentage: Option<f64>,
    pub deposit_bonus_count: Option<f64>,
    pub used_deposit_bonus: f64,
    pub remaining_deposit_bonus: f64,
    pub renewal_period: RenewalPeriod,
    pub last_renewal_date: Option<DateTime<Utc>>,
    /// Weekday indices (0 = Sunday .. 6 = Saturday) on which the agent is
    /// audited and sent a competition.
    pub audit_days: Vec<u8>,
    /// Default announcement channel for this agent's competitions.
    pub chat_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Onboarding input for a new agent account.
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub agent_code: String,
    pub name: String,
    pub classification: Classification,
    pub rank: AgentRank,
    pub renewal_period: RenewalPeriod,
    pub audit_days: Vec<u8>,
    pub chat_id: Option<String>,
}

impl NewAgent {
    pub fn validate(&self) -> DeskResult<()> {
        if self.agent_code.trim().is_empty() {
            return Err(DeskError::Validation("agent_code must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(DeskError::Validation("name must not be empty".into()));
        }
        if let Some(day) = self.audit_days.iter().find(|d| **d > 6) {
            return Err(DeskError::Validation(format!(
                "audit day {day} out of range 0..=6"
            )));
        }
        Ok(())
    }
}

/// Builds a fresh account from onboarding input, seeding both balance
/// pairs from the rank defaults.
pub fn build_account(new: NewAgent, id: EntityId, now: DateTime<Utc>) -> AgentRecord {
    let defaults = new.rank.defaults();
    AgentRecord {
        id,
        agent_code: new.agent_code,
        name: new.name,
        classification: new.classification,
        rank: new.rank,
        competition_bonus: defaults.competition_bonus,
        consumed_balance: 0.0,
        remaining_balance: defaults.competition_bonus,
        deposit_bonus_percentage: defaults.deposit_bonus_percentage,
        deposit_bonus_count: defaults.deposit_bonus_count,
        used_deposit_bonus: 0.0,
        remaining_deposit_bonus: defaults.deposit_bonus_count.unwrap_or(0.0),
        renewal_period: new.renewal_period,
        last_renewal_date: None,
        audit_days: new.audit_days,
        chat_id: new.chat_id,
        created_at: now,
        updated_at: now,
    }
}

/// Partial edit of an agent. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub classification: Option<Classification>,
    pub rank: Option<AgentRank>,
    pub renewal_period: Option<RenewalPeriod>,
    pub audit_days: Option<Vec<u8>>,
    pub chat_id: Option<Option<String>>,
    pub consumed_balance: Option<f64>,
    pub used_deposit_bonus: Option<f64>,
}

impl AgentUpdate {
    /// True when the edit touches the financial side of the account.
    pub fn touches_financials(&self) -> bool {
        self.consumed_balance.is_some() || self.used_deposit_bonus.is_some()
    }
}

/// Applies an edit in place. A rank change re-seeds the bonus totals from
/// the new rank's defaults; an edit to a consumed figure recomputes the
/// matching remaining figure from the current totals.
pub fn apply_update(
    agent: &mut AgentRecord,
    update: &AgentUpdate,
    now: DateTime<Utc>,
) -> DeskResult<()> {
    if let Some(days) = &update.audit_days {
        if let Some(day) = days.iter().find(|d| **d > 6) {
            return Err(DeskError::Validation(format!(
                "audit day {day} out of range 0..=6"
            )));
        }
    }
    if let Some(c) = update.consumed_balance {
        if c < 0.0 {
            return Err(DeskError::Validation(
                "consumed_balance must be non-negative".into(),
            ));
        }
    }
    if let Some(u) = update.used_deposit_bonus {
        if u < 0.0 {
            return Err(DeskError::Validation(
                "used_deposit_bonus must be non-negative".into(),
            ));
        }
    }

    if let Some(name) = &update.name {
        agent.name = name.clone();
    }
    if let Some(classification) = update.classification {
        agent.classification = classification;
    }
    if let Some(rank) = update.rank {
        let defaults = rank.defaults();
        agent.rank = rank;
        agent.competition_bonus = defaults.competition_bonus;
        agent.deposit_bonus_percentage = defaults.deposit_bonus_percentage;
        agent.deposit_bonus_count = defaults.deposit_bonus_count;
        agent.remaining_balance = agent.competition_bonus - agent.consumed_balance;
        agent.remaining_deposit_bonus =
            agent.deposit_bonus_count.unwrap_or(0.0) - agent.used_deposit_bonus;
    }
    if let Some(period) = update.renewal_period {
        agent.renewal_period = period;
    }
    if let Some(days) = &update.audit_days {
        agent.audit_days = days.clone();
    }
    if let Some(chat) = &update.chat_id {
        agent.chat_id = chat.clone();
    }
    if let Some(consumed) = update.consumed_balance {
        agent.consumed_balance = consumed;
        agent.remaining_balance = agent.competition_bonus - consumed;
    }
    if let Some(used) = update.used_deposit_bonus {
        agent.used_deposit_bonus = used;
        agent.remaining_deposit_bonus = agent.deposit_bonus_count.unwrap_or(0.0) - used;
    }
    agent.updated_at = now;
    Ok(())
}
