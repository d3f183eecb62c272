//! Balance renewal — periodic reset of consumed balances back to the rank
//! defaults.
//!
//! Renewal is always operator-initiated. Eligibility is computed from the
//! last renewal date (or the account creation date for accounts that never
//! renewed) plus the configured period; an early call fails instead of
//! resetting ahead of schedule.

use chrono::{DateTime, Duration, Months, Utc};

use crate::{
    activity_log::{ActionType, ActivityLogEntry},
    agent_subsystem::{AgentRecord, RenewalPeriod},
    clock::Clock,
    error::{DeskError, DeskResult},
    store::DeskStore,
};

/// The next instant at which the agent may renew. `None` when the agent
/// has no renewal period configured.
pub fn next_renewal_date(agent: &AgentRecord) -> Option<DateTime<Utc>> {
    let last = agent.last_renewal_date.unwrap_or(agent.created_at);
    match agent.renewal_period {
        RenewalPeriod::None => None,
        RenewalPeriod::Weekly => Some(last + Duration::days(7)),
        RenewalPeriod::Biweekly => Some(last + Duration::days(14)),
        RenewalPeriod::Monthly => last.checked_add_months(Months::new(1)),
    }
}

pub fn is_eligible(agent: &AgentRecord, now: DateTime<Utc>) -> bool {
    matches!(next_renewal_date(agent), Some(next) if now >= next)
}

/// Counts from a sweep over all agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenewalOutcome {
    pub renewed: u32,
    pub skipped: u32,
    pub failed: u32,
}

pub struct RenewalEngine<'a> {
    store: &'a DeskStore,
    clock: &'a dyn Clock,
}

impl<'a> RenewalEngine<'a> {
    pub fn new(store: &'a DeskStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Resets the agent's consumed balances to the rank totals and stamps
    /// the renewal date. Fails with `NotEligible` before the next renewal
    /// date.
    pub fn renew(&self, actor: Option<&str>, agent_id: &str) -> DeskResult<AgentRecord> {
        let agent = self
            .store
            .get_agent(agent_id)?
            .ok_or_else(|| DeskError::NotFound {
                entity: "agent",
                id: agent_id.to_string(),
            })?;

        let now = self.clock.now();
        if !is_eligible(&agent, now) {
            return Err(DeskError::NotEligible {
                next_renewal: next_renewal_date(&agent),
            });
        }

        self.store.renew_agent_balances(&agent.id, now)?;
        self.store.append_log(&ActivityLogEntry::new(
            actor,
            Some(&agent.id),
            ActionType::BalanceRenewed,
            format!("Balances renewed for agent {}", agent.agent_code),
            now,
        ))?;
        log::info!("agent {} renewed", agent.agent_code);

        self.store
            .get_agent(agent_id)?
            .ok_or_else(|| DeskError::NotFound {
                entity: "agent",
                id: agent_id.to_string(),
            })
    }

    /// Sweeps every agent and renews the eligible ones, one at a time.
    /// Best effort: a failing agent is counted and the sweep continues.
    pub fn renew_all(&self, actor: Option<&str>) -> DeskResult<RenewalOutcome> {
        let agents = self.store.list_agents()?;
        let now = self.clock.now();
        let mut outcome = RenewalOutcome::default();

        for agent in &agents {
            if !is_eligible(agent, now) {
                outcome.skipped += 1;
                continue;
            }
            match self.renew(actor, &agent.id) {
                Ok(_) => outcome.renewed += 1,
                Err(e) => {
                    log::warn!("bulk renewal skipped agent {}: {e}", agent.agent_code);
                    outcome.failed += 1;
                }
            }
        }

        self.store.append_log(
            &ActivityLogEntry::new(
                actor,
                None,
                ActionType::AllBalancesRenewed,
                format!(
                    "Bulk renewal: {} renewed, {} skipped, {} failed",
                    outcome.renewed, outcome.skipped, outcome.failed
                ),
                now,
            )
            .with_metadata(serde_json::json!({
                "renewed": outcome.renewed,
                "skipped": outcome.skipped,
                "failed": outcome.failed,
            })),
        )?;
        Ok(outcome)
    }
}
