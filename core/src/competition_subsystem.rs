//! Competition lifecycle — the desk's state machine.
//!
//! States only move forward:
//!   sent → active → awaiting_winners → completed
//! `archived` is a side branch reachable from any non-terminal state, and
//! hard deletion is possible from any state. The balance debit happens at
//! creation; deleting a competition never refunds it.
//!
//! The announcement send is deliberately not atomic with the debit: when
//! the gateway rejects the message the debit stands and the send error is
//! carried back to the operator in the creation outcome.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    activity_log::{ActionType, ActivityLogEntry},
    clock::Clock,
    error::{DeskError, DeskResult},
    ledger,
    notifier::{NotificationGateway, SendError},
    store::DeskStore,
    template_subsystem::{render_announcement, TemplateRecord},
    types::EntityId,
};

/// Hours ahead of UTC for the desk's operating region. Competition
/// deadlines land on local midnights.
pub const TZ_OFFSET_HOURS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionStatus {
    Sent,
    Active,
    AwaitingWinners,
    Completed,
    Archived,
}

impl CompetitionStatus {
    /// Terminal states accept no further lifecycle transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CompetitionStatus::Completed | CompetitionStatus::Archived
        )
    }

    /// Live states count down toward the winner-selection deadline.
    pub fn is_live(self) -> bool {
        matches!(self, CompetitionStatus::Sent | CompetitionStatus::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompetitionStatus::Sent => "sent",
            CompetitionStatus::Active => "active",
            CompetitionStatus::AwaitingWinners => "awaiting_winners",
            CompetitionStatus::Completed => "completed",
            CompetitionStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(CompetitionStatus::Sent),
            "active" => Some(CompetitionStatus::Active),
            "awaiting_winners" => Some(CompetitionStatus::AwaitingWinners),
            "completed" => Some(CompetitionStatus::Completed),
            "archived" => Some(CompetitionStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompetitionDuration {
    OneDay,
    TwoDays,
    OneWeek,
}

impl CompetitionDuration {
    pub fn days(self) -> i64 {
        match self {
            CompetitionDuration::OneDay => 1,
            CompetitionDuration::TwoDays => 2,
            CompetitionDuration::OneWeek => 7,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            CompetitionDuration::OneDay => "1d",
            CompetitionDuration::TwoDays => "2d",
            CompetitionDuration::OneWeek => "1w",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "1d" => Some(CompetitionDuration::OneDay),
            "2d" => Some(CompetitionDuration::TwoDays),
            "1w" => Some(CompetitionDuration::OneWeek),
            _ => None,
        }
    }
}

/// Winner selection happens at the start of the local day after the
/// competition's final day: local midnight of the creation day, plus
/// `duration + 1` days, expressed back in UTC.
pub fn winner_selection_date(now: DateTime<Utc>, duration: CompetitionDuration) -> DateTime<Utc> {
    let local = now + Duration::hours(TZ_OFFSET_HOURS);
    let local_day_start = local.date_naive().and_time(NaiveTime::MIN);
    let end_local = local_day_start + Duration::days(duration.days() + 1);
    Utc.from_utc_datetime(&(end_local - Duration::hours(TZ_OFFSET_HOURS)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionRecord {
    pub id: EntityId,
    pub agent_id: EntityId,
    /// The competition question shown to participants.
    pub name: String,
    pub template_id: Option<EntityId>,
    pub correct_answer: Option<String>,
    pub status: CompetitionStatus,
    pub duration: CompetitionDuration,
    pub winners_count: i64,
    pub prize_per_winner: f64,
    pub total_cost: f64,
    pub deposit_winners_count: i64,
    pub ends_at: DateTime<Utc>,
    pub views_count: i64,
    pub reactions_count: i64,
    pub participants_count: i64,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CompetitionRecord {
    /// A competition is compliant once its final stats were recorded.
    pub fn is_compliant(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Display fallback: derives the awaiting-winners condition without
    /// relying on the persisted transition.
    pub fn is_awaiting_winners(&self, now: DateTime<Utc>) -> bool {
        self.status.is_live() && self.ends_at <= now && self.processed_at.is_none()
    }
}

/// Operator input for creating a competition.
#[derive(Debug, Clone)]
pub struct CompetitionParams {
    pub name: String,
    pub template_id: Option<EntityId>,
    pub correct_answer: Option<String>,
    pub duration: CompetitionDuration,
    pub winners_count: i64,
    pub prize_per_winner: f64,
    pub deposit_winners_count: i64,
    /// Overrides the agent's default announcement channel.
    pub chat_id: Option<String>,
}

impl CompetitionParams {
    pub fn validate(&self) -> DeskResult<()> {
        if self.name.trim().is_empty() {
            return Err(DeskError::Validation("name must not be empty".into()));
        }
        if self.deposit_winners_count < 0 {
            return Err(DeskError::Validation(
                "deposit_winners_count must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Result of a creation. `send_error` is set when the announcement could
/// not be delivered; the debit is already committed at that point and is
/// not rolled back.
#[derive(Debug)]
pub struct CreationOutcome {
    pub competition: CompetitionRecord,
    pub send_error: Option<SendError>,
}

/// Per-item outcome counts of a bulk operation. Best effort: one failed
/// id never stops the rest of the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: u32,
    pub failed: u32,
}

/// Listing filter for competitions.
#[derive(Debug, Clone, Default)]
pub struct CompetitionFilter {
    pub agent_id: Option<EntityId>,
    pub status: Option<CompetitionStatus>,
    pub exclude_status: Option<CompetitionStatus>,
    /// Substring match on the competition name.
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

pub struct CompetitionLifecycle<'a> {
    store: &'a DeskStore,
    clock: &'a dyn Clock,
    gateway: &'a dyn NotificationGateway,
}

impl<'a> CompetitionLifecycle<'a> {
    pub fn new(
        store: &'a DeskStore,
        clock: &'a dyn Clock,
        gateway: &'a dyn NotificationGateway,
    ) -> Self {
        Self {
            store,
            clock,
            gateway,
        }
    }

    /// Creates a competition for an agent: validates everything up front,
    /// persists the record, debits the agent in one atomic update, bumps
    /// template usage, and announces. No mutation happens when validation
    /// or sufficiency fails.
    pub fn create(
        &self,
        actor: Option<&str>,
        agent_id: &str,
        params: CompetitionParams,
    ) -> DeskResult<CreationOutcome> {
        let agent = self
            .store
            .get_agent(agent_id)?
            .ok_or_else(|| DeskError::NotFound {
                entity: "agent",
                id: agent_id.to_string(),
            })?;

        params.validate()?;
        let total_cost = ledger::creation_cost(params.winners_count, params.prize_per_winner)?;

        let template = match &params.template_id {
            Some(template_id) => {
                let t = self
                    .store
                    .get_template(template_id)?
                    .ok_or_else(|| DeskError::NotFound {
                        entity: "template",
                        id: template_id.clone(),
                    })?;
                self.check_template(&t, &agent)?;
                Some(t)
            }
            None => None,
        };

        let violations =
            ledger::validate_sufficiency(&agent, total_cost, params.deposit_winners_count);
        if !violations.is_empty() {
            for v in &violations {
                log::warn!("competition rejected for agent {}: {v:?}", agent.agent_code);
            }
            return Err(violations[0].into());
        }

        let now = self.clock.now();
        let record = CompetitionRecord {
            id: Uuid::new_v4().to_string(),
            agent_id: agent.id.clone(),
            name: params.name.clone(),
            template_id: params.template_id.clone(),
            correct_answer: params
                .correct_answer
                .clone()
                .or_else(|| template.as_ref().map(|t| t.correct_answer.clone())),
            status: CompetitionStatus::Sent,
            duration: params.duration,
            winners_count: params.winners_count,
            prize_per_winner: params.prize_per_winner,
            total_cost,
            deposit_winners_count: params.deposit_winners_count,
            ends_at: winner_selection_date(now, params.duration),
            views_count: 0,
            reactions_count: 0,
            participants_count: 0,
            processed_at: None,
            created_at: now,
        };

        self.store.insert_competition(&record)?;
        self.store
            .debit_agent(&agent.id, total_cost, params.deposit_winners_count, now)?;

        if let Some(t) = &template {
            let updated = self.store.increment_template_usage(&t.id)?;
            if updated.is_exhausted() && !updated.is_archived {
                self.store.set_template_archived(&t.id, true)?;
                self.store.append_log(&ActivityLogEntry::new(
                    None,
                    None,
                    ActionType::TemplateArchived,
                    format!("Template '{}' reached its usage limit", updated.question),
                    now,
                ))?;
            }
        }

        self.store.append_log(
            &ActivityLogEntry::new(
                actor,
                Some(&agent.id),
                ActionType::CompetitionCreated,
                format!(
                    "Competition '{}' created for agent {} (cost {total_cost:.2})",
                    record.name, agent.agent_code
                ),
                now,
            )
            .with_metadata(serde_json::json!({
                "competition_id": record.id,
                "total_cost": total_cost,
                "deposit_winners_count": params.deposit_winners_count,
            })),
        )?;

        let message = render_announcement(template.as_ref(), &params);
        let chat = params.chat_id.as_deref().or(agent.chat_id.as_deref());
        let send_error = match self.gateway.send(&message, chat) {
            Ok(()) => None,
            Err(e) => {
                // The debit already stands; surface the failure instead of
                // unwinding it.
                log::warn!(
                    "announcement for competition {} failed, balance stays debited: {e}",
                    record.id
                );
                Some(e)
            }
        };

        log::info!(
            "competition {} created for agent {} (cost {total_cost:.2}, ends {})",
            record.id,
            agent.agent_code,
            record.ends_at
        );

        Ok(CreationOutcome {
            competition: record,
            send_error,
        })
    }

    fn check_template(&self, template: &TemplateRecord, agent: &crate::agent_subsystem::AgentRecord) -> DeskResult<()> {
        if template.is_archived {
            return Err(DeskError::Validation(format!(
                "template '{}' is archived",
                template.question
            )));
        }
        if template.is_exhausted() {
            return Err(DeskError::Validation(format!(
                "template '{}' has reached its usage limit",
                template.question
            )));
        }
        if !template.classification.allows(agent.classification) {
            return Err(DeskError::Validation(format!(
                "template '{}' is restricted to classification {}",
                template.question,
                template.classification.as_str()
            )));
        }
        Ok(())
    }

    /// Persists the awaiting-winners transition for every live competition
    /// whose deadline has passed without recorded stats. Returns how many
    /// competitions moved.
    pub fn refresh_statuses(&self) -> DeskResult<u32> {
        let now = self.clock.now();
        let moved = self.store.mark_awaiting_winners(now)?;
        for (id, agent_id) in &moved {
            self.store.append_log(&ActivityLogEntry::new(
                None,
                Some(agent_id),
                ActionType::CompetitionAwaitingWinners,
                format!("Competition {id} passed its deadline and awaits winners"),
                now,
            ))?;
        }
        Ok(moved.len() as u32)
    }

    /// Records the final stats and completes the competition. All three
    /// values must be non-negative; nothing changes when validation fails.
    pub fn record_final_stats(
        &self,
        actor: Option<&str>,
        id: &str,
        views: i64,
        reactions: i64,
        participants: i64,
    ) -> DeskResult<CompetitionRecord> {
        let competition = self.get(id)?;
        if competition.status.is_terminal() {
            return Err(DeskError::Validation(format!(
                "competition is already {}",
                competition.status.as_str()
            )));
        }
        if views < 0 || reactions < 0 || participants < 0 {
            return Err(DeskError::Validation(
                "views, reactions and participants must all be non-negative".into(),
            ));
        }

        let now = self.clock.now();
        self.store
            .set_final_stats(id, views, reactions, participants, now)?;
        self.store.append_log(
            &ActivityLogEntry::new(
                actor,
                Some(&competition.agent_id),
                ActionType::CompetitionCompleted,
                format!("Competition '{}' completed", competition.name),
                now,
            )
            .with_metadata(serde_json::json!({
                "competition_id": id,
                "views": views,
                "reactions": reactions,
                "participants": participants,
            })),
        )?;
        self.get(id)
    }

    /// Moves a non-terminal competition to the archived side branch.
    pub fn archive(&self, actor: Option<&str>, id: &str) -> DeskResult<()> {
        let competition = self.get(id)?;
        if competition.status.is_terminal() {
            return Err(DeskError::Validation(format!(
                "competition is already {}",
                competition.status.as_str()
            )));
        }
        let now = self.clock.now();
        self.store
            .update_competition_status(id, CompetitionStatus::Archived)?;
        self.store.append_log(&ActivityLogEntry::new(
            actor,
            Some(&competition.agent_id),
            ActionType::CompetitionArchived,
            format!("Competition '{}' archived", competition.name),
            now,
        ))?;
        Ok(())
    }

    /// Brings an archived competition back, deriving the stage it should
    /// resume in from its recorded facts.
    pub fn unarchive(&self, actor: Option<&str>, id: &str) -> DeskResult<CompetitionRecord> {
        let competition = self.get(id)?;
        if competition.status != CompetitionStatus::Archived {
            return Err(DeskError::Validation(format!(
                "competition is {}, not archived",
                competition.status.as_str()
            )));
        }
        let now = self.clock.now();
        let resumed = if competition.processed_at.is_some() {
            CompetitionStatus::Completed
        } else if competition.ends_at <= now {
            CompetitionStatus::AwaitingWinners
        } else {
            CompetitionStatus::Active
        };
        self.store.update_competition_status(id, resumed)?;
        self.store.append_log(&ActivityLogEntry::new(
            actor,
            Some(&competition.agent_id),
            ActionType::CompetitionReactivated,
            format!(
                "Competition '{}' reactivated as {}",
                competition.name,
                resumed.as_str()
            ),
            now,
        ))?;
        self.get(id)
    }

    /// Hard delete. The agent's debited balance is not restored.
    pub fn delete(&self, actor: Option<&str>, id: &str) -> DeskResult<()> {
        let competition = self.get(id)?;
        self.store.delete_competition(id)?;
        self.store.append_log(&ActivityLogEntry::new(
            actor,
            Some(&competition.agent_id),
            ActionType::CompetitionDeleted,
            format!("Competition '{}' deleted", competition.name),
            self.clock.now(),
        ))?;
        Ok(())
    }

    pub fn bulk_archive(&self, actor: Option<&str>, ids: &[String]) -> BatchOutcome {
        self.for_each(ids, |id| self.archive(actor, id))
    }

    pub fn bulk_delete(&self, actor: Option<&str>, ids: &[String]) -> BatchOutcome {
        self.for_each(ids, |id| self.delete(actor, id))
    }

    fn for_each(&self, ids: &[String], op: impl Fn(&str) -> DeskResult<()>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for id in ids {
            match op(id) {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => {
                    log::warn!("bulk operation skipped competition {id}: {e}");
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }

    pub fn get(&self, id: &str) -> DeskResult<CompetitionRecord> {
        self.store
            .get_competition(id)?
            .ok_or_else(|| DeskError::NotFound {
                entity: "competition",
                id: id.to_string(),
            })
    }

    pub fn list(&self, filter: &CompetitionFilter) -> DeskResult<Vec<CompetitionRecord>> {
        self.store.list_competitions(filter)
    }
}
