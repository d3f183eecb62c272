//! Append-only activity log.
//!
//! RULE: Entries are never mutated after insertion. Every mutating desk
//! operation appends exactly one entry; reads filter and paginate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::EntityId;

/// Stable tag identifying what kind of action an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    AgentCreated,
    AgentUpdated,
    AgentDeleted,
    CompetitionCreated,
    CompetitionAwaitingWinners,
    CompetitionCompleted,
    CompetitionArchived,
    CompetitionReactivated,
    CompetitionDeleted,
    BalanceRenewed,
    AllBalancesRenewed,
    TemplateCreated,
    TemplateUpdated,
    TemplateArchived,
    TemplateReactivated,
    UserCreated,
    UserUpdated,
    LogsPurged,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        use ActionType::*;
        match self {
            AgentCreated => "agent_created",
            AgentUpdated => "agent_updated",
            AgentDeleted => "agent_deleted",
            CompetitionCreated => "competition_created",
            CompetitionAwaitingWinners => "competition_awaiting_winners",
            CompetitionCompleted => "competition_completed",
            CompetitionArchived => "competition_archived",
            CompetitionReactivated => "competition_reactivated",
            CompetitionDeleted => "competition_deleted",
            BalanceRenewed => "balance_renewed",
            AllBalancesRenewed => "all_balances_renewed",
            TemplateCreated => "template_created",
            TemplateUpdated => "template_updated",
            TemplateArchived => "template_archived",
            TemplateReactivated => "template_reactivated",
            UserCreated => "user_created",
            UserUpdated => "user_updated",
            LogsPurged => "logs_purged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        use ActionType::*;
        match s {
            "agent_created" => Some(AgentCreated),
            "agent_updated" => Some(AgentUpdated),
            "agent_deleted" => Some(AgentDeleted),
            "competition_created" => Some(CompetitionCreated),
            "competition_awaiting_winners" => Some(CompetitionAwaitingWinners),
            "competition_completed" => Some(CompetitionCompleted),
            "competition_archived" => Some(CompetitionArchived),
            "competition_reactivated" => Some(CompetitionReactivated),
            "competition_deleted" => Some(CompetitionDeleted),
            "balance_renewed" => Some(BalanceRenewed),
            "all_balances_renewed" => Some(AllBalancesRenewed),
            "template_created" => Some(TemplateCreated),
            "template_updated" => Some(TemplateUpdated),
            "template_archived" => Some(TemplateArchived),
            "template_reactivated" => Some(TemplateReactivated),
            "user_created" => Some(UserCreated),
            "user_updated" => Some(UserUpdated),
            "logs_purged" => Some(LogsPurged),
            _ => None,
        }
    }
}

/// One recorded action. `actor_user_id` of `None` means the action was
/// system-initiated rather than performed by a signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: Option<i64>,
    pub actor_user_id: Option<EntityId>,
    pub target_agent_id: Option<EntityId>,
    pub action_type: ActionType,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new(
        actor_user_id: Option<&str>,
        target_agent_id: Option<&str>,
        action_type: ActionType,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            actor_user_id: actor_user_id.map(str::to_string),
            target_agent_id: target_agent_id.map(str::to_string),
            action_type,
            description: description.into(),
            metadata: serde_json::Value::Object(Default::default()),
            created_at,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Filter and pagination for log reads. Empty filter returns the newest
/// entries first.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub action_type: Option<ActionType>,
    pub actor_user_id: Option<EntityId>,
    pub target_agent_id: Option<EntityId>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: u32,
}
