//! The desk engine — single entry point for every operator action.
//!
//! RULES:
//!   - Permission checks happen here, once per operation, against the
//!     acting user's capability view. An absent actor is the trusted
//!     system path (headless tooling, tests).
//!   - Every mutation appends an activity-log entry.
//!   - Subsystems never check permissions themselves.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    activity_log::{ActionType, ActivityLogEntry, LogQuery},
    agent_subsystem::{self, AgentRecord, AgentUpdate, NewAgent},
    clock::{Clock, FixedClock, SystemClock},
    competition_subsystem::{
        BatchOutcome, CompetitionFilter, CompetitionLifecycle, CompetitionParams,
        CompetitionRecord, CreationOutcome,
    },
    error::{DeskError, DeskResult},
    notifier::{NotificationGateway, NullGateway, RecordingGateway},
    renewal_subsystem::{RenewalEngine, RenewalOutcome},
    store::DeskStore,
    template_subsystem::{NewTemplate, TemplateRecord},
    user_subsystem::{Capabilities, NewUser, UserRecord, UserStatus, UserUpdate},
};

pub struct DeskEngine {
    store: DeskStore,
    clock: Box<dyn Clock>,
    gateway: Box<dyn NotificationGateway>,
}

impl DeskEngine {
    pub fn new(
        store: DeskStore,
        clock: Box<dyn Clock>,
        gateway: Box<dyn NotificationGateway>,
    ) -> Self {
        Self {
            store,
            clock,
            gateway,
        }
    }

    /// Open (or create) the desk database at `path` and apply migrations.
    pub fn open(path: &str, gateway: Box<dyn NotificationGateway>) -> DeskResult<Self> {
        let store = DeskStore::open(path)?;
        store.migrate()?;
        Ok(Self::new(store, Box::new(SystemClock), gateway))
    }

    /// In-memory engine with the real clock and a discarding gateway.
    pub fn in_memory() -> DeskResult<Self> {
        let store = DeskStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(
            store,
            Box::new(SystemClock),
            Box::new(NullGateway),
        ))
    }

    /// Fully wired engine on an in-memory store with a fixed clock and a
    /// recording gateway. Used by the integration tests.
    pub fn build_test(
        start: DateTime<Utc>,
    ) -> DeskResult<(Self, Arc<FixedClock>, Arc<RecordingGateway>)> {
        let store = DeskStore::in_memory()?;
        store.migrate()?;
        let clock = Arc::new(FixedClock::new(start));
        let gateway = Arc::new(RecordingGateway::new());
        let engine = Self::new(
            store,
            Box::new(Arc::clone(&clock)),
            Box::new(Arc::clone(&gateway)),
        );
        Ok((engine, clock, gateway))
    }

    pub fn store(&self) -> &DeskStore {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn competitions(&self) -> CompetitionLifecycle<'_> {
        CompetitionLifecycle::new(&self.store, self.clock.as_ref(), self.gateway.as_ref())
    }

    fn renewals(&self) -> RenewalEngine<'_> {
        RenewalEngine::new(&self.store, self.clock.as_ref())
    }

    /// Capability gate. `None` is the trusted system path and passes.
    fn require(
        actor: Option<&UserRecord>,
        action: &'static str,
        check: impl Fn(&Capabilities) -> bool,
    ) -> DeskResult<()> {
        match actor {
            Some(user) if !check(&user.capabilities()) => Err(DeskError::Forbidden { action }),
            _ => Ok(()),
        }
    }

    fn actor_id(actor: Option<&UserRecord>) -> Option<&str> {
        actor.map(|u| u.id.as_str())
    }

    // ── Agents ─────────────────────────────────────────────────

    pub fn create_agent(
        &self,
        actor: Option<&UserRecord>,
        new: NewAgent,
    ) -> DeskResult<AgentRecord> {
        Self::require(actor, "create agent", Capabilities::can_edit_profile)?;
        new.validate()?;
        let now = self.clock.now();
        let record = agent_subsystem::build_account(new, Uuid::new_v4().to_string(), now);
        self.store.insert_agent(&record)?;
        self.store.append_log(&ActivityLogEntry::new(
            Self::actor_id(actor),
            Some(&record.id),
            ActionType::AgentCreated,
            format!("Agent {} ({}) onboarded", record.agent_code, record.name),
            now,
        ))?;
        log::info!(
            "agent {} onboarded with rank {}",
            record.agent_code,
            record.rank.as_str()
        );
        Ok(record)
    }

    pub fn get_agent(&self, id: &str) -> DeskResult<AgentRecord> {
        self.store
            .get_agent(id)?
            .ok_or_else(|| DeskError::NotFound {
                entity: "agent",
                id: id.to_string(),
            })
    }

    pub fn get_agent_by_code(&self, agent_code: &str) -> DeskResult<AgentRecord> {
        self.store
            .get_agent_by_code(agent_code)?
            .ok_or_else(|| DeskError::NotFound {
                entity: "agent",
                id: agent_code.to_string(),
            })
    }

    pub fn list_agents(&self) -> DeskResult<Vec<AgentRecord>> {
        self.store.list_agents()
    }

    pub fn agents_due_for_audit(&self, weekday: u8) -> DeskResult<Vec<AgentRecord>> {
        self.store.agents_due_for_audit(weekday)
    }

    pub fn update_agent(
        &self,
        actor: Option<&UserRecord>,
        id: &str,
        update: AgentUpdate,
    ) -> DeskResult<AgentRecord> {
        if update.touches_financials() {
            Self::require(actor, "edit agent financials", Capabilities::can_edit_financials)?;
        } else {
            Self::require(actor, "edit agent profile", Capabilities::can_edit_profile)?;
        }
        let mut agent = self.get_agent(id)?;
        let now = self.clock.now();
        agent_subsystem::apply_update(&mut agent, &update, now)?;
        self.store.update_agent(&agent)?;
        self.store.append_log(&ActivityLogEntry::new(
            Self::actor_id(actor),
            Some(&agent.id),
            ActionType::AgentUpdated,
            format!("Agent {} updated", agent.agent_code),
            now,
        ))?;
        Ok(agent)
    }

    pub fn delete_agent(&self, actor: Option<&UserRecord>, id: &str) -> DeskResult<()> {
        Self::require(actor, "delete agent", Capabilities::can_edit_profile)?;
        let agent = self.get_agent(id)?;
        self.store.delete_agent(id)?;
        self.store.append_log(&ActivityLogEntry::new(
            Self::actor_id(actor),
            Some(id),
            ActionType::AgentDeleted,
            format!("Agent {} ({}) deleted", agent.agent_code, agent.name),
            self.clock.now(),
        ))?;
        Ok(())
    }

    // ── Competitions ───────────────────────────────────────────

    pub fn create_competition(
        &self,
        actor: Option<&UserRecord>,
        agent_id: &str,
        params: CompetitionParams,
    ) -> DeskResult<CreationOutcome> {
        Self::require(
            actor,
            "create competition",
            Capabilities::can_create_competition,
        )?;
        self.competitions()
            .create(Self::actor_id(actor), agent_id, params)
    }

    pub fn get_competition(&self, id: &str) -> DeskResult<CompetitionRecord> {
        self.competitions().get(id)
    }

    pub fn list_competitions(
        &self,
        filter: &CompetitionFilter,
    ) -> DeskResult<Vec<CompetitionRecord>> {
        self.competitions().list(filter)
    }

    /// Persist the awaiting-winners transition for overdue competitions.
    pub fn refresh_competition_statuses(&self) -> DeskResult<u32> {
        self.competitions().refresh_statuses()
    }

    pub fn record_final_stats(
        &self,
        actor: Option<&UserRecord>,
        id: &str,
        views: i64,
        reactions: i64,
        participants: i64,
    ) -> DeskResult<CompetitionRecord> {
        Self::require(
            actor,
            "record competition stats",
            Capabilities::can_manage_competitions,
        )?;
        self.competitions()
            .record_final_stats(Self::actor_id(actor), id, views, reactions, participants)
    }

    pub fn archive_competition(&self, actor: Option<&UserRecord>, id: &str) -> DeskResult<()> {
        Self::require(
            actor,
            "archive competition",
            Capabilities::can_manage_competitions,
        )?;
        self.competitions().archive(Self::actor_id(actor), id)
    }

    pub fn unarchive_competition(
        &self,
        actor: Option<&UserRecord>,
        id: &str,
    ) -> DeskResult<CompetitionRecord> {
        Self::require(
            actor,
            "unarchive competition",
            Capabilities::can_manage_competitions,
        )?;
        self.competitions().unarchive(Self::actor_id(actor), id)
    }

    pub fn delete_competition(&self, actor: Option<&UserRecord>, id: &str) -> DeskResult<()> {
        Self::require(
            actor,
            "delete competition",
            Capabilities::can_manage_competitions,
        )?;
        self.competitions().delete(Self::actor_id(actor), id)
    }

    pub fn bulk_archive_competitions(
        &self,
        actor: Option<&UserRecord>,
        ids: &[String],
    ) -> DeskResult<BatchOutcome> {
        Self::require(
            actor,
            "bulk archive competitions",
            Capabilities::can_manage_competitions,
        )?;
        Ok(self.competitions().bulk_archive(Self::actor_id(actor), ids))
    }

    pub fn bulk_delete_competitions(
        &self,
        actor: Option<&UserRecord>,
        ids: &[String],
    ) -> DeskResult<BatchOutcome> {
        Self::require(
            actor,
            "bulk delete competitions",
            Capabilities::can_manage_competitions,
        )?;
        Ok(self.competitions().bulk_delete(Self::actor_id(actor), ids))
    }

    // ── Renewal ────────────────────────────────────────────────

    pub fn renew_agent(&self, actor: Option<&UserRecord>, id: &str) -> DeskResult<AgentRecord> {
        Self::require(actor, "renew agent balances", Capabilities::can_edit_financials)?;
        self.renewals().renew(Self::actor_id(actor), id)
    }

    pub fn renew_all_agents(&self, actor: Option<&UserRecord>) -> DeskResult<RenewalOutcome> {
        Self::require(
            actor,
            "renew all balances",
            Capabilities::can_renew_all_balances,
        )?;
        self.renewals().renew_all(Self::actor_id(actor))
    }

    // ── Templates ──────────────────────────────────────────────

    pub fn create_template(
        &self,
        actor: Option<&UserRecord>,
        new: NewTemplate,
    ) -> DeskResult<TemplateRecord> {
        Self::require(actor, "create template", Capabilities::can_manage_templates)?;
        new.validate()?;
        let now = self.clock.now();
        let record = TemplateRecord {
            id: Uuid::new_v4().to_string(),
            question: new.question,
            content: new.content,
            classification: new.classification,
            correct_answer: new.correct_answer,
            usage_limit: new.usage_limit,
            usage_count: 0,
            is_archived: false,
            created_at: now,
        };
        self.store.insert_template(&record)?;
        self.store.append_log(&ActivityLogEntry::new(
            Self::actor_id(actor),
            None,
            ActionType::TemplateCreated,
            format!("Template '{}' created", record.question),
            now,
        ))?;
        Ok(record)
    }

    pub fn get_template(&self, id: &str) -> DeskResult<TemplateRecord> {
        self.store
            .get_template(id)?
            .ok_or_else(|| DeskError::NotFound {
                entity: "template",
                id: id.to_string(),
            })
    }

    pub fn list_templates(&self, include_archived: bool) -> DeskResult<Vec<TemplateRecord>> {
        self.store.list_templates(include_archived)
    }

    pub fn update_template(
        &self,
        actor: Option<&UserRecord>,
        template: &TemplateRecord,
    ) -> DeskResult<()> {
        Self::require(actor, "edit template", Capabilities::can_manage_templates)?;
        self.store.update_template(template)?;
        self.store.append_log(&ActivityLogEntry::new(
            Self::actor_id(actor),
            None,
            ActionType::TemplateUpdated,
            format!("Template '{}' updated", template.question),
            self.clock.now(),
        ))?;
        Ok(())
    }

    pub fn archive_template(&self, actor: Option<&UserRecord>, id: &str) -> DeskResult<()> {
        Self::require(actor, "archive template", Capabilities::can_manage_templates)?;
        let template = self.get_template(id)?;
        self.store.set_template_archived(id, true)?;
        self.store.append_log(&ActivityLogEntry::new(
            Self::actor_id(actor),
            None,
            ActionType::TemplateArchived,
            format!("Template '{}' archived", template.question),
            self.clock.now(),
        ))?;
        Ok(())
    }

    /// Brings an archived template back into rotation with a fresh usage
    /// counter.
    pub fn reactivate_template(
        &self,
        actor: Option<&UserRecord>,
        id: &str,
    ) -> DeskResult<TemplateRecord> {
        Self::require(
            actor,
            "reactivate template",
            Capabilities::can_manage_templates,
        )?;
        let template = self.get_template(id)?;
        self.store.set_template_archived(id, false)?;
        self.store.reset_template_usage(id)?;
        self.store.append_log(&ActivityLogEntry::new(
            Self::actor_id(actor),
            None,
            ActionType::TemplateReactivated,
            format!("Template '{}' reactivated", template.question),
            self.clock.now(),
        ))?;
        self.get_template(id)
    }

    // ── Users ──────────────────────────────────────────────────

    pub fn create_user(&self, actor: Option<&UserRecord>, new: NewUser) -> DeskResult<UserRecord> {
        Self::require(actor, "create user", Capabilities::can_manage_users)?;
        new.validate()?;
        let now = self.clock.now();
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            full_name: new.full_name,
            email: new.email,
            role: new.role,
            status: UserStatus::Active,
            permissions: new.permissions,
            created_at: now,
        };
        self.store.insert_user(&record)?;
        self.store.append_log(&ActivityLogEntry::new(
            Self::actor_id(actor),
            None,
            ActionType::UserCreated,
            format!("User {} ({}) created", record.full_name, record.email),
            now,
        ))?;
        Ok(record)
    }

    pub fn get_user(&self, id: &str) -> DeskResult<UserRecord> {
        self.store.get_user(id)?.ok_or_else(|| DeskError::NotFound {
            entity: "user",
            id: id.to_string(),
        })
    }

    pub fn list_users(&self) -> DeskResult<Vec<UserRecord>> {
        self.store.list_users()
    }

    pub fn update_user(
        &self,
        actor: Option<&UserRecord>,
        id: &str,
        update: UserUpdate,
    ) -> DeskResult<UserRecord> {
        let mut user = self.get_user(id)?;
        if let Some(acting) = actor {
            if !user.may_be_modified_by(acting) {
                return Err(DeskError::Forbidden {
                    action: "modify user",
                });
            }
        }
        if let Some(full_name) = update.full_name {
            user.full_name = full_name;
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(status) = update.status {
            user.status = status;
        }
        if let Some(permissions) = update.permissions {
            user.permissions = permissions;
        }
        self.store.update_user(&user)?;
        self.store.append_log(&ActivityLogEntry::new(
            Self::actor_id(actor),
            None,
            ActionType::UserUpdated,
            format!("User {} updated", user.full_name),
            self.clock.now(),
        ))?;
        Ok(user)
    }

    // ── Activity log ───────────────────────────────────────────

    pub fn activity(&self, query: &LogQuery) -> DeskResult<Vec<ActivityLogEntry>> {
        self.store.query_logs(query)
    }

    /// Wipes the activity log. Super-admin only.
    pub fn purge_logs(&self, actor: Option<&UserRecord>) -> DeskResult<u32> {
        Self::require(actor, "purge activity log", Capabilities::can_purge_logs)?;
        let removed = self.store.purge_logs()?;
        self.store.append_log(&ActivityLogEntry::new(
            Self::actor_id(actor),
            None,
            ActionType::LogsPurged,
            format!("Activity log purged ({removed} entries removed)"),
            self.clock.now(),
        ))?;
        Ok(removed)
    }

    // ── Notifications ──────────────────────────────────────────

    /// Send a free-form announcement through the gateway.
    pub fn announce(&self, message: &str, chat_id: Option<&str>) -> DeskResult<()> {
        self.gateway.send(message, chat_id)?;
        Ok(())
    }

    /// Resolve a chat id to its display title, catching misconfigured
    /// target channels before anything is sent to them.
    pub fn verify_chat(&self, chat_id: &str) -> DeskResult<String> {
        Ok(self.gateway.chat_title(chat_id)?)
    }
}
