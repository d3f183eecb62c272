//! Desk users, roles, and capabilities.
//!
//! Raw permission flags are stored per user; desk code never inspects the
//! flags directly. A `Capabilities` view is evaluated once per request and
//! consulted through named predicates, so the rules for who may do what
//! live in exactly one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{DeskError, DeskResult},
    types::EntityId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(UserStatus::Active),
            "inactive" => Some(UserStatus::Inactive),
            _ => None,
        }
    }
}

/// Tri-state access to a managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    None,
    View,
    Full,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentPermissions {
    #[serde(default)]
    pub view_financials: bool,
    #[serde(default)]
    pub edit_profile: bool,
    #[serde(default)]
    pub edit_financials: bool,
    #[serde(default)]
    pub view_competitions_tab: bool,
    #[serde(default)]
    pub renew_all_balances: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompetitionPermissions {
    #[serde(default)]
    pub manage_comps: AccessLevel,
    #[serde(default)]
    pub manage_templates: AccessLevel,
    #[serde(default)]
    pub can_create: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub agents: AgentPermissions,
    #[serde(default)]
    pub competitions: CompetitionPermissions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: EntityId,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub permissions: Permissions,
}

impl NewUser {
    pub fn validate(&self) -> DeskResult<()> {
        if self.full_name.trim().is_empty() {
            return Err(DeskError::Validation("full_name must not be empty".into()));
        }
        if !self.email.contains('@') {
            return Err(DeskError::Validation(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        Ok(())
    }
}

/// Partial edit of a user. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub permissions: Option<Permissions>,
}

/// Capability view of one user, evaluated once. Admins implicitly hold
/// every capability; purging logs additionally requires super-admin; an
/// inactive user holds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    view_financials: bool,
    edit_profile: bool,
    edit_financials: bool,
    view_competitions_tab: bool,
    renew_all_balances: bool,
    create_competition: bool,
    manage_competitions: bool,
    manage_templates: bool,
    manage_users: bool,
    purge_logs: bool,
}

impl Capabilities {
    pub fn can_view_financials(&self) -> bool {
        self.view_financials
    }
    pub fn can_edit_profile(&self) -> bool {
        self.edit_profile
    }
    pub fn can_edit_financials(&self) -> bool {
        self.edit_financials
    }
    pub fn can_view_competitions_tab(&self) -> bool {
        self.view_competitions_tab
    }
    pub fn can_renew_all_balances(&self) -> bool {
        self.renew_all_balances
    }
    pub fn can_create_competition(&self) -> bool {
        self.create_competition
    }
    pub fn can_manage_competitions(&self) -> bool {
        self.manage_competitions
    }
    pub fn can_manage_templates(&self) -> bool {
        self.manage_templates
    }
    pub fn can_manage_users(&self) -> bool {
        self.manage_users
    }
    pub fn can_purge_logs(&self) -> bool {
        self.purge_logs
    }
}

impl UserRecord {
    pub fn capabilities(&self) -> Capabilities {
        if self.status == UserStatus::Inactive {
            return Capabilities {
                view_financials: false,
                edit_profile: false,
                edit_financials: false,
                view_competitions_tab: false,
                renew_all_balances: false,
                create_competition: false,
                manage_competitions: false,
                manage_templates: false,
                manage_users: false,
                purge_logs: false,
            };
        }
        let admin = matches!(self.role, Role::Admin | Role::SuperAdmin);
        let p = &self.permissions;
        Capabilities {
            view_financials: admin || p.agents.view_financials,
            edit_profile: admin || p.agents.edit_profile,
            edit_financials: admin || p.agents.edit_financials,
            view_competitions_tab: admin || p.agents.view_competitions_tab,
            renew_all_balances: admin || p.agents.renew_all_balances,
            create_competition: admin || p.competitions.can_create,
            manage_competitions: admin || p.competitions.manage_comps == AccessLevel::Full,
            manage_templates: admin || p.competitions.manage_templates == AccessLevel::Full,
            manage_users: admin,
            purge_logs: self.role == Role::SuperAdmin,
        }
    }

    /// A super-admin account may only be modified by itself; everyone else
    /// may be modified by any user manager.
    pub fn may_be_modified_by(&self, actor: &UserRecord) -> bool {
        if self.role == Role::SuperAdmin {
            return self.id == actor.id;
        }
        actor.capabilities().can_manage_users()
    }
}
