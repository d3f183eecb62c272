//! Agent Desk core — competition lifecycle, bonus-balance bookkeeping,
//! periodic renewal, announcement templates, users, and an append-only
//! activity log for the partner desk.

pub mod activity_log;
pub mod agent_subsystem;
pub mod clock;
pub mod competition_subsystem;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod notifier;
pub mod rank;
pub mod renewal_subsystem;
pub mod store;
pub mod template_subsystem;
pub mod types;
pub mod user_subsystem;
