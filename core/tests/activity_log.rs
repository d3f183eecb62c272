//! Activity-log tests — append-on-mutation, filtering, pagination, and
//! the super-admin purge gate.

use agentdesk_core::{
    activity_log::{ActionType, LogQuery},
    agent_subsystem::{NewAgent, RenewalPeriod},
    competition_subsystem::{CompetitionDuration, CompetitionParams},
    engine::DeskEngine,
    error::DeskError,
    rank::{AgentRank, Classification},
    user_subsystem::{NewUser, Permissions, Role},
};
use chrono::{TimeZone, Utc};

fn desk() -> DeskEngine {
    let (engine, _clock, _gateway) =
        DeskEngine::build_test(Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()).unwrap();
    engine
}

fn onboard(engine: &DeskEngine, code: &str) -> String {
    engine
        .create_agent(
            None,
            NewAgent {
                agent_code: code.into(),
                name: format!("Agent {code}"),
                classification: Classification::A,
                rank: AgentRank::Gold,
                renewal_period: RenewalPeriod::None,
                audit_days: vec![],
                chat_id: None,
            },
        )
        .unwrap()
        .id
}

fn params(name: &str) -> CompetitionParams {
    CompetitionParams {
        name: name.into(),
        template_id: None,
        correct_answer: None,
        duration: CompetitionDuration::OneDay,
        winners_count: 1,
        prize_per_winner: 10.0,
        deposit_winners_count: 0,
        chat_id: None,
    }
}

/// Every mutating operation leaves exactly one trace.
#[test]
fn mutations_append_entries() {
    let engine = desk();
    let agent_id = onboard(&engine, "AG-1");
    let outcome = engine
        .create_competition(None, &agent_id, params("Q1"))
        .unwrap();
    engine
        .delete_competition(None, &outcome.competition.id)
        .unwrap();

    let entries = engine.activity(&LogQuery::default()).unwrap();
    let kinds: Vec<ActionType> = entries.iter().map(|e| e.action_type).collect();
    // Newest first.
    assert_eq!(
        kinds,
        vec![
            ActionType::CompetitionDeleted,
            ActionType::CompetitionCreated,
            ActionType::AgentCreated,
        ]
    );
    // System-initiated: no actor recorded.
    assert!(entries.iter().all(|e| e.actor_user_id.is_none()));
    // Agent-scoped entries carry the agent id.
    assert!(entries.iter().all(|e| e.target_agent_id.as_deref() == Some(agent_id.as_str())));
}

/// Acting as a signed-in user stamps the actor onto each entry.
#[test]
fn actor_recorded_on_entries() {
    let engine = desk();
    let admin = engine
        .create_user(
            None,
            NewUser {
                full_name: "Admin".into(),
                email: "a@desk.io".into(),
                role: Role::Admin,
                permissions: Permissions::default(),
            },
        )
        .unwrap();
    let agent_id = engine
        .create_agent(
            Some(&admin),
            NewAgent {
                agent_code: "AG-9".into(),
                name: "Agent".into(),
                classification: Classification::B,
                rank: AgentRank::Growth,
                renewal_period: RenewalPeriod::None,
                audit_days: vec![],
                chat_id: None,
            },
        )
        .unwrap()
        .id;

    let entries = engine
        .activity(&LogQuery {
            action_type: Some(ActionType::AgentCreated),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor_user_id.as_deref(), Some(admin.id.as_str()));
    assert_eq!(entries[0].target_agent_id.as_deref(), Some(agent_id.as_str()));
}

/// Filters narrow by action type and agent; pagination slices the newest
/// entries first.
#[test]
fn filtering_and_pagination() {
    let engine = desk();
    let a1 = onboard(&engine, "AG-1");
    let a2 = onboard(&engine, "AG-2");
    for i in 0..5 {
        engine
            .create_competition(None, &a1, params(&format!("Q{i}")))
            .unwrap();
    }
    engine.create_competition(None, &a2, params("other")).unwrap();

    let created = engine
        .activity(&LogQuery {
            action_type: Some(ActionType::CompetitionCreated),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(created.len(), 6);

    let for_a2 = engine
        .activity(&LogQuery {
            action_type: Some(ActionType::CompetitionCreated),
            target_agent_id: Some(a2.clone()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(for_a2.len(), 1);

    let page1 = engine
        .activity(&LogQuery {
            action_type: Some(ActionType::CompetitionCreated),
            limit: Some(4),
            ..Default::default()
        })
        .unwrap();
    let page2 = engine
        .activity(&LogQuery {
            action_type: Some(ActionType::CompetitionCreated),
            limit: Some(4),
            offset: 4,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page1.len(), 4);
    assert_eq!(page2.len(), 2);
    // Pages never overlap.
    let ids1: Vec<_> = page1.iter().map(|e| e.id).collect();
    assert!(page2.iter().all(|e| !ids1.contains(&e.id)));
}

/// Metadata survives the round trip as structured JSON.
#[test]
fn metadata_round_trips() {
    let engine = desk();
    let agent_id = onboard(&engine, "AG-1");
    engine
        .create_competition(None, &agent_id, params("Q1"))
        .unwrap();

    let entries = engine
        .activity(&LogQuery {
            action_type: Some(ActionType::CompetitionCreated),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(entries[0].metadata["total_cost"], 10.0);
}

/// Purging requires the super-admin capability and leaves a single fresh
/// purge entry behind.
#[test]
fn purge_gate_and_trace() {
    let engine = desk();
    onboard(&engine, "AG-1");

    let admin = engine
        .create_user(
            None,
            NewUser {
                full_name: "Admin".into(),
                email: "a@desk.io".into(),
                role: Role::Admin,
                permissions: Permissions::default(),
            },
        )
        .unwrap();
    let sa = engine
        .create_user(
            None,
            NewUser {
                full_name: "Head".into(),
                email: "sa@desk.io".into(),
                role: Role::SuperAdmin,
                permissions: Permissions::default(),
            },
        )
        .unwrap();

    let err = engine.purge_logs(Some(&admin)).unwrap_err();
    assert!(matches!(err, DeskError::Forbidden { .. }));

    let removed = engine.purge_logs(Some(&sa)).unwrap();
    assert!(removed >= 3, "agent + two user creations, got {removed}");

    let entries = engine.activity(&LogQuery::default()).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action_type, ActionType::LogsPurged);
    assert_eq!(entries[0].actor_user_id.as_deref(), Some(sa.id.as_str()));
}
