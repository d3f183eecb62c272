//! Competition lifecycle tests — creation, deadlines, stats, archival,
//! deletion, and the debit-then-announce sequence.

use agentdesk_core::{
    agent_subsystem::{NewAgent, RenewalPeriod},
    clock::{Clock, FixedClock},
    competition_subsystem::{
        winner_selection_date, CompetitionDuration, CompetitionFilter, CompetitionParams,
        CompetitionStatus,
    },
    engine::DeskEngine,
    error::DeskError,
    notifier::RecordingGateway,
    rank::{AgentRank, Classification},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

fn start() -> DateTime<Utc> {
    // 10:00 UTC is 13:00 local, mid-day in the desk's operating region.
    Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
}

fn desk() -> (DeskEngine, Arc<FixedClock>, Arc<RecordingGateway>) {
    DeskEngine::build_test(start()).unwrap()
}

fn onboard(engine: &DeskEngine, code: &str, rank: AgentRank) -> String {
    engine
        .create_agent(
            None,
            NewAgent {
                agent_code: code.into(),
                name: format!("Agent {code}"),
                classification: Classification::A,
                rank,
                renewal_period: RenewalPeriod::None,
                audit_days: vec![],
                chat_id: Some("-100123".into()),
            },
        )
        .unwrap()
        .id
}

fn params(name: &str, winners: i64, prize: f64) -> CompetitionParams {
    CompetitionParams {
        name: name.into(),
        template_id: None,
        correct_answer: Some("42".into()),
        duration: CompetitionDuration::OneDay,
        winners_count: winners,
        prize_per_winner: prize,
        deposit_winners_count: 0,
        chat_id: None,
    }
}

/// An agent with remaining balance 100 creates a 2x40 competition: cost 80,
/// balance drops to 20, and the announcement goes out.
#[test]
fn creation_debits_agent_and_announces() {
    let (engine, _clock, gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Growth); // bonus 100

    let outcome = engine
        .create_competition(None, &agent_id, params("Q1", 2, 40.0))
        .unwrap();
    assert_eq!(outcome.competition.total_cost, 80.0);
    assert_eq!(outcome.competition.status, CompetitionStatus::Sent);
    assert!(outcome.send_error.is_none());

    let agent = engine.get_agent(&agent_id).unwrap();
    assert_eq!(agent.remaining_balance, 20.0);
    assert_eq!(agent.consumed_balance, 80.0);

    let sent = gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.as_deref(), Some("-100123"));
}

/// A cost above the remaining balance fails before any mutation: the
/// balance stays put and nothing is announced.
#[test]
fn insufficient_balance_aborts_without_mutation() {
    let (engine, _clock, gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Growth);

    engine
        .create_competition(None, &agent_id, params("Q1", 2, 40.0))
        .unwrap();

    // Remaining is now 20; a 1x50 competition must be rejected.
    let err = engine
        .create_competition(None, &agent_id, params("Q2", 1, 50.0))
        .unwrap_err();
    assert!(
        matches!(err, DeskError::InsufficientBalance { required, available }
            if required == 50.0 && available == 20.0),
        "unexpected error: {err:?}"
    );

    let agent = engine.get_agent(&agent_id).unwrap();
    assert_eq!(agent.remaining_balance, 20.0, "balance must be unchanged");
    assert_eq!(gateway.sent().len(), 1, "no second announcement");
    assert_eq!(
        engine
            .list_competitions(&CompetitionFilter::default())
            .unwrap()
            .len(),
        1
    );
}

/// Spending the balance exactly to zero is allowed.
#[test]
fn exact_balance_spend_succeeds() {
    let (engine, _clock, _gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Growth);

    engine
        .create_competition(None, &agent_id, params("Q1", 2, 50.0))
        .unwrap();
    let agent = engine.get_agent(&agent_id).unwrap();
    assert_eq!(agent.remaining_balance, 0.0);
}

/// A deposit-winner count above the remaining deposit bonus is rejected.
#[test]
fn insufficient_deposit_bonus_rejected() {
    let (engine, _clock, _gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Growth); // deposit count 2

    let mut p = params("Q1", 0, 0.0);
    p.deposit_winners_count = 3;
    let err = engine.create_competition(None, &agent_id, p).unwrap_err();
    assert!(matches!(err, DeskError::InsufficientDepositBonus { .. }));
}

/// The deadline lands at the start of the local day after the duration
/// ends, expressed in UTC.
#[test]
fn winner_selection_date_respects_local_midnight() {
    // 2024-03-04 10:00 UTC = 13:00 local (UTC+3); local day start is
    // 2024-03-03 21:00 UTC.
    let now = start();
    let one_day = winner_selection_date(now, CompetitionDuration::OneDay);
    assert_eq!(one_day, Utc.with_ymd_and_hms(2024, 3, 5, 21, 0, 0).unwrap());

    let two_days = winner_selection_date(now, CompetitionDuration::TwoDays);
    assert_eq!(two_days, Utc.with_ymd_and_hms(2024, 3, 6, 21, 0, 0).unwrap());

    let one_week = winner_selection_date(now, CompetitionDuration::OneWeek);
    assert_eq!(one_week, Utc.with_ymd_and_hms(2024, 3, 11, 21, 0, 0).unwrap());
}

/// Once the deadline passes, refresh persists the awaiting-winners
/// transition.
#[test]
fn refresh_moves_overdue_competitions_to_awaiting() {
    let (engine, clock, _gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Growth);
    let outcome = engine
        .create_competition(None, &agent_id, params("Q1", 1, 10.0))
        .unwrap();

    // Not yet due: nothing moves.
    assert_eq!(engine.refresh_competition_statuses().unwrap(), 0);

    clock.advance(Duration::days(3));
    assert_eq!(engine.refresh_competition_statuses().unwrap(), 1);

    let competition = engine.get_competition(&outcome.competition.id).unwrap();
    assert_eq!(competition.status, CompetitionStatus::AwaitingWinners);

    // Idempotent: a second refresh moves nothing.
    assert_eq!(engine.refresh_competition_statuses().unwrap(), 0);
}

/// The derivation fallback agrees with the persisted transition.
#[test]
fn awaiting_winners_derivation_fallback() {
    let (engine, clock, _gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Growth);
    let outcome = engine
        .create_competition(None, &agent_id, params("Q1", 1, 10.0))
        .unwrap();

    let competition = engine.get_competition(&outcome.competition.id).unwrap();
    assert!(!competition.is_awaiting_winners(clock.now()));
    clock.advance(Duration::days(3));
    assert!(competition.is_awaiting_winners(clock.now()));
}

/// Recording final stats completes the competition and stamps
/// processed_at.
#[test]
fn record_final_stats_completes() {
    let (engine, clock, _gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Growth);
    let outcome = engine
        .create_competition(None, &agent_id, params("Q1", 1, 10.0))
        .unwrap();
    clock.advance(Duration::days(3));
    engine.refresh_competition_statuses().unwrap();

    let competition = engine
        .record_final_stats(None, &outcome.competition.id, 1200, 85, 40)
        .unwrap();
    assert_eq!(competition.status, CompetitionStatus::Completed);
    assert_eq!(competition.views_count, 1200);
    assert_eq!(competition.reactions_count, 85);
    assert_eq!(competition.participants_count, 40);
    assert!(competition.processed_at.is_some());
    assert!(competition.is_compliant());
}

/// Negative stats are rejected and the competition stays awaiting.
#[test]
fn negative_stats_rejected_state_unchanged() {
    let (engine, clock, _gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Growth);
    let outcome = engine
        .create_competition(None, &agent_id, params("Q1", 1, 10.0))
        .unwrap();
    clock.advance(Duration::days(3));
    engine.refresh_competition_statuses().unwrap();

    let err = engine
        .record_final_stats(None, &outcome.competition.id, -1, 0, 0)
        .unwrap_err();
    assert!(matches!(err, DeskError::Validation(_)));

    let competition = engine.get_competition(&outcome.competition.id).unwrap();
    assert_eq!(competition.status, CompetitionStatus::AwaitingWinners);
    assert!(competition.processed_at.is_none());
}

/// Hard delete never restores the debited balance.
#[test]
fn delete_does_not_refund() {
    let (engine, _clock, _gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Growth);
    let outcome = engine
        .create_competition(None, &agent_id, params("Q1", 2, 40.0))
        .unwrap();

    engine
        .delete_competition(None, &outcome.competition.id)
        .unwrap();
    assert!(matches!(
        engine.get_competition(&outcome.competition.id),
        Err(DeskError::NotFound { .. })
    ));

    let agent = engine.get_agent(&agent_id).unwrap();
    assert_eq!(agent.remaining_balance, 20.0, "debit must stand after delete");
}

/// Archival is a side branch; unarchiving resumes at the stage the
/// competition's facts imply.
#[test]
fn archive_and_unarchive_roundtrip() {
    let (engine, clock, _gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Growth);
    let outcome = engine
        .create_competition(None, &agent_id, params("Q1", 1, 10.0))
        .unwrap();

    engine
        .archive_competition(None, &outcome.competition.id)
        .unwrap();
    let archived = engine.get_competition(&outcome.competition.id).unwrap();
    assert_eq!(archived.status, CompetitionStatus::Archived);

    // Still before the deadline: resumes as active.
    let resumed = engine
        .unarchive_competition(None, &outcome.competition.id)
        .unwrap();
    assert_eq!(resumed.status, CompetitionStatus::Active);

    // Past the deadline it resumes as awaiting winners instead.
    engine
        .archive_competition(None, &outcome.competition.id)
        .unwrap();
    clock.advance(Duration::days(3));
    let resumed = engine
        .unarchive_competition(None, &outcome.competition.id)
        .unwrap();
    assert_eq!(resumed.status, CompetitionStatus::AwaitingWinners);
}

/// A completed competition cannot be archived.
#[test]
fn terminal_states_reject_archive() {
    let (engine, clock, _gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Growth);
    let outcome = engine
        .create_competition(None, &agent_id, params("Q1", 1, 10.0))
        .unwrap();
    clock.advance(Duration::days(3));
    engine
        .record_final_stats(None, &outcome.competition.id, 1, 1, 1)
        .unwrap();

    let err = engine
        .archive_competition(None, &outcome.competition.id)
        .unwrap_err();
    assert!(matches!(err, DeskError::Validation(_)));
}

/// Bulk operations are best effort: bad ids are counted, good ids still
/// go through.
#[test]
fn bulk_operations_are_best_effort() {
    let (engine, _clock, _gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Gold); // bonus 300
    let a = engine
        .create_competition(None, &agent_id, params("Q1", 1, 10.0))
        .unwrap();
    let b = engine
        .create_competition(None, &agent_id, params("Q2", 1, 10.0))
        .unwrap();

    let ids = vec![
        a.competition.id.clone(),
        "missing-id".to_string(),
        b.competition.id.clone(),
    ];
    let outcome = engine.bulk_archive_competitions(None, &ids).unwrap();
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failed, 1);

    let outcome = engine.bulk_delete_competitions(None, &ids).unwrap();
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failed, 1);
    assert!(engine
        .list_competitions(&CompetitionFilter::default())
        .unwrap()
        .is_empty());
}

/// A failed announcement never rolls the debit back; the error rides
/// along in the outcome instead.
#[test]
fn failed_send_leaves_debit_standing() {
    let (engine, _clock, gateway) = desk();
    let agent_id = onboard(&engine, "AG-1", AgentRank::Growth);

    gateway.fail_next("network down");
    let outcome = engine
        .create_competition(None, &agent_id, params("Q1", 2, 40.0))
        .unwrap();
    assert!(outcome.send_error.is_some());

    let agent = engine.get_agent(&agent_id).unwrap();
    assert_eq!(agent.remaining_balance, 20.0, "debit stands despite send failure");
    assert!(
        engine.get_competition(&outcome.competition.id).is_ok(),
        "competition persists despite send failure"
    );
}

/// Listing filters by agent, status, exclusion, and name substring.
#[test]
fn listing_filters() {
    let (engine, _clock, _gateway) = desk();
    let a1 = onboard(&engine, "AG-1", AgentRank::Gold);
    let a2 = onboard(&engine, "AG-2", AgentRank::Gold);
    engine
        .create_competition(None, &a1, params("gold rush", 1, 10.0))
        .unwrap();
    let c2 = engine
        .create_competition(None, &a2, params("silver lining", 1, 10.0))
        .unwrap();
    engine.archive_competition(None, &c2.competition.id).unwrap();

    let by_agent = engine
        .list_competitions(&CompetitionFilter {
            agent_id: Some(a1.clone()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_agent.len(), 1);

    let active_only = engine
        .list_competitions(&CompetitionFilter {
            exclude_status: Some(CompetitionStatus::Archived),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(active_only.len(), 1);

    let by_name = engine
        .list_competitions(&CompetitionFilter {
            search: Some("silver".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].name, "silver lining");
}
