//! Bonus ledger tests — pure arithmetic, projections, and sufficiency.

use agentdesk_core::{
    agent_subsystem::{build_account, NewAgent, RenewalPeriod},
    error::DeskError,
    ledger,
    rank::{AgentRank, Classification},
};
use chrono::{TimeZone, Utc};

fn agent_with_rank(rank: AgentRank) -> agentdesk_core::agent_subsystem::AgentRecord {
    build_account(
        NewAgent {
            agent_code: "AG-1".into(),
            name: "Test Agent".into(),
            classification: Classification::A,
            rank,
            renewal_period: RenewalPeriod::None,
            audit_days: vec![],
            chat_id: None,
        },
        "agent-1".into(),
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
    )
}

/// Cost is exactly winners times prize, for any non-negative pair.
#[test]
fn creation_cost_is_exact_product() {
    assert_eq!(ledger::creation_cost(2, 40.0).unwrap(), 80.0);
    assert_eq!(ledger::creation_cost(0, 500.0).unwrap(), 0.0);
    assert_eq!(ledger::creation_cost(7, 0.0).unwrap(), 0.0);
    assert_eq!(ledger::creation_cost(3, 12.5).unwrap(), 37.5);
}

/// Negative inputs are rejected before any arithmetic happens.
#[test]
fn creation_cost_rejects_negative_inputs() {
    assert!(matches!(
        ledger::creation_cost(-1, 10.0),
        Err(DeskError::Validation(_))
    ));
    assert!(matches!(
        ledger::creation_cost(1, -10.0),
        Err(DeskError::Validation(_))
    ));
}

/// Projection subtracts without mutating the agent.
#[test]
fn projection_does_not_mutate() {
    let agent = agent_with_rank(AgentRank::Growth); // bonus 100, deposit count 2
    let projection = ledger::project_balances(&agent, 80.0, 1);
    assert_eq!(projection.remaining_balance, 20.0);
    assert_eq!(projection.remaining_deposit_bonus, 1.0);
    assert_eq!(agent.remaining_balance, 100.0);
    assert_eq!(agent.remaining_deposit_bonus, 2.0);
}

/// Exact equality passes: spending the balance down to zero is allowed.
#[test]
fn sufficiency_boundary_equality_passes() {
    let agent = agent_with_rank(AgentRank::Growth);
    let violations = ledger::validate_sufficiency(&agent, 100.0, 2);
    assert!(
        violations.is_empty(),
        "cost equal to remaining balance must pass, got {violations:?}"
    );
}

/// Zero-cost, zero-deposit-winner competitions are always valid.
#[test]
fn zero_cost_always_valid() {
    let agent = agent_with_rank(AgentRank::Beginning); // no deposit bonus at all
    let violations = ledger::validate_sufficiency(&agent, 0.0, 0);
    assert!(violations.is_empty());
}

/// Both constraints are reported together so the operator sees every
/// problem at once.
#[test]
fn all_violations_reported_at_once() {
    let agent = agent_with_rank(AgentRank::Beginning); // bonus 60, no deposit bonus
    let violations = ledger::validate_sufficiency(&agent, 100.0, 1);
    assert_eq!(violations.len(), 2, "expected both violations: {violations:?}");
}

/// A violation converts into the matching domain error.
#[test]
fn violation_converts_to_error() {
    let agent = agent_with_rank(AgentRank::Growth);
    let violations = ledger::validate_sufficiency(&agent, 150.0, 0);
    assert_eq!(violations.len(), 1);
    match DeskError::from(violations[0]) {
        DeskError::InsufficientBalance {
            required,
            available,
        } => {
            assert_eq!(required, 150.0);
            assert_eq!(available, 100.0);
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }
}

/// The rank table round-trips through account creation exactly.
#[test]
fn rank_defaults_round_trip() {
    let cases = [
        (AgentRank::Beginning, 60.0, None, None),
        (AgentRank::Growth, 100.0, Some(40.0), Some(2.0)),
        (AgentRank::Pro, 150.0, Some(50.0), Some(3.0)),
        (AgentRank::Elite, 200.0, Some(50.0), Some(4.0)),
        (AgentRank::Center, 300.0, None, None),
        (AgentRank::Bronze, 150.0, Some(40.0), Some(2.0)),
        (AgentRank::Silver, 230.0, Some(40.0), Some(3.0)),
        (AgentRank::Gold, 300.0, Some(50.0), Some(3.0)),
        (AgentRank::Platinum, 500.0, Some(60.0), Some(4.0)),
        (AgentRank::Diamond, 800.0, Some(75.0), Some(4.0)),
        (AgentRank::Sapphire, 1100.0, Some(85.0), Some(4.0)),
        (AgentRank::Emerald, 2000.0, Some(90.0), Some(4.0)),
        (AgentRank::King, 2500.0, Some(95.0), Some(4.0)),
    ];
    for (rank, bonus, pct, count) in cases {
        let defaults = ledger::rank_defaults(rank);
        assert_eq!(defaults.competition_bonus, bonus, "{rank:?}");
        assert_eq!(defaults.deposit_bonus_percentage, pct, "{rank:?}");
        assert_eq!(defaults.deposit_bonus_count, count, "{rank:?}");

        let agent = agent_with_rank(rank);
        assert_eq!(agent.competition_bonus, bonus, "{rank:?}");
        assert_eq!(agent.remaining_balance, bonus, "{rank:?}");
    }
}

/// Legend is unbounded on both the cash bonus and the deposit count.
#[test]
fn legend_rank_is_unbounded() {
    let defaults = ledger::rank_defaults(AgentRank::Legend);
    assert!(defaults.competition_bonus.is_infinite());
    assert_eq!(defaults.deposit_bonus_percentage, Some(100.0));
    assert!(defaults.deposit_bonus_count.unwrap().is_infinite());

    // No cost can exhaust an unbounded balance.
    let agent = agent_with_rank(AgentRank::Legend);
    let violations = ledger::validate_sufficiency(&agent, 1.0e12, 500);
    assert!(violations.is_empty());
}

/// The unranked exclusive agent always gets the fixed {60, none, none}
/// override, never a row from the tier table.
#[test]
fn exclusive_unranked_sentinel_defaults() {
    let defaults = ledger::rank_defaults(AgentRank::ExclusiveUnranked);
    assert_eq!(defaults.competition_bonus, 60.0);
    assert_eq!(defaults.deposit_bonus_percentage, None);
    assert_eq!(defaults.deposit_bonus_count, None);

    let agent = agent_with_rank(AgentRank::ExclusiveUnranked);
    assert_eq!(agent.remaining_balance, 60.0);
    assert_eq!(agent.remaining_deposit_bonus, 0.0);
}
