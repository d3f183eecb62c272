//! desk-runner: headless operator console for Agent Desk.
//!
//! Usage:
//!   desk-runner --db desk.db --seed-demo
//!   desk-runner --db desk.db --ipc-mode

use anyhow::Result;
use agentdesk_core::{
    agent_subsystem::{NewAgent, RenewalPeriod},
    competition_subsystem::{CompetitionDuration, CompetitionFilter, CompetitionParams},
    engine::DeskEngine,
    notifier::NullGateway,
    rank::{AgentRank, Classification},
    template_subsystem::{NewTemplate, TemplateClassification},
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    RefreshStatuses,
    CreateCompetition {
        agent_code: String,
        name: String,
        duration: String,
        winners_count: i64,
        prize_per_winner: f64,
        #[serde(default)]
        deposit_winners_count: i64,
    },
    RecordStats {
        competition_id: String,
        views: i64,
        reactions: i64,
        participants: i64,
    },
    Renew {
        agent_code: String,
    },
    RenewAll,
    Quit,
}

#[derive(serde::Serialize)]
struct DeskState {
    agents: i64,
    competitions_by_status: Vec<(String, i64)>,
    log_entries: i64,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let seed_demo = args.iter().any(|a| a == "--seed-demo");
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");

    if !ipc_mode {
        println!("Agent Desk — desk-runner");
        println!("  db: {db}");
        println!();
    }

    let engine = if db == ":memory:" {
        DeskEngine::in_memory()?
    } else {
        DeskEngine::open(db, Box::new(NullGateway))?
    };

    if seed_demo {
        seed_demo_data(&engine)?;
    }

    if ipc_mode {
        run_ipc_loop(&engine)?;
    } else {
        engine.refresh_competition_statuses()?;
        print_summary(&engine)?;
    }

    Ok(())
}

fn run_ipc_loop(engine: &DeskEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let response = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => state_json(engine),
            IpcCommand::RefreshStatuses => engine
                .refresh_competition_statuses()
                .map(|moved| serde_json::json!({ "moved": moved }))
                .unwrap_or_else(error_json),
            IpcCommand::CreateCompetition {
                agent_code,
                name,
                duration,
                winners_count,
                prize_per_winner,
                deposit_winners_count,
            } => create_competition(
                engine,
                &agent_code,
                name,
                &duration,
                winners_count,
                prize_per_winner,
                deposit_winners_count,
            ),
            IpcCommand::RecordStats {
                competition_id,
                views,
                reactions,
                participants,
            } => engine
                .record_final_stats(None, &competition_id, views, reactions, participants)
                .map(|c| serde_json::json!({ "status": c.status.as_str() }))
                .unwrap_or_else(error_json),
            IpcCommand::Renew { agent_code } => engine
                .get_agent_by_code(&agent_code)
                .and_then(|a| engine.renew_agent(None, &a.id))
                .map(|a| serde_json::json!({ "remaining_balance": a.remaining_balance }))
                .unwrap_or_else(error_json),
            IpcCommand::RenewAll => engine
                .renew_all_agents(None)
                .map(|o| {
                    serde_json::json!({
                        "renewed": o.renewed, "skipped": o.skipped, "failed": o.failed
                    })
                })
                .unwrap_or_else(error_json),
        };

        writeln!(stdout, "{}", response)?;
        stdout.flush()?;
    }
    Ok(())
}

fn create_competition(
    engine: &DeskEngine,
    agent_code: &str,
    name: String,
    duration: &str,
    winners_count: i64,
    prize_per_winner: f64,
    deposit_winners_count: i64,
) -> serde_json::Value {
    let Some(duration) = CompetitionDuration::parse(duration) else {
        return serde_json::json!({ "error": format!("invalid duration '{duration}'") });
    };
    let result = engine.get_agent_by_code(agent_code).and_then(|agent| {
        engine.create_competition(
            None,
            &agent.id,
            CompetitionParams {
                name,
                template_id: None,
                correct_answer: None,
                duration,
                winners_count,
                prize_per_winner,
                deposit_winners_count,
                chat_id: None,
            },
        )
    });
    match result {
        Ok(outcome) => serde_json::json!({
            "competition_id": outcome.competition.id,
            "total_cost": outcome.competition.total_cost,
            "ends_at": outcome.competition.ends_at.to_rfc3339(),
            "send_error": outcome.send_error.map(|e| e.to_string()),
        }),
        Err(e) => error_json(e),
    }
}

fn state_json(engine: &DeskEngine) -> serde_json::Value {
    match build_state(engine) {
        Ok(state) => serde_json::to_value(state)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() })),
        Err(e) => error_json(e),
    }
}

fn build_state(engine: &DeskEngine) -> agentdesk_core::error::DeskResult<DeskState> {
    Ok(DeskState {
        agents: engine.store().agent_count()?,
        competitions_by_status: engine.store().competition_counts_by_status()?,
        log_entries: engine.store().log_count()?,
    })
}

fn error_json(e: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({ "error": e.to_string() })
}

fn print_summary(engine: &DeskEngine) -> Result<()> {
    println!("=== DESK SUMMARY ===");
    println!("  time: {}", engine.now().to_rfc3339());
    let agents = engine.list_agents()?;
    println!("  agents: {}", agents.len());
    for agent in &agents {
        println!(
            "    {} [{}] rank={} remaining={:.2} deposit_remaining={:.0}",
            agent.agent_code,
            agent.classification.as_str(),
            agent.rank.as_str(),
            agent.remaining_balance,
            agent.remaining_deposit_bonus,
        );
    }

    println!();
    println!("  competitions:");
    let by_status = engine.store().competition_counts_by_status()?;
    if by_status.is_empty() {
        println!("    (none)");
    } else {
        for (status, count) in &by_status {
            println!("    {status}: {count}");
        }
    }

    let recent = engine.activity(&agentdesk_core::activity_log::LogQuery {
        limit: Some(5),
        ..Default::default()
    })?;
    println!();
    println!("  recent activity:");
    if recent.is_empty() {
        println!("    (none)");
    } else {
        for entry in &recent {
            println!(
                "    [{}] {}",
                entry.action_type.as_str(),
                entry.description
            );
        }
    }

    let open = engine.list_competitions(&CompetitionFilter {
        status: Some(agentdesk_core::competition_subsystem::CompetitionStatus::AwaitingWinners),
        ..Default::default()
    })?;
    if !open.is_empty() {
        println!();
        println!("  awaiting winners:");
        for c in &open {
            println!("    {} '{}' ended {}", c.id, c.name, c.ends_at);
        }
    }
    Ok(())
}

fn seed_demo_data(engine: &DeskEngine) -> Result<()> {
    let demo_agents = [
        ("AG-1001", "Falcon Trading", Classification::A, AgentRank::Gold),
        ("AG-1002", "North Star", Classification::B, AgentRank::Growth),
        ("AG-1003", "Blue Harbor", Classification::R, AgentRank::ExclusiveUnranked),
    ];
    for (code, name, classification, rank) in demo_agents {
        if engine.store().agent_code_exists(code)? {
            continue;
        }
        engine.create_agent(
            None,
            NewAgent {
                agent_code: code.to_string(),
                name: name.to_string(),
                classification,
                rank,
                renewal_period: RenewalPeriod::Weekly,
                audit_days: vec![1, 4],
                chat_id: None,
            },
        )?;
    }

    if engine.list_templates(true)?.is_empty() {
        engine.create_template(
            None,
            NewTemplate {
                question: "Guess the closing price".to_string(),
                content: "{question}\nPrize: {prize} for each of {winners} winners!".to_string(),
                classification: TemplateClassification::All,
                correct_answer: "42".to_string(),
                usage_limit: Some(10),
            },
        )?;
    }
    log::info!("demo data seeded");
    Ok(())
}
