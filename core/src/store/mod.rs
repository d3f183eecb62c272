//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database. Subsystems call store
//! methods — they never execute SQL directly.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};

use crate::{
    agent_subsystem::{AgentRecord, RenewalPeriod},
    error::{DeskError, DeskResult},
    rank::{AgentRank, Classification},
};

mod activity_log;
mod competition;
mod template;
mod user;

pub struct DeskStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl DeskStore {
    pub fn open(path: &str) -> DeskResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> DeskResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database. For in-memory
    /// databases this returns a fresh, isolated database.
    pub fn reopen(&self) -> DeskResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> DeskResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_competitions.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_templates.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_users.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/005_activity_log.sql"))?;
        Ok(())
    }

    // ── Agents ─────────────────────────────────────────────────

    pub fn insert_agent(&self, a: &AgentRecord) -> DeskResult<()> {
        self.conn
            .execute(
                "INSERT INTO agents (
                    id, agent_code, name, classification, rank,
                    competition_bonus, consumed_balance, remaining_balance,
                    deposit_bonus_percentage, deposit_bonus_count,
                    used_deposit_bonus, remaining_deposit_bonus,
                    renewal_period, last_renewal_date, audit_days, chat_id,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    &a.id,
                    &a.agent_code,
                    &a.name,
                    a.classification.as_str(),
                    a.rank.as_str(),
                    a.competition_bonus,
                    a.consumed_balance,
                    a.remaining_balance,
                    a.deposit_bonus_percentage,
                    a.deposit_bonus_count,
                    a.used_deposit_bonus,
                    a.remaining_deposit_bonus,
                    a.renewal_period.as_str(),
                    a.last_renewal_date.map(fmt_ts),
                    serde_json::to_string(&a.audit_days)?,
                    a.chat_id.as_deref(),
                    fmt_ts(a.created_at),
                    fmt_ts(a.updated_at),
                ],
            )
            .map_err(|e| map_conflict(e, &format!("agent code '{}'", a.agent_code)))?;
        Ok(())
    }

    pub fn get_agent(&self, id: &str) -> DeskResult<Option<AgentRecord>> {
        let result = self
            .conn
            .query_row(
                &format!("{AGENT_SELECT} WHERE id = ?1"),
                params![id],
                agent_row_mapper,
            )
            .optional()?;
        Ok(result)
    }

    pub fn get_agent_by_code(&self, agent_code: &str) -> DeskResult<Option<AgentRecord>> {
        let result = self
            .conn
            .query_row(
                &format!("{AGENT_SELECT} WHERE agent_code = ?1"),
                params![agent_code],
                agent_row_mapper,
            )
            .optional()?;
        Ok(result)
    }

    pub fn agent_code_exists(&self, agent_code: &str) -> DeskResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM agents WHERE agent_code = ?1",
            params![agent_code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list_agents(&self) -> DeskResult<Vec<AgentRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{AGENT_SELECT} ORDER BY agent_code ASC"))?;
        let rows = stmt.query_map([], agent_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Agents whose audit schedule includes the given weekday (0 = Sunday).
    pub fn agents_due_for_audit(&self, weekday: u8) -> DeskResult<Vec<AgentRecord>> {
        let agents = self.list_agents()?;
        Ok(agents
            .into_iter()
            .filter(|a| a.audit_days.contains(&weekday))
            .collect())
    }

    /// Full-row update of a mutable agent profile.
    pub fn update_agent(&self, a: &AgentRecord) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE agents SET
                name = ?1, classification = ?2, rank = ?3,
                competition_bonus = ?4, consumed_balance = ?5, remaining_balance = ?6,
                deposit_bonus_percentage = ?7, deposit_bonus_count = ?8,
                used_deposit_bonus = ?9, remaining_deposit_bonus = ?10,
                renewal_period = ?11, last_renewal_date = ?12,
                audit_days = ?13, chat_id = ?14, updated_at = ?15
             WHERE id = ?16",
            params![
                &a.name,
                a.classification.as_str(),
                a.rank.as_str(),
                a.competition_bonus,
                a.consumed_balance,
                a.remaining_balance,
                a.deposit_bonus_percentage,
                a.deposit_bonus_count,
                a.used_deposit_bonus,
                a.remaining_deposit_bonus,
                a.renewal_period.as_str(),
                a.last_renewal_date.map(fmt_ts),
                serde_json::to_string(&a.audit_days)?,
                a.chat_id.as_deref(),
                fmt_ts(a.updated_at),
                &a.id,
            ],
        )?;
        Ok(())
    }

    pub fn delete_agent(&self, id: &str) -> DeskResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM agents WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Charges a competition against the agent in one atomic update, so
    /// concurrent edits cannot lose the debit.
    pub fn debit_agent(
        &self,
        id: &str,
        total_cost: f64,
        deposit_uses: i64,
        now: DateTime<Utc>,
    ) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE agents SET
                consumed_balance = consumed_balance + ?1,
                remaining_balance = remaining_balance - ?1,
                used_deposit_bonus = used_deposit_bonus + ?2,
                remaining_deposit_bonus = remaining_deposit_bonus - ?2,
                updated_at = ?3
             WHERE id = ?4",
            params![total_cost, deposit_uses as f64, fmt_ts(now), id],
        )?;
        Ok(())
    }

    /// Resets both balance pairs to the rank totals and stamps the renewal
    /// date.
    pub fn renew_agent_balances(&self, id: &str, now: DateTime<Utc>) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE agents SET
                consumed_balance = 0,
                remaining_balance = competition_bonus,
                used_deposit_bonus = 0,
                remaining_deposit_bonus = COALESCE(deposit_bonus_count, 0),
                last_renewal_date = ?1,
                updated_at = ?1
             WHERE id = ?2",
            params![fmt_ts(now), id],
        )?;
        Ok(())
    }

    pub fn agent_count(&self) -> DeskResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM agents", [], |row| row.get(0))
            .map_err(Into::into)
    }
}

const AGENT_SELECT: &str = "SELECT id, agent_code, name, classification, rank,
        competition_bonus, consumed_balance, remaining_balance,
        deposit_bonus_percentage, deposit_bonus_count,
        used_deposit_bonus, remaining_deposit_bonus,
        renewal_period, last_renewal_date, audit_days, chat_id,
        created_at, updated_at
 FROM agents";

fn agent_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentRecord> {
    let classification: String = row.get(3)?;
    let rank: String = row.get(4)?;
    let renewal_period: String = row.get(12)?;
    let audit_days: String = row.get(14)?;
    Ok(AgentRecord {
        id: row.get(0)?,
        agent_code: row.get(1)?,
        name: row.get(2)?,
        classification: Classification::parse(&classification)
            .ok_or_else(|| bad_column(3, format!("unknown classification '{classification}'")))?,
        rank: AgentRank::parse(&rank)
            .ok_or_else(|| bad_column(4, format!("unknown rank '{rank}'")))?,
        competition_bonus: row.get(5)?,
        consumed_balance: row.get(6)?,
        remaining_balance: row.get(7)?,
        deposit_bonus_percentage: row.get(8)?,
        deposit_bonus_count: row.get(9)?,
        used_deposit_bonus: row.get(10)?,
        remaining_deposit_bonus: row.get(11)?,
        renewal_period: RenewalPeriod::parse(&renewal_period)
            .ok_or_else(|| bad_column(12, format!("unknown renewal period '{renewal_period}'")))?,
        last_renewal_date: parse_opt_ts(13, row.get(13)?)?,
        audit_days: serde_json::from_str(&audit_days)
            .map_err(|e| bad_column(14, format!("bad audit_days: {e}")))?,
        chat_id: row.get(15)?,
        created_at: parse_ts(16, row.get(16)?)?,
        updated_at: parse_ts(17, row.get(17)?)?,
    })
}

// ── Shared row-mapping helpers ─────────────────────────────────

/// Fixed-width UTC timestamp format so lexicographic comparison in SQL
/// matches chronological order.
pub(crate) fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| bad_column(idx, format!("bad timestamp '{raw}': {e}")))
}

pub(crate) fn parse_opt_ts(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|r| parse_ts(idx, r)).transpose()
}

pub(crate) fn bad_column(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn map_conflict(e: rusqlite::Error, what: &str) -> DeskError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DeskError::Conflict(format!("{what} already exists"))
        }
        _ => DeskError::Database(e),
    }
}

/// Turns a boxed parameter list into the slice form rusqlite expects.
pub(crate) fn param_refs(args: &[Box<dyn ToSql>]) -> Vec<&dyn ToSql> {
    args.iter().map(|a| a.as_ref()).collect()
}
