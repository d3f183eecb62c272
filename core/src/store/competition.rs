//! Competition database queries.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, ToSql};

use super::{bad_column, fmt_ts, param_refs, parse_opt_ts, parse_ts, DeskStore};
use crate::{
    competition_subsystem::{
        CompetitionDuration, CompetitionFilter, CompetitionRecord, CompetitionStatus,
    },
    error::DeskResult,
};

const COMPETITION_SELECT: &str = "SELECT id, agent_id, name, template_id, correct_answer,
        status, duration, winners_count, prize_per_winner, total_cost,
        deposit_winners_count, ends_at, views_count, reactions_count,
        participants_count, processed_at, created_at
 FROM competitions";

impl DeskStore {
    pub fn insert_competition(&self, c: &CompetitionRecord) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO competitions (
                id, agent_id, name, template_id, correct_answer,
                status, duration, winners_count, prize_per_winner, total_cost,
                deposit_winners_count, ends_at, views_count, reactions_count,
                participants_count, processed_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                &c.id,
                &c.agent_id,
                &c.name,
                c.template_id.as_deref(),
                c.correct_answer.as_deref(),
                c.status.as_str(),
                c.duration.code(),
                c.winners_count,
                c.prize_per_winner,
                c.total_cost,
                c.deposit_winners_count,
                fmt_ts(c.ends_at),
                c.views_count,
                c.reactions_count,
                c.participants_count,
                c.processed_at.map(fmt_ts),
                fmt_ts(c.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_competition(&self, id: &str) -> DeskResult<Option<CompetitionRecord>> {
        let result = self
            .conn
            .query_row(
                &format!("{COMPETITION_SELECT} WHERE id = ?1"),
                params![id],
                competition_row_mapper,
            )
            .optional()?;
        Ok(result)
    }

    pub fn list_competitions(
        &self,
        filter: &CompetitionFilter,
    ) -> DeskResult<Vec<CompetitionRecord>> {
        let mut sql = format!("{COMPETITION_SELECT} WHERE 1=1");
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(agent_id) = &filter.agent_id {
            sql.push_str(" AND agent_id = ?");
            args.push(Box::new(agent_id.clone()));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            args.push(Box::new(status.as_str()));
        }
        if let Some(excluded) = filter.exclude_status {
            sql.push_str(" AND status != ?");
            args.push(Box::new(excluded.as_str()));
        }
        if let Some(search) = &filter.search {
            sql.push_str(" AND name LIKE ?");
            args.push(Box::new(format!("%{search}%")));
        }
        sql.push_str(" ORDER BY created_at DESC");
        sql.push_str(" LIMIT ? OFFSET ?");
        args.push(Box::new(filter.limit.map(i64::from).unwrap_or(-1)));
        args.push(Box::new(filter.offset as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs(&args).as_slice(), competition_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn update_competition_status(
        &self,
        id: &str,
        status: CompetitionStatus,
    ) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE competitions SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(())
    }

    /// Live competitions whose deadline passed without recorded stats are
    /// moved to awaiting_winners. Returns `(id, agent_id)` of every
    /// competition that moved.
    pub fn mark_awaiting_winners(
        &self,
        now: DateTime<Utc>,
    ) -> DeskResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, agent_id FROM competitions
             WHERE status IN ('sent', 'active')
               AND ends_at <= ?1
               AND processed_at IS NULL",
        )?;
        let due: Vec<(String, String)> = stmt
            .query_map(params![fmt_ts(now)], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (id, _) in &due {
            self.conn.execute(
                "UPDATE competitions SET status = 'awaiting_winners' WHERE id = ?1",
                params![id],
            )?;
        }
        Ok(due)
    }

    pub fn set_final_stats(
        &self,
        id: &str,
        views: i64,
        reactions: i64,
        participants: i64,
        processed_at: DateTime<Utc>,
    ) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE competitions SET
                views_count = ?1, reactions_count = ?2, participants_count = ?3,
                processed_at = ?4, status = 'completed'
             WHERE id = ?5",
            params![views, reactions, participants, fmt_ts(processed_at), id],
        )?;
        Ok(())
    }

    pub fn delete_competition(&self, id: &str) -> DeskResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM competitions WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub fn competition_counts_by_status(&self) -> DeskResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM competitions GROUP BY status ORDER BY status",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn competition_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<CompetitionRecord> {
    let status: String = row.get(5)?;
    let duration: String = row.get(6)?;
    Ok(CompetitionRecord {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        name: row.get(2)?,
        template_id: row.get(3)?,
        correct_answer: row.get(4)?,
        status: CompetitionStatus::parse(&status)
            .ok_or_else(|| bad_column(5, format!("unknown status '{status}'")))?,
        duration: CompetitionDuration::parse(&duration)
            .ok_or_else(|| bad_column(6, format!("unknown duration '{duration}'")))?,
        winners_count: row.get(7)?,
        prize_per_winner: row.get(8)?,
        total_cost: row.get(9)?,
        deposit_winners_count: row.get(10)?,
        ends_at: parse_ts(11, row.get(11)?)?,
        views_count: row.get(12)?,
        reactions_count: row.get(13)?,
        participants_count: row.get(14)?,
        processed_at: parse_opt_ts(15, row.get(15)?)?,
        created_at: parse_ts(16, row.get(16)?)?,
    })
}
