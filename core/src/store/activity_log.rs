//! Activity-log database queries. Insert and read only; rows are never
//! updated.

use rusqlite::{params, ToSql};

use super::{bad_column, fmt_ts, param_refs, parse_ts, DeskStore};
use crate::{
    activity_log::{ActionType, ActivityLogEntry, LogQuery},
    error::DeskResult,
};

impl DeskStore {
    pub fn append_log(&self, entry: &ActivityLogEntry) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO activity_log (
                actor_user_id, target_agent_id, action_type, description, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.actor_user_id.as_deref(),
                entry.target_agent_id.as_deref(),
                entry.action_type.as_str(),
                &entry.description,
                entry.metadata.to_string(),
                fmt_ts(entry.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn query_logs(&self, query: &LogQuery) -> DeskResult<Vec<ActivityLogEntry>> {
        let mut sql = String::from(
            "SELECT id, actor_user_id, target_agent_id, action_type, description,
                    metadata, created_at
             FROM activity_log WHERE 1=1",
        );
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(action) = query.action_type {
            sql.push_str(" AND action_type = ?");
            args.push(Box::new(action.as_str()));
        }
        if let Some(actor) = &query.actor_user_id {
            sql.push_str(" AND actor_user_id = ?");
            args.push(Box::new(actor.clone()));
        }
        if let Some(agent) = &query.target_agent_id {
            sql.push_str(" AND target_agent_id = ?");
            args.push(Box::new(agent.clone()));
        }
        if let Some(since) = query.since {
            sql.push_str(" AND created_at >= ?");
            args.push(Box::new(fmt_ts(since)));
        }
        if let Some(until) = query.until {
            sql.push_str(" AND created_at <= ?");
            args.push(Box::new(fmt_ts(until)));
        }
        sql.push_str(" ORDER BY id DESC LIMIT ? OFFSET ?");
        args.push(Box::new(query.limit.map(i64::from).unwrap_or(-1)));
        args.push(Box::new(query.offset as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs(&args).as_slice(), log_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Deletes every entry. Returns how many were removed.
    pub fn purge_logs(&self) -> DeskResult<u32> {
        let removed = self.conn.execute("DELETE FROM activity_log", [])?;
        Ok(removed as u32)
    }

    pub fn log_count(&self) -> DeskResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM activity_log", [], |row| row.get(0))
            .map_err(Into::into)
    }
}

fn log_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActivityLogEntry> {
    let action: String = row.get(3)?;
    let metadata: String = row.get(5)?;
    Ok(ActivityLogEntry {
        id: Some(row.get(0)?),
        actor_user_id: row.get(1)?,
        target_agent_id: row.get(2)?,
        action_type: ActionType::parse(&action)
            .ok_or_else(|| bad_column(3, format!("unknown action type '{action}'")))?,
        description: row.get(4)?,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| bad_column(5, format!("bad metadata: {e}")))?,
        created_at: parse_ts(6, row.get(6)?)?,
    })
}
