//! User database queries.

use rusqlite::{params, OptionalExtension};

use super::{bad_column, fmt_ts, map_conflict, parse_ts, DeskStore};
use crate::{
    error::DeskResult,
    user_subsystem::{Role, UserRecord, UserStatus},
};

const USER_SELECT: &str =
    "SELECT id, full_name, email, role, status, permissions, created_at FROM users";

impl DeskStore {
    pub fn insert_user(&self, u: &UserRecord) -> DeskResult<()> {
        self.conn
            .execute(
                "INSERT INTO users (id, full_name, email, role, status, permissions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    &u.id,
                    &u.full_name,
                    &u.email,
                    u.role.as_str(),
                    u.status.as_str(),
                    serde_json::to_string(&u.permissions)?,
                    fmt_ts(u.created_at),
                ],
            )
            .map_err(|e| map_conflict(e, &format!("user email '{}'", u.email)))?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> DeskResult<Option<UserRecord>> {
        let result = self
            .conn
            .query_row(
                &format!("{USER_SELECT} WHERE id = ?1"),
                params![id],
                user_row_mapper,
            )
            .optional()?;
        Ok(result)
    }

    pub fn get_user_by_email(&self, email: &str) -> DeskResult<Option<UserRecord>> {
        let result = self
            .conn
            .query_row(
                &format!("{USER_SELECT} WHERE email = ?1"),
                params![email],
                user_row_mapper,
            )
            .optional()?;
        Ok(result)
    }

    pub fn list_users(&self) -> DeskResult<Vec<UserRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT} ORDER BY full_name ASC"))?;
        let rows = stmt.query_map([], user_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn update_user(&self, u: &UserRecord) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE users SET full_name = ?1, role = ?2, status = ?3, permissions = ?4
             WHERE id = ?5",
            params![
                &u.full_name,
                u.role.as_str(),
                u.status.as_str(),
                serde_json::to_string(&u.permissions)?,
                &u.id,
            ],
        )?;
        Ok(())
    }
}

fn user_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let role: String = row.get(3)?;
    let status: String = row.get(4)?;
    let permissions: String = row.get(5)?;
    Ok(UserRecord {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        role: Role::parse(&role).ok_or_else(|| bad_column(3, format!("unknown role '{role}'")))?,
        status: UserStatus::parse(&status)
            .ok_or_else(|| bad_column(4, format!("unknown status '{status}'")))?,
        permissions: serde_json::from_str(&permissions)
            .map_err(|e| bad_column(5, format!("bad permissions: {e}")))?,
        created_at: parse_ts(6, row.get(6)?)?,
    })
}
