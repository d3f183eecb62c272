//! Template database queries.

use rusqlite::{params, OptionalExtension};

use super::{bad_column, fmt_ts, parse_ts, DeskStore};
use crate::{
    error::{DeskError, DeskResult},
    template_subsystem::{TemplateClassification, TemplateRecord},
};

const TEMPLATE_SELECT: &str = "SELECT id, question, content, classification, correct_answer,
        usage_limit, usage_count, is_archived, created_at
 FROM templates";

impl DeskStore {
    pub fn insert_template(&self, t: &TemplateRecord) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO templates (
                id, question, content, classification, correct_answer,
                usage_limit, usage_count, is_archived, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &t.id,
                &t.question,
                &t.content,
                t.classification.as_str(),
                &t.correct_answer,
                t.usage_limit,
                t.usage_count,
                if t.is_archived { 1 } else { 0 },
                fmt_ts(t.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_template(&self, id: &str) -> DeskResult<Option<TemplateRecord>> {
        let result = self
            .conn
            .query_row(
                &format!("{TEMPLATE_SELECT} WHERE id = ?1"),
                params![id],
                template_row_mapper,
            )
            .optional()?;
        Ok(result)
    }

    pub fn list_templates(&self, include_archived: bool) -> DeskResult<Vec<TemplateRecord>> {
        let sql = if include_archived {
            format!("{TEMPLATE_SELECT} ORDER BY created_at DESC")
        } else {
            format!("{TEMPLATE_SELECT} WHERE is_archived = 0 ORDER BY created_at DESC")
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], template_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn update_template(&self, t: &TemplateRecord) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE templates SET
                question = ?1, content = ?2, classification = ?3,
                correct_answer = ?4, usage_limit = ?5
             WHERE id = ?6",
            params![
                &t.question,
                &t.content,
                t.classification.as_str(),
                &t.correct_answer,
                t.usage_limit,
                &t.id,
            ],
        )?;
        Ok(())
    }

    /// Bumps the usage counter and returns the updated row.
    pub fn increment_template_usage(&self, id: &str) -> DeskResult<TemplateRecord> {
        self.conn.execute(
            "UPDATE templates SET usage_count = usage_count + 1 WHERE id = ?1",
            params![id],
        )?;
        self.get_template(id)?.ok_or_else(|| DeskError::NotFound {
            entity: "template",
            id: id.to_string(),
        })
    }

    pub fn set_template_archived(&self, id: &str, archived: bool) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE templates SET is_archived = ?1 WHERE id = ?2",
            params![if archived { 1 } else { 0 }, id],
        )?;
        Ok(())
    }

    pub fn reset_template_usage(&self, id: &str) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE templates SET usage_count = 0 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }
}

fn template_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<TemplateRecord> {
    let classification: String = row.get(3)?;
    Ok(TemplateRecord {
        id: row.get(0)?,
        question: row.get(1)?,
        content: row.get(2)?,
        classification: TemplateClassification::parse(&classification)
            .ok_or_else(|| bad_column(3, format!("unknown classification '{classification}'")))?,
        correct_answer: row.get(4)?,
        usage_limit: row.get(5)?,
        usage_count: row.get(6)?,
        is_archived: row.get::<_, i32>(7)? != 0,
        created_at: parse_ts(8, row.get(8)?)?,
    })
}
