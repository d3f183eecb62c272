//! Announcement templates.
//!
//! A template carries the question text and the message body used to
//! announce a competition. Templates are gated by agent classification,
//! counted per use, and archived automatically once their usage limit is
//! reached. Reactivating an archived template resets its counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    competition_subsystem::CompetitionParams,
    error::{DeskError, DeskResult},
    rank::Classification,
    types::EntityId,
};

/// Which agent classification may use a template. `All` matches every
/// classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateClassification {
    R,
    A,
    B,
    C,
    All,
}

impl TemplateClassification {
    pub fn allows(self, classification: Classification) -> bool {
        match self {
            TemplateClassification::All => true,
            TemplateClassification::R => classification == Classification::R,
            TemplateClassification::A => classification == Classification::A,
            TemplateClassification::B => classification == Classification::B,
            TemplateClassification::C => classification == Classification::C,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateClassification::R => "R",
            TemplateClassification::A => "A",
            TemplateClassification::B => "B",
            TemplateClassification::C => "C",
            TemplateClassification::All => "All",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "R" => Some(TemplateClassification::R),
            "A" => Some(TemplateClassification::A),
            "B" => Some(TemplateClassification::B),
            "C" => Some(TemplateClassification::C),
            "All" => Some(TemplateClassification::All),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: EntityId,
    pub question: String,
    /// Message body. May contain `{question}`, `{answer}`, `{prize}` and
    /// `{winners}` placeholder tokens.
    pub content: String,
    pub classification: TemplateClassification,
    pub correct_answer: String,
    /// `None` means unlimited use.
    pub usage_limit: Option<i64>,
    pub usage_count: i64,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
}

impl TemplateRecord {
    /// True once the usage limit has been consumed.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.usage_limit, Some(limit) if self.usage_count >= limit)
    }

    /// Whether an agent of the given classification may announce with
    /// this template right now.
    pub fn usable_by(&self, classification: Classification) -> bool {
        !self.is_archived && !self.is_exhausted() && self.classification.allows(classification)
    }
}

/// Input for a new template.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub question: String,
    pub content: String,
    pub classification: TemplateClassification,
    pub correct_answer: String,
    pub usage_limit: Option<i64>,
}

impl NewTemplate {
    pub fn validate(&self) -> DeskResult<()> {
        if self.question.trim().is_empty() {
            return Err(DeskError::Validation("question must not be empty".into()));
        }
        if self.content.trim().is_empty() {
            return Err(DeskError::Validation("content must not be empty".into()));
        }
        if matches!(self.usage_limit, Some(limit) if limit <= 0) {
            return Err(DeskError::Validation(
                "usage_limit must be positive when set".into(),
            ));
        }
        Ok(())
    }
}

/// Renders the announcement text for one competition. With a template the
/// body's placeholder tokens are substituted; without one the competition
/// name stands alone.
pub fn render_announcement(template: Option<&TemplateRecord>, params: &CompetitionParams) -> String {
    match template {
        Some(t) => t
            .content
            .replace("{question}", &params.name)
            .replace("{answer}", t.correct_answer.as_str())
            .replace("{prize}", &format!("{:.2}", params.prize_per_winner))
            .replace("{winners}", &params.winners_count.to_string()),
        None => params.name.clone(),
    }
}
