//! Agent tiers and the static table of bonus defaults each tier grants.

use serde::{Deserialize, Serialize};

/// Commercial classification of an agent. Gates which announcement
/// templates the agent may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    R,
    A,
    B,
    C,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::R => "R",
            Classification::A => "A",
            Classification::B => "B",
            Classification::C => "C",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "R" => Some(Classification::R),
            "A" => Some(Classification::A),
            "B" => Some(Classification::B),
            "C" => Some(Classification::C),
            _ => None,
        }
    }
}

/// Agency rank. The first four are the regular track, the rest the
/// exclusive track. `ExclusiveUnranked` is the exclusive agent that holds
/// no tier at all; it always resolves to the fixed {60, none, none}
/// defaults rather than a row in the tier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRank {
    Beginning,
    Growth,
    Pro,
    Elite,
    Center,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Sapphire,
    Emerald,
    King,
    Legend,
    ExclusiveUnranked,
}

/// The `(competition_bonus, deposit_bonus_percentage, deposit_bonus_count)`
/// triple a rank grants at onboarding and at every renewal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankDefaults {
    pub competition_bonus: f64,
    pub deposit_bonus_percentage: Option<f64>,
    pub deposit_bonus_count: Option<f64>,
}

impl AgentRank {
    pub fn defaults(self) -> RankDefaults {
        use AgentRank::*;
        let (bonus, pct, count) = match self {
            Beginning => (60.0, None, None),
            Growth => (100.0, Some(40.0), Some(2.0)),
            Pro => (150.0, Some(50.0), Some(3.0)),
            Elite => (200.0, Some(50.0), Some(4.0)),
            Center => (300.0, None, None),
            Bronze => (150.0, Some(40.0), Some(2.0)),
            Silver => (230.0, Some(40.0), Some(3.0)),
            Gold => (300.0, Some(50.0), Some(3.0)),
            Platinum => (500.0, Some(60.0), Some(4.0)),
            Diamond => (800.0, Some(75.0), Some(4.0)),
            Sapphire => (1100.0, Some(85.0), Some(4.0)),
            Emerald => (2000.0, Some(90.0), Some(4.0)),
            King => (2500.0, Some(95.0), Some(4.0)),
            Legend => (f64::INFINITY, Some(100.0), Some(f64::INFINITY)),
            ExclusiveUnranked => (60.0, None, None),
        };
        RankDefaults {
            competition_bonus: bonus,
            deposit_bonus_percentage: pct,
            deposit_bonus_count: count,
        }
    }

    pub fn as_str(self) -> &'static str {
        use AgentRank::*;
        match self {
            Beginning => "beginning",
            Growth => "growth",
            Pro => "pro",
            Elite => "elite",
            Center => "center",
            Bronze => "bronze",
            Silver => "silver",
            Gold => "gold",
            Platinum => "platinum",
            Diamond => "diamond",
            Sapphire => "sapphire",
            Emerald => "emerald",
            King => "king",
            Legend => "legend",
            ExclusiveUnranked => "exclusive_unranked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        use AgentRank::*;
        match s {
            "beginning" => Some(Beginning),
            "growth" => Some(Growth),
            "pro" => Some(Pro),
            "elite" => Some(Elite),
            "center" => Some(Center),
            "bronze" => Some(Bronze),
            "silver" => Some(Silver),
            "gold" => Some(Gold),
            "platinum" => Some(Platinum),
            "diamond" => Some(Diamond),
            "sapphire" => Some(Sapphire),
            "emerald" => Some(Emerald),
            "king" => Some(King),
            "legend" => Some(Legend),
            "exclusive_unranked" => Some(ExclusiveUnranked),
            _ => None,
        }
    }
}
