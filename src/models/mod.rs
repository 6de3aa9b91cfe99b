use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollType {
    IsitText,
    IsitImage,
    MultipleChoice,
    QuadSorting,
}

impl PollType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollType::IsitText => "isit_text",
            PollType::IsitImage => "isit_image",
            PollType::MultipleChoice => "multiple_choice",
            PollType::QuadSorting => "quad_sorting",
        }
    }
}

impl FromStr for PollType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "isit_text" => Ok(PollType::IsitText),
            "isit_image" => Ok(PollType::IsitImage),
            "multiple_choice" => Ok(PollType::MultipleChoice),
            "quad_sorting" => Ok(PollType::QuadSorting),
            other => Err(Error::UnknownPollType(other.to_string())),
        }
    }
}

/// The side of a binary ISIT poll a user sorted an object into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "IS")]
    Is,
    #[serde(rename = "IT")]
    It,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Is => "IS",
            Side::It => "IT",
        }
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IS" => Ok(Side::Is),
            "IT" => Ok(Side::It),
            other => Err(Error::UnknownSide(other.to_string())),
        }
    }
}

/// A (stage, level) pair. Ordering is by stage first, then level, which is
/// the order users progress through the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bucket {
    pub stage: i32,
    pub level: i32,
}

impl Bucket {
    pub fn new(stage: i32, level: i32) -> Self {
        Self { stage, level }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}-L{}", self.stage, self.level)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollObject {
    pub id: String,
    pub text: String,
    pub points: i32,
    pub correct_side: Option<Side>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub poll_type: PollType,
    pub stage: i32,
    pub level: i32,
    pub poll_order: i32,
    pub objects: Vec<PollObject>,
    /// Points per object pair, keyed by the editor's pair key. Only quad
    /// sorting polls fill this in.
    #[serde(default)]
    pub quad_scores: BTreeMap<String, i32>,
}

impl Poll {
    pub fn new(poll_type: PollType, stage: i32, level: i32, poll_order: i32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            poll_type,
            stage,
            level,
            poll_order,
            objects: Vec::new(),
            quad_scores: BTreeMap::new(),
        }
    }

    pub fn with_object(mut self, text: &str, points: i32, correct_side: Option<Side>) -> Self {
        self.objects.push(PollObject {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            points,
            correct_side,
        });
        self
    }

    pub fn bucket(&self) -> Bucket {
        Bucket::new(self.stage, self.level)
    }
}

/// A ledger row as written when a user votes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub user_id: String,
    pub poll_id: String,
    pub selected_object_id: String,
    pub is_correct: bool,
    pub points_earned: i32,
    pub chosen_side: Option<Side>,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(
        user_id: &str,
        poll_id: &str,
        selected_object_id: &str,
        is_correct: bool,
        points_earned: i32,
        chosen_side: Option<Side>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            poll_id: poll_id.to_string(),
            selected_object_id: selected_object_id.to_string(),
            is_correct,
            points_earned,
            chosen_side,
            created_at: Utc::now(),
        }
    }
}

/// A ledger row joined with the stage and level of its poll. `stage` and
/// `level` are `None` when the poll no longer exists in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub poll_id: String,
    pub is_correct: bool,
    pub points_earned: i32,
    pub stage: Option<i32>,
    pub level: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub score: i64,
    pub current_stage: i32,
    pub current_level: i32,
}

impl UserProfile {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            score: 0,
            current_stage: 0,
            current_level: 1,
        }
    }

    pub fn bucket(&self) -> Bucket {
        Bucket::new(self.current_stage, self.current_level)
    }
}

/// Metrics derived from a user's vote history. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetrics {
    pub polls_taken: usize,
    pub polls_incorrect: usize,
    pub overall_dq: f64,
    pub raw_score: i64,
    pub aq: f64,
    /// AQ of each Stage-0 level the user has points in, keyed by level.
    pub level_aq: BTreeMap<i32, f64>,
    pub total_possible_points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTier {
    pub tier: String,
    pub min_score: i64,
    pub message: String,
    pub title: String,
}

/// Values substituted into feedback templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageVariables {
    pub dq: f64,
    pub aq: f64,
    pub point_total: i64,
    pub last_dq: f64,
    pub last_score: i64,
}

impl MessageVariables {
    /// Variables for a user who has just moved from `previous` to `current`.
    pub fn from_metrics(current: &UserMetrics, previous: &UserMetrics) -> Self {
        Self {
            dq: current.overall_dq,
            aq: current.aq,
            point_total: current.raw_score,
            last_dq: previous.overall_dq,
            last_score: previous.raw_score,
        }
    }
}

impl From<&UserMetrics> for MessageVariables {
    fn from(metrics: &UserMetrics) -> Self {
        Self::from_metrics(metrics, metrics)
    }
}
