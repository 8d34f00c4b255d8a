//! Domain models shared by the engine, the store, and the HTTP edge
//!
//! An `Interview` and its `Question` rows form an aggregate: the pair
//! `(interview_id, question_index)` is unique, and deleting an interview
//! cascades to its questions and favorite marks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interview lifecycle status
///
/// `Completed` is terminal; status never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterviewStatus {
    InProgress,
    Pending,
    Completed,
}

impl InterviewStatus {
    pub fn code(self) -> i32 {
        match self {
            InterviewStatus::InProgress => 0,
            InterviewStatus::Pending => 1,
            InterviewStatus::Completed => 2,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => InterviewStatus::Pending,
            2 => InterviewStatus::Completed,
            _ => InterviewStatus::InProgress,
        }
    }
}

/// Per-question status
///
/// Transitions: New -> Answered -> Rated | Failed, or New -> Failed on
/// timeout. No other transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionStatus {
    New,
    Answered,
    Rated,
    Failed,
}

impl QuestionStatus {
    pub fn code(self) -> i32 {
        match self {
            QuestionStatus::New => 0,
            QuestionStatus::Answered => 1,
            QuestionStatus::Rated => 2,
            QuestionStatus::Failed => 3,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => QuestionStatus::Answered,
            2 => QuestionStatus::Rated,
            3 => QuestionStatus::Failed,
            _ => QuestionStatus::New,
        }
    }

    /// A settled question counts against `remaining_questions`.
    pub fn is_settled(self) -> bool {
        !matches!(self, QuestionStatus::New)
    }
}

/// Letter-grade histogram returned by the content scorer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalScore {
    #[serde(rename = "A", default)]
    pub a: i32,
    #[serde(rename = "B", default)]
    pub b: i32,
    #[serde(rename = "C", default)]
    pub c: i32,
    #[serde(rename = "D", default)]
    pub d: i32,
    #[serde(rename = "F", default)]
    pub f: i32,
}

/// Timed mouth-cue sequence produced by the speech synthesizer
///
/// `mouth_cues` is ordered by `start` ascending; all times are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LipSync {
    pub metadata: LipSyncMetadata,
    #[serde(rename = "mouthCues")]
    pub mouth_cues: Vec<MouthCue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LipSyncMetadata {
    #[serde(rename = "soundFile", default)]
    pub sound_file: String,
    pub duration: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouthCue {
    pub start: f32,
    pub end: f32,
    pub value: String,
}

/// One interview session row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interview {
    /// Externally visible opaque id, globally unique
    pub id: String,
    pub user_id: u64,
    pub position: String,
    pub experience: String,
    pub language: String,
    pub voice_id: String,
    pub speed: i32,
    pub skills: Vec<String>,
    /// Aligned by index with `skills` once completed
    pub skills_score: Vec<String>,
    pub skip_code: bool,
    pub skip_intro: bool,
    pub total_questions: i32,
    /// Derived: `total_questions - max settled question_index`
    pub remaining_questions: i32,
    pub total_score: Option<TotalScore>,
    pub overall_score: f64,
    pub positive_feedback: String,
    pub actionable_feedback: String,
    pub final_comment: String,
    pub status: InterviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One question row, keyed by `(interview_id, question_index)`
///
/// `audio` and `lipsync` are either both absent or both present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub interview_id: String,
    /// 1-based, contiguous within an interview
    pub question_index: i32,
    pub content: String,
    /// Base64 or URI, opaque to the engine; empty until rendered
    pub audio: String,
    pub lipsync: Option<LipSync>,
    pub answer: String,
    /// Opaque client-captured evidence attached to the answer
    pub record_proof: String,
    pub comment: String,
    pub score: String,
    pub status: QuestionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    /// New unanswered question with empty artifacts.
    pub fn new(interview_id: &str, question_index: i32, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Question {
            interview_id: interview_id.to_string(),
            question_index,
            content: content.into(),
            audio: String::new(),
            lipsync: None,
            answer: String::new(),
            record_proof: String::new(),
            comment: String::new(),
            score: String::new(),
            status: QuestionStatus::New,
            created_at: now,
            updated_at: now,
        }
    }

    /// A question is rendered once both synthesized artifacts are present.
    pub fn is_rendered(&self) -> bool {
        !self.audio.is_empty() && self.lipsync.is_some()
    }
}

/// Question/answer pair fed back to the generator as conversation context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Reusable question template from the public catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub position: String,
    pub experience: String,
    pub language: String,
    pub content: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
