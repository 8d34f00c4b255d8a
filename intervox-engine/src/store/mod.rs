//! Store contract
//!
//! The engine depends on these dynamic-dispatch repositories, not on a
//! particular store. It expects individual row writes to be atomic and
//! `(interview_id, question_index)` conflicts to be rejected cleanly, which
//! gives question preparation its idempotence. Implementations: SQLite for
//! production, in-memory for tests.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intervox_common::models::{Interview, LipSync, PublicQuestion, QaPair, Question};
use intervox_common::Result;
use std::sync::Arc;

/// Sortable columns for interview history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// Creation time
    Recency,
    TotalQuestions,
    OverallScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// Interview history query
///
/// Only completed interviews are listed. `query` matches position,
/// experience, language, and voice id case-insensitively.
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    pub user_id: u64,
    pub query: Option<String>,
    pub favorites_only: bool,
    pub english_only: bool,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub sort: SortField,
    pub dir: SortDir,
    pub page: i64,
    pub page_size: i64,
}

impl HistoryFilter {
    pub fn for_user(user_id: u64, page_size: i64) -> Self {
        HistoryFilter {
            user_id,
            query: None,
            favorites_only: false,
            english_only: false,
            from: None,
            to: None,
            sort: SortField::Recency,
            dir: SortDir::Desc,
            page: 1,
            page_size,
        }
    }
}

/// One page of interview history
#[derive(Debug, Clone)]
pub struct InterviewPage {
    pub interviews: Vec<Interview>,
    pub total_count: i64,
    pub total_pages: i64,
    pub page: i64,
}

/// Public question catalog query
#[derive(Debug, Clone)]
pub struct PublicQuestionFilter {
    pub position: Option<String>,
    pub experience: Option<String>,
    pub language: Option<String>,
    pub page: i64,
    pub page_size: i64,
}

/// One page of the public question catalog
#[derive(Debug, Clone)]
pub struct PublicQuestionPage {
    pub questions: Vec<PublicQuestion>,
    pub total_count: i64,
    pub total_pages: i64,
    pub page: i64,
}

/// Transactional CRUD over interview rows plus the favorite toggle
#[async_trait]
pub trait InterviewStore: Send + Sync {
    async fn create(&self, interview: &Interview) -> Result<()>;

    async fn update(&self, interview: &Interview) -> Result<()>;

    /// Fails with `NotFound` when the interview does not exist.
    async fn get(&self, id: &str) -> Result<Interview>;

    async fn exists(&self, id: &str) -> Result<bool>;

    async fn list(&self, filter: &HistoryFilter) -> Result<InterviewPage>;

    /// Toggle the `(user_id, interview_id)` favorite mark.
    ///
    /// Returns whether the interview is a favorite after the call.
    async fn toggle_favorite(&self, user_id: u64, interview_id: &str) -> Result<bool>;
}

/// CRUD over question rows
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Insert a question row.
    ///
    /// Returns `Ok(false)` when a row for `(interview_id, question_index)`
    /// already exists; the duplicate insert is a no-op, not an error.
    async fn insert(&self, question: &Question) -> Result<bool>;

    async fn update(&self, question: &Question) -> Result<()>;

    /// Idempotent write of the rendered artifacts for an existing row.
    ///
    /// Audio and lip-sync are written together so a row never carries one
    /// without the other.
    async fn upsert_artifacts(
        &self,
        interview_id: &str,
        question_index: i32,
        audio: &str,
        lipsync: &LipSync,
    ) -> Result<()>;

    /// Fails with `NotFound` when the row does not exist.
    async fn get(&self, interview_id: &str, question_index: i32) -> Result<Question>;

    async fn find(&self, interview_id: &str, question_index: i32) -> Result<Option<Question>>;

    /// All questions of an interview ordered by index ascending.
    async fn list(&self, interview_id: &str) -> Result<Vec<Question>>;

    /// The trailing `limit` question/answer pairs, oldest first.
    async fn recent_pairs(&self, interview_id: &str, limit: i64) -> Result<Vec<QaPair>>;

    /// Highest question index that is answered, rated, or failed; 0 if none.
    async fn max_settled_index(&self, interview_id: &str) -> Result<i32>;
}

/// Read-only access to the public question catalog
#[async_trait]
pub trait PublicQuestionStore: Send + Sync {
    async fn list(&self, filter: &PublicQuestionFilter) -> Result<PublicQuestionPage>;

    async fn create_bulk(&self, questions: &[PublicQuestion]) -> Result<()>;
}

/// Bundle of the per-entity repositories the engine works against
#[derive(Clone)]
pub struct Repository {
    pub interviews: Arc<dyn InterviewStore>,
    pub questions: Arc<dyn QuestionStore>,
    pub public_questions: Arc<dyn PublicQuestionStore>,
}

impl Repository {
    /// Production repository over a SQLite pool.
    pub fn sqlite(pool: sqlx::SqlitePool) -> Self {
        let store = Arc::new(sqlite::SqliteStore::new(pool));
        Repository {
            interviews: store.clone(),
            questions: store.clone(),
            public_questions: store,
        }
    }

    /// In-memory repository for tests.
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Repository {
            interviews: store.clone(),
            questions: store.clone(),
            public_questions: store,
        }
    }
}
