//! Interview session engine
//!
//! The front door for every interview operation. On start and fetch the
//! engine renders the question the caller needs synchronously, then enqueues
//! speculative preparation of the following index into the worker pool so
//! the next fetch is served from the store. Fetching arms a per-question
//! answer deadline; submitting cancels it. Submitting the interview renders
//! the outro synchronously and detaches a scoring task that fans out to the
//! content and fluency scorers and merges their verdicts.

pub mod compose;
pub mod demo;
pub mod pool;
pub mod score;
pub mod timer;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use intervox_common::config::{Config, WorkerConfig};
use intervox_common::models::{
    Interview, InterviewStatus, LipSync, Question, QuestionStatus, TotalScore,
};
use intervox_common::events::UserEvent;
use intervox_common::{Error, Result};

use crate::cache::{self, Cache};
use crate::clients::{
    FluencyRequest, FluencySubmission, GenScoreApi, GenerateContext, GenerateRequest, RequestMeta,
    ScoreRequest, ScoreSubmission, SpeechApi, SynthesizeRequest,
};
use crate::notify::Notifier;
use crate::store::{HistoryFilter, Repository, SortDir, SortField};
use compose::Composer;
use pool::{PoolMetrics, PreparationJob, PreparationPool, PrepareQuestions};
use timer::{timer_key, TimerManager};

/// How long a cached interview snapshot stays fresh
const SNAPSHOT_TTL: Duration = Duration::from_secs(60);

/// Engine tunables, decoupled from the on-disk config for testability
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub question_timeout: Duration,
    pub page_size: i64,
    pub context_qa_length: i64,
    pub worker: WorkerConfig,
    pub cache_namespace: String,
    /// Fixed seed for the phrase composer; `None` draws from entropy
    pub composer_seed: Option<u64>,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        EngineSettings {
            question_timeout: config.question_timeout(),
            page_size: config.engine.page_size,
            context_qa_length: config.engine.context_qa_length,
            worker: config.worker.clone(),
            cache_namespace: config.redis.namespace.clone(),
            composer_seed: None,
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

fn default_language() -> String {
    "English".to_string()
}

fn default_speed() -> i32 {
    1
}

fn default_total_questions() -> i32 {
    10
}

fn default_page() -> i64 {
    1
}

/// Interview profile submitted by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartInterviewRequest {
    pub position: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub voice_id: String,
    #[serde(default = "default_speed")]
    pub speed: i32,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub skip_code: bool,
    #[serde(default)]
    pub skip_intro: bool,
    #[serde(default = "default_total_questions")]
    pub total_questions: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartInterviewResponse {
    pub interview_id: String,
}

/// One question as delivered to the client
///
/// `is_loading` signals that preparation has not caught up yet; clients poll.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionResponse {
    pub question_id: i32,
    pub content: String,
    pub audio: String,
    pub lipsync: Option<LipSync>,
    pub is_last_question: bool,
    pub is_loading: bool,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAnswerRequest {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub record_proof: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AckResponse {
    pub message: String,
}

/// Rendered outro: returned to the caller, never persisted as a question
#[derive(Debug, Clone, Serialize)]
pub struct OutroArtifact {
    pub audio: String,
    pub lipsync: LipSync,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitInterviewResponse {
    pub outro: OutroArtifact,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    pub index: i32,
    pub content: String,
    pub answer: String,
    pub record_proof: String,
    pub comment: String,
    pub score: String,
    pub status: QuestionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterviewDetail {
    pub interview_id: String,
    pub status: InterviewStatus,
    pub position: String,
    pub experience: String,
    pub language: String,
    pub voice_id: String,
    pub speed: i32,
    pub skip_code: bool,
    pub total_questions: i32,
    pub submissions: Vec<SubmissionView>,
    pub skills_score: BTreeMap<String, String>,
    pub total_score: Option<TotalScore>,
    pub overall_score: f64,
    pub positive_feedback: String,
    pub actionable_feedback: String,
    pub final_comment: String,
}

/// History query as accepted from the client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryRequest {
    pub query: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub english_only: bool,
    /// Unix seconds, inclusive window start
    pub from: Option<i64>,
    /// Unix seconds, inclusive window end
    pub to: Option<i64>,
    /// recency | total_questions | overall_score
    pub sort: Option<String>,
    /// asc | desc
    pub order: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterviewSummary {
    pub interview_id: String,
    pub position: String,
    pub experience: String,
    pub total_score: Option<TotalScore>,
    pub overall_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub interviews: Vec<InterviewSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteResponse {
    pub favorite: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicQuestionsRequest {
    pub position: Option<String>,
    pub experience: Option<String>,
    pub language: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestionView {
    pub content: String,
    pub answer: String,
    pub position: String,
    pub experience: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestionsResponse {
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub questions: Vec<PublicQuestionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoResponse {
    pub questions: Vec<QuestionResponse>,
}

// ============================================================================
// Engine
// ============================================================================

/// The stateful orchestrator driving interview sessions
pub struct SessionEngine {
    weak: Weak<SessionEngine>,
    repo: Repository,
    genscore: Arc<dyn GenScoreApi>,
    speech: Arc<dyn SpeechApi>,
    notifier: Arc<Notifier>,
    cache: Arc<dyn Cache>,
    timers: TimerManager,
    pool: PreparationPool,
    composer: Mutex<Composer>,
    /// Preparation keys currently being processed (best-effort dedup)
    in_flight: Mutex<HashSet<(String, i32)>>,
    settings: EngineSettings,
}

impl SessionEngine {
    pub fn new(
        repo: Repository,
        genscore: Arc<dyn GenScoreApi>,
        speech: Arc<dyn SpeechApi>,
        notifier: Arc<Notifier>,
        cache: Arc<dyn Cache>,
        settings: EngineSettings,
    ) -> Arc<SessionEngine> {
        let composer = match settings.composer_seed {
            Some(seed) => Composer::with_seed(seed),
            None => Composer::new(),
        };
        let engine = Arc::new_cyclic(|weak| SessionEngine {
            weak: weak.clone(),
            repo,
            genscore,
            speech,
            notifier,
            cache,
            timers: TimerManager::new(settings.question_timeout),
            pool: PreparationPool::new(&settings.worker),
            composer: Mutex::new(composer),
            in_flight: Mutex::new(HashSet::new()),
            settings,
        });
        let handler: Weak<dyn PrepareQuestions> = engine.weak.clone();
        engine.pool.start(handler);
        engine
    }

    /// Worker pool counters; exposed for health reporting and tests.
    pub fn pool_metrics(&self) -> Arc<PoolMetrics> {
        Arc::clone(&self.pool.metrics)
    }

    /// Remaining time on a question's answer deadline.
    pub fn remaining_time(&self, interview_id: &str, question_index: i32) -> Duration {
        self.timers.remaining(interview_id, question_index)
    }

    /// Cancel all timers and stop the worker pool.
    pub async fn shutdown(&self) {
        self.timers.shutdown().await;
        self.pool.shutdown();
    }

    fn require_user(meta: &RequestMeta) -> Result<u64> {
        if meta.user_id == 0 {
            return Err(Error::Unauthenticated(
                "request metadata does not carry a user id".to_string(),
            ));
        }
        Ok(meta.user_id)
    }

    // ------------------------------------------------------------------
    // Public operations
    // ------------------------------------------------------------------

    /// Start a new interview session.
    ///
    /// Persists the interview, seeds the initial question list, renders the
    /// first question synchronously so the caller can fetch it immediately,
    /// and enqueues speculative preparation for the following index.
    pub async fn start_interview(
        &self,
        meta: &RequestMeta,
        req: StartInterviewRequest,
    ) -> Result<StartInterviewResponse> {
        let user_id = Self::require_user(meta)?;

        if req.position.trim().is_empty() {
            return Err(Error::InvalidArgument("position must not be empty".into()));
        }
        if req.total_questions < 1 {
            return Err(Error::InvalidArgument(
                "total_questions must be at least 1".into(),
            ));
        }

        // Mint an id, retrying on the (unlikely) collision.
        let interview_id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !self.repo.interviews.exists(&candidate).await? {
                break candidate;
            }
        };

        let now = Utc::now();
        let interview = Interview {
            id: interview_id.clone(),
            user_id,
            position: req.position.clone(),
            experience: req.experience.clone(),
            language: req.language.clone(),
            voice_id: req.voice_id.clone(),
            speed: req.speed,
            skills: req.skills.clone(),
            skills_score: Vec::new(),
            skip_code: req.skip_code,
            skip_intro: req.skip_intro,
            total_questions: req.total_questions,
            remaining_questions: req.total_questions,
            total_score: None,
            overall_score: 0.0,
            positive_feedback: String::new(),
            actionable_feedback: String::new(),
            final_comment: String::new(),
            status: InterviewStatus::InProgress,
            created_at: now,
            updated_at: now,
        };
        self.repo.interviews.create(&interview).await?;
        info!(interview_id = %interview_id, user_id, "Created interview");

        // Initial question list: optional intro plus one position opener.
        let mut contents = Vec::new();
        {
            let mut composer = self.composer.lock().unwrap();
            if !req.skip_intro {
                contents.push(composer.intro_question(&interview.language));
            }
            contents.push(composer.opener_question(&interview.language, &interview.position));
        }
        contents.truncate(interview.total_questions as usize);

        let seeds: Vec<Question> = contents
            .iter()
            .enumerate()
            .map(|(i, content)| Question::new(&interview_id, i as i32 + 1, content.clone()))
            .collect();
        let seed_count = seeds.len() as i32;

        // The first question is rendered on the caller's dime so the very
        // next fetch is a hit.
        let first_job = PreparationJob::new(&interview, user_id, 1, seeds);
        self.prepare_with_dedup(&first_job).await?;

        let next_index = seed_count + 1;
        if next_index <= interview.total_questions {
            let job = PreparationJob::new(&interview, user_id, next_index, Vec::new());
            self.pool.ensure_workers();
            if !self.pool.enqueue(job).await {
                warn!(
                    interview_id = %interview_id,
                    question_index = next_index,
                    "Failed to enqueue question preparation job"
                );
            }
        }

        Ok(StartInterviewResponse {
            interview_id,
        })
    }

    /// Fetch a question, arming its answer deadline.
    ///
    /// When preparation has not caught up yet the call returns a loading
    /// sentinel instead of blocking, and re-enqueues the missing work.
    pub async fn get_next_question(
        &self,
        meta: &RequestMeta,
        interview_id: &str,
        question_index: i32,
    ) -> Result<QuestionResponse> {
        let user_id = Self::require_user(meta)?;
        debug!(interview_id, question_index, "Retrieving next question");

        let interview = self.interview_snapshot(interview_id).await?;
        if question_index < 1 || question_index > interview.total_questions {
            return Err(Error::InvalidArgument(format!(
                "question index out of range: {}",
                question_index
            )));
        }

        let question = match self.repo.questions.find(interview_id, question_index).await? {
            Some(q) if !q.content.is_empty() && q.is_rendered() => q,
            _ => {
                // Re-drive preparation for this index; a previously dropped
                // or lost job is recovered here.
                let job = PreparationJob::new(&interview, user_id, question_index, Vec::new());
                self.pool.ensure_workers();
                self.pool.enqueue(job).await;

                return Ok(QuestionResponse {
                    question_id: question_index,
                    content: String::new(),
                    audio: String::new(),
                    lipsync: None,
                    is_last_question: false,
                    is_loading: true,
                    timestamp: Utc::now().timestamp(),
                });
            }
        };

        let is_last_question = question_index == interview.total_questions;

        let weak = self.weak.clone();
        self.timers
            .start(
                interview_id,
                question_index,
                user_id,
                Box::new(move |interview_id, question_index, user_id| {
                    Box::pin(async move {
                        if let Some(engine) = weak.upgrade() {
                            engine
                                .handle_question_timeout(&interview_id, question_index, user_id)
                                .await;
                        }
                    })
                }),
            )
            .await;

        if !is_last_question {
            let job = PreparationJob::new(&interview, user_id, question_index + 1, Vec::new());
            self.pool.ensure_workers();
            if !self.pool.enqueue(job).await {
                warn!(
                    interview_id,
                    question_index = question_index + 1,
                    "Failed to enqueue question preparation job"
                );
            }
        }

        Ok(QuestionResponse {
            question_id: question.question_index,
            content: question.content,
            audio: question.audio,
            lipsync: question.lipsync,
            is_last_question,
            is_loading: false,
            timestamp: Utc::now().timestamp(),
        })
    }

    /// Record an answer for an open question.
    ///
    /// The deadline timer is cancelled first, unconditionally. Re-submitting
    /// an already answered question and submitting an empty answer are both
    /// benign no-ops.
    pub async fn submit_answer(
        &self,
        meta: &RequestMeta,
        interview_id: &str,
        question_index: i32,
        req: SubmitAnswerRequest,
    ) -> Result<AckResponse> {
        Self::require_user(meta)?;

        self.timers
            .cancel(&timer_key(interview_id, question_index))
            .await;

        let mut question = self.repo.questions.get(interview_id, question_index).await?;

        if question.status != QuestionStatus::New {
            warn!(interview_id, question_index, "Question already answered");
            return Ok(AckResponse {
                message: "Question already answered".to_string(),
            });
        }
        if req.answer.is_empty() {
            warn!(interview_id, question_index, "Answer is empty");
            return Ok(AckResponse {
                message: "Answer is empty".to_string(),
            });
        }

        question.answer = req.answer;
        question.record_proof = req.record_proof;
        question.status = QuestionStatus::Answered;
        self.repo.questions.update(&question).await?;

        self.settle_remaining(interview_id).await;

        Ok(AckResponse {
            message: "Answer submitted successfully".to_string(),
        })
    }

    /// Close the interview: render the outro for the caller and detach the
    /// scoring fan-out.
    ///
    /// Re-submission is rejected only once the interview is completed, so a
    /// session stuck in the pending state (for example after a scorer
    /// failure) can be re-driven by calling this again.
    pub async fn submit_interview(
        &self,
        meta: &RequestMeta,
        interview_id: &str,
    ) -> Result<SubmitInterviewResponse> {
        let user_id = Self::require_user(meta)?;

        let mut interview = self.repo.interviews.get(interview_id).await?;
        if interview.status == InterviewStatus::Completed {
            return Err(Error::FailedPrecondition(
                "interview already submitted".to_string(),
            ));
        }

        self.timers.cleanup_interview(interview_id).await;

        let questions = self.repo.questions.list(interview_id).await?;

        interview.status = InterviewStatus::Pending;
        self.repo.interviews.update(&interview).await?;
        self.invalidate_snapshot(interview_id).await;

        // The outro is rendered synchronously and handed back; it is not a
        // question row.
        let outro_content = compose::outro_text(&interview.language);
        let synthesized = self
            .speech
            .synthesize(
                meta,
                &SynthesizeRequest {
                    interview_id: interview_id.to_string(),
                    content: outro_content.to_string(),
                    voice_id: interview.voice_id.clone(),
                    speed: interview.speed,
                },
            )
            .await?;

        let score_request = ScoreRequest {
            interview_id: interview_id.to_string(),
            submissions: questions
                .iter()
                .map(|q| ScoreSubmission {
                    index: q.question_index,
                    question: q.content.clone(),
                    answer: q.answer.clone(),
                })
                .collect(),
            skills: interview.skills.clone(),
        };
        let fluency_request = FluencyRequest {
            interview_id: interview_id.to_string(),
            submissions: questions
                .iter()
                .map(|q| FluencySubmission {
                    index: q.question_index,
                    answer: q.answer.clone(),
                    record_proof: q.record_proof.clone(),
                })
                .collect(),
        };

        // Detached task with a fresh root context: cancelling the request
        // that triggered submission must not cancel scoring.
        if let Some(engine) = self.weak.upgrade() {
            let interview_id = interview_id.to_string();
            tokio::spawn(async move {
                engine
                    .run_scoring(user_id, &interview_id, score_request, fluency_request)
                    .await;
            });
        }

        Ok(SubmitInterviewResponse {
            outro: OutroArtifact {
                audio: synthesized.audio,
                lipsync: synthesized.lipsync,
            },
        })
    }

    /// Full interview detail with per-question submissions.
    pub async fn get_interview(&self, interview_id: &str) -> Result<InterviewDetail> {
        let interview = self.repo.interviews.get(interview_id).await?;
        let questions = self.repo.questions.list(interview_id).await?;

        let mut skills_score = BTreeMap::new();
        if interview.skills.len() == interview.skills_score.len() {
            for (skill, score) in interview.skills.iter().zip(interview.skills_score.iter()) {
                skills_score.insert(skill.clone(), score.clone());
            }
        }

        Ok(InterviewDetail {
            interview_id: interview.id,
            status: interview.status,
            position: interview.position,
            experience: interview.experience,
            language: interview.language,
            voice_id: interview.voice_id,
            speed: interview.speed,
            skip_code: interview.skip_code,
            total_questions: interview.total_questions,
            submissions: questions
                .into_iter()
                .map(|q| SubmissionView {
                    index: q.question_index,
                    content: q.content,
                    answer: q.answer,
                    record_proof: q.record_proof,
                    comment: q.comment,
                    score: q.score,
                    status: q.status,
                })
                .collect(),
            skills_score,
            total_score: interview.total_score,
            overall_score: interview.overall_score,
            positive_feedback: interview.positive_feedback,
            actionable_feedback: interview.actionable_feedback,
            final_comment: interview.final_comment,
        })
    }

    /// Completed-interview history for the authenticated user.
    pub async fn get_interview_history(
        &self,
        meta: &RequestMeta,
        req: HistoryRequest,
    ) -> Result<HistoryResponse> {
        let user_id = Self::require_user(meta)?;

        let window = match (req.from, req.to) {
            (None, None) => (None, None),
            (Some(from), Some(to)) => {
                if from > to {
                    return Err(Error::InvalidArgument("inverted time window".to_string()));
                }
                (timestamp_to_datetime(from)?, timestamp_to_datetime(to)?)
            }
            _ => {
                return Err(Error::InvalidArgument(
                    "time window requires both bounds".to_string(),
                ))
            }
        };

        let sort = match req.sort.as_deref() {
            None | Some("recency") => SortField::Recency,
            Some("total_questions") => SortField::TotalQuestions,
            Some("overall_score") => SortField::OverallScore,
            Some(other) => {
                return Err(Error::InvalidArgument(format!("unknown sort key: {}", other)))
            }
        };
        let dir = match req.order.as_deref() {
            None | Some("desc") => SortDir::Desc,
            Some("asc") => SortDir::Asc,
            Some(other) => {
                return Err(Error::InvalidArgument(format!(
                    "unknown sort order: {}",
                    other
                )))
            }
        };

        let filter = HistoryFilter {
            user_id,
            query: req.query,
            favorites_only: req.favorite,
            english_only: req.english_only,
            from: window.0,
            to: window.1,
            sort,
            dir,
            page: req.page,
            page_size: self.settings.page_size,
        };
        let page = self.repo.interviews.list(&filter).await?;

        Ok(HistoryResponse {
            page: page.page,
            per_page: self.settings.page_size,
            total_pages: page.total_pages,
            total_count: page.total_count,
            interviews: page
                .interviews
                .into_iter()
                .map(|iv| InterviewSummary {
                    interview_id: iv.id,
                    position: iv.position,
                    experience: iv.experience,
                    total_score: iv.total_score,
                    overall_score: iv.overall_score,
                    created_at: iv.created_at,
                    updated_at: iv.updated_at,
                })
                .collect(),
        })
    }

    /// Toggle the caller's favorite mark on an interview.
    pub async fn favorite_interview(
        &self,
        meta: &RequestMeta,
        interview_id: &str,
    ) -> Result<FavoriteResponse> {
        let user_id = Self::require_user(meta)?;
        if !self.repo.interviews.exists(interview_id).await? {
            return Err(Error::NotFound(format!("interview {}", interview_id)));
        }
        let favorite = self
            .repo
            .interviews
            .toggle_favorite(user_id, interview_id)
            .await?;
        Ok(FavoriteResponse { favorite })
    }

    /// Paged read over the public question catalog.
    pub async fn get_public_questions(
        &self,
        req: PublicQuestionsRequest,
    ) -> Result<PublicQuestionsResponse> {
        let filter = crate::store::PublicQuestionFilter {
            position: req.position,
            experience: req.experience,
            language: req.language,
            page: req.page,
            page_size: self.settings.page_size,
        };
        let page = self.repo.public_questions.list(&filter).await?;

        Ok(PublicQuestionsResponse {
            page: page.page,
            per_page: self.settings.page_size,
            total_pages: page.total_pages,
            total_count: page.total_count,
            questions: page
                .questions
                .into_iter()
                .map(|q| PublicQuestionView {
                    content: q.content,
                    answer: q.answer,
                    position: q.position,
                    experience: q.experience,
                    language: q.language,
                    created_at: q.created_at,
                })
                .collect(),
        })
    }

    /// Serve a pre-canned question set for a demo topic.
    pub async fn demo_interview(&self, topic: &str) -> Result<DemoResponse> {
        let topic = if topic.is_empty() {
            demo::DEFAULT_TOPIC
        } else {
            topic
        };
        let contents = demo::demo_questions(topic)
            .ok_or_else(|| Error::NotFound(format!("demo topic {}", topic)))?;

        let now = Utc::now().timestamp();
        Ok(DemoResponse {
            questions: contents
                .iter()
                .enumerate()
                .map(|(i, content)| QuestionResponse {
                    question_id: i as i32 + 1,
                    content: content.to_string(),
                    audio: String::new(),
                    lipsync: None,
                    is_last_question: i == contents.len() - 1,
                    is_loading: false,
                    timestamp: now,
                })
                .collect(),
        })
    }

    // ------------------------------------------------------------------
    // Timeout handling
    // ------------------------------------------------------------------

    async fn handle_question_timeout(&self, interview_id: &str, question_index: i32, user_id: u64) {
        let question = match self.repo.questions.find(interview_id, question_index).await {
            Ok(q) => q,
            Err(e) => {
                error!(interview_id, question_index, error = %e, "Timeout: failed to reload question");
                return;
            }
        };
        let Some(mut question) = question else {
            debug!(interview_id, question_index, "Timeout for a question that never materialized");
            return;
        };
        if question.status != QuestionStatus::New {
            return;
        }

        question.status = QuestionStatus::Failed;
        if let Err(e) = self.repo.questions.update(&question).await {
            error!(interview_id, question_index, error = %e, "Timeout: failed to mark question failed");
            return;
        }
        self.settle_remaining(interview_id).await;

        self.notifier.push(
            user_id,
            UserEvent::QuestionTimeout {
                interview_id: interview_id.to_string(),
                question_index,
            },
        );
    }

    // ------------------------------------------------------------------
    // Background scoring
    // ------------------------------------------------------------------

    async fn run_scoring(
        &self,
        user_id: u64,
        interview_id: &str,
        score_request: ScoreRequest,
        fluency_request: FluencyRequest,
    ) {
        // Fresh metadata: the originating request is long gone.
        let meta = RequestMeta::for_user(user_id);

        let content = match self.genscore.score(&meta, &score_request).await {
            Ok(response) => response,
            Err(e) => {
                error!(interview_id, error = %e, "Content scoring failed, interview left pending");
                return;
            }
        };
        let fluency = match self.speech.score_fluency(&meta, &fluency_request).await {
            Ok(response) => response,
            Err(e) => {
                error!(interview_id, error = %e, "Fluency scoring failed, interview left pending");
                return;
            }
        };

        // Apply per-question verdicts.
        for verdict in &content.result {
            let mut question = match self.repo.questions.find(interview_id, verdict.index).await {
                Ok(Some(q)) => q,
                Ok(None) => {
                    warn!(interview_id, question_index = verdict.index, "Scored question not found");
                    continue;
                }
                Err(e) => {
                    error!(interview_id, question_index = verdict.index, error = %e, "Failed to load scored question");
                    continue;
                }
            };
            question.comment = verdict.comment.clone();
            question.score = verdict.score.clone();
            question.status = if verdict.score.is_empty() {
                QuestionStatus::Failed
            } else {
                QuestionStatus::Rated
            };
            if let Err(e) = self.repo.questions.update(&question).await {
                error!(interview_id, question_index = verdict.index, error = %e, "Failed to persist question score");
            }
        }

        // Anything the scorer did not settle (questions that never got an
        // answer, or indices missing from the verdict list) fails now so the
        // completed interview holds only rated or failed questions.
        match self.repo.questions.list(interview_id).await {
            Ok(questions) => {
                for mut question in questions {
                    if !matches!(
                        question.status,
                        QuestionStatus::Rated | QuestionStatus::Failed
                    ) {
                        question.status = QuestionStatus::Failed;
                        if let Err(e) = self.repo.questions.update(&question).await {
                            error!(
                                interview_id,
                                question_index = question.question_index,
                                error = %e,
                                "Failed to settle unscored question"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                error!(interview_id, error = %e, "Failed to sweep unscored questions");
            }
        }

        let mut interview = match self.repo.interviews.get(interview_id).await {
            Ok(iv) => iv,
            Err(e) => {
                error!(interview_id, error = %e, "Failed to reload interview for score merge");
                return;
            }
        };

        let (skills, skills_score) = score::merge_skills(&content.skills, &fluency.skills);
        interview.skills = skills;
        interview.skills_score = skills_score;
        interview.total_score = Some(content.total_score.clone());
        interview.overall_score = score::overall_score(&content.total_score);
        interview.positive_feedback = content.positive_feedback;
        interview.actionable_feedback =
            join_feedback(&content.actionable_feedback, &fluency.actionable_feedback);
        interview.final_comment = content.final_comment;
        interview.status = InterviewStatus::Completed;
        if let Ok(max_settled) = self.repo.questions.max_settled_index(interview_id).await {
            interview.remaining_questions = (interview.total_questions - max_settled).max(0);
        }

        if let Err(e) = self.repo.interviews.update(&interview).await {
            error!(interview_id, error = %e, "Failed to persist interview feedback");
            return;
        }
        self.invalidate_snapshot(interview_id).await;
        info!(interview_id, "Interview feedback saved successfully");
    }

    // ------------------------------------------------------------------
    // Question preparation
    // ------------------------------------------------------------------

    fn begin_preparation(&self, key: &(String, i32)) -> bool {
        self.in_flight.lock().unwrap().insert(key.clone())
    }

    fn finish_preparation(&self, key: &(String, i32)) {
        self.in_flight.lock().unwrap().remove(key);
    }

    /// Run a preparation job unless the same key is already being prepared.
    ///
    /// Errors are returned to the caller; the worker-pool path logs them and
    /// moves on, the synchronous start path propagates them.
    pub async fn prepare_with_dedup(&self, job: &PreparationJob) -> Result<()> {
        let key = (job.interview_id.clone(), job.next_question_index);
        if !self.begin_preparation(&key) {
            debug!(
                interview_id = %job.interview_id,
                question_index = job.next_question_index,
                "Preparation already in flight, skipping"
            );
            return Ok(());
        }
        let result = self.execute_preparation(job).await;
        self.finish_preparation(&key);
        result
    }

    async fn execute_preparation(&self, job: &PreparationJob) -> Result<()> {
        let meta = RequestMeta::for_user(job.user_id);
        let interview = &job.interview;
        let index = job.next_question_index;

        // Seed questions from the start path; inserting an existing
        // (interview, index) pair is a clean no-op.
        for seed in &job.seed_questions {
            if !self.repo.questions.insert(seed).await? {
                debug!(
                    interview_id = %job.interview_id,
                    question_index = seed.question_index,
                    "Seed question already exists, skipping"
                );
            }
        }

        // Generation is skipped when the row already carries content - the
        // cache-hit no-op that makes duplicate jobs cheap.
        let existing = self.repo.questions.find(&job.interview_id, index).await?;
        let needs_generation = existing.as_ref().map_or(true, |q| q.content.is_empty());
        if needs_generation {
            let pairs = self
                .repo
                .questions
                .recent_pairs(&job.interview_id, self.settings.context_qa_length)
                .await?;

            let request = GenerateRequest {
                context: GenerateContext {
                    position: non_empty_or(&interview.position, "General"),
                    experience: non_empty_or(&interview.experience, "General"),
                    language: non_empty_or(&interview.language, "English"),
                    skills: if interview.skills.is_empty() {
                        vec!["English skills".to_string()]
                    } else {
                        interview.skills.clone()
                    },
                    max_questions: interview.total_questions,
                    skip_code: interview.skip_code,
                },
                submissions: pairs,
                remaining_questions: interview.total_questions - index + 1,
            };
            let response = self.genscore.generate(&meta, &request).await?;
            if response.questions.is_empty() {
                return Err(Error::remote_invalid("genscore", "no questions generated"));
            }

            for (offset, content) in response.questions.iter().enumerate() {
                let question_index = index + offset as i32;
                if question_index > interview.total_questions {
                    break;
                }
                let question = Question::new(&job.interview_id, question_index, content.clone());
                self.repo.questions.insert(&question).await?;
            }
        }

        // Render when the artifacts are missing; audio and lip-sync are
        // written together.
        let question = self.repo.questions.get(&job.interview_id, index).await?;
        if !question.is_rendered() {
            let spoken = {
                let mut composer = self.composer.lock().unwrap();
                composer.spoken_form(index, &question.content, &interview.voice_id)
            };
            let synthesized = self
                .speech
                .synthesize(
                    &meta,
                    &SynthesizeRequest {
                        interview_id: job.interview_id.clone(),
                        content: spoken,
                        voice_id: interview.voice_id.clone(),
                        speed: interview.speed,
                    },
                )
                .await?;
            self.repo
                .questions
                .upsert_artifacts(&job.interview_id, index, &synthesized.audio, &synthesized.lipsync)
                .await?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Snapshot cache and derived counters
    // ------------------------------------------------------------------

    fn snapshot_key(&self, interview_id: &str) -> String {
        cache::namespaced(
            &self.settings.cache_namespace,
            &format!("interview:{}", interview_id),
        )
    }

    async fn interview_snapshot(&self, interview_id: &str) -> Result<Interview> {
        let key = self.snapshot_key(interview_id);
        if let Some(bytes) = self.cache.get(&key).await {
            if let Ok(interview) = serde_json::from_slice::<Interview>(&bytes) {
                return Ok(interview);
            }
        }
        let interview = self.repo.interviews.get(interview_id).await?;
        if let Ok(bytes) = serde_json::to_vec(&interview) {
            self.cache.set(&key, &bytes, SNAPSHOT_TTL).await;
        }
        Ok(interview)
    }

    async fn invalidate_snapshot(&self, interview_id: &str) {
        self.cache.delete(&self.snapshot_key(interview_id)).await;
    }

    /// Recompute `remaining_questions` from the settled question set.
    async fn settle_remaining(&self, interview_id: &str) {
        let max_settled = match self.repo.questions.max_settled_index(interview_id).await {
            Ok(max) => max,
            Err(e) => {
                error!(interview_id, error = %e, "Failed to derive remaining questions");
                return;
            }
        };
        let mut interview = match self.repo.interviews.get(interview_id).await {
            Ok(iv) => iv,
            Err(e) => {
                error!(interview_id, error = %e, "Failed to load interview for settlement");
                return;
            }
        };
        if interview.status == InterviewStatus::Completed {
            return;
        }
        let remaining = (interview.total_questions - max_settled).max(0);
        if interview.remaining_questions != remaining {
            interview.remaining_questions = remaining;
            if let Err(e) = self.repo.interviews.update(&interview).await {
                error!(interview_id, error = %e, "Failed to persist remaining questions");
            }
            self.invalidate_snapshot(interview_id).await;
        }
    }
}

#[async_trait]
impl PrepareQuestions for SessionEngine {
    async fn prepare(&self, job: PreparationJob) {
        let interview_id = job.interview_id.clone();
        let question_index = job.next_question_index;
        if let Err(e) = self.prepare_with_dedup(&job).await {
            error!(
                interview_id = %interview_id,
                question_index,
                error = %e,
                "Question preparation failed"
            );
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn join_feedback(content: &str, fluency: &str) -> String {
    match (content.is_empty(), fluency.is_empty()) {
        (true, _) => fluency.to_string(),
        (_, true) => content.to_string(),
        _ => format!("{} {}", content, fluency),
    }
}

fn timestamp_to_datetime(secs: i64) -> Result<Option<DateTime<Utc>>> {
    match Utc.timestamp_opt(secs, 0) {
        chrono::LocalResult::Single(dt) => Ok(Some(dt)),
        _ => Err(Error::InvalidArgument(format!(
            "invalid unix timestamp: {}",
            secs
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_feedback() {
        assert_eq!(join_feedback("a", "b"), "a b");
        assert_eq!(join_feedback("", "b"), "b");
        assert_eq!(join_feedback("a", ""), "a");
        assert_eq!(join_feedback("", ""), "");
    }

    #[test]
    fn test_timestamp_to_datetime() {
        assert!(timestamp_to_datetime(1_700_000_000).unwrap().is_some());
        assert!(timestamp_to_datetime(i64::MAX).is_err());
    }
}
