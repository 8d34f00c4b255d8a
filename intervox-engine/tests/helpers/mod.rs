//! Test harness for session engine integration tests
//!
//! Provides an engine wired to the in-memory store, scripted fake remote
//! services, and short timeouts so the suites stay fast.

// Each test binary uses a subset of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use intervox_common::config::WorkerConfig;
use intervox_common::models::{
    Interview, InterviewStatus, LipSync, LipSyncMetadata, MouthCue, TotalScore,
};
use intervox_common::{Error, Result};
use intervox_engine::cache::MemoryCache;
use intervox_engine::clients::{
    FluencyRequest, FluencyResponse, GenScoreApi, GenerateRequest, GenerateResponse, QuestionScore,
    RequestMeta, ScoreRequest, ScoreResponse, SkillScore, SpeechApi, SynthesizeRequest,
    SynthesizeResponse,
};
use intervox_engine::engine::{EngineSettings, SessionEngine};
use intervox_engine::notify::Notifier;
use intervox_engine::store::Repository;

/// Scripted question generator / content scorer
#[derive(Default)]
pub struct FakeGenScore {
    pub generate_calls: AtomicU64,
    pub score_calls: AtomicU64,
    /// When set, `score` fails with a remote error
    pub fail_score: AtomicBool,
}

#[async_trait]
impl GenScoreApi for FakeGenScore {
    async fn generate(
        &self,
        _meta: &RequestMeta,
        _req: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        let call = self.generate_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GenerateResponse {
            questions: vec![format!("Generated question {}", call)],
        })
    }

    async fn score(&self, _meta: &RequestMeta, req: &ScoreRequest) -> Result<ScoreResponse> {
        self.score_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_score.load(Ordering::SeqCst) {
            return Err(Error::remote("genscore", 500, "scorer unavailable"));
        }

        let result: Vec<QuestionScore> = req
            .submissions
            .iter()
            .map(|s| QuestionScore {
                index: s.index,
                comment: if s.answer.is_empty() {
                    String::new()
                } else {
                    "Good answer.".to_string()
                },
                score: if s.answer.is_empty() {
                    String::new()
                } else {
                    "A".to_string()
                },
            })
            .collect();
        let graded = result.iter().filter(|r| !r.score.is_empty()).count() as i32;
        let failed = result.len() as i32 - graded;

        Ok(ScoreResponse {
            result,
            skills: vec![
                SkillScore {
                    skill: "Communication".to_string(),
                    score: "A".to_string(),
                },
                SkillScore {
                    skill: "Clarity".to_string(),
                    score: "B".to_string(),
                },
            ],
            total_score: TotalScore {
                a: graded,
                f: failed,
                ..Default::default()
            },
            positive_feedback: "Strong fundamentals.".to_string(),
            actionable_feedback: "Practice concision.".to_string(),
            final_comment: "Overall solid.".to_string(),
        })
    }
}

/// Scripted synthesizer / fluency scorer
#[derive(Default)]
pub struct FakeSpeech {
    pub synthesize_calls: AtomicU64,
    pub fluency_calls: AtomicU64,
    /// When set, `score_fluency` fails with a remote error
    pub fail_fluency: AtomicBool,
}

pub fn test_lipsync() -> LipSync {
    LipSync {
        metadata: LipSyncMetadata {
            sound_file: "utterance.wav".to_string(),
            duration: 1.2,
        },
        mouth_cues: vec![
            MouthCue {
                start: 0.0,
                end: 0.6,
                value: "A".to_string(),
            },
            MouthCue {
                start: 0.6,
                end: 1.2,
                value: "B".to_string(),
            },
        ],
    }
}

#[async_trait]
impl SpeechApi for FakeSpeech {
    async fn synthesize(
        &self,
        _meta: &RequestMeta,
        _req: &SynthesizeRequest,
    ) -> Result<SynthesizeResponse> {
        self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SynthesizeResponse {
            audio: "QXVkaW8=".to_string(),
            lipsync: test_lipsync(),
        })
    }

    async fn score_fluency(
        &self,
        _meta: &RequestMeta,
        _req: &FluencyRequest,
    ) -> Result<FluencyResponse> {
        self.fluency_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fluency.load(Ordering::SeqCst) {
            return Err(Error::remote("speech", 502, "gateway hiccup"));
        }

        let mut skills = BTreeMap::new();
        // "Communication" collides with the content scorer's verdict on
        // purpose: the merge must prefer the content scorer.
        skills.insert("Communication".to_string(), "C".to_string());
        skills.insert("Fluency".to_string(), "B".to_string());
        Ok(FluencyResponse {
            skills,
            actionable_feedback: "Slow down a little.".to_string(),
        })
    }
}

pub struct TestHarness {
    pub engine: Arc<SessionEngine>,
    pub repo: Repository,
    pub genscore: Arc<FakeGenScore>,
    pub speech: Arc<FakeSpeech>,
    pub notifier: Arc<Notifier>,
}

pub fn harness() -> TestHarness {
    harness_with_timeout(Duration::from_secs(60))
}

pub fn harness_with_timeout(question_timeout: Duration) -> TestHarness {
    let repo = Repository::in_memory();
    let genscore = Arc::new(FakeGenScore::default());
    let speech = Arc::new(FakeSpeech::default());
    let notifier = Arc::new(Notifier::new());

    let settings = EngineSettings {
        question_timeout,
        page_size: 10,
        context_qa_length: 3,
        worker: WorkerConfig {
            size: 2,
            max_tasks_per_worker: 4,
            max_idle_time: 60,
            max_task_wait_time: 1,
        },
        cache_namespace: "test".to_string(),
        composer_seed: Some(7),
    };

    let engine = SessionEngine::new(
        repo.clone(),
        genscore.clone(),
        speech.clone(),
        Arc::clone(&notifier),
        Arc::new(MemoryCache::new()),
        settings,
    );

    TestHarness {
        engine,
        repo,
        genscore,
        speech,
        notifier,
    }
}

pub fn meta(user_id: u64) -> RequestMeta {
    RequestMeta::for_user(user_id)
}

/// Completed-interview row for seeding history tests.
pub fn completed_interview(id: &str, user_id: u64, language: &str) -> Interview {
    Interview {
        id: id.to_string(),
        user_id,
        position: "Backend".to_string(),
        experience: "mid".to_string(),
        language: language.to_string(),
        voice_id: "en-US-amy".to_string(),
        speed: 1,
        skills: vec!["Communication".to_string()],
        skills_score: vec!["A".to_string()],
        skip_code: false,
        skip_intro: true,
        total_questions: 2,
        remaining_questions: 0,
        total_score: None,
        overall_score: 3.0,
        positive_feedback: String::new(),
        actionable_feedback: String::new(),
        final_comment: String::new(),
        status: InterviewStatus::Completed,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Poll an async predicate until it holds or the timeout elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
