//! Remote service clients
//!
//! Request/response adapters to the two external AI services: the question
//! generator / content scorer ("GenScore") and the audio + lip-sync
//! synthesizer / fluency scorer ("Speech"). Every call is an HTTP POST with a
//! JSON body; non-2xx responses become errors carrying the captured status
//! and body.

pub mod genscore;
pub mod speech;

pub use genscore::HttpGenScore;
pub use speech::HttpSpeech;

use async_trait::async_trait;
use intervox_common::models::{LipSync, QaPair, TotalScore};
use intervox_common::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ambient request metadata propagated to downstream services
///
/// Carries the authenticated user id plus any opaque `x-*` headers the edge
/// received; the engine forwards them without interpreting.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub user_id: u64,
    pub headers: Vec<(String, String)>,
}

impl RequestMeta {
    pub fn for_user(user_id: u64) -> Self {
        RequestMeta {
            user_id,
            headers: Vec::new(),
        }
    }
}

/// Question generation request context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContext {
    pub position: String,
    pub experience: String,
    pub language: String,
    pub skills: Vec<String>,
    pub max_questions: i32,
    pub skip_code: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub context: GenerateContext,
    pub submissions: Vec<QaPair>,
    pub remaining_questions: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSubmission {
    pub index: i32,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub interview_id: String,
    pub submissions: Vec<ScoreSubmission>,
    pub skills: Vec<String>,
}

/// Per-question verdict from the content scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionScore {
    pub index: i32,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub score: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillScore {
    pub skill: String,
    pub score: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    #[serde(default)]
    pub result: Vec<QuestionScore>,
    #[serde(default)]
    pub skills: Vec<SkillScore>,
    #[serde(default)]
    pub total_score: TotalScore,
    #[serde(default)]
    pub positive_feedback: String,
    #[serde(default)]
    pub actionable_feedback: String,
    #[serde(default)]
    pub final_comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeRequest {
    pub interview_id: String,
    pub content: String,
    pub voice_id: String,
    pub speed: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizeResponse {
    pub audio: String,
    pub lipsync: LipSync,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluencySubmission {
    pub index: i32,
    pub answer: String,
    pub record_proof: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluencyRequest {
    pub interview_id: String,
    pub submissions: Vec<FluencySubmission>,
}

/// Fluency verdict; `skills` is ordered so merges stay deterministic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluencyResponse {
    #[serde(default)]
    pub skills: BTreeMap<String, String>,
    #[serde(default)]
    pub actionable_feedback: String,
}

/// Question generator and content scorer
#[async_trait]
pub trait GenScoreApi: Send + Sync {
    async fn generate(&self, meta: &RequestMeta, req: &GenerateRequest)
        -> Result<GenerateResponse>;

    async fn score(&self, meta: &RequestMeta, req: &ScoreRequest) -> Result<ScoreResponse>;
}

/// Audio + lip-sync synthesizer and fluency scorer
#[async_trait]
pub trait SpeechApi: Send + Sync {
    async fn synthesize(
        &self,
        meta: &RequestMeta,
        req: &SynthesizeRequest,
    ) -> Result<SynthesizeResponse>;

    async fn score_fluency(
        &self,
        meta: &RequestMeta,
        req: &FluencyRequest,
    ) -> Result<FluencyResponse>;
}

/// Shared JSON POST helper for both service clients.
///
/// Propagates the caller's `x-*` metadata, captures the status and body of
/// non-2xx responses, and distinguishes unreachable hosts from malformed
/// payloads.
pub(crate) async fn post_json<B, T>(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    service: &'static str,
    meta: &RequestMeta,
    body: &B,
) -> Result<T>
where
    B: Serialize + ?Sized,
    T: serde::de::DeserializeOwned,
{
    use intervox_common::Error;
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

    let url = format!("{}{}", base_url.trim_end_matches('/'), path);

    let mut headers = HeaderMap::new();
    if meta.user_id != 0 {
        if let Ok(value) = HeaderValue::from_str(&meta.user_id.to_string()) {
            headers.insert("x-user-id", value);
        }
    }
    for (name, value) in &meta.headers {
        let parsed = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        );
        if let (Ok(name), Ok(value)) = parsed {
            headers.insert(name, value);
        }
    }

    let response = client
        .post(&url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(|e| Error::RemoteUnreachable {
            service: service.to_string(),
            detail: e.to_string(),
        })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::RemoteUnreachable {
            service: service.to_string(),
            detail: e.to_string(),
        })?;

    if !status.is_success() {
        return Err(Error::remote(service, status.as_u16(), body));
    }

    serde_json::from_str(&body).map_err(|e| Error::remote_invalid(service, e.to_string()))
}
