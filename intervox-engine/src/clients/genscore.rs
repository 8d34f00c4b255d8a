//! GenScore HTTP client
//!
//! Talks to the question generator / content scorer over JSON POST.

use async_trait::async_trait;
use intervox_common::Result;
use std::time::Duration;
use tracing::debug;

use super::{post_json, GenScoreApi, GenerateRequest, GenerateResponse, RequestMeta, ScoreRequest, ScoreResponse};

const SERVICE: &str = "genscore";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP implementation of [`GenScoreApi`]
pub struct HttpGenScore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGenScore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| intervox_common::Error::Internal(e.to_string()))?;

        Ok(HttpGenScore {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl GenScoreApi for HttpGenScore {
    async fn generate(
        &self,
        meta: &RequestMeta,
        req: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        debug!(
            position = %req.context.position,
            remaining = req.remaining_questions,
            "Requesting question generation"
        );
        post_json(&self.client, &self.base_url, "/generate", SERVICE, meta, req).await
    }

    async fn score(&self, meta: &RequestMeta, req: &ScoreRequest) -> Result<ScoreResponse> {
        debug!(
            interview_id = %req.interview_id,
            submissions = req.submissions.len(),
            "Requesting content scoring"
        );
        post_json(&self.client, &self.base_url, "/score", SERVICE, meta, req).await
    }
}
