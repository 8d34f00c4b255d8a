//! Speech HTTP client
//!
//! Talks to the audio + lip-sync synthesizer and the fluency scorer. The
//! fluency endpoint sits behind a flaky gateway, so a 502 there gets a
//! bounded retry; every other non-2xx fails fast.

use async_trait::async_trait;
use intervox_common::{Error, Result};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    post_json, FluencyRequest, FluencyResponse, RequestMeta, SpeechApi, SynthesizeRequest,
    SynthesizeResponse,
};

const SERVICE: &str = "speech";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Retry budget for 502 responses from the fluency scorer
const FLUENCY_MAX_ATTEMPTS: u32 = 3;
const FLUENCY_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// HTTP implementation of [`SpeechApi`]
pub struct HttpSpeech {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSpeech {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(HttpSpeech {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SpeechApi for HttpSpeech {
    async fn synthesize(
        &self,
        meta: &RequestMeta,
        req: &SynthesizeRequest,
    ) -> Result<SynthesizeResponse> {
        debug!(
            interview_id = %req.interview_id,
            voice_id = %req.voice_id,
            "Requesting speech synthesis"
        );
        post_json(&self.client, &self.base_url, "/synthesize", SERVICE, meta, req).await
    }

    async fn score_fluency(
        &self,
        meta: &RequestMeta,
        req: &FluencyRequest,
    ) -> Result<FluencyResponse> {
        let mut attempt = 0;
        let mut backoff = FLUENCY_INITIAL_BACKOFF;

        loop {
            attempt += 1;
            let result = post_json(
                &self.client,
                &self.base_url,
                "/score_fluency",
                SERVICE,
                meta,
                req,
            )
            .await;

            match result {
                Err(Error::Remote { status: 502, .. }) if attempt < FLUENCY_MAX_ATTEMPTS => {
                    warn!(
                        interview_id = %req.interview_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Fluency scorer returned 502, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                other => return other,
            }
        }
    }
}
