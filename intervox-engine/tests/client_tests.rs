//! Remote client tests against a local stub server
//!
//! Spin up a minimal axum server and point the real HTTP clients at it to
//! verify payload handling, error capture, metadata propagation, and the
//! fluency scorer's bounded 502 retry.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use intervox_common::Error;
use intervox_engine::clients::{
    FluencyRequest, GenScoreApi, GenerateContext, GenerateRequest, HttpGenScore, HttpSpeech,
    RequestMeta, SpeechApi, SynthesizeRequest,
};

#[derive(Clone)]
struct StubState {
    fluency_calls: Arc<AtomicU64>,
    /// How many 502 responses to serve before succeeding
    fail_first: u64,
    /// Status to fail with
    fail_status: StatusCode,
    seen_user_header: Arc<std::sync::Mutex<Option<String>>>,
}

async fn stub_generate(State(state): State<StubState>, headers: HeaderMap) -> Json<serde_json::Value> {
    if let Some(value) = headers.get("x-user-id") {
        *state.seen_user_header.lock().unwrap() =
            Some(value.to_str().unwrap_or_default().to_string());
    }
    Json(json!({ "questions": ["What is a mutex?"] }))
}

async fn stub_synthesize(State(_state): State<StubState>) -> Json<serde_json::Value> {
    Json(json!({
        "audio": "QXVkaW8=",
        "lipsync": {
            "metadata": { "soundFile": "utterance.wav", "duration": 1.0 },
            "mouthCues": [ { "start": 0.0, "end": 1.0, "value": "A" } ]
        }
    }))
}

async fn stub_score_fluency(
    State(state): State<StubState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let call = state.fluency_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if call <= state.fail_first {
        return Err((state.fail_status, "upstream unavailable".to_string()));
    }
    Ok(Json(json!({
        "skills": { "Fluency": "B" },
        "actionableFeedback": "Slow down."
    })))
}

async fn spawn_stub(fail_first: u64, fail_status: StatusCode) -> (String, StubState) {
    let state = StubState {
        fluency_calls: Arc::new(AtomicU64::new(0)),
        fail_first,
        fail_status,
        seen_user_header: Arc::new(std::sync::Mutex::new(None)),
    };
    let app = Router::new()
        .route("/generate", post(stub_generate))
        .route("/synthesize", post(stub_synthesize))
        .route("/score_fluency", post(stub_score_fluency))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

fn generate_request() -> GenerateRequest {
    GenerateRequest {
        context: GenerateContext {
            position: "Backend".to_string(),
            experience: "mid".to_string(),
            language: "English".to_string(),
            skills: vec![],
            max_questions: 5,
            skip_code: false,
        },
        submissions: vec![],
        remaining_questions: 5,
    }
}

fn fluency_request() -> FluencyRequest {
    FluencyRequest {
        interview_id: "iv-1".to_string(),
        submissions: vec![],
    }
}

#[tokio::test]
async fn test_generate_round_trip_and_user_header() {
    let (base_url, state) = spawn_stub(0, StatusCode::BAD_GATEWAY).await;
    let client = HttpGenScore::new(base_url).unwrap();

    let response = client
        .generate(&RequestMeta::for_user(42), &generate_request())
        .await
        .unwrap();
    assert_eq!(response.questions, vec!["What is a mutex?".to_string()]);
    assert_eq!(
        state.seen_user_header.lock().unwrap().as_deref(),
        Some("42")
    );
}

#[tokio::test]
async fn test_synthesize_parses_lipsync() {
    let (base_url, _state) = spawn_stub(0, StatusCode::BAD_GATEWAY).await;
    let client = HttpSpeech::new(base_url).unwrap();

    let response = client
        .synthesize(
            &RequestMeta::for_user(42),
            &SynthesizeRequest {
                interview_id: "iv-1".to_string(),
                content: "Hello there.".to_string(),
                voice_id: "en-US-amy".to_string(),
                speed: 1,
            },
        )
        .await
        .unwrap();
    assert_eq!(response.audio, "QXVkaW8=");
    assert_eq!(response.lipsync.mouth_cues.len(), 1);
    assert_eq!(response.lipsync.metadata.duration, 1.0);
}

#[tokio::test]
async fn test_fluency_retries_502_then_succeeds() {
    let (base_url, state) = spawn_stub(2, StatusCode::BAD_GATEWAY).await;
    let client = HttpSpeech::new(base_url).unwrap();

    let response = client
        .score_fluency(&RequestMeta::for_user(42), &fluency_request())
        .await
        .unwrap();
    assert_eq!(response.skills.get("Fluency").unwrap(), "B");
    // Two 502s plus the successful third attempt.
    assert_eq!(state.fluency_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_fluency_gives_up_after_three_502s() {
    let (base_url, state) = spawn_stub(10, StatusCode::BAD_GATEWAY).await;
    let client = HttpSpeech::new(base_url).unwrap();

    let err = client
        .score_fluency(&RequestMeta::for_user(42), &fluency_request())
        .await
        .unwrap_err();
    match err {
        Error::Remote { status, .. } => assert_eq!(status, 502),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(state.fluency_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_fluency_other_statuses_fail_fast() {
    let (base_url, state) = spawn_stub(10, StatusCode::INTERNAL_SERVER_ERROR).await;
    let client = HttpSpeech::new(base_url).unwrap();

    let err = client
        .score_fluency(&RequestMeta::for_user(42), &fluency_request())
        .await
        .unwrap_err();
    match err {
        Error::Remote { status, body, .. } => {
            assert_eq!(status, 500);
            assert!(body.contains("upstream unavailable"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(state.fluency_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_host_is_distinguished() {
    // Port 9 (discard) is essentially never listening locally.
    let client = HttpGenScore::new("http://127.0.0.1:9").unwrap();
    let err = client
        .generate(&RequestMeta::for_user(42), &generate_request())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RemoteUnreachable { .. }));
}
