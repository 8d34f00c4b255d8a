//! Interview history and public catalog tests

mod helpers;

use chrono::{Duration as ChronoDuration, Utc};
use helpers::*;
use intervox_common::models::PublicQuestion;
use intervox_common::Error;
use intervox_engine::engine::{HistoryRequest, PublicQuestionsRequest};

const USER: u64 = 7;

fn history_request() -> HistoryRequest {
    HistoryRequest {
        page: 1,
        ..Default::default()
    }
}

async fn seed_history(h: &TestHarness) {
    let now = Utc::now();

    let mut english = completed_interview("iv-en", USER, "English");
    english.created_at = now - ChronoDuration::hours(2);
    english.overall_score = 3.5;
    english.total_questions = 5;
    h.repo.interviews.create(&english).await.unwrap();

    let mut vietnamese = completed_interview("iv-vi", USER, "Vietnamese");
    vietnamese.created_at = now - ChronoDuration::hours(1);
    vietnamese.overall_score = 2.0;
    vietnamese.position = "Data Engineer".to_string();
    vietnamese.total_questions = 8;
    h.repo.interviews.create(&vietnamese).await.unwrap();

    // In progress: never listed.
    let mut open = completed_interview("iv-open", USER, "English");
    open.status = intervox_common::models::InterviewStatus::InProgress;
    h.repo.interviews.create(&open).await.unwrap();

    // Another user's interview: never listed for USER.
    let other = completed_interview("iv-other", 99, "English");
    h.repo.interviews.create(&other).await.unwrap();
}

#[tokio::test]
async fn test_history_lists_only_own_completed_interviews() {
    let h = harness();
    seed_history(&h).await;

    let page = h
        .engine
        .get_interview_history(&meta(USER), history_request())
        .await
        .unwrap();
    assert_eq!(page.total_count, 2);
    let ids: Vec<&str> = page
        .interviews
        .iter()
        .map(|iv| iv.interview_id.as_str())
        .collect();
    assert!(ids.contains(&"iv-en"));
    assert!(ids.contains(&"iv-vi"));
}

#[tokio::test]
async fn test_history_default_sort_is_recency_desc() {
    let h = harness();
    seed_history(&h).await;

    let page = h
        .engine
        .get_interview_history(&meta(USER), history_request())
        .await
        .unwrap();
    assert_eq!(page.interviews[0].interview_id, "iv-vi"); // newer first
    assert_eq!(page.interviews[1].interview_id, "iv-en");
}

#[tokio::test]
async fn test_history_sort_by_overall_score_asc() {
    let h = harness();
    seed_history(&h).await;

    let req = HistoryRequest {
        sort: Some("overall_score".to_string()),
        order: Some("asc".to_string()),
        ..history_request()
    };
    let page = h
        .engine
        .get_interview_history(&meta(USER), req)
        .await
        .unwrap();
    assert_eq!(page.interviews[0].interview_id, "iv-vi"); // 2.0 before 3.5
}

#[tokio::test]
async fn test_history_sort_by_total_questions_desc() {
    let h = harness();
    seed_history(&h).await;

    let req = HistoryRequest {
        sort: Some("total_questions".to_string()),
        order: Some("desc".to_string()),
        ..history_request()
    };
    let page = h
        .engine
        .get_interview_history(&meta(USER), req)
        .await
        .unwrap();
    assert_eq!(page.interviews[0].interview_id, "iv-vi"); // 8 questions
}

#[tokio::test]
async fn test_history_english_only_and_query_filters() {
    let h = harness();
    seed_history(&h).await;

    let req = HistoryRequest {
        english_only: true,
        ..history_request()
    };
    let page = h
        .engine
        .get_interview_history(&meta(USER), req)
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.interviews[0].interview_id, "iv-en");

    let req = HistoryRequest {
        query: Some("data".to_string()), // case-insensitive position match
        ..history_request()
    };
    let page = h
        .engine
        .get_interview_history(&meta(USER), req)
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.interviews[0].interview_id, "iv-vi");
}

#[tokio::test]
async fn test_history_favorites_filter() {
    let h = harness();
    seed_history(&h).await;
    h.engine
        .favorite_interview(&meta(USER), "iv-en")
        .await
        .unwrap();

    let req = HistoryRequest {
        favorite: true,
        ..history_request()
    };
    let page = h
        .engine
        .get_interview_history(&meta(USER), req)
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.interviews[0].interview_id, "iv-en");
}

#[tokio::test]
async fn test_history_time_window_validation() {
    let h = harness();
    seed_history(&h).await;
    let now = Utc::now().timestamp();

    // Half-open window is rejected.
    let req = HistoryRequest {
        from: Some(now),
        ..history_request()
    };
    let err = h
        .engine
        .get_interview_history(&meta(USER), req)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    // Inverted window is rejected.
    let req = HistoryRequest {
        from: Some(now),
        to: Some(now - 3600),
        ..history_request()
    };
    let err = h
        .engine
        .get_interview_history(&meta(USER), req)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    // A valid window narrows the results.
    let req = HistoryRequest {
        from: Some(now - 90 * 60),
        to: Some(now),
        ..history_request()
    };
    let page = h
        .engine
        .get_interview_history(&meta(USER), req)
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.interviews[0].interview_id, "iv-vi");
}

#[tokio::test]
async fn test_history_rejects_unknown_sort() {
    let h = harness();
    let req = HistoryRequest {
        sort: Some("shoe_size".to_string()),
        ..history_request()
    };
    let err = h
        .engine
        .get_interview_history(&meta(USER), req)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn test_public_questions_paging_and_filters() {
    let h = harness();
    let now = Utc::now();
    let questions: Vec<PublicQuestion> = (0..25)
        .map(|i| PublicQuestion {
            position: if i % 2 == 0 { "Backend" } else { "Frontend" }.to_string(),
            experience: "mid".to_string(),
            language: "English".to_string(),
            content: format!("Public question {}", i),
            answer: String::new(),
            created_at: now,
            updated_at: now,
        })
        .collect();
    h.repo
        .public_questions
        .create_bulk(&questions)
        .await
        .unwrap();

    let page = h
        .engine
        .get_public_questions(PublicQuestionsRequest {
            page: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total_count, 25);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.questions.len(), 10);
    // Newest first.
    assert_eq!(page.questions[0].content, "Public question 24");

    let filtered = h
        .engine
        .get_public_questions(PublicQuestionsRequest {
            position: Some("backend".to_string()),
            page: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(filtered.total_count, 13);
    assert!(filtered.questions.iter().all(|q| q.position == "Backend"));

    let empty = h
        .engine
        .get_public_questions(PublicQuestionsRequest {
            language: Some("Klingon".to_string()),
            page: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(empty.total_count, 0);
    assert!(empty.questions.is_empty());
}
