//! SQLite store tests
//!
//! Verify the persistence contract against a throwaway database file:
//! idempotent question inserts, artifact upserts, derived counters, the
//! favorite toggle, and history filtering.

mod helpers;

use chrono::{Duration as ChronoDuration, Utc};
use helpers::{completed_interview, test_lipsync};
use tempfile::TempDir;

use intervox_common::models::{InterviewStatus, Question, QuestionStatus};
use intervox_common::Error;
use intervox_engine::store::{sqlite, HistoryFilter, Repository, SortDir, SortField};

const USER: u64 = 7;

async fn sqlite_repo() -> (Repository, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let pool = sqlite::init_database(&temp_dir.path().join("test.db"))
        .await
        .unwrap();
    (Repository::sqlite(pool), temp_dir)
}

#[tokio::test]
async fn test_interview_round_trip() {
    let (repo, _guard) = sqlite_repo().await;
    let mut interview = completed_interview("iv-1", USER, "English");
    interview.status = InterviewStatus::InProgress;
    repo.interviews.create(&interview).await.unwrap();

    assert!(repo.interviews.exists("iv-1").await.unwrap());
    assert!(!repo.interviews.exists("iv-2").await.unwrap());

    let loaded = repo.interviews.get("iv-1").await.unwrap();
    assert_eq!(loaded.id, "iv-1");
    assert_eq!(loaded.user_id, USER);
    assert_eq!(loaded.position, "Backend");
    assert_eq!(loaded.skills, vec!["Communication".to_string()]);
    assert_eq!(loaded.status, InterviewStatus::InProgress);

    let err = repo.interviews.get("iv-2").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_interview_update_persists_scoring_fields() {
    let (repo, _guard) = sqlite_repo().await;
    let mut interview = completed_interview("iv-1", USER, "English");
    interview.status = InterviewStatus::InProgress;
    repo.interviews.create(&interview).await.unwrap();

    interview.status = InterviewStatus::Completed;
    interview.skills = vec!["Communication".to_string(), "Fluency".to_string()];
    interview.skills_score = vec!["A".to_string(), "B".to_string()];
    interview.total_score = Some(intervox_common::models::TotalScore {
        a: 1,
        b: 1,
        ..Default::default()
    });
    interview.overall_score = 3.5;
    interview.final_comment = "Well done.".to_string();
    repo.interviews.update(&interview).await.unwrap();

    let loaded = repo.interviews.get("iv-1").await.unwrap();
    assert_eq!(loaded.status, InterviewStatus::Completed);
    assert_eq!(loaded.skills_score, vec!["A", "B"]);
    assert_eq!(loaded.total_score.unwrap().a, 1);
    assert_eq!(loaded.overall_score, 3.5);
    assert_eq!(loaded.final_comment, "Well done.");
}

#[tokio::test]
async fn test_question_insert_is_idempotent() {
    let (repo, _guard) = sqlite_repo().await;
    let mut interview = completed_interview("iv-1", USER, "English");
    interview.status = InterviewStatus::InProgress;
    repo.interviews.create(&interview).await.unwrap();

    let question = Question::new("iv-1", 1, "What is ownership?");
    assert!(repo.questions.insert(&question).await.unwrap());
    // Duplicate (interview_id, question_index) is a clean no-op.
    assert!(!repo.questions.insert(&question).await.unwrap());

    let listed = repo.questions.list("iv-1").await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_artifact_upsert_writes_both_or_neither() {
    let (repo, _guard) = sqlite_repo().await;
    let mut interview = completed_interview("iv-1", USER, "English");
    interview.status = InterviewStatus::InProgress;
    repo.interviews.create(&interview).await.unwrap();
    repo.questions
        .insert(&Question::new("iv-1", 1, "Q"))
        .await
        .unwrap();

    let lipsync = test_lipsync();
    repo.questions
        .upsert_artifacts("iv-1", 1, "QXVkaW8=", &lipsync)
        .await
        .unwrap();
    // Repeating the upsert is harmless.
    repo.questions
        .upsert_artifacts("iv-1", 1, "QXVkaW8=", &lipsync)
        .await
        .unwrap();

    let loaded = repo.questions.get("iv-1", 1).await.unwrap();
    assert!(loaded.is_rendered());
    assert_eq!(loaded.audio, "QXVkaW8=");
    let cues = loaded.lipsync.unwrap().mouth_cues;
    assert_eq!(cues.len(), 2);
    assert!(cues[0].start <= cues[1].start);

    // Upserting artifacts for a missing row is an error, not a new row.
    let err = repo
        .questions
        .upsert_artifacts("iv-1", 9, "QXVkaW8=", &lipsync)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_recent_pairs_and_max_settled() {
    let (repo, _guard) = sqlite_repo().await;
    let mut interview = completed_interview("iv-1", USER, "English");
    interview.status = InterviewStatus::InProgress;
    repo.interviews.create(&interview).await.unwrap();

    for i in 1..=4 {
        let mut q = Question::new("iv-1", i, format!("Question {}", i));
        if i <= 2 {
            q.answer = format!("Answer {}", i);
            q.status = QuestionStatus::Answered;
        }
        repo.questions.insert(&q).await.unwrap();
    }

    let pairs = repo.questions.recent_pairs("iv-1", 2).await.unwrap();
    assert_eq!(pairs.len(), 2);
    // Oldest first within the trailing window.
    assert_eq!(pairs[0].question, "Question 3");
    assert_eq!(pairs[1].question, "Question 4");

    assert_eq!(repo.questions.max_settled_index("iv-1").await.unwrap(), 2);
}

#[tokio::test]
async fn test_favorite_toggle() {
    let (repo, _guard) = sqlite_repo().await;
    let interview = completed_interview("iv-1", USER, "English");
    repo.interviews.create(&interview).await.unwrap();

    assert!(repo.interviews.toggle_favorite(USER, "iv-1").await.unwrap());
    assert!(!repo.interviews.toggle_favorite(USER, "iv-1").await.unwrap());
    // Toggling twice leaves the favorite set unchanged.
    assert!(repo.interviews.toggle_favorite(USER, "iv-1").await.unwrap());
}

#[tokio::test]
async fn test_history_list_filters_and_sorts() {
    let (repo, _guard) = sqlite_repo().await;
    let now = Utc::now();

    let mut a = completed_interview("iv-a", USER, "English");
    a.created_at = now - ChronoDuration::hours(3);
    a.overall_score = 1.0;
    repo.interviews.create(&a).await.unwrap();

    let mut b = completed_interview("iv-b", USER, "Vietnamese");
    b.created_at = now - ChronoDuration::hours(1);
    b.overall_score = 4.0;
    b.position = "Data Engineer".to_string();
    repo.interviews.create(&b).await.unwrap();

    let mut open = completed_interview("iv-open", USER, "English");
    open.status = InterviewStatus::InProgress;
    repo.interviews.create(&open).await.unwrap();

    let other = completed_interview("iv-other", 99, "English");
    repo.interviews.create(&other).await.unwrap();

    let mut filter = HistoryFilter::for_user(USER, 10);
    let page = repo.interviews.list(&filter).await.unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.interviews[0].id, "iv-b"); // recency desc

    filter.sort = SortField::OverallScore;
    filter.dir = SortDir::Asc;
    let page = repo.interviews.list(&filter).await.unwrap();
    assert_eq!(page.interviews[0].id, "iv-a");

    let mut filter = HistoryFilter::for_user(USER, 10);
    filter.english_only = true;
    let page = repo.interviews.list(&filter).await.unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.interviews[0].id, "iv-a");

    let mut filter = HistoryFilter::for_user(USER, 10);
    filter.query = Some("DATA".to_string());
    let page = repo.interviews.list(&filter).await.unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.interviews[0].id, "iv-b");

    let mut filter = HistoryFilter::for_user(USER, 10);
    filter.from = Some(now - ChronoDuration::hours(2));
    filter.to = Some(now);
    let page = repo.interviews.list(&filter).await.unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.interviews[0].id, "iv-b");

    repo.interviews.toggle_favorite(USER, "iv-a").await.unwrap();
    let mut filter = HistoryFilter::for_user(USER, 10);
    filter.favorites_only = true;
    let page = repo.interviews.list(&filter).await.unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.interviews[0].id, "iv-a");
}

#[tokio::test]
async fn test_cascade_delete_questions_with_interview() {
    let (repo, temp_dir) = sqlite_repo().await;
    let mut interview = completed_interview("iv-1", USER, "English");
    interview.status = InterviewStatus::InProgress;
    repo.interviews.create(&interview).await.unwrap();
    repo.questions
        .insert(&Question::new("iv-1", 1, "Q"))
        .await
        .unwrap();

    // Delete the aggregate root directly; children must cascade.
    let pool = sqlite::init_database(&temp_dir.path().join("test.db"))
        .await
        .unwrap();
    sqlx::query("DELETE FROM interviews WHERE id = 'iv-1'")
        .execute(&pool)
        .await
        .unwrap();

    assert!(repo
        .questions
        .find("iv-1", 1)
        .await
        .unwrap()
        .is_none());
}
