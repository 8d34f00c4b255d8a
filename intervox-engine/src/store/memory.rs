//! In-memory store
//!
//! Implements the full repository contract over plain maps. Used by the test
//! suites; behavior (idempotent question insert, favorite toggle, history
//! filtering and sorting) mirrors the SQLite store.

use async_trait::async_trait;
use intervox_common::models::{
    Interview, InterviewStatus, LipSync, PublicQuestion, QaPair, Question,
};
use intervox_common::pagination::paginate;
use intervox_common::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use super::{
    HistoryFilter, InterviewPage, InterviewStore, PublicQuestionFilter, PublicQuestionPage,
    PublicQuestionStore, QuestionStore, SortDir, SortField,
};

/// Map-backed repository for tests
#[derive(Default)]
pub struct MemoryStore {
    interviews: Mutex<HashMap<String, Interview>>,
    questions: Mutex<BTreeMap<(String, i32), Question>>,
    favorites: Mutex<HashSet<(u64, String)>>,
    public_questions: Mutex<Vec<PublicQuestion>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the public catalog directly (test convenience).
    pub fn seed_public_questions(&self, questions: Vec<PublicQuestion>) {
        self.public_questions.lock().unwrap().extend(questions);
    }
}

fn matches_query(interview: &Interview, query: &str) -> bool {
    let query = query.to_lowercase();
    [
        &interview.position,
        &interview.experience,
        &interview.language,
        &interview.voice_id,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&query))
}

#[async_trait]
impl InterviewStore for MemoryStore {
    async fn create(&self, interview: &Interview) -> Result<()> {
        let mut interviews = self.interviews.lock().unwrap();
        if interviews.contains_key(&interview.id) {
            return Err(Error::Internal(format!(
                "interview {} already exists",
                interview.id
            )));
        }
        interviews.insert(interview.id.clone(), interview.clone());
        Ok(())
    }

    async fn update(&self, interview: &Interview) -> Result<()> {
        let mut interviews = self.interviews.lock().unwrap();
        match interviews.get_mut(&interview.id) {
            Some(existing) => {
                *existing = interview.clone();
                existing.updated_at = chrono::Utc::now();
                Ok(())
            }
            None => Err(Error::NotFound(format!("interview {}", interview.id))),
        }
    }

    async fn get(&self, id: &str) -> Result<Interview> {
        self.interviews
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("interview {}", id)))
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.interviews.lock().unwrap().contains_key(id))
    }

    async fn list(&self, filter: &HistoryFilter) -> Result<InterviewPage> {
        let favorites = self.favorites.lock().unwrap().clone();
        let mut matched: Vec<Interview> = self
            .interviews
            .lock()
            .unwrap()
            .values()
            .filter(|iv| iv.status == InterviewStatus::Completed)
            .filter(|iv| iv.user_id == filter.user_id)
            .filter(|iv| {
                filter
                    .query
                    .as_ref()
                    .filter(|q| !q.is_empty())
                    .map_or(true, |q| matches_query(iv, q))
            })
            .filter(|iv| !filter.english_only || iv.language == "English")
            .filter(|iv| filter.from.map_or(true, |from| iv.created_at >= from))
            .filter(|iv| filter.to.map_or(true, |to| iv.created_at <= to))
            .filter(|iv| {
                !filter.favorites_only
                    || favorites.contains(&(filter.user_id, iv.id.clone()))
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ordering = match filter.sort {
                SortField::Recency => a.created_at.cmp(&b.created_at),
                SortField::TotalQuestions => a.total_questions.cmp(&b.total_questions),
                SortField::OverallScore => a
                    .overall_score
                    .partial_cmp(&b.overall_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            };
            match filter.dir {
                SortDir::Asc => ordering,
                SortDir::Desc => ordering.reverse(),
            }
        });

        let total_count = matched.len() as i64;
        let pagination = paginate(total_count, filter.page, filter.page_size);
        let interviews = matched
            .into_iter()
            .skip(pagination.offset as usize)
            .take(filter.page_size as usize)
            .collect();

        Ok(InterviewPage {
            interviews,
            total_count,
            total_pages: pagination.total_pages,
            page: pagination.page,
        })
    }

    async fn toggle_favorite(&self, user_id: u64, interview_id: &str) -> Result<bool> {
        let mut favorites = self.favorites.lock().unwrap();
        let key = (user_id, interview_id.to_string());
        if favorites.remove(&key) {
            Ok(false)
        } else {
            favorites.insert(key);
            Ok(true)
        }
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn insert(&self, question: &Question) -> Result<bool> {
        let mut questions = self.questions.lock().unwrap();
        let key = (question.interview_id.clone(), question.question_index);
        if questions.contains_key(&key) {
            return Ok(false);
        }
        questions.insert(key, question.clone());
        Ok(true)
    }

    async fn update(&self, question: &Question) -> Result<()> {
        let mut questions = self.questions.lock().unwrap();
        let key = (question.interview_id.clone(), question.question_index);
        match questions.get_mut(&key) {
            Some(existing) => {
                *existing = question.clone();
                existing.updated_at = chrono::Utc::now();
                Ok(())
            }
            None => Err(Error::NotFound(format!(
                "question {}:{}",
                question.interview_id, question.question_index
            ))),
        }
    }

    async fn upsert_artifacts(
        &self,
        interview_id: &str,
        question_index: i32,
        audio: &str,
        lipsync: &LipSync,
    ) -> Result<()> {
        let mut questions = self.questions.lock().unwrap();
        let key = (interview_id.to_string(), question_index);
        match questions.get_mut(&key) {
            Some(existing) => {
                existing.audio = audio.to_string();
                existing.lipsync = Some(lipsync.clone());
                existing.updated_at = chrono::Utc::now();
                Ok(())
            }
            None => Err(Error::NotFound(format!(
                "question {}:{}",
                interview_id, question_index
            ))),
        }
    }

    async fn get(&self, interview_id: &str, question_index: i32) -> Result<Question> {
        self.find(interview_id, question_index).await?.ok_or_else(|| {
            Error::NotFound(format!("question {}:{}", interview_id, question_index))
        })
    }

    async fn find(&self, interview_id: &str, question_index: i32) -> Result<Option<Question>> {
        Ok(self
            .questions
            .lock()
            .unwrap()
            .get(&(interview_id.to_string(), question_index))
            .cloned())
    }

    async fn list(&self, interview_id: &str) -> Result<Vec<Question>> {
        Ok(self
            .questions
            .lock()
            .unwrap()
            .values()
            .filter(|q| q.interview_id == interview_id)
            .cloned()
            .collect())
    }

    async fn recent_pairs(&self, interview_id: &str, limit: i64) -> Result<Vec<QaPair>> {
        let questions = QuestionStore::list(self, interview_id).await?;
        let skip = questions.len().saturating_sub(limit.max(0) as usize);
        Ok(questions
            .into_iter()
            .skip(skip)
            .map(|q| QaPair {
                question: q.content,
                answer: q.answer,
            })
            .collect())
    }

    async fn max_settled_index(&self, interview_id: &str) -> Result<i32> {
        Ok(self
            .questions
            .lock()
            .unwrap()
            .values()
            .filter(|q| q.interview_id == interview_id && q.status.is_settled())
            .map(|q| q.question_index)
            .max()
            .unwrap_or(0))
    }
}

#[async_trait]
impl PublicQuestionStore for MemoryStore {
    async fn list(&self, filter: &PublicQuestionFilter) -> Result<PublicQuestionPage> {
        let mut matched: Vec<PublicQuestion> = self
            .public_questions
            .lock()
            .unwrap()
            .iter()
            .filter(|q| {
                filter
                    .position
                    .as_ref()
                    .filter(|p| !p.is_empty())
                    .map_or(true, |p| {
                        q.position.to_lowercase().contains(&p.to_lowercase())
                    })
            })
            .filter(|q| {
                filter
                    .experience
                    .as_ref()
                    .filter(|e| !e.is_empty())
                    .map_or(true, |e| q.experience == **e)
            })
            .filter(|q| {
                filter
                    .language
                    .as_ref()
                    .filter(|l| !l.is_empty())
                    .map_or(true, |l| q.language == **l)
            })
            .cloned()
            .collect();
        matched.reverse(); // newest first

        let total_count = matched.len() as i64;
        let pagination = paginate(total_count, filter.page, filter.page_size);
        let questions = matched
            .into_iter()
            .skip(pagination.offset as usize)
            .take(filter.page_size as usize)
            .collect();

        Ok(PublicQuestionPage {
            questions,
            total_count,
            total_pages: pagination.total_pages,
            page: pagination.page,
        })
    }

    async fn create_bulk(&self, questions: &[PublicQuestion]) -> Result<()> {
        self.public_questions
            .lock()
            .unwrap()
            .extend(questions.iter().cloned());
        Ok(())
    }
}
