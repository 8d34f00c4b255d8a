//! SQLite store
//!
//! One `SqliteStore` implements all three repository contracts over a shared
//! pool. Timestamps are stored as RFC 3339 text, list-valued fields as JSON
//! text. The `(interview_id, question_index)` unique index backs the
//! idempotent insert the preparation pipeline relies on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intervox_common::models::{
    Interview, InterviewStatus, LipSync, PublicQuestion, QaPair, Question, QuestionStatus,
    TotalScore,
};
use intervox_common::pagination::paginate;
use intervox_common::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::info;

use super::{
    HistoryFilter, InterviewPage, InterviewStore, PublicQuestionFilter, PublicQuestionPage,
    PublicQuestionStore, QuestionStore, SortDir, SortField,
};

/// Open (creating if needed) the database and apply the schema.
pub async fn init_database(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    info!("Database initialized at {}", path.display());
    Ok(pool)
}

/// Create the tables and indexes when absent.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interviews (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            position TEXT NOT NULL,
            experience TEXT NOT NULL DEFAULT '',
            language TEXT NOT NULL,
            voice_id TEXT NOT NULL DEFAULT '',
            speed INTEGER NOT NULL DEFAULT 1,
            skills TEXT NOT NULL DEFAULT '[]',
            skills_score TEXT NOT NULL DEFAULT '[]',
            skip_code INTEGER NOT NULL DEFAULT 0,
            skip_intro INTEGER NOT NULL DEFAULT 0,
            total_questions INTEGER NOT NULL DEFAULT 10,
            remaining_questions INTEGER NOT NULL DEFAULT 10,
            total_score TEXT,
            overall_score REAL NOT NULL DEFAULT 0,
            positive_feedback TEXT NOT NULL DEFAULT '',
            actionable_feedback TEXT NOT NULL DEFAULT '',
            final_comment TEXT NOT NULL DEFAULT '',
            status INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            interview_id TEXT NOT NULL REFERENCES interviews(id) ON DELETE CASCADE,
            question_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            audio TEXT NOT NULL DEFAULT '',
            lipsync TEXT,
            answer TEXT NOT NULL DEFAULT '',
            record_proof TEXT NOT NULL DEFAULT '',
            comment TEXT NOT NULL DEFAULT '',
            score TEXT NOT NULL DEFAULT '',
            status INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (interview_id, question_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interview_favorites (
            user_id INTEGER NOT NULL,
            interview_id TEXT NOT NULL REFERENCES interviews(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            UNIQUE (user_id, interview_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS public_questions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            position TEXT NOT NULL,
            experience TEXT NOT NULL,
            language TEXT NOT NULL,
            content TEXT NOT NULL,
            answer TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// SQLite-backed repository
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_interview(row: &sqlx::sqlite::SqliteRow) -> Interview {
    let skills: Vec<String> =
        serde_json::from_str(&row.get::<String, _>("skills")).unwrap_or_default();
    let skills_score: Vec<String> =
        serde_json::from_str(&row.get::<String, _>("skills_score")).unwrap_or_default();
    let total_score: Option<TotalScore> = row
        .get::<Option<String>, _>("total_score")
        .and_then(|raw| serde_json::from_str(&raw).ok());

    Interview {
        id: row.get("id"),
        user_id: row.get::<i64, _>("user_id") as u64,
        position: row.get("position"),
        experience: row.get("experience"),
        language: row.get("language"),
        voice_id: row.get("voice_id"),
        speed: row.get::<i64, _>("speed") as i32,
        skills,
        skills_score,
        skip_code: row.get::<i64, _>("skip_code") != 0,
        skip_intro: row.get::<i64, _>("skip_intro") != 0,
        total_questions: row.get::<i64, _>("total_questions") as i32,
        remaining_questions: row.get::<i64, _>("remaining_questions") as i32,
        total_score,
        overall_score: row.get("overall_score"),
        positive_feedback: row.get("positive_feedback"),
        actionable_feedback: row.get("actionable_feedback"),
        final_comment: row.get("final_comment"),
        status: InterviewStatus::from_code(row.get::<i64, _>("status") as i32),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at")),
    }
}

fn row_to_question(row: &sqlx::sqlite::SqliteRow) -> Question {
    let lipsync: Option<LipSync> = row
        .get::<Option<String>, _>("lipsync")
        .and_then(|raw| serde_json::from_str(&raw).ok());

    Question {
        interview_id: row.get("interview_id"),
        question_index: row.get::<i64, _>("question_index") as i32,
        content: row.get("content"),
        audio: row.get("audio"),
        lipsync,
        answer: row.get("answer"),
        record_proof: row.get("record_proof"),
        comment: row.get("comment"),
        score: row.get("score"),
        status: QuestionStatus::from_code(row.get::<i64, _>("status") as i32),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at")),
    }
}

#[async_trait]
impl InterviewStore for SqliteStore {
    async fn create(&self, interview: &Interview) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO interviews (
                id, user_id, position, experience, language, voice_id, speed,
                skills, skills_score, skip_code, skip_intro,
                total_questions, remaining_questions, total_score, overall_score,
                positive_feedback, actionable_feedback, final_comment, status,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&interview.id)
        .bind(interview.user_id as i64)
        .bind(&interview.position)
        .bind(&interview.experience)
        .bind(&interview.language)
        .bind(&interview.voice_id)
        .bind(interview.speed as i64)
        .bind(to_json(&interview.skills))
        .bind(to_json(&interview.skills_score))
        .bind(interview.skip_code as i64)
        .bind(interview.skip_intro as i64)
        .bind(interview.total_questions as i64)
        .bind(interview.remaining_questions as i64)
        .bind(interview.total_score.as_ref().map(to_json))
        .bind(interview.overall_score)
        .bind(&interview.positive_feedback)
        .bind(&interview.actionable_feedback)
        .bind(&interview.final_comment)
        .bind(interview.status.code() as i64)
        .bind(interview.created_at.to_rfc3339())
        .bind(interview.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, interview: &Interview) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE interviews SET
                position = ?, experience = ?, language = ?, voice_id = ?, speed = ?,
                skills = ?, skills_score = ?, skip_code = ?, skip_intro = ?,
                total_questions = ?, remaining_questions = ?, total_score = ?,
                overall_score = ?, positive_feedback = ?, actionable_feedback = ?,
                final_comment = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&interview.position)
        .bind(&interview.experience)
        .bind(&interview.language)
        .bind(&interview.voice_id)
        .bind(interview.speed as i64)
        .bind(to_json(&interview.skills))
        .bind(to_json(&interview.skills_score))
        .bind(interview.skip_code as i64)
        .bind(interview.skip_intro as i64)
        .bind(interview.total_questions as i64)
        .bind(interview.remaining_questions as i64)
        .bind(interview.total_score.as_ref().map(to_json))
        .bind(interview.overall_score)
        .bind(&interview.positive_feedback)
        .bind(&interview.actionable_feedback)
        .bind(&interview.final_comment)
        .bind(interview.status.code() as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(&interview.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("interview {}", interview.id)));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Interview> {
        let row = sqlx::query("SELECT * FROM interviews WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("interview {}", id)))?;
        Ok(row_to_interview(&row))
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM interviews WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn list(&self, filter: &HistoryFilter) -> Result<InterviewPage> {
        let mut conditions = vec![
            "status = 2".to_string(),
            "user_id = ?".to_string(),
        ];
        let mut text_binds: Vec<String> = Vec::new();

        if let Some(query) = filter.query.as_ref().filter(|q| !q.is_empty()) {
            conditions.push(
                "(position LIKE ? OR experience LIKE ? OR language LIKE ? OR voice_id LIKE ?)"
                    .to_string(),
            );
            let pattern = format!("%{}%", query);
            for _ in 0..4 {
                text_binds.push(pattern.clone());
            }
        }
        if filter.english_only {
            conditions.push("language = 'English'".to_string());
        }
        if let Some(from) = filter.from {
            conditions.push("created_at >= ?".to_string());
            text_binds.push(from.to_rfc3339());
        }
        if let Some(to) = filter.to {
            conditions.push("created_at <= ?".to_string());
            text_binds.push(to.to_rfc3339());
        }
        if filter.favorites_only {
            conditions.push(
                "EXISTS (SELECT 1 FROM interview_favorites f \
                 WHERE f.interview_id = interviews.id AND f.user_id = interviews.user_id)"
                    .to_string(),
            );
        }

        let where_clause = conditions.join(" AND ");

        let count_sql = format!("SELECT COUNT(*) FROM interviews WHERE {}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(filter.user_id as i64);
        for bind in &text_binds {
            count_query = count_query.bind(bind);
        }
        let total_count = count_query.fetch_one(&self.pool).await?;

        let pagination = paginate(total_count, filter.page, filter.page_size);
        if total_count == 0 {
            return Ok(InterviewPage {
                interviews: Vec::new(),
                total_count: 0,
                total_pages: 0,
                page: pagination.page,
            });
        }

        let order_column = match filter.sort {
            SortField::Recency => "created_at",
            SortField::TotalQuestions => "total_questions",
            SortField::OverallScore => "overall_score",
        };
        let order_dir = match filter.dir {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        };

        let rows_sql = format!(
            "SELECT * FROM interviews WHERE {} ORDER BY {} {} LIMIT ? OFFSET ?",
            where_clause, order_column, order_dir
        );
        let mut rows_query = sqlx::query(&rows_sql).bind(filter.user_id as i64);
        for bind in &text_binds {
            rows_query = rows_query.bind(bind);
        }
        let rows = rows_query
            .bind(filter.page_size)
            .bind(pagination.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(InterviewPage {
            interviews: rows.iter().map(row_to_interview).collect(),
            total_count,
            total_pages: pagination.total_pages,
            page: pagination.page,
        })
    }

    async fn toggle_favorite(&self, user_id: u64, interview_id: &str) -> Result<bool> {
        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM interview_favorites WHERE user_id = ? AND interview_id = ?",
        )
        .bind(user_id as i64)
        .bind(interview_id)
        .fetch_one(&self.pool)
        .await?;

        if existing > 0 {
            sqlx::query("DELETE FROM interview_favorites WHERE user_id = ? AND interview_id = ?")
                .bind(user_id as i64)
                .bind(interview_id)
                .execute(&self.pool)
                .await?;
            Ok(false)
        } else {
            sqlx::query(
                "INSERT INTO interview_favorites (user_id, interview_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(user_id as i64)
            .bind(interview_id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
            Ok(true)
        }
    }
}

#[async_trait]
impl QuestionStore for SqliteStore {
    async fn insert(&self, question: &Question) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO questions (
                interview_id, question_index, content, audio, lipsync,
                answer, record_proof, comment, score, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (interview_id, question_index) DO NOTHING
            "#,
        )
        .bind(&question.interview_id)
        .bind(question.question_index as i64)
        .bind(&question.content)
        .bind(&question.audio)
        .bind(question.lipsync.as_ref().map(to_json))
        .bind(&question.answer)
        .bind(&question.record_proof)
        .bind(&question.comment)
        .bind(&question.score)
        .bind(question.status.code() as i64)
        .bind(question.created_at.to_rfc3339())
        .bind(question.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, question: &Question) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE questions SET
                content = ?, audio = ?, lipsync = ?, answer = ?, record_proof = ?,
                comment = ?, score = ?, status = ?, updated_at = ?
            WHERE interview_id = ? AND question_index = ?
            "#,
        )
        .bind(&question.content)
        .bind(&question.audio)
        .bind(question.lipsync.as_ref().map(to_json))
        .bind(&question.answer)
        .bind(&question.record_proof)
        .bind(&question.comment)
        .bind(&question.score)
        .bind(question.status.code() as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(&question.interview_id)
        .bind(question.question_index as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "question {}:{}",
                question.interview_id, question.question_index
            )));
        }
        Ok(())
    }

    async fn upsert_artifacts(
        &self,
        interview_id: &str,
        question_index: i32,
        audio: &str,
        lipsync: &LipSync,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE questions SET audio = ?, lipsync = ?, updated_at = ? \
             WHERE interview_id = ? AND question_index = ?",
        )
        .bind(audio)
        .bind(to_json(lipsync))
        .bind(Utc::now().to_rfc3339())
        .bind(interview_id)
        .bind(question_index as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "question {}:{}",
                interview_id, question_index
            )));
        }
        Ok(())
    }

    async fn get(&self, interview_id: &str, question_index: i32) -> Result<Question> {
        self.find(interview_id, question_index).await?.ok_or_else(|| {
            Error::NotFound(format!("question {}:{}", interview_id, question_index))
        })
    }

    async fn find(&self, interview_id: &str, question_index: i32) -> Result<Option<Question>> {
        let row = sqlx::query(
            "SELECT * FROM questions WHERE interview_id = ? AND question_index = ?",
        )
        .bind(interview_id)
        .bind(question_index as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| row_to_question(&r)))
    }

    async fn list(&self, interview_id: &str) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            "SELECT * FROM questions WHERE interview_id = ? ORDER BY question_index ASC",
        )
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_question).collect())
    }

    async fn recent_pairs(&self, interview_id: &str, limit: i64) -> Result<Vec<QaPair>> {
        let rows = sqlx::query(
            "SELECT content, answer FROM questions WHERE interview_id = ? \
             ORDER BY question_index DESC LIMIT ?",
        )
        .bind(interview_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut pairs: Vec<QaPair> = rows
            .iter()
            .map(|row| QaPair {
                question: row.get("content"),
                answer: row.get("answer"),
            })
            .collect();
        pairs.reverse();
        Ok(pairs)
    }

    async fn max_settled_index(&self, interview_id: &str) -> Result<i32> {
        let max: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(question_index), 0) FROM questions \
             WHERE interview_id = ? AND status IN (1, 2, 3)",
        )
        .bind(interview_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(max as i32)
    }
}

#[async_trait]
impl PublicQuestionStore for SqliteStore {
    async fn list(&self, filter: &PublicQuestionFilter) -> Result<PublicQuestionPage> {
        let mut conditions = vec!["1 = 1".to_string()];
        let mut text_binds: Vec<String> = Vec::new();

        if let Some(position) = filter.position.as_ref().filter(|p| !p.is_empty()) {
            conditions.push("position LIKE ?".to_string());
            text_binds.push(format!("%{}%", position));
        }
        if let Some(experience) = filter.experience.as_ref().filter(|e| !e.is_empty()) {
            conditions.push("experience = ?".to_string());
            text_binds.push(experience.clone());
        }
        if let Some(language) = filter.language.as_ref().filter(|l| !l.is_empty()) {
            conditions.push("language = ?".to_string());
            text_binds.push(language.clone());
        }

        let where_clause = conditions.join(" AND ");

        let count_sql = format!("SELECT COUNT(*) FROM public_questions WHERE {}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for bind in &text_binds {
            count_query = count_query.bind(bind);
        }
        let total_count = count_query.fetch_one(&self.pool).await?;

        let pagination = paginate(total_count, filter.page, filter.page_size);
        if total_count == 0 {
            return Ok(PublicQuestionPage {
                questions: Vec::new(),
                total_count: 0,
                total_pages: 0,
                page: pagination.page,
            });
        }

        let rows_sql = format!(
            "SELECT * FROM public_questions WHERE {} ORDER BY id DESC LIMIT ? OFFSET ?",
            where_clause
        );
        let mut rows_query = sqlx::query(&rows_sql);
        for bind in &text_binds {
            rows_query = rows_query.bind(bind);
        }
        let rows = rows_query
            .bind(filter.page_size)
            .bind(pagination.offset)
            .fetch_all(&self.pool)
            .await?;

        let questions = rows
            .iter()
            .map(|row| PublicQuestion {
                position: row.get("position"),
                experience: row.get("experience"),
                language: row.get("language"),
                content: row.get("content"),
                answer: row.get("answer"),
                created_at: parse_timestamp(&row.get::<String, _>("created_at")),
                updated_at: parse_timestamp(&row.get::<String, _>("updated_at")),
            })
            .collect();

        Ok(PublicQuestionPage {
            questions,
            total_count,
            total_pages: pagination.total_pages,
            page: pagination.page,
        })
    }

    async fn create_bulk(&self, questions: &[PublicQuestion]) -> Result<()> {
        for question in questions {
            sqlx::query(
                "INSERT INTO public_questions \
                 (position, experience, language, content, answer, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&question.position)
            .bind(&question.experience)
            .bind(&question.language)
            .bind(&question.content)
            .bind(&question.answer)
            .bind(question.created_at.to_rfc3339())
            .bind(question.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}
