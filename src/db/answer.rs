use color_eyre::{eyre::OptionExt, Result};
use libsql::params;

use super::helpers::query_all;
use super::models::{Answer, AnswerResult, CategoryPoints};
use super::Db;
use crate::models::AnswerInput;

impl Db {
    /// Insert or replace the answer to one question of a session.
    pub async fn upsert_answer(
        &self,
        session_id: i64,
        question_id: i64,
        answer: &AnswerInput,
    ) -> Result<i64> {
        let conn = self.conn().await?;
        let answer_id = conn
            .query(
                r#"INSERT INTO answers (session_id, question_id, selected_choice_id, text_answer, time_spent_seconds)
                   VALUES (?, ?, ?, ?, ?)
                   ON CONFLICT (session_id, question_id) DO UPDATE
                   SET selected_choice_id = excluded.selected_choice_id,
                       text_answer = excluded.text_answer,
                       time_spent_seconds = excluded.time_spent_seconds
                   RETURNING id"#,
                params![
                    session_id,
                    question_id,
                    answer.selected_choice,
                    answer.text_answer.as_deref(),
                    answer.time_spent_seconds
                ],
            )
            .await?
            .next()
            .await?
            .ok_or_eyre("could not get answer id")?
            .get::<i64>(0)?;

        tracing::debug!("answer stored: session_id={session_id}, question_id={question_id}");
        Ok(answer_id)
    }

    pub async fn session_answers(&self, session_id: i64) -> Result<Vec<Answer>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            r#"SELECT a.id, a.session_id, a.question_id, q.text, q.question_type, q.category, q.points,
                      a.selected_choice_id, ch.is_correct, a.text_answer, a.score_earned, a.is_reviewed,
                      a.time_spent_seconds
               FROM answers a
               JOIN questions q ON q.id = a.question_id
               LEFT JOIN choices ch ON ch.id = a.selected_choice_id
               WHERE a.session_id = ?
               ORDER BY q.position, q.id"#,
            params![session_id],
        )
        .await
    }

    pub async fn answer_results(&self, session_id: i64) -> Result<Vec<AnswerResult>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            r#"SELECT q.text, q.question_type, q.category, q.points,
                      ch.text, a.text_answer,
                      (SELECT c.text FROM choices c WHERE c.question_id = q.id AND c.is_correct = 1
                       ORDER BY c.position, c.id LIMIT 1),
                      q.correct_text_answer, a.score_earned, a.is_reviewed
               FROM answers a
               JOIN questions q ON q.id = a.question_id
               LEFT JOIN choices ch ON ch.id = a.selected_choice_id
               WHERE a.session_id = ?
               ORDER BY q.position, q.id"#,
            params![session_id],
        )
        .await
    }

    /// Earned and available points per category over all of a user's completed sessions.
    pub async fn user_category_points(&self, user_id: i64) -> Result<Vec<CategoryPoints>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            r#"SELECT q.category, COALESCE(SUM(a.score_earned), 0.0), COALESCE(SUM(CAST(q.points AS REAL)), 0.0)
               FROM answers a
               JOIN questions q ON q.id = a.question_id
               JOIN test_sessions s ON s.id = a.session_id
               WHERE s.user_id = ? AND s.status = 'completed'
               GROUP BY q.category
               ORDER BY q.category"#,
            params![user_id],
        )
        .await
    }
}

/// Earned and available points per category over one session's answers.
pub(super) async fn session_category_points_on(
    conn: &libsql::Connection,
    session_id: i64,
) -> Result<Vec<CategoryPoints>> {
    query_all(
        conn,
        r#"SELECT q.category, COALESCE(SUM(a.score_earned), 0.0), COALESCE(SUM(CAST(q.points AS REAL)), 0.0)
           FROM answers a
           JOIN questions q ON q.id = a.question_id
           WHERE a.session_id = ?
           GROUP BY q.category
           ORDER BY q.category"#,
        params![session_id],
    )
    .await
}
