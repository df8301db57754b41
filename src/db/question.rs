use std::collections::HashMap;

use color_eyre::{eyre::OptionExt, Result};
use libsql::params;

use super::helpers::{begin_write, query_all, query_one, query_optional};
use super::models::{Choice, Question};
use super::Db;
use crate::models::QuestionInput;

const QUESTION_COLUMNS: &str =
    "id, test_id, category, question_type, text, correct_text_answer, points, position";

/// Insert a question and its choices on an existing connection or transaction.
pub(super) async fn insert_question(
    conn: &libsql::Connection,
    test_id: i64,
    question: &QuestionInput,
    position: i64,
) -> Result<i64> {
    let question_id = conn
        .query(
            r#"INSERT INTO questions (test_id, category, question_type, text, correct_text_answer, points, position)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               RETURNING id"#,
            params![
                test_id,
                question.category.as_str(),
                question.question_type.as_str(),
                question.text.trim(),
                question.correct_text_answer.as_deref(),
                question.points,
                position
            ],
        )
        .await?
        .next()
        .await?
        .ok_or_eyre("could not get question id")?
        .get::<i64>(0)?;

    insert_choices(conn, question_id, question).await?;
    Ok(question_id)
}

async fn insert_choices(
    conn: &libsql::Connection,
    question_id: i64,
    question: &QuestionInput,
) -> Result<()> {
    for (idx, choice) in question.choices.iter().enumerate() {
        conn.execute(
            "INSERT INTO choices (question_id, text, is_correct, position) VALUES (?, ?, ?, ?)",
            params![
                question_id,
                choice.text.trim(),
                choice.is_correct,
                choice.order.unwrap_or(idx as i64 + 1)
            ],
        )
        .await?;
    }
    Ok(())
}

impl Db {
    /// Questions of a test in display order, each with its choices.
    pub async fn questions_for_test(&self, test_id: i64) -> Result<Vec<Question>> {
        let conn = self.conn().await?;
        let mut questions: Vec<Question> = query_all(
            &conn,
            &format!(
                "SELECT {QUESTION_COLUMNS} FROM questions WHERE test_id = ? ORDER BY position, id"
            ),
            params![test_id],
        )
        .await?;

        let choices: Vec<Choice> = query_all(
            &conn,
            r#"SELECT c.id, c.question_id, c.text, c.is_correct, c.position
               FROM choices c
               JOIN questions q ON q.id = c.question_id
               WHERE q.test_id = ?
               ORDER BY c.position, c.id"#,
            params![test_id],
        )
        .await?;

        let mut by_question: HashMap<i64, Vec<Choice>> = HashMap::new();
        for choice in choices {
            by_question.entry(choice.question_id).or_default().push(choice);
        }
        for question in &mut questions {
            question.choices = by_question.remove(&question.id).unwrap_or_default();
        }

        Ok(questions)
    }

    pub async fn get_question(&self, question_id: i64) -> Result<Option<Question>> {
        let conn = self.conn().await?;
        let question: Option<Question> = query_optional(
            &conn,
            &format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?"),
            params![question_id],
        )
        .await?;

        let Some(mut question) = question else {
            return Ok(None);
        };

        question.choices = query_all(
            &conn,
            r#"SELECT id, question_id, text, is_correct, position
               FROM choices WHERE question_id = ?
               ORDER BY position, id"#,
            params![question_id],
        )
        .await?;

        Ok(Some(question))
    }

    pub async fn question_position_taken(
        &self,
        test_id: i64,
        position: i64,
        except_question: Option<i64>,
    ) -> Result<bool> {
        let conn = self.conn().await?;
        query_one(
            &conn,
            "SELECT EXISTS(SELECT 1 FROM questions WHERE test_id = ? AND position = ? AND id IS NOT ?)",
            params![test_id, position, except_question],
        )
        .await
    }

    pub async fn next_question_position(&self, test_id: i64) -> Result<i64> {
        let conn = self.conn().await?;
        query_one(
            &conn,
            "SELECT COALESCE(MAX(position), 0) + 1 FROM questions WHERE test_id = ?",
            params![test_id],
        )
        .await
    }

    pub async fn add_question(
        &self,
        test_id: i64,
        question: &QuestionInput,
        position: i64,
    ) -> Result<i64> {
        let conn = self.conn().await?;
        let tx = begin_write(&conn).await?;
        let question_id = insert_question(&tx, test_id, question, position).await?;
        tx.commit().await?;

        tracing::info!("question added: id={question_id}, test_id={test_id}");
        Ok(question_id)
    }

    /// Overwrite a question's fields and replace its choices.
    pub async fn update_question(
        &self,
        question_id: i64,
        question: &QuestionInput,
        position: i64,
    ) -> Result<()> {
        let conn = self.conn().await?;
        let tx = begin_write(&conn).await?;

        tx.execute(
            r#"UPDATE questions
               SET category = ?, question_type = ?, text = ?, correct_text_answer = ?, points = ?, position = ?
               WHERE id = ?"#,
            params![
                question.category.as_str(),
                question.question_type.as_str(),
                question.text.trim(),
                question.correct_text_answer.as_deref(),
                question.points,
                position,
                question_id
            ],
        )
        .await?;

        tx.execute(
            "DELETE FROM choices WHERE question_id = ?",
            params![question_id],
        )
        .await?;
        insert_choices(&tx, question_id, question).await?;

        tx.commit().await?;

        tracing::info!("question updated: id={question_id}");
        Ok(())
    }

    pub async fn delete_question(&self, question_id: i64) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute("DELETE FROM questions WHERE id = ?", params![question_id])
            .await?;
        tracing::info!("question deleted: id={question_id}");
        Ok(())
    }

    pub async fn choice_belongs_to_question(&self, choice_id: i64, question_id: i64) -> Result<bool> {
        let conn = self.conn().await?;
        query_one(
            &conn,
            "SELECT EXISTS(SELECT 1 FROM choices WHERE id = ? AND question_id = ?)",
            params![choice_id, question_id],
        )
        .await
    }
}
