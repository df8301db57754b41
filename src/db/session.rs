use color_eyre::{eyre::OptionExt, Result};
use libsql::params;

use super::analytics::{notify_on, save_summary_on, summary_on};
use super::answer::session_category_points_on;
use super::helpers::{begin_write, query_all, query_one, query_optional};
use super::models::{CategoryPoints, PerformanceSummary, TestSession, User, SESSION_SELECT};
use super::user::{find_user_on, write_level_change, write_placement_taken};
use super::Db;
use crate::models::SessionStatus;

#[derive(Clone, Debug, PartialEq)]
pub struct LevelStep {
    pub old_level: i64,
    pub new_level: i64,
    pub reason: String,
}

/// Everything completing a session changes for its owner.
///
/// Written in the same transaction as the status change, so a session is
/// never `completed` without its level and summary updates.
#[derive(Clone, Debug, Default)]
pub struct Completion {
    pub placement: bool,
    pub level: Option<LevelStep>,
    pub summary: PerformanceSummary,
    pub notifications: Vec<String>,
}

/// Filter appended to session queries to keep only tests a user may manage.
const MANAGED_BY: &str = r#"
    (t.created_by = ?1 OR EXISTS (
        SELECT 1 FROM contents c WHERE c.id = t.related_content_id AND c.author_id = ?1
    ))"#;

impl Db {
    pub async fn get_session(&self, session_id: i64) -> Result<Option<TestSession>> {
        let conn = self.conn().await?;
        query_optional(
            &conn,
            &format!("{SESSION_SELECT} WHERE s.id = ?"),
            params![session_id],
        )
        .await
    }

    pub async fn in_progress_session(
        &self,
        user_id: i64,
        test_id: i64,
    ) -> Result<Option<TestSession>> {
        let conn = self.conn().await?;
        query_optional(
            &conn,
            &format!(
                "{SESSION_SELECT} WHERE s.user_id = ? AND s.test_id = ? AND s.status = 'in_progress' ORDER BY s.id DESC"
            ),
            params![user_id, test_id],
        )
        .await
    }

    /// Open a session that expires `time_limit_minutes` from now.
    pub async fn create_session(
        &self,
        user_id: i64,
        test_id: i64,
        time_limit_minutes: i64,
    ) -> Result<i64> {
        let conn = self.conn().await?;
        let session_id = conn
            .query(
                r#"INSERT INTO test_sessions (user_id, test_id, expires_at)
                   VALUES (?, ?, datetime('now', ?))
                   RETURNING id"#,
                params![user_id, test_id, format!("+{time_limit_minutes} minutes")],
            )
            .await?
            .next()
            .await?
            .ok_or_eyre("could not get session id")?
            .get::<i64>(0)?;

        tracing::info!("session started: id={session_id}, user_id={user_id}, test_id={test_id}");
        Ok(session_id)
    }

    /// Sessions waiting for manual grading, newest first. `None` lists every one.
    pub async fn pending_review_sessions(
        &self,
        managed_by: Option<i64>,
        limit: i64,
    ) -> Result<Vec<TestSession>> {
        let conn = self.conn().await?;
        match managed_by {
            Some(user_id) => {
                query_all(
                    &conn,
                    &format!(
                        "{SESSION_SELECT} WHERE s.status = 'pending_review' AND {MANAGED_BY} ORDER BY s.started_at DESC, s.id DESC LIMIT ?2"
                    ),
                    params![user_id, limit],
                )
                .await
            }
            None => {
                query_all(
                    &conn,
                    &format!(
                        "{SESSION_SELECT} WHERE s.status = 'pending_review' ORDER BY s.started_at DESC, s.id DESC LIMIT ?"
                    ),
                    params![limit],
                )
                .await
            }
        }
    }

    pub async fn count_pending_reviews(&self, managed_by: Option<i64>) -> Result<i64> {
        let conn = self.conn().await?;
        match managed_by {
            Some(user_id) => {
                query_one(
                    &conn,
                    &format!(
                        "SELECT COUNT(*) FROM test_sessions s JOIN tests t ON t.id = s.test_id WHERE s.status = 'pending_review' AND {MANAGED_BY}"
                    ),
                    params![user_id],
                )
                .await
            }
            None => {
                query_one(
                    &conn,
                    "SELECT COUNT(*) FROM test_sessions WHERE status = 'pending_review'",
                    (),
                )
                .await
            }
        }
    }

    /// A student's finished or pending sessions, newest first.
    pub async fn session_history(&self, user_id: i64, limit: i64) -> Result<Vec<TestSession>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            &format!(
                r#"{SESSION_SELECT}
                   WHERE s.user_id = ? AND s.status != 'in_progress'
                   ORDER BY COALESCE(s.finished_at, s.started_at) DESC, s.id DESC
                   LIMIT ?"#
            ),
            params![user_id, limit],
        )
        .await
    }

    pub async fn count_completed_sessions(&self) -> Result<i64> {
        let conn = self.conn().await?;
        query_one(
            &conn,
            "SELECT COUNT(*) FROM test_sessions WHERE status = 'completed'",
            (),
        )
        .await
    }

    /// Store auto-scored answers and close the session in one transaction.
    ///
    /// When `status` is `completed`, `plan` decides the owner's level and
    /// summary changes from the state read inside that transaction.
    /// Returns `false` when the session had already left `in_progress`.
    pub async fn close_session(
        &self,
        session_id: i64,
        scored_answers: &[(i64, f64)],
        total_score: f64,
        status: SessionStatus,
        plan: impl FnOnce(&User, f64, PerformanceSummary, &[CategoryPoints]) -> Completion,
    ) -> Result<bool> {
        let conn = self.conn().await?;
        let tx = begin_write(&conn).await?;

        let closed = tx
            .execute(
                r#"UPDATE test_sessions
                   SET status = ?, total_score = ?, finished_at = datetime('now')
                   WHERE id = ? AND status = 'in_progress'"#,
                params![status.as_str(), total_score, session_id],
            )
            .await?;

        if closed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for (answer_id, score) in scored_answers {
            tx.execute(
                "UPDATE answers SET score_earned = ?, is_reviewed = 1 WHERE id = ? AND session_id = ?",
                params![*score, *answer_id, session_id],
            )
            .await?;
        }

        if status == SessionStatus::Completed {
            complete_on(&tx, session_id, total_score, plan).await?;
        }

        tx.commit().await?;

        tracing::info!("session closed: id={session_id}, status={status}, score={total_score:.2}");
        Ok(true)
    }

    /// Write manual grades, recompute the session total from all its answers
    /// and complete the session, all in one transaction.
    ///
    /// Returns the new total, or `None` if the session was no longer pending review.
    pub async fn grade_session(
        &self,
        session_id: i64,
        grades: &[(i64, f64)],
        feedback: Option<&str>,
        reviewer_id: i64,
        plan: impl FnOnce(&User, f64, PerformanceSummary, &[CategoryPoints]) -> Completion,
    ) -> Result<Option<f64>> {
        let conn = self.conn().await?;
        let tx = begin_write(&conn).await?;

        for (answer_id, score) in grades {
            tx.execute(
                "UPDATE answers SET score_earned = ?, is_reviewed = 1 WHERE id = ? AND session_id = ?",
                params![*score, *answer_id, session_id],
            )
            .await?;
        }

        let (earned, possible) = {
            let row = tx
                .query(
                    r#"SELECT COALESCE(SUM(a.score_earned), 0.0), COALESCE(SUM(CAST(q.points AS REAL)), 0.0)
                       FROM answers a JOIN questions q ON q.id = a.question_id
                       WHERE a.session_id = ?"#,
                    params![session_id],
                )
                .await?
                .next()
                .await?
                .ok_or_eyre("could not sum session answers")?;
            (row.get::<f64>(0)?, row.get::<f64>(1)?)
        };
        let total_score = if possible > 0.0 {
            earned / possible * 100.0
        } else {
            0.0
        };

        let updated = tx
            .execute(
                r#"UPDATE test_sessions
                   SET status = 'completed', total_score = ?, teacher_feedback = COALESCE(?, teacher_feedback),
                       reviewed_by = ?, finished_at = COALESCE(finished_at, datetime('now'))
                   WHERE id = ? AND status = 'pending_review'"#,
                params![total_score, feedback, reviewer_id, session_id],
            )
            .await?;

        if updated == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        complete_on(&tx, session_id, total_score, plan).await?;

        tx.commit().await?;

        tracing::info!(
            "session graded: id={session_id}, reviewer={reviewer_id}, score={total_score:.2}"
        );
        Ok(Some(total_score))
    }
}

/// Apply the owner's level and summary changes for a session that just completed.
async fn complete_on(
    conn: &libsql::Connection,
    session_id: i64,
    total_score: f64,
    plan: impl FnOnce(&User, f64, PerformanceSummary, &[CategoryPoints]) -> Completion,
) -> Result<()> {
    let user_id: i64 = query_one(
        conn,
        "SELECT user_id FROM test_sessions WHERE id = ?",
        params![session_id],
    )
    .await?;
    let user = find_user_on(conn, user_id)
        .await?
        .ok_or_eyre("session owner not found")?;
    let summary = summary_on(conn, user_id)
        .await?
        .unwrap_or_else(|| PerformanceSummary {
            user: user_id,
            ..Default::default()
        });
    let points = session_category_points_on(conn, session_id).await?;

    let completion = plan(&user, total_score, summary, &points);

    if completion.placement {
        write_placement_taken(conn, user_id).await?;
    }
    if let Some(step) = &completion.level {
        write_level_change(
            conn,
            user_id,
            step.old_level,
            step.new_level,
            &step.reason,
            Some(session_id),
        )
        .await?;
    }
    save_summary_on(conn, &completion.summary).await?;
    for message in &completion.notifications {
        notify_on(conn, user_id, message).await?;
    }
    Ok(())
}
