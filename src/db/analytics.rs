use color_eyre::Result;
use libsql::params;

use super::helpers::{query_all, query_one, query_optional};
use super::models::{Notification, PerformanceSummary};
use super::Db;

const SUMMARY_COLUMNS: &str = "user_id, avg_memory_score, avg_focus_score, avg_logic_score, total_tests_completed, last_updated";

impl Db {
    pub async fn log_event(
        &self,
        user_id: i64,
        event_type: &str,
        event_data: &serde_json::Value,
    ) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO analytics_events (user_id, event_type, event_data) VALUES (?, ?, ?)",
            params![user_id, event_type, event_data.to_string()],
        )
        .await?;
        tracing::debug!("event logged: user_id={user_id}, type={event_type}");
        Ok(())
    }

    pub async fn count_events(&self, user_id: i64, event_type: &str) -> Result<i64> {
        let conn = self.conn().await?;
        query_one(
            &conn,
            "SELECT COUNT(*) FROM analytics_events WHERE user_id = ? AND event_type = ?",
            params![user_id, event_type],
        )
        .await
    }

    pub async fn performance_summary(&self, user_id: i64) -> Result<Option<PerformanceSummary>> {
        let conn = self.conn().await?;
        summary_on(&conn, user_id).await
    }

    /// Insert or overwrite the summary row and return it as stored.
    pub async fn save_performance_summary(
        &self,
        summary: &PerformanceSummary,
    ) -> Result<PerformanceSummary> {
        let conn = self.conn().await?;
        save_summary_on(&conn, summary).await
    }

    pub async fn count_completed_sessions_for(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn().await?;
        query_one(
            &conn,
            "SELECT COUNT(*) FROM test_sessions WHERE user_id = ? AND status = 'completed'",
            params![user_id],
        )
        .await
    }

    pub async fn notifications(&self, user_id: i64) -> Result<Vec<Notification>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            r#"SELECT id, message, is_read, created_at FROM notifications
               WHERE user_id = ?
               ORDER BY created_at DESC, id DESC"#,
            params![user_id],
        )
        .await
    }

    /// Returns `false` if the notification is not the user's.
    pub async fn mark_notification_read(&self, notification_id: i64, user_id: i64) -> Result<bool> {
        let conn = self.conn().await?;
        let updated = conn
            .execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?",
                params![notification_id, user_id],
            )
            .await?;
        Ok(updated > 0)
    }
}

pub(super) async fn summary_on(
    conn: &libsql::Connection,
    user_id: i64,
) -> Result<Option<PerformanceSummary>> {
    query_optional(
        conn,
        &format!("SELECT {SUMMARY_COLUMNS} FROM performance_summaries WHERE user_id = ?"),
        params![user_id],
    )
    .await
}

pub(super) async fn save_summary_on(
    conn: &libsql::Connection,
    summary: &PerformanceSummary,
) -> Result<PerformanceSummary> {
    query_one(
        conn,
        &format!(
            r#"INSERT INTO performance_summaries
                   (user_id, avg_memory_score, avg_focus_score, avg_logic_score, total_tests_completed)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (user_id) DO UPDATE
               SET avg_memory_score = excluded.avg_memory_score,
                   avg_focus_score = excluded.avg_focus_score,
                   avg_logic_score = excluded.avg_logic_score,
                   total_tests_completed = excluded.total_tests_completed,
                   last_updated = datetime('now')
               RETURNING {SUMMARY_COLUMNS}"#
        ),
        params![
            summary.user,
            summary.avg_memory_score,
            summary.avg_focus_score,
            summary.avg_logic_score,
            summary.total_tests_completed
        ],
    )
    .await
}

pub(super) async fn notify_on(conn: &libsql::Connection, user_id: i64, message: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (user_id, message) VALUES (?, ?)",
        params![user_id, message],
    )
    .await?;
    tracing::info!("notification created for user_id={user_id}");
    Ok(())
}
