use color_eyre::{eyre::OptionExt, Result};
use libsql::params;

use super::helpers::{begin_write, query_all, query_one, query_optional};
use super::models::{
    Content, ContentProgress, LearningPath, LearningPathItem, Recommendation, CONTENT_COLUMNS,
};
use super::Db;

/// Content the user has already finished.
const COMPLETED_BY_USER: &str =
    "SELECT p.content_id FROM content_progress p WHERE p.user_id = ?1 AND p.is_completed = 1";

impl Db {
    // -----------------------------------------------------------------------
    // Learning paths
    // -----------------------------------------------------------------------

    pub async fn active_learning_path(&self, user_id: i64) -> Result<Option<LearningPath>> {
        let conn = self.conn().await?;
        let path: Option<LearningPath> = query_optional(
            &conn,
            r#"SELECT id, name, is_active, created_at FROM learning_paths
               WHERE user_id = ? AND is_active = 1
               ORDER BY id DESC"#,
            params![user_id],
        )
        .await?;

        let Some(mut path) = path else {
            return Ok(None);
        };

        path.items = query_all::<LearningPathItem>(
            &conn,
            &format!(
                r#"SELECT i.id, i.position, i.is_unlocked,
                          EXISTS(SELECT 1 FROM content_progress p
                                 WHERE p.user_id = ?1 AND p.content_id = i.content_id AND p.is_completed = 1),
                          {CONTENT_COLUMNS}
                   FROM learning_path_items i
                   JOIN contents c ON c.id = i.content_id
                   WHERE i.path_id = ?2
                   ORDER BY i.position"#
            ),
            params![user_id, path.id],
        )
        .await?;

        Ok(Some(path))
    }

    /// Retire the active path and build a new one for `level`.
    pub async fn reset_learning_path(
        &self,
        user_id: i64,
        level: i64,
        length: i64,
    ) -> Result<i64> {
        let conn = self.conn().await?;
        let tx = begin_write(&conn).await?;

        tx.execute(
            "UPDATE learning_paths SET is_active = 0 WHERE user_id = ? AND is_active = 1",
            params![user_id],
        )
        .await?;

        let path_id = tx
            .query(
                "INSERT INTO learning_paths (user_id, name) VALUES (?, ?) RETURNING id",
                params![user_id, format!("Learning path for level {level}")],
            )
            .await?
            .next()
            .await?
            .ok_or_eyre("could not get learning path id")?
            .get::<i64>(0)?;

        // Contents covering the level come first, then harder ones.
        let mut rows = tx
            .query(
                &format!(
                    r#"SELECT c.id, c.min_level FROM contents c
                       WHERE c.is_active = 1
                         AND ((c.min_level <= ?2 AND c.max_level >= ?2) OR c.min_level > ?2)
                         AND c.id NOT IN ({COMPLETED_BY_USER})
                       ORDER BY c.min_level > ?2, c.min_level, c.id
                       LIMIT ?3"#
                ),
                params![user_id, level, length],
            )
            .await?;

        let mut picked = Vec::new();
        while let Some(row) = rows.next().await? {
            picked.push((row.get::<i64>(0)?, row.get::<i64>(1)?));
        }

        for (idx, (content_id, min_level)) in picked.iter().enumerate() {
            let unlocked = idx == 0 || *min_level <= level;
            tx.execute(
                r#"INSERT INTO learning_path_items (path_id, content_id, position, is_unlocked)
                   VALUES (?, ?, ?, ?)"#,
                params![path_id, *content_id, idx as i64 + 1, unlocked],
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "learning path reset: user_id={user_id}, path_id={path_id}, items={}",
            picked.len()
        );
        Ok(path_id)
    }

    pub async fn has_active_learning_path(&self, user_id: i64) -> Result<bool> {
        let conn = self.conn().await?;
        query_one(
            &conn,
            "SELECT EXISTS(SELECT 1 FROM learning_paths WHERE user_id = ? AND is_active = 1)",
            params![user_id],
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Progress
    // -----------------------------------------------------------------------

    /// Record progress on a content item. Reaching 100% completes it and
    /// unlocks the following item of the active path.
    ///
    /// Returns the stored completion flag, which stays set once reached.
    pub async fn record_progress(&self, user_id: i64, content_id: i64, percent: f64) -> Result<bool> {
        let completed = percent >= 100.0;
        let conn = self.conn().await?;
        let tx = begin_write(&conn).await?;

        let is_completed: bool = query_one(
            &tx,
            r#"INSERT INTO content_progress (user_id, content_id, progress_percent, is_completed)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT (user_id, content_id) DO UPDATE
               SET progress_percent = excluded.progress_percent,
                   is_completed = MAX(is_completed, excluded.is_completed),
                   last_accessed = datetime('now')
               RETURNING is_completed"#,
            params![user_id, content_id, percent, completed],
        )
        .await?;

        if completed {
            tx.execute(
                r#"UPDATE learning_path_items SET is_unlocked = 1
                   WHERE id = (
                       SELECT nxt.id
                       FROM learning_path_items cur
                       JOIN learning_paths lp ON lp.id = cur.path_id AND lp.user_id = ?1 AND lp.is_active = 1
                       JOIN learning_path_items nxt ON nxt.path_id = cur.path_id AND nxt.position > cur.position
                       WHERE cur.content_id = ?2
                       ORDER BY nxt.position
                       LIMIT 1
                   )"#,
                params![user_id, content_id],
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "progress recorded: user_id={user_id}, content_id={content_id}, percent={percent}"
        );
        Ok(is_completed)
    }

    pub async fn content_progress(&self, user_id: i64) -> Result<Vec<ContentProgress>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            r#"SELECT p.content_id, c.title, p.progress_percent, p.is_completed, p.last_accessed
               FROM content_progress p
               JOIN contents c ON c.id = p.content_id
               WHERE p.user_id = ?
               ORDER BY p.last_accessed DESC, p.id DESC"#,
            params![user_id],
        )
        .await
    }

    pub async fn count_completed_contents(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn().await?;
        query_one(
            &conn,
            "SELECT COUNT(*) FROM content_progress WHERE user_id = ? AND is_completed = 1",
            params![user_id],
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Recommendations
    // -----------------------------------------------------------------------

    /// Active content within `window` levels of `level` that the user has not completed.
    pub async fn recommendation_candidates(
        &self,
        user_id: i64,
        level: i64,
        window: i64,
    ) -> Result<Vec<Content>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            &format!(
                r#"SELECT {CONTENT_COLUMNS} FROM contents c
                   WHERE c.is_active = 1
                     AND c.min_level <= ?2 + ?3
                     AND c.max_level >= ?2 - ?3
                     AND c.id NOT IN ({COMPLETED_BY_USER})
                   ORDER BY c.id"#
            ),
            params![user_id, level, window],
        )
        .await
    }

    /// Drop the user's previous recommendations and store the new set.
    pub async fn replace_recommendations(
        &self,
        user_id: i64,
        content_ids: &[i64],
        recommendation_type: &str,
    ) -> Result<()> {
        let conn = self.conn().await?;
        let tx = begin_write(&conn).await?;

        tx.execute(
            "DELETE FROM recommendations WHERE user_id = ?",
            params![user_id],
        )
        .await?;

        for content_id in content_ids {
            tx.execute(
                r#"INSERT INTO recommendations (user_id, content_id, recommendation_type, priority_weight)
                   VALUES (?, ?, ?, 1.0)"#,
                params![user_id, *content_id, recommendation_type],
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "recommendations regenerated: user_id={user_id}, count={}",
            content_ids.len()
        );
        Ok(())
    }

    /// The user's recommendations, heaviest first.
    pub async fn recommendations(&self, user_id: i64, limit: i64) -> Result<Vec<Recommendation>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            &format!(
                r#"SELECT r.id, r.recommendation_type, r.priority_weight, r.is_clicked, r.created_at,
                          {CONTENT_COLUMNS}
                   FROM recommendations r
                   JOIN contents c ON c.id = r.content_id
                   WHERE r.user_id = ?
                   ORDER BY r.priority_weight DESC, r.id
                   LIMIT ?"#
            ),
            params![user_id, limit],
        )
        .await
    }

    /// Returns `false` if the recommendation does not exist or belongs to someone else.
    pub async fn mark_recommendation_clicked(
        &self,
        recommendation_id: i64,
        user_id: i64,
    ) -> Result<bool> {
        let conn = self.conn().await?;
        let updated = conn
            .execute(
                "UPDATE recommendations SET is_clicked = 1 WHERE id = ? AND user_id = ?",
                params![recommendation_id, user_id],
            )
            .await?;
        Ok(updated > 0)
    }
}
