use color_eyre::{eyre::OptionExt, Result};
use libsql::params;

use super::helpers::{begin_write, query_all, query_one, query_optional};
use super::models::{Content, ContentFile, CONTENT_COLUMNS};
use super::Db;
use crate::models::{ContentUpdate, NewContent, UploadedFile};

impl Db {
    pub async fn create_content(
        &self,
        content: &NewContent,
        author_id: i64,
        file: Option<&UploadedFile>,
    ) -> Result<i64> {
        let conn = self.conn().await?;
        let content_id = conn
            .query(
                r#"INSERT INTO contents (title, content_type, body, file_name, file_type, file_data,
                                         video_url, min_level, max_level, author_id)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                   RETURNING id"#,
                params![
                    content.title.trim(),
                    content.content_type.as_str(),
                    content.body.as_str(),
                    file.map(|f| f.name.clone()),
                    file.map(|f| f.media_type.clone()),
                    file.map(|f| f.bytes.clone()),
                    content.video_url.as_deref(),
                    content.min_level,
                    content.max_level,
                    author_id
                ],
            )
            .await?
            .next()
            .await?
            .ok_or_eyre("could not get content id")?
            .get::<i64>(0)?;

        tracing::info!(
            "content created: id={content_id}, author_id={author_id}, with_file={}",
            file.is_some()
        );
        Ok(content_id)
    }

    pub async fn get_content(&self, content_id: i64) -> Result<Option<Content>> {
        let conn = self.conn().await?;
        query_optional(
            &conn,
            &format!("SELECT {CONTENT_COLUMNS} FROM contents c WHERE c.id = ?"),
            params![content_id],
        )
        .await
    }

    pub async fn content_file(&self, content_id: i64) -> Result<Option<ContentFile>> {
        let conn = self.conn().await?;
        query_optional(
            &conn,
            r#"SELECT file_name, COALESCE(file_type, 'application/octet-stream'), file_data
               FROM contents
               WHERE id = ? AND file_data IS NOT NULL AND file_name IS NOT NULL"#,
            params![content_id],
        )
        .await
    }

    pub async fn all_contents(&self) -> Result<Vec<Content>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            &format!("SELECT {CONTENT_COLUMNS} FROM contents c ORDER BY c.id DESC"),
            (),
        )
        .await
    }

    pub async fn contents_by_author(&self, author_id: i64) -> Result<Vec<Content>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            &format!("SELECT {CONTENT_COLUMNS} FROM contents c WHERE c.author_id = ? ORDER BY c.id DESC"),
            params![author_id],
        )
        .await
    }

    pub async fn count_contents_by_author(&self, author_id: i64) -> Result<i64> {
        let conn = self.conn().await?;
        query_one(
            &conn,
            "SELECT COUNT(*) FROM contents WHERE author_id = ?",
            params![author_id],
        )
        .await
    }

    /// Active content whose level range contains `level`.
    pub async fn contents_for_level(&self, level: i64) -> Result<Vec<Content>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            &format!(
                r#"SELECT {CONTENT_COLUMNS} FROM contents c
                   WHERE c.is_active = 1 AND c.min_level <= ?1 AND c.max_level >= ?1
                   ORDER BY c.min_level, c.id"#
            ),
            params![level],
        )
        .await
    }

    pub async fn update_content(
        &self,
        content_id: i64,
        update: &ContentUpdate,
        file: Option<&UploadedFile>,
    ) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            r#"UPDATE contents
               SET title = COALESCE(?, title),
                   content_type = COALESCE(?, content_type),
                   body = COALESCE(?, body),
                   video_url = COALESCE(?, video_url),
                   min_level = COALESCE(?, min_level),
                   max_level = COALESCE(?, max_level),
                   is_active = COALESCE(?, is_active),
                   file_name = COALESCE(?, file_name),
                   file_type = COALESCE(?, file_type),
                   file_data = COALESCE(?, file_data)
               WHERE id = ?"#,
            params![
                update.title.as_deref().map(str::trim),
                update.content_type.map(|t| t.as_str()),
                update.body.as_deref(),
                update.video_url.as_deref(),
                update.min_level,
                update.max_level,
                update.is_active,
                file.map(|f| f.name.clone()),
                file.map(|f| f.media_type.clone()),
                file.map(|f| f.bytes.clone()),
                content_id
            ],
        )
        .await?;
        tracing::info!("content updated: id={content_id}");
        Ok(())
    }

    /// Delete content together with the test built on it.
    pub async fn delete_content(&self, content_id: i64) -> Result<()> {
        let conn = self.conn().await?;
        let tx = begin_write(&conn).await?;
        tx.execute(
            "DELETE FROM tests WHERE related_content_id = ?",
            params![content_id],
        )
        .await?;
        tx.execute("DELETE FROM contents WHERE id = ?", params![content_id])
            .await?;
        tx.commit().await?;

        tracing::info!("content deleted: id={content_id}");
        Ok(())
    }
}
