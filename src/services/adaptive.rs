use color_eyre::{eyre::OptionExt, Result};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::{Outcome, Refusal};
use crate::db::{
    models::{Content, ContentFile, ContentProgress, LearningPath, Recommendation, User},
    Db,
};
use crate::models::{ContentType, ContentUpdate, NewContent, Role, UploadedFile};
use crate::names::{
    LEARNING_PATH_LENGTH, MAX_LEVEL, MAX_RECOMMENDATIONS, MIN_LEVEL, RECOMMENDATION_LEVEL_WINDOW,
};

const RECOMMENDATION_LIST_LIMIT: i64 = 50;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub content_id: i64,
    pub progress_percent: f64,
    pub is_completed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdaptiveDashboard {
    pub cognitive_level: i64,
    pub completed_contents: i64,
    pub has_learning_path: bool,
}

pub fn recommendation_type(level: i64) -> String {
    format!("Recommended for level {level}")
}

fn validate_levels(min_level: i64, max_level: i64) -> std::result::Result<(), &'static str> {
    let range = MIN_LEVEL..=MAX_LEVEL;
    if !range.contains(&min_level) || !range.contains(&max_level) {
        return Err("levels must be between 1 and 100");
    }
    if min_level > max_level {
        return Err("min level cannot be above max level");
    }
    Ok(())
}

pub fn validate_new_content(
    content: &NewContent,
    file: Option<&UploadedFile>,
) -> std::result::Result<(), &'static str> {
    if content.title.trim().is_empty() {
        return Err("title is required");
    }
    validate_levels(content.min_level, content.max_level)?;
    if content.content_type == ContentType::Video
        && content.video_url.as_deref().map_or(true, |url| url.trim().is_empty())
        && file.is_none()
    {
        return Err("a video needs a URL or an uploaded file");
    }
    Ok(())
}

#[derive(Clone)]
pub struct AdaptiveService {
    db: Db,
}

impl AdaptiveService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    // -----------------------------------------------------------------------
    // Content for learners
    // -----------------------------------------------------------------------

    /// Students see active content for their level; staff see everything.
    pub async fn contents_for(&self, user: &User) -> Result<Vec<Content>> {
        if user.is_student() {
            self.db.contents_for_level(user.level()).await
        } else {
            self.db.all_contents().await
        }
    }

    pub async fn content_detail(&self, user: &User, content_id: i64) -> Result<Outcome<Content>> {
        let Some(content) = self.db.get_content(content_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if user.is_student() && !content.is_active {
            return Ok(Err(Refusal::NotFound));
        }

        self.db
            .log_event(
                user.id,
                "view_content",
                &serde_json::json!({ "content_id": content_id }),
            )
            .await?;
        Ok(Ok(content))
    }

    pub async fn content_file(&self, user: &User, content_id: i64) -> Result<Outcome<ContentFile>> {
        let Some(content) = self.db.get_content(content_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if user.is_student() && !content.is_active {
            return Ok(Err(Refusal::NotFound));
        }
        Ok(self.db.content_file(content_id).await?.ok_or(Refusal::NotFound))
    }

    // -----------------------------------------------------------------------
    // Progress
    // -----------------------------------------------------------------------

    pub async fn record_progress(
        &self,
        user: &User,
        content_id: i64,
        percent: f64,
    ) -> Result<Outcome<ProgressUpdate>> {
        if !percent.is_finite() || percent < 0.0 {
            return Ok(Err(Refusal::Invalid("progress must be between 0 and 100")));
        }
        if self.db.get_content(content_id).await?.is_none() {
            return Ok(Err(Refusal::NotFound));
        }

        let percent = percent.min(100.0);
        let is_completed = self.db.record_progress(user.id, content_id, percent).await?;
        Ok(Ok(ProgressUpdate {
            content_id,
            progress_percent: percent,
            is_completed,
        }))
    }

    pub async fn progress(&self, user: &User) -> Result<Vec<ContentProgress>> {
        self.db.content_progress(user.id).await
    }

    // -----------------------------------------------------------------------
    // Recommendations
    // -----------------------------------------------------------------------

    /// Replace the user's recommendations with a fresh random pick near their level.
    pub async fn regenerate_recommendations(
        &self,
        user: &User,
    ) -> Result<Outcome<Vec<Recommendation>>> {
        if user.needs_placement() {
            return Ok(Err(Refusal::Forbidden));
        }

        let level = user.level();
        let mut candidates = self
            .db
            .recommendation_candidates(user.id, level, RECOMMENDATION_LEVEL_WINDOW)
            .await?;
        {
            let mut rng = rand::thread_rng();
            candidates.shuffle(&mut rng);
        }
        candidates.truncate(MAX_RECOMMENDATIONS);

        let ids: Vec<i64> = candidates.iter().map(|c| c.id).collect();
        self.db
            .replace_recommendations(user.id, &ids, &recommendation_type(level))
            .await?;

        Ok(Ok(self
            .db
            .recommendations(user.id, MAX_RECOMMENDATIONS as i64)
            .await?))
    }

    pub async fn recommendations(&self, user: &User) -> Result<Vec<Recommendation>> {
        self.db
            .recommendations(user.id, RECOMMENDATION_LIST_LIMIT)
            .await
    }

    pub async fn click_recommendation(
        &self,
        user: &User,
        recommendation_id: i64,
    ) -> Result<Outcome<()>> {
        if self
            .db
            .mark_recommendation_clicked(recommendation_id, user.id)
            .await?
        {
            Ok(Ok(()))
        } else {
            Ok(Err(Refusal::NotFound))
        }
    }

    // -----------------------------------------------------------------------
    // Learning path
    // -----------------------------------------------------------------------

    pub async fn learning_path(&self, user: &User) -> Result<Option<LearningPath>> {
        self.db.active_learning_path(user.id).await
    }

    pub async fn reset_learning_path(&self, user: &User) -> Result<LearningPath> {
        self.db
            .reset_learning_path(user.id, user.level(), LEARNING_PATH_LENGTH)
            .await?;
        self.db
            .active_learning_path(user.id)
            .await?
            .ok_or_eyre("learning path missing after reset")
    }

    pub async fn dashboard(&self, user: &User) -> Result<AdaptiveDashboard> {
        Ok(AdaptiveDashboard {
            cognitive_level: user.level(),
            completed_contents: self.db.count_completed_contents(user.id).await?,
            has_learning_path: self.db.has_active_learning_path(user.id).await?,
        })
    }

    // -----------------------------------------------------------------------
    // Authoring
    // -----------------------------------------------------------------------

    pub async fn authored_contents(&self, user: &User) -> Result<Vec<Content>> {
        if user.role == Role::Admin {
            self.db.all_contents().await
        } else {
            self.db.contents_by_author(user.id).await
        }
    }

    async fn owned_content(&self, user: &User, content_id: i64) -> Result<Outcome<Content>> {
        let Some(content) = self.db.get_content(content_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if user.role != Role::Admin && content.author != user.id {
            tracing::warn!("user_id={} may not edit content_id={content_id}", user.id);
            return Ok(Err(Refusal::Forbidden));
        }
        Ok(Ok(content))
    }

    pub async fn create_content(
        &self,
        user: &User,
        content: &NewContent,
        file: Option<&UploadedFile>,
    ) -> Result<Outcome<Content>> {
        if let Err(msg) = validate_new_content(content, file) {
            return Ok(Err(Refusal::Invalid(msg)));
        }

        let content_id = self.db.create_content(content, user.id, file).await?;
        let created = self
            .db
            .get_content(content_id)
            .await?
            .ok_or_eyre("content missing after insert")?;
        Ok(Ok(created))
    }

    pub async fn update_content(
        &self,
        user: &User,
        content_id: i64,
        update: &ContentUpdate,
        file: Option<&UploadedFile>,
    ) -> Result<Outcome<Content>> {
        let existing = match self.owned_content(user, content_id).await? {
            Ok(content) => content,
            Err(refusal) => return Ok(Err(refusal)),
        };

        if update
            .title
            .as_deref()
            .is_some_and(|title| title.trim().is_empty())
        {
            return Ok(Err(Refusal::Invalid("title is required")));
        }
        if let Err(msg) = validate_levels(
            update.min_level.unwrap_or(existing.min_level),
            update.max_level.unwrap_or(existing.max_level),
        ) {
            return Ok(Err(Refusal::Invalid(msg)));
        }

        self.db.update_content(content_id, update, file).await?;
        let updated = self
            .db
            .get_content(content_id)
            .await?
            .ok_or_eyre("content missing after update")?;
        Ok(Ok(updated))
    }

    pub async fn delete_content(&self, user: &User, content_id: i64) -> Result<Outcome<()>> {
        if let Err(refusal) = self.owned_content(user, content_id).await? {
            return Ok(Err(refusal));
        }
        self.db.delete_content(content_id).await?;
        Ok(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(content_type: ContentType, video_url: Option<&str>) -> NewContent {
        NewContent {
            title: "Attention basics".to_string(),
            content_type,
            body: String::new(),
            video_url: video_url.map(str::to_string),
            min_level: 1,
            max_level: 20,
        }
    }

    #[test]
    fn recommendation_type_names_the_level() {
        assert_eq!(recommendation_type(12), "Recommended for level 12");
    }

    #[test]
    fn content_levels_must_be_ordered() {
        let mut new = content(ContentType::Text, None);
        assert!(validate_new_content(&new, None).is_ok());
        new.min_level = 30;
        assert_eq!(
            validate_new_content(&new, None),
            Err("min level cannot be above max level")
        );
        new.min_level = 0;
        assert!(validate_new_content(&new, None).is_err());
    }

    #[test]
    fn video_needs_a_source() {
        let video = content(ContentType::Video, None);
        assert!(validate_new_content(&video, None).is_err());

        let file = UploadedFile {
            name: "clip.mp4".to_string(),
            media_type: "video/mp4".to_string(),
            bytes: vec![0, 1, 2],
        };
        assert!(validate_new_content(&video, Some(&file)).is_ok());

        let linked = content(ContentType::Video, Some("https://videos.example/clip"));
        assert!(validate_new_content(&linked, None).is_ok());
    }
}
