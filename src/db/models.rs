// Database model structs

use color_eyre::Result;
use serde::{Deserialize, Serialize};

use super::helpers::{get_enum, FromRow};
use crate::models::{Category, ContentType, QuestionType, Role, SessionStatus, TestType};

pub(crate) const USER_COLUMNS: &str = "u.id, u.username, u.email, u.first_name, u.last_name, u.role, u.cognitive_level, u.has_taken_placement_test, u.created_at";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub cognitive_level: Option<i64>,
    pub has_taken_placement_test: bool,
    pub created_at: String,
}

impl User {
    pub fn full_name(&self) -> String {
        crate::utils::full_name(&self.first_name, &self.last_name, &self.username)
    }

    /// Students without a recorded level are treated as level 1.
    pub fn level(&self) -> i64 {
        self.cognitive_level.unwrap_or(crate::names::MIN_LEVEL)
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    pub fn needs_placement(&self) -> bool {
        self.is_student() && !self.has_taken_placement_test
    }
}

impl FromRow for User {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            role: get_enum(row, 5)?,
            cognitive_level: row.get(6)?,
            has_taken_placement_test: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

pub(crate) const TEST_COLUMNS: &str = "t.id, t.title, t.test_type, t.description, t.created_by, t.min_level, t.target_level, t.related_content_id, t.time_limit_minutes, t.passing_score, t.is_active, t.created_at";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CognitiveTest {
    pub id: i64,
    pub title: String,
    pub test_type: TestType,
    pub description: String,
    pub created_by: Option<i64>,
    pub min_level: i64,
    pub target_level: i64,
    pub related_content: Option<i64>,
    pub time_limit_minutes: i64,
    pub passing_score: i64,
    pub is_active: bool,
    pub created_at: String,
}

impl FromRow for CognitiveTest {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            test_type: get_enum(row, 2)?,
            description: row.get(3)?,
            created_by: row.get(4)?,
            min_level: row.get(5)?,
            target_level: row.get(6)?,
            related_content: row.get(7)?,
            time_limit_minutes: row.get(8)?,
            passing_score: row.get(9)?,
            is_active: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub test_id: i64,
    pub category: Category,
    pub question_type: QuestionType,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_text_answer: Option<String>,
    pub points: i64,
    pub order: i64,
    pub choices: Vec<Choice>,
}

impl Question {
    /// Strip everything that would give the answer away.
    pub fn redacted(mut self) -> Self {
        self.correct_text_answer = None;
        for choice in &mut self.choices {
            choice.is_correct = None;
        }
        self
    }
}

impl FromRow for Question {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            test_id: row.get(1)?,
            category: get_enum(row, 2)?,
            question_type: get_enum(row, 3)?,
            text: row.get(4)?,
            correct_text_answer: row.get(5)?,
            points: row.get(6)?,
            order: row.get(7)?,
            choices: Vec::new(),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Choice {
    pub id: i64,
    #[serde(skip)]
    pub question_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    pub order: i64,
}

impl FromRow for Choice {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            question_id: row.get(1)?,
            text: row.get(2)?,
            is_correct: Some(row.get(3)?),
            order: row.get(4)?,
        })
    }
}

pub(crate) const SESSION_SELECT: &str = r#"
    SELECT s.id, s.user_id, s.test_id, t.title, u.first_name, u.last_name, u.username,
           s.status, s.started_at, s.finished_at, s.expires_at, s.total_score,
           s.teacher_feedback, s.reviewed_by,
           CAST((julianday(s.expires_at) - julianday('now')) * 86400 AS INTEGER)
    FROM test_sessions s
    JOIN tests t ON t.id = s.test_id
    JOIN users u ON u.id = s.user_id
"#;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestSession {
    pub id: i64,
    pub user: i64,
    pub test: i64,
    pub test_title: String,
    pub user_full_name: String,
    pub status: SessionStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub expires_at: String,
    pub total_score: f64,
    pub teacher_feedback: Option<String>,
    pub reviewed_by: Option<i64>,
    /// Seconds until `expires_at`; negative once expired.
    pub remaining_seconds: i64,
}

impl TestSession {
    pub fn is_expired(&self) -> bool {
        self.remaining_seconds < 0
    }
}

impl FromRow for TestSession {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        let first: String = row.get(4)?;
        let last: String = row.get(5)?;
        let username: String = row.get(6)?;
        Ok(Self {
            id: row.get(0)?,
            user: row.get(1)?,
            test: row.get(2)?,
            test_title: row.get(3)?,
            user_full_name: crate::utils::full_name(&first, &last, &username),
            status: get_enum(row, 7)?,
            started_at: row.get(8)?,
            finished_at: row.get(9)?,
            expires_at: row.get(10)?,
            total_score: row.get(11)?,
            teacher_feedback: row.get(12)?,
            reviewed_by: row.get(13)?,
            remaining_seconds: row.get(14)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub session: i64,
    pub question: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub category: Category,
    pub points: i64,
    pub selected_choice: Option<i64>,
    pub selected_choice_correct: Option<bool>,
    pub text_answer: Option<String>,
    pub score_earned: f64,
    pub is_reviewed: bool,
    pub time_spent_seconds: i64,
}

impl FromRow for Answer {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session: row.get(1)?,
            question: row.get(2)?,
            question_text: row.get(3)?,
            question_type: get_enum(row, 4)?,
            category: get_enum(row, 5)?,
            points: row.get(6)?,
            selected_choice: row.get(7)?,
            selected_choice_correct: row.get(8)?,
            text_answer: row.get(9)?,
            score_earned: row.get(10)?,
            is_reviewed: row.get(11)?,
            time_spent_seconds: row.get(12)?,
        })
    }
}

/// One answer as shown to the student on the result page.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerResult {
    pub question_text: String,
    pub question_type: QuestionType,
    pub category: Category,
    pub points: i64,
    pub user_choice_text: Option<String>,
    pub text_answer: Option<String>,
    pub correct_choice_text: Option<String>,
    pub sample_correct_text: Option<String>,
    pub score_earned: f64,
    pub is_reviewed: bool,
}

impl FromRow for AnswerResult {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            question_text: row.get(0)?,
            question_type: get_enum(row, 1)?,
            category: get_enum(row, 2)?,
            points: row.get(3)?,
            user_choice_text: row.get(4)?,
            text_answer: row.get(5)?,
            correct_choice_text: row.get(6)?,
            sample_correct_text: row.get(7)?,
            score_earned: row.get(8)?,
            is_reviewed: row.get(9)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    pub test_title: String,
    pub test_type: TestType,
    pub status: SessionStatus,
    pub total_score: f64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub teacher_feedback: Option<String>,
    pub answers: Vec<AnswerResult>,
}

pub(crate) const CONTENT_COLUMNS: &str = "c.id, c.title, c.content_type, c.body, c.file_name, c.file_type, c.video_url, c.min_level, c.max_level, c.author_id, c.is_active, c.created_at, (SELECT rt.id FROM tests rt WHERE rt.related_content_id = c.id)";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Content {
    pub id: i64,
    pub title: String,
    pub content_type: ContentType,
    pub body: String,
    pub file_name: Option<String>,
    #[serde(skip)]
    pub file_type: Option<String>,
    pub file_url: Option<String>,
    pub video_url: Option<String>,
    pub min_level: i64,
    pub max_level: i64,
    pub author: i64,
    pub is_active: bool,
    pub created_at: String,
    pub related_test_id: Option<i64>,
}

impl Content {
    /// Read the content columns starting at `offset`.
    pub(crate) fn from_row_at(row: &libsql::Row, offset: i32) -> Result<Self> {
        let id: i64 = row.get(offset)?;
        let file_name: Option<String> = row.get(offset + 4)?;
        Ok(Self {
            id,
            title: row.get(offset + 1)?,
            content_type: get_enum(row, offset + 2)?,
            body: row.get(offset + 3)?,
            file_url: file_name
                .as_ref()
                .map(|_| crate::names::content_file_url(id)),
            file_name,
            file_type: row.get(offset + 5)?,
            video_url: row.get(offset + 6)?,
            min_level: row.get(offset + 7)?,
            max_level: row.get(offset + 8)?,
            author: row.get(offset + 9)?,
            is_active: row.get(offset + 10)?,
            created_at: row.get(offset + 11)?,
            related_test_id: row.get(offset + 12)?,
        })
    }

    pub fn covers_level(&self, level: i64) -> bool {
        self.min_level <= level && level <= self.max_level
    }
}

impl FromRow for Content {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Self::from_row_at(row, 0)
    }
}

pub struct ContentFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl FromRow for ContentFile {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            media_type: row.get(1)?,
            bytes: row.get(2)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub created_at: String,
    pub items: Vec<LearningPathItem>,
}

impl FromRow for LearningPath {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            is_active: row.get(2)?,
            created_at: row.get(3)?,
            items: Vec::new(),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LearningPathItem {
    pub id: i64,
    pub order: i64,
    pub is_unlocked: bool,
    pub is_completed: bool,
    pub content: Content,
}

impl FromRow for LearningPathItem {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            order: row.get(1)?,
            is_unlocked: row.get(2)?,
            is_completed: row.get(3)?,
            content: Content::from_row_at(row, 4)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentProgress {
    pub content: i64,
    pub content_title: String,
    pub progress_percent: f64,
    pub is_completed: bool,
    pub last_accessed: String,
}

impl FromRow for ContentProgress {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            content: row.get(0)?,
            content_title: row.get(1)?,
            progress_percent: row.get(2)?,
            is_completed: row.get(3)?,
            last_accessed: row.get(4)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    pub recommendation_type: String,
    pub priority_weight: f64,
    pub is_clicked: bool,
    pub created_at: String,
    pub content: Content,
}

impl FromRow for Recommendation {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            recommendation_type: row.get(1)?,
            priority_weight: row.get(2)?,
            is_clicked: row.get(3)?,
            created_at: row.get(4)?,
            content: Content::from_row_at(row, 5)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelChange {
    pub old_level: i64,
    pub new_level: i64,
    pub reason: String,
    pub timestamp: String,
}

impl FromRow for LevelChange {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            old_level: row.get(0)?,
            new_level: row.get(1)?,
            reason: row.get(2)?,
            timestamp: row.get(3)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub user: i64,
    pub avg_memory_score: f64,
    pub avg_focus_score: f64,
    pub avg_logic_score: f64,
    pub total_tests_completed: i64,
    pub last_updated: String,
}

impl PerformanceSummary {
    pub fn average(&self, category: Category) -> f64 {
        match category {
            Category::Memory => self.avg_memory_score,
            Category::Focus => self.avg_focus_score,
            Category::Logic => self.avg_logic_score,
        }
    }

    pub fn set_average(&mut self, category: Category, value: f64) {
        match category {
            Category::Memory => self.avg_memory_score = value,
            Category::Focus => self.avg_focus_score = value,
            Category::Logic => self.avg_logic_score = value,
        }
    }
}

impl FromRow for PerformanceSummary {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            user: row.get(0)?,
            avg_memory_score: row.get(1)?,
            avg_focus_score: row.get(2)?,
            avg_logic_score: row.get(3)?,
            total_tests_completed: row.get(4)?,
            last_updated: row.get(5)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}

impl FromRow for Notification {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            message: row.get(1)?,
            is_read: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

/// Earned and available points for one category of a session.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryPoints {
    pub category: Category,
    pub earned: f64,
    pub points: f64,
}

impl FromRow for CategoryPoints {
    fn from_row(row: &libsql::Row) -> Result<Self> {
        Ok(Self {
            category: get_enum(row, 0)?,
            earned: row.get(1)?,
            points: row.get(2)?,
        })
    }
}
