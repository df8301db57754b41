use std::{fmt, str::FromStr};

use color_eyre::eyre::{eyre, Report};
use serde::{Deserialize, Serialize};

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Report;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)*
                    other => Err(eyre!(concat!("unknown ", stringify!($name), ": {}"), other)),
                }
            }
        }
    };
}

string_enum!(Role {
    Student => "student",
    Teacher => "teacher",
    Admin => "admin",
});

string_enum!(TestType {
    Placement => "placement",
    ContentBased => "content_based",
    General => "general",
});

string_enum!(Category {
    Memory => "memory",
    Focus => "focus",
    Logic => "logic",
});

string_enum!(QuestionType {
    Mcq => "mcq",
    Text => "text",
});

string_enum!(SessionStatus {
    InProgress => "in_progress",
    Completed => "completed",
    PendingReview => "pending_review",
});

string_enum!(ContentType {
    Text => "text",
    Video => "video",
});

impl Role {
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Teacher | Role::Admin)
    }
}

// ---------------------------------------------------------------------------
// Inputs accepted by the API and the authoring forms
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChoiceInput {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub order: Option<i64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QuestionInput {
    #[serde(default = "default_category")]
    pub category: Category,
    #[serde(default = "default_question_type")]
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default)]
    pub correct_text_answer: Option<String>,
    #[serde(default = "default_points")]
    pub points: i64,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub choices: Vec<ChoiceInput>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewTest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_test_type")]
    pub test_type: TestType,
    #[serde(default = "default_level")]
    pub min_level: i64,
    #[serde(default = "default_level")]
    pub target_level: i64,
    #[serde(default = "default_time_limit")]
    pub time_limit_minutes: i64,
    #[serde(default = "default_passing_score")]
    pub passing_score: i64,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TestUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub min_level: Option<i64>,
    pub target_level: Option<i64>,
    pub time_limit_minutes: Option<i64>,
    pub passing_score: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewContent {
    pub title: String,
    #[serde(default = "default_content_type")]
    pub content_type: ContentType,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default = "default_level")]
    pub min_level: i64,
    #[serde(default = "max_level")]
    pub max_level: i64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ContentUpdate {
    pub title: Option<String>,
    pub content_type: Option<ContentType>,
    pub body: Option<String>,
    pub video_url: Option<String>,
    pub min_level: Option<i64>,
    pub max_level: Option<i64>,
    pub is_active: Option<bool>,
}

/// A file uploaded alongside learning content.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AnswerInput {
    #[serde(default)]
    pub selected_choice: Option<i64>,
    #[serde(default)]
    pub text_answer: Option<String>,
    #[serde(default)]
    pub time_spent_seconds: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GradeInput {
    pub answer_id: i64,
    pub score: f64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GradeSubmission {
    #[serde(default)]
    pub grades: Vec<GradeInput>,
    #[serde(default)]
    pub feedback: Option<String>,
}

fn default_category() -> Category {
    Category::Logic
}

fn default_question_type() -> QuestionType {
    QuestionType::Mcq
}

fn default_points() -> i64 {
    crate::names::DEFAULT_QUESTION_POINTS
}

fn default_test_type() -> TestType {
    TestType::General
}

fn default_content_type() -> ContentType {
    ContentType::Text
}

fn default_level() -> i64 {
    crate::names::MIN_LEVEL
}

fn max_level() -> i64 {
    crate::names::MAX_LEVEL
}

fn default_time_limit() -> i64 {
    crate::names::DEFAULT_TIME_LIMIT_MINUTES
}

fn default_passing_score() -> i64 {
    crate::names::DEFAULT_PASSING_SCORE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_their_wire_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert_eq!(
            "pending_review".parse::<SessionStatus>().unwrap(),
            SessionStatus::PendingReview
        );
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn new_test_fills_defaults() {
        let test: NewTest = serde_json::from_str(
            r#"{"title":"Memory 1","questions":[{"text":"Q","choices":[{"text":"a","is_correct":true}]}]}"#,
        )
        .unwrap();
        assert_eq!(test.test_type, TestType::General);
        assert_eq!(test.time_limit_minutes, 30);
        assert_eq!(test.passing_score, 70);
        assert_eq!(test.questions[0].points, 10);
        assert_eq!(test.questions[0].question_type, QuestionType::Mcq);
    }
}
