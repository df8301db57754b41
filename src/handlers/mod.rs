pub mod account;
pub mod api;
pub mod content;
pub mod homepage;
pub mod student;
pub mod teacher;

use std::collections::HashMap;

use axum::extract::Multipart;
use serde::Deserialize;

use crate::{
    models::{
        AnswerInput, Category, ChoiceInput, ContentType, NewContent, QuestionInput, QuestionType,
        UploadedFile,
    },
    names,
    rejections::AppError,
    views::teacher::CHOICE_SLOTS,
};

/// Parse an optional number typed into a form. Blank means "not given".
pub(crate) fn optional_number(value: Option<&str>) -> Result<Option<i64>, &'static str> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| "please enter whole numbers"),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The question inputs shared by the new-test and add-question forms.
#[derive(Debug, Default, Deserialize)]
pub struct QuestionFields {
    #[serde(default)]
    pub question_text: String,
    pub category: Option<String>,
    pub question_type: Option<String>,
    pub points: Option<String>,
    pub order: Option<String>,
    pub correct: Option<String>,
    pub correct_text_answer: Option<String>,
    pub choice_1: Option<String>,
    pub choice_2: Option<String>,
    pub choice_3: Option<String>,
    pub choice_4: Option<String>,
}

impl QuestionFields {
    pub fn into_input(self) -> Result<QuestionInput, &'static str> {
        let category = match self.category.as_deref() {
            None | Some("") => Category::Logic,
            Some(c) => c.parse().map_err(|_| "unknown category")?,
        };
        let question_type = match self.question_type.as_deref() {
            None | Some("") => QuestionType::Mcq,
            Some(t) => t.parse().map_err(|_| "unknown question type")?,
        };
        let points =
            optional_number(self.points.as_deref())?.unwrap_or(names::DEFAULT_QUESTION_POINTS);
        let order = optional_number(self.order.as_deref())?;
        let correct = optional_number(self.correct.as_deref())?;

        let slots = [self.choice_1, self.choice_2, self.choice_3, self.choice_4];
        let choices = if question_type == QuestionType::Mcq {
            slots
                .into_iter()
                .take(CHOICE_SLOTS)
                .enumerate()
                .filter_map(|(idx, text)| {
                    let slot = idx as i64 + 1;
                    non_blank(text).map(|text| ChoiceInput {
                        text,
                        is_correct: correct == Some(slot),
                        order: Some(slot),
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(QuestionInput {
            category,
            question_type,
            text: self.question_text.trim().to_string(),
            correct_text_answer: non_blank(self.correct_text_answer),
            points,
            order,
            choices,
        })
    }
}

/// Answers posted from the attempt form: `q<question_id>` fields.
pub(crate) fn answers_from_form(
    form: &HashMap<String, String>,
    questions: &[crate::db::models::Question],
) -> Vec<(i64, AnswerInput)> {
    questions
        .iter()
        .filter_map(|question| {
            let value = form.get(&format!("q{}", question.id))?.trim();
            if value.is_empty() {
                return None;
            }
            let answer = match question.question_type {
                QuestionType::Mcq => AnswerInput {
                    selected_choice: Some(value.parse().ok()?),
                    ..Default::default()
                },
                QuestionType::Text => AnswerInput {
                    text_answer: Some(value.to_string()),
                    ..Default::default()
                },
            };
            Some((question.id, answer))
        })
        .collect()
}

/// Read a content form posted as `multipart/form-data`, with an optional `file` part.
pub(crate) async fn content_from_multipart(
    mut multipart: Multipart,
) -> Result<(NewContent, Option<UploadedFile>), AppError> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("failed to read multipart field: {e}");
        AppError::Input("failed to read multipart field")
    })? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let media_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(|e| {
                tracing::error!("failed to read uploaded file: {e}");
                AppError::Input("failed to read uploaded file")
            })?;
            if !file_name.is_empty() && !bytes.is_empty() {
                file = Some(UploadedFile {
                    name: file_name,
                    media_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let text = field.text().await.map_err(|e| {
            tracing::error!("failed to read field data: {e}");
            AppError::Input("failed to read field data")
        })?;
        fields.insert(name, text);
    }

    let content_type = match fields.get("content_type").map(String::as_str) {
        None | Some("") => ContentType::Text,
        Some(t) => t
            .parse()
            .map_err(|_| AppError::Input("unknown content type"))?,
    };
    let level = |key: &str, default: i64| {
        optional_number(fields.get(key).map(String::as_str))
            .map(|v| v.unwrap_or(default))
            .map_err(AppError::Input)
    };

    let content = NewContent {
        title: fields.get("title").cloned().unwrap_or_default(),
        content_type,
        body: fields.get("body").cloned().unwrap_or_default(),
        video_url: non_blank(fields.get("video_url").cloned()),
        min_level: level("min_level", names::MIN_LEVEL)?,
        max_level: level("max_level", names::MAX_LEVEL)?,
    };
    Ok((content, file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_numbers_are_absent() {
        assert_eq!(optional_number(Some("  ")), Ok(None));
        assert_eq!(optional_number(None), Ok(None));
        assert_eq!(optional_number(Some("12")), Ok(Some(12)));
        assert!(optional_number(Some("twelve")).is_err());
    }

    #[test]
    fn question_fields_keep_filled_choices() {
        let fields = QuestionFields {
            question_text: " Which is larger? ".to_string(),
            category: Some("memory".to_string()),
            question_type: Some("mcq".to_string()),
            points: Some("5".to_string()),
            correct: Some("3".to_string()),
            choice_1: Some("2".to_string()),
            choice_2: Some("".to_string()),
            choice_3: Some("9".to_string()),
            ..Default::default()
        };
        let input = fields.into_input().unwrap();
        assert_eq!(input.text, "Which is larger?");
        assert_eq!(input.category, Category::Memory);
        assert_eq!(input.points, 5);
        assert_eq!(input.choices.len(), 2);
        assert!(!input.choices[0].is_correct);
        assert!(input.choices[1].is_correct);
        assert_eq!(input.choices[1].order, Some(3));
    }

    #[test]
    fn text_questions_drop_choices() {
        let fields = QuestionFields {
            question_text: "Describe a memory trick".to_string(),
            question_type: Some("text".to_string()),
            choice_1: Some("ignored".to_string()),
            correct_text_answer: Some("Chunking".to_string()),
            ..Default::default()
        };
        let input = fields.into_input().unwrap();
        assert!(input.choices.is_empty());
        assert_eq!(input.correct_text_answer.as_deref(), Some("Chunking"));
    }
}
