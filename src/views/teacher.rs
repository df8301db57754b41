use maud::{html, Markup};

use crate::{
    db::models::{
        CognitiveTest, Content, LevelChange, PerformanceSummary, Question, TestSession, User,
    },
    models::{Category, ContentType, QuestionType, TestType},
    names,
    services::{
        analytics::{self, SystemReport, TeacherDashboard},
        assessment::SessionDetail,
    },
    views::{
        account, components,
        student::{category_label, profile_rows},
    },
};

/// Number of choice inputs offered when authoring a multiple-choice question.
pub const CHOICE_SLOTS: usize = 4;

pub fn dashboard(data: &TeacherDashboard) -> Markup {
    html! {
        h1 { "Welcome, " (data.teacher_name) }
        div.grid {
            article { header { "Contents" } p.big-number { (data.contents_authored) } }
            article { header { "Tests" } p.big-number { (data.tests_managed) } }
            article { header { "Pending reviews" } p.big-number { (data.pending_reviews) } }
        }

        nav.quick-links {
            ul {
                @for link in &data.quick_links {
                    li { a role="button" class="outline" href=(link.url) { (link.label) } }
                }
            }
        }

        h2 { "Waiting for review" }
        (pending_table(&data.recent_pending))
    }
}

fn pending_table(sessions: &[TestSession]) -> Markup {
    html! {
        @if sessions.is_empty() {
            (components::empty_state("Nothing to grade."))
        } @else {
            table {
                thead { tr { th { "Student" } th { "Test" } th { "Started" } th {} } }
                tbody {
                    @for session in sessions {
                        tr {
                            td { (session.user_full_name) }
                            td { (session.test_title) }
                            td { (session.started_at) }
                            td { a href=(names::grade_session_url(session.id)) { "Grade" } }
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests and questions
// ---------------------------------------------------------------------------

pub fn tests_list(tests: &[CognitiveTest]) -> Markup {
    html! {
        h1 { "Tests" }
        a role="button" href=(names::NEW_TEST_URL) { "New test" }
        @if tests.is_empty() {
            (components::empty_state("No tests yet."))
        } @else {
            table {
                thead {
                    tr { th { "Title" } th { "Type" } th { "Levels" } th { "Active" } th {} }
                }
                tbody {
                    @for test in tests {
                        tr {
                            td { (test.title) }
                            td { (test.test_type) }
                            td { (test.min_level) " → " (test.target_level) }
                            td { @if test.is_active { "yes" } @else { "no" } }
                            td {
                                a href=(names::edit_test_url(test.id)) { "Edit" }
                                " · "
                                a href=(names::test_questions_url(test.id)) { "Questions" }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn test_settings_fields(test: Option<&CognitiveTest>) -> Markup {
    html! {
        label {
            "Title"
            input name="title" type="text" required="true"
                  value=[test.map(|t| t.title.as_str())];
        }
        label {
            "Description"
            textarea name="description" rows="2" {
                (test.map(|t| t.description.as_str()).unwrap_or(""))
            }
        }
        div.grid {
            label {
                "Min level"
                input name="min_level" type="number" min="1" max="100"
                      value=(test.map_or(1, |t| t.min_level));
            }
            label {
                "Target level"
                input name="target_level" type="number" min="1" max="100"
                      value=(test.map_or(1, |t| t.target_level));
            }
            label {
                "Time limit (minutes)"
                input name="time_limit_minutes" type="number" min="1"
                      value=(test.map_or(names::DEFAULT_TIME_LIMIT_MINUTES, |t| t.time_limit_minutes));
            }
            label {
                "Passing score (%)"
                input name="passing_score" type="number" min="0" max="100"
                      value=(test.map_or(names::DEFAULT_PASSING_SCORE, |t| t.passing_score));
            }
        }
    }
}

/// Inputs for one question. Choices are numbered from 1 and `correct` holds the right one.
pub fn question_fields() -> Markup {
    html! {
        fieldset {
            legend { "Question" }
            label {
                "Text"
                textarea name="question_text" rows="2" {}
            }
            div.grid {
                label {
                    "Category"
                    select name="category" {
                        @for category in Category::ALL {
                            option value=(category.as_str()) { (category_label(*category)) }
                        }
                    }
                }
                label {
                    "Type"
                    select name="question_type" {
                        option value=(QuestionType::Mcq.as_str()) { "Multiple choice" }
                        option value=(QuestionType::Text.as_str()) { "Written answer" }
                    }
                }
                label {
                    "Points"
                    input name="points" type="number" min="1"
                          value=(names::DEFAULT_QUESTION_POINTS);
                }
                label {
                    "Order"
                    input name="order" type="number" min="1" placeholder="next";
                }
            }
            @for slot in 1..=CHOICE_SLOTS {
                div.choice-row {
                    input type="radio" name="correct" value=(slot) aria-label="Correct choice";
                    input name=(format!("choice_{slot}")) type="text"
                          placeholder=(format!("Choice {slot}"));
                }
            }
            label {
                "Sample answer (written questions)"
                input name="correct_text_answer" type="text";
            }
        }
    }
}

pub fn new_test_form(error: Option<&str>) -> Markup {
    html! {
        h1 { "New test" }
        (components::form_error(error))
        form action=(names::NEW_TEST_URL) method="post" {
            (test_settings_fields(None))
            label {
                "Type"
                select name="test_type" {
                    @for test_type in TestType::ALL {
                        option value=(test_type.as_str()) selected[*test_type == TestType::General] {
                            (test_type)
                        }
                    }
                }
            }
            (question_fields())
            p { small { "More questions can be added after the test is created." } }
            button type="submit" { "Create test" }
        }
    }
}

pub fn edit_test_form(test: &CognitiveTest, error: Option<&str>, saved: bool) -> Markup {
    html! {
        h1 { "Edit " (test.title) }
        (components::form_error(error))
        @if saved {
            (components::form_success(Some("Test saved.")))
        }
        form action=(names::edit_test_url(test.id)) method="post" {
            (test_settings_fields(Some(test)))
            label {
                input type="checkbox" role="switch" name="is_active" value="true" checked[test.is_active];
                "Active"
            }
            button type="submit" { "Save" }
        }
        p {
            a href=(names::test_questions_url(test.id)) { "Edit questions" }
        }
        (components::action_button(&names::delete_test_url(test.id), "Delete test", "secondary outline"))
    }
}

pub fn questions_page(test: &CognitiveTest, questions: &[Question], error: Option<&str>) -> Markup {
    html! {
        h1 { "Questions: " (test.title) }
        a href=(names::edit_test_url(test.id)) { "Back to test settings" }

        @if questions.is_empty() {
            (components::empty_state("This test has no questions yet."))
        }
        @for question in questions {
            article.question {
                header {
                    strong { "#" (question.order) " " }
                    (question.text)
                    small { " · " (category_label(question.category)) " · " (question.points) " pts" }
                }
                @if question.question_type == QuestionType::Mcq {
                    ul {
                        @for choice in &question.choices {
                            li {
                                (choice.text)
                                @if choice.is_correct == Some(true) { " " mark { "correct" } }
                            }
                        }
                    }
                } @else {
                    @if let Some(sample) = &question.correct_text_answer {
                        p { "Sample answer: " (sample) }
                    }
                }
                (components::action_button(
                    &names::delete_question_url(test.id, question.id),
                    "Delete",
                    "secondary outline",
                ))
            }
        }

        h2 { "Add a question" }
        (components::form_error(error))
        form action=(names::test_questions_url(test.id)) method="post" {
            (question_fields())
            button type="submit" { "Add question" }
        }
    }
}

// ---------------------------------------------------------------------------
// Contents
// ---------------------------------------------------------------------------

pub fn contents_list(contents: &[Content]) -> Markup {
    html! {
        h1 { "Contents" }
        a role="button" href=(names::NEW_CONTENT_URL) { "New content" }
        @if contents.is_empty() {
            (components::empty_state("No content yet."))
        } @else {
            table {
                thead {
                    tr { th { "Title" } th { "Type" } th { "Levels" } th { "Test" } th {} }
                }
                tbody {
                    @for content in contents {
                        tr {
                            td { a href=(names::content_url(content.id)) { (content.title) } }
                            td { (content.content_type) }
                            td { (content.min_level) "-" (content.max_level) }
                            td {
                                @if let Some(test_id) = content.related_test_id {
                                    a href=(names::test_questions_url(test_id)) { "Questions" }
                                } @else {
                                    (components::action_button(
                                        &names::content_test_url(content.id),
                                        "Create test",
                                        "outline",
                                    ))
                                }
                            }
                            td {
                                (components::action_button(
                                    &names::delete_content_url(content.id),
                                    "Delete",
                                    "secondary outline",
                                ))
                            }
                        }
                    }
                }
            }
        }
    }
}

pub fn new_content_form(error: Option<&str>) -> Markup {
    html! {
        h1 { "New content" }
        (components::form_error(error))
        form action=(names::NEW_CONTENT_URL) method="post" enctype="multipart/form-data" {
            label {
                "Title"
                input name="title" type="text" required="true";
            }
            label {
                "Type"
                select name="content_type" {
                    option value=(ContentType::Text.as_str()) { "Text" }
                    option value=(ContentType::Video.as_str()) { "Video" }
                }
            }
            label {
                "Body"
                textarea name="body" rows="8" {}
            }
            label {
                "Video URL"
                input name="video_url" type="url";
            }
            div.grid {
                label {
                    "Min level"
                    input name="min_level" type="number" min="1" max="100" value="1";
                }
                label {
                    "Max level"
                    input name="max_level" type="number" min="1" max="100" value="100";
                }
            }
            label {
                "File"
                input name="file" type="file";
            }
            button type="submit" { "Create content" }
        }
    }
}

// ---------------------------------------------------------------------------
// Grading
// ---------------------------------------------------------------------------

pub fn grading_list(sessions: &[TestSession]) -> Markup {
    html! {
        h1 { "Grading" }
        (pending_table(sessions))
    }
}

pub fn grade_form(detail: &SessionDetail, error: Option<&str>) -> Markup {
    let session = &detail.session;
    html! {
        h1 { "Grade: " (session.test_title) }
        p { "Student: " strong { (session.user_full_name) } " · " (components::status_badge(session.status)) }
        (components::form_error(error))

        form action=(names::grade_session_url(session.id)) method="post" {
            @for answer in &detail.answers {
                article.answer {
                    header {
                        strong { (answer.question_text) }
                        small { " · " (answer.question_type) " · " (answer.points) " pts" }
                    }
                    @match answer.question_type {
                        QuestionType::Mcq => {
                            p {
                                @match answer.selected_choice_correct {
                                    Some(true) => { "Correct choice" }
                                    Some(false) => { "Wrong choice" }
                                    None => { "No choice" }
                                }
                                " · auto-scored " (format!("{:.1}", answer.score_earned))
                            }
                        }
                        QuestionType::Text => {
                            blockquote { (answer.text_answer.as_deref().unwrap_or("(no answer)")) }
                            label {
                                "Score (0-" (answer.points) ")"
                                input type="number"
                                      name=(format!("score_{}", answer.id))
                                      min="0"
                                      max=(answer.points)
                                      step="0.5"
                                      value=(answer.score_earned)
                                      required="true";
                            }
                        }
                    }
                }
            }
            label {
                "Feedback"
                textarea name="feedback" rows="3" {
                    (session.teacher_feedback.as_deref().unwrap_or(""))
                }
            }
            button type="submit" { "Save grades" }
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Student list for staff, with the platform totals for admins.
pub fn reports(system: Option<&SystemReport>, students: &[User]) -> Markup {
    html! {
        h1 { "Reports" }
        @if let Some(system) = system {
            div.grid {
                article { header { "Students" } p.big-number { (system.total_students) } }
                article { header { "Average level" } p.big-number { (format!("{:.1}", system.average_level)) } }
                article { header { "Completed tests" } p.big-number { (system.completed_sessions) } }
            }
        }

        h2 { "Students" }
        @if students.is_empty() {
            (components::empty_state("No students yet."))
        } @else {
            table {
                thead {
                    tr { th { "Student" } th { "Level" } th { "Rank" } th { "Placement" } th {} }
                }
                tbody {
                    @for student in students {
                        tr {
                            td { (student.full_name()) }
                            td { (student.level()) }
                            td { (analytics::rank(student.level())) }
                            td { @if student.has_taken_placement_test { "Taken" } @else { "Pending" } }
                            td { a href=(names::student_report_url(student.id)) { "Report" } }
                        }
                    }
                }
            }
        }
    }
}

pub fn student_report(
    student: &User,
    summary: &PerformanceSummary,
    history: &[LevelChange],
) -> Markup {
    html! {
        h1 { (student.full_name()) }
        div.grid {
            article {
                header { "Level" }
                p.big-number { (student.level()) }
                p { "Rank: " strong { (analytics::rank(student.level())) } }
                p { "Tests completed: " (summary.total_tests_completed) }
            }
            article {
                header { "Average by category" }
                (profile_rows(summary))
            }
        }

        h2 { "Level history" }
        (account::level_history(history))

        a href=(names::REPORTS_URL) { "Back to reports" }
    }
}
