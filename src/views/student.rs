use maud::{html, Markup};

use crate::{
    db::models::{
        CognitiveTest, LearningPath, Notification, PerformanceSummary, Recommendation, TestResult,
        TestSession,
    },
    models::{Category, QuestionType, SessionStatus},
    names,
    services::{analytics::StudentDashboard, assessment::TestDetail},
    views::components,
};

pub fn dashboard(data: &StudentDashboard) -> Markup {
    let identity = &data.identity;
    html! {
        h1 { "Welcome, " (identity.full_name) }

        @for alert in &data.alerts {
            article class=(format!("alert alert-{}", alert.kind)) {
                (alert.message)
                @if let Some(url) = &alert.url {
                    " " a href=(url) { "Go" }
                }
            }
        }

        div.grid {
            article {
                header { "Level" }
                p.big-number { (identity.level) }
                p { "Rank: " strong { (identity.rank) } }
            }
            article {
                header { "Cognitive profile" }
                (profile_rows(&data.cognitive_profile))
            }
            article {
                header { "Learning path" }
                @if let Some(name) = &data.learning_status.path_name {
                    p { (name) }
                    (components::progress_bar(data.learning_status.progress_percent))
                    p {
                        (data.learning_status.completed_items) " of "
                        (data.learning_status.total_items) " completed"
                    }
                } @else {
                    p { "No active learning path." }
                }
                a href=(names::LEARNING_PATH_URL) { "Open learning path" }
            }
        }

        h2 { "Recommended for you" }
        (recommendation_list(&data.recommendations))
        a href=(names::RECOMMENDATIONS_URL) { "All recommendations" }

        h2 { "Recent results" }
        (session_table(&data.recent_results))
    }
}

pub fn profile_rows(summary: &PerformanceSummary) -> Markup {
    html! {
        @for category in Category::ALL {
            div.profile-row {
                span { (category_label(*category)) }
                (components::progress_bar(summary.average(*category)))
            }
        }
    }
}

pub fn category_label(category: Category) -> &'static str {
    match category {
        Category::Memory => "Memory",
        Category::Focus => "Focus",
        Category::Logic => "Logic",
    }
}

fn recommendation_list(recommendations: &[Recommendation]) -> Markup {
    html! {
        @if recommendations.is_empty() {
            (components::empty_state("No recommendations yet. Finish a test to get some."))
        } @else {
            ul {
                @for rec in recommendations {
                    li {
                        a href=(names::content_url(rec.content.id)) { (rec.content.title) }
                        small { " · " (rec.recommendation_type) }
                    }
                }
            }
        }
    }
}

fn session_table(sessions: &[TestSession]) -> Markup {
    html! {
        @if sessions.is_empty() {
            (components::empty_state("No finished tests yet."))
        } @else {
            table {
                thead {
                    tr { th { "Test" } th { "Status" } th { "Score" } th { "Finished" } th {} }
                }
                tbody {
                    @for session in sessions {
                        tr {
                            td { (session.test_title) }
                            td { (components::status_badge(session.status)) }
                            td {
                                @if session.status == SessionStatus::Completed {
                                    (components::score(session.total_score))
                                } @else {
                                    "-"
                                }
                            }
                            td { (session.finished_at.as_deref().unwrap_or("-")) }
                            td { a href=(names::results_url(session.id)) { "Details" } }
                        }
                    }
                }
            }
        }
    }
}

pub fn recommendations(recommendations: &[Recommendation], level: i64) -> Markup {
    html! {
        h1 { "Recommended content" }
        p { "Picked for level " (level) ", within five levels either way." }
        (components::action_button(names::RECOMMENDATIONS_URL, "Refresh recommendations", "secondary"))

        @if recommendations.is_empty() {
            (components::empty_state("No recommendations yet. Refresh to get some."))
        } @else {
            table {
                thead {
                    tr { th { "Content" } th { "Levels" } th { "Why" } th {} }
                }
                tbody {
                    @for rec in recommendations {
                        tr class=(if rec.is_clicked { "read" } else { "unread" }) {
                            td { (rec.content.title) }
                            td { (rec.content.min_level) "-" (rec.content.max_level) }
                            td { (rec.recommendation_type) }
                            td {
                                (components::action_button(
                                    &names::open_recommendation_url(rec.id),
                                    if rec.is_clicked { "Open again" } else { "Open" },
                                    "outline",
                                ))
                            }
                        }
                    }
                }
            }
        }
    }
}

pub fn no_placement_test() -> Markup {
    html! {
        h1 { "Placement test" }
        article {
            p { "There is no placement test available yet. Please check back later." }
        }
    }
}

pub fn tests_list(tests: &[CognitiveTest], needs_placement: bool) -> Markup {
    html! {
        h1 { "Available tests" }
        @if needs_placement {
            p { "Start with the placement test to find your level." }
        }
        @if tests.is_empty() {
            (components::empty_state("No tests are available for your level right now."))
        } @else {
            div.card-list {
                @for test in tests {
                    article {
                        header {
                            strong { (test.title) }
                            small { " · " (test.test_type) }
                        }
                        @if !test.description.is_empty() {
                            p { (test.description) }
                        }
                        p {
                            small {
                                "Level " (test.min_level) "+ · "
                                (test.time_limit_minutes) " min · pass at "
                                (test.passing_score) "%"
                            }
                        }
                        a role="button" href=(names::take_test_url(test.id)) { "Start" }
                    }
                }
            }
        }
    }
}

/// The attempt form. `action` is where the answers are posted.
pub fn take_test(detail: &TestDetail, session: &TestSession, action: &str) -> Markup {
    let remaining = session.remaining_seconds.max(0);
    html! {
        h1 { (detail.test.title) }
        p.countdown data-remaining-seconds=(remaining) data-form="attempt-form" {
            "Time left: " span.countdown-value { (format!("{}:{:02}", remaining / 60, remaining % 60)) }
        }

        form id="attempt-form" action=(action) method="post" {
            input type="hidden" name="session_id" value=(session.id);
            @for (idx, question) in detail.questions.iter().enumerate() {
                article.question {
                    header {
                        strong { "Question " (idx + 1) }
                        small { " · " (category_label(question.category)) " · " (question.points) " pts" }
                    }
                    p { (question.text) }
                    @match question.question_type {
                        QuestionType::Mcq => {
                            fieldset {
                                @for choice in &question.choices {
                                    label {
                                        input type="radio"
                                              name=(format!("q{}", question.id))
                                              value=(choice.id);
                                        (choice.text)
                                    }
                                }
                            }
                        }
                        QuestionType::Text => {
                            textarea name=(format!("q{}", question.id)) rows="4" {}
                        }
                    }
                }
            }
            button type="submit" { "Submit answers" }
        }
    }
}

pub fn result_page(result: &TestResult) -> Markup {
    html! {
        h1 { "Result: " (result.test_title) }
        article {
            p { (components::status_badge(result.status)) }
            @match result.status {
                SessionStatus::PendingReview => {
                    p { "Your written answers are waiting for your teacher's review." }
                }
                _ => {
                    p.big-number { (components::score(result.total_score)) }
                }
            }
            @if let Some(feedback) = &result.teacher_feedback {
                blockquote { (feedback) footer { "Teacher feedback" } }
            }
        }

        @for answer in &result.answers {
            article.answer {
                header {
                    strong { (answer.question_text) }
                    small { " · " (format!("{:.1}", answer.score_earned)) " / " (answer.points) }
                }
                @match answer.question_type {
                    QuestionType::Mcq => {
                        p { "Your answer: " (answer.user_choice_text.as_deref().unwrap_or("(none)")) }
                        @if let Some(correct) = &answer.correct_choice_text {
                            p { "Correct answer: " (correct) }
                        }
                    }
                    QuestionType::Text => {
                        p { "Your answer: " (answer.text_answer.as_deref().unwrap_or("(none)")) }
                        @if let Some(sample) = &answer.sample_correct_text {
                            p { "Sample answer: " (sample) }
                        }
                        @if !answer.is_reviewed {
                            p { small { "Not reviewed yet." } }
                        }
                    }
                }
            }
        }
        a href=(names::STUDENT_HISTORY_URL) { "Back to history" }
    }
}

pub fn history(sessions: &[TestSession]) -> Markup {
    html! {
        h1 { "History" }
        (session_table(sessions))
    }
}

pub fn learning_path(path: Option<&LearningPath>) -> Markup {
    html! {
        h1 { "Learning path" }
        @if let Some(path) = path {
            h2 { (path.name) }
            @if path.items.is_empty() {
                (components::empty_state("Nothing left to learn at your level. Try resetting later."))
            }
            ol.learning-path {
                @for item in &path.items {
                    li class=(if item.is_unlocked { "unlocked" } else { "locked" }) {
                        @if item.is_unlocked {
                            a href=(names::content_url(item.content.id)) { (item.content.title) }
                        } @else {
                            span { (item.content.title) }
                            small { " (locked)" }
                        }
                        @if item.is_completed {
                            " " mark { "done" }
                        }
                    }
                }
            }
        } @else {
            (components::empty_state("You do not have a learning path yet."))
        }
        (components::action_button(names::LEARNING_PATH_URL, "Build a new path", "secondary"))
    }
}

pub fn stats(
    summary: &PerformanceSummary,
    level: i64,
    rank: &str,
    notifications: &[Notification],
) -> Markup {
    html! {
        h1 { "My stats" }
        div.grid {
            article {
                header { "Level" }
                p.big-number { (level) }
                p { "Rank: " strong { (rank) } }
                p { "Tests completed: " (summary.total_tests_completed) }
            }
            article {
                header { "Average by category" }
                (profile_rows(summary))
            }
        }

        h2 { "Notifications" }
        @if notifications.is_empty() {
            (components::empty_state("No notifications."))
        } @else {
            ul {
                @for note in notifications {
                    li class=(if note.is_read { "read" } else { "unread" }) {
                        (note.message) " " small { (note.created_at) }
                    }
                }
            }
        }
    }
}
