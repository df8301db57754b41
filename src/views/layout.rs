use maud::{html, Markup, DOCTYPE};

use crate::{db::models::User, models::Role, names, utils};

const PICO_CSS: &str = "https://cdn.jsdelivr.net/npm/@picocss/pico@2/css/pico.min.css";

fn css() -> Markup {
    html! {
        link rel="stylesheet" href=(PICO_CSS);
        link rel="stylesheet" href="/static/index.css";
    }
}

fn js() -> Markup {
    html! {
        script src="/static/app.js" defer {}
    }
}

fn icon() -> Markup {
    html! {
        link rel="icon" href="/static/img/icon.svg" type="image/svg+xml" {}
    }
}

fn nav_links(user: &User) -> Markup {
    html! {
        @match user.role {
            Role::Student => {
                li { a href=(names::STUDENT_DASHBOARD_URL) { "Dashboard" } }
                li { a href=(names::STUDENT_TESTS_URL) { "Tests" } }
                li { a href=(names::LEARNING_PATH_URL) { "Learning path" } }
                li { a href=(names::RECOMMENDATIONS_URL) { "Recommended" } }
                li { a href=(names::STUDENT_HISTORY_URL) { "History" } }
                li { a href=(names::STUDENT_STATS_URL) { "Stats" } }
            }
            Role::Teacher | Role::Admin => {
                li { a href=(names::TEACHER_DASHBOARD_URL) { "Dashboard" } }
                li { a href=(names::TEACHER_TESTS_URL) { "Tests" } }
                li { a href=(names::TEACHER_CONTENTS_URL) { "Contents" } }
                li { a href=(names::GRADING_URL) { "Grading" } }
                li { a href=(names::REPORTS_URL) { "Reports" } }
            }
        }
    }
}

fn header(user: Option<&User>) -> Markup {
    html! {
        header {
            nav {
                ul {
                    li."secondary" {
                        a href="/" {
                            strong { "CogLearn" }
                        }
                    }
                }
                ul {
                    @if let Some(user) = user {
                        (nav_links(user))
                        li { a href=(names::PROFILE_URL) { (user.full_name()) } }
                        li {
                            form.inline-form action=(names::LOGOUT_URL) method="post" {
                                button.outline.secondary type="submit" { "Log out" }
                            }
                        }
                    } @else {
                        li { a href=(names::LOGIN_URL) { "Log in" } }
                        li { a href=(names::REGISTER_URL) { "Register" } }
                    }
                    li."secondary" { (utils::VERSION) }
                }
            }
        }
    }
}

fn main(body: Markup) -> Markup {
    html! {
        main { (body) }
    }
}

fn document(title: &str, user: Option<&User>, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        head {
            meta charset="utf-8";
            meta name="viewport" content="width=device-width, initial-scale=1";
            meta name="color-scheme" content="light dark";

            (css())
            (js())
            (icon())

            title { (format!("{title} - CogLearn")) }
        }

        body."container" {
            (header(user))
            (main(body))
        }
    }
}

pub fn page(title: &str, body: Markup) -> Markup {
    document(title, None, body)
}

pub fn page_with_user(title: &str, user: &User, body: Markup) -> Markup {
    document(title, Some(user), body)
}
