use maud::{html, Markup};

use crate::models::SessionStatus;

/// Inline error shown above a form after a failed submission.
pub fn form_error(msg: Option<&str>) -> Markup {
    html! {
        @if let Some(msg) = msg {
            p.form-error role="alert" { (msg) }
        }
    }
}

pub fn form_success(msg: Option<&str>) -> Markup {
    html! {
        @if let Some(msg) = msg {
            p.form-success role="status" { (msg) }
        }
    }
}

pub fn status_badge(status: SessionStatus) -> Markup {
    let label = match status {
        SessionStatus::InProgress => "In progress",
        SessionStatus::Completed => "Completed",
        SessionStatus::PendingReview => "Pending review",
    };
    html! {
        mark class=(format!("status status-{status}")) { (label) }
    }
}

pub fn score(value: f64) -> String {
    format!("{value:.1}%")
}

/// A `progress` bar with its value written beside it.
pub fn progress_bar(percent: f64) -> Markup {
    html! {
        div.progress-row {
            progress value=(format!("{percent:.0}")) max="100" {}
            span { (format!("{percent:.0}%")) }
        }
    }
}

pub fn empty_state(msg: &str) -> Markup {
    html! {
        p.empty-state { (msg) }
    }
}

/// A POST form holding just a button, for actions like delete or reset.
pub fn action_button(action: &str, label: &str, class: &str) -> Markup {
    html! {
        form.inline-form action=(action) method="post" {
            button class=(class) type="submit" { (label) }
        }
    }
}
