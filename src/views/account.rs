use maud::{html, Markup};

use crate::{
    db::models::{LevelChange, User},
    names,
    views::components,
};

pub enum ProfileState {
    NoError,
    ProfileSaved,
    PasswordChanged,
    EmptyFields,
    WeakPassword,
    IncorrectPassword,
}

pub fn profile_page(user: &User, history: &[LevelChange], state: ProfileState) -> Markup {
    let (error_msg, success_msg) = match state {
        ProfileState::NoError => (None, None),
        ProfileState::ProfileSaved => (None, Some("Profile saved.")),
        ProfileState::PasswordChanged => (None, Some("Password changed.")),
        ProfileState::EmptyFields => (Some("Please fill in both password fields."), None),
        ProfileState::WeakPassword => {
            (Some("New password must be at least 8 characters long."), None)
        }
        ProfileState::IncorrectPassword => (Some("Current password is incorrect."), None),
    };

    html! {
        h1 { "Profile" }
        (components::form_success(success_msg))
        (components::form_error(error_msg))

        div.grid {
            article {
                header { strong { (user.username) } " · " (user.role) }
                @if let Some(level) = user.cognitive_level {
                    p { "Cognitive level: " strong { (level) } }
                }
                form action=(names::PROFILE_URL) method="post" {
                    input type="hidden" name="action" value="profile";
                    label {
                        "First name"
                        input name="first_name" type="text" value=(user.first_name);
                    }
                    label {
                        "Last name"
                        input name="last_name" type="text" value=(user.last_name);
                    }
                    label {
                        "Email"
                        input name="email" type="email" value=(user.email);
                    }
                    button type="submit" { "Save profile" }
                }
            }

            article {
                header { strong { "Change password" } }
                form action=(names::PROFILE_URL) method="post" {
                    input type="hidden" name="action" value="password";
                    label {
                        "Current password"
                        input name="current_password" type="password"
                              autocomplete="current-password";
                    }
                    label {
                        "New password"
                        input name="new_password" type="password"
                              autocomplete="new-password" minlength="8";
                    }
                    button type="submit" { "Change password" }
                }
            }
        }

        @if user.is_student() {
            h2 { "Level history" }
            (level_history(history))
        }
    }
}

pub fn level_history(history: &[LevelChange]) -> Markup {
    html! {
        @if history.is_empty() {
            (components::empty_state("No level changes yet."))
        } @else {
            table {
                thead {
                    tr { th { "When" } th { "From" } th { "To" } th { "Reason" } }
                }
                tbody {
                    @for change in history {
                        tr {
                            td { (change.timestamp) }
                            td { (change.old_level) }
                            td { (change.new_level) }
                            td { (change.reason) }
                        }
                    }
                }
            }
        }
    }
}
