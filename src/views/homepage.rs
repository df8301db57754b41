use maud::{html, Markup};

use crate::{models::Role, names, views::components};

pub fn landing_page() -> Markup {
    html! {
        section.landing-hero {
            h1 { "Train your memory, focus and logic" }
            p.landing-hero-desc {
                "Take a placement test, get tests matched to your cognitive level, "
                "and follow a learning path that grows with you."
            }
            div.landing-cta {
                a role="button" href=(names::REGISTER_URL) { "Sign up" }
                a role="button" href=(names::LOGIN_URL) class="outline" { "Log in" }
            }
        }

        section.landing-features {
            div.grid {
                article {
                    h3 { "Adaptive tests" }
                    p { "Your level moves with every passed test, from 1 to 100." }
                }
                article {
                    h3 { "Teacher review" }
                    p { "Written answers are graded by your teacher, with feedback." }
                }
                article {
                    h3 { "Learning paths" }
                    p { "Content unlocks step by step as you complete it." }
                }
            }
        }
    }
}

pub enum LoginState {
    NoError,
    IncorrectPassword,
    EmptyFields,
}

pub fn login(state: LoginState, next: Option<&str>) -> Markup {
    let error_msg = match state {
        LoginState::NoError => None,
        LoginState::IncorrectPassword => Some("Incorrect username or password."),
        LoginState::EmptyFields => Some("Please enter your username and password."),
    };

    html! {
        h1 { "Log in" }
        article.narrow {
            (components::form_error(error_msg))
            form action=(names::LOGIN_URL) method="post" {
                @if let Some(next) = next {
                    input type="hidden" name=(names::NEXT_QUERY_PARAM) value=(next);
                }
                label {
                    "Username"
                    input name="username"
                          type="text"
                          autocomplete="username"
                          required="true"
                          aria-invalid=[error_msg.map(|_| "true")];
                }
                label {
                    "Password"
                    input name="password"
                          type="password"
                          autocomplete="current-password"
                          required="true"
                          aria-invalid=[error_msg.map(|_| "true")];
                }
                button type="submit" { "Log in" }
            }
            p {
                "No account yet? "
                a href=(names::REGISTER_URL) { "Register" }
            }
        }
    }
}

pub enum RegisterState {
    NoError,
    EmptyFields,
    UsernameTaken,
    WeakPassword,
    InvalidRole,
}

/// Values to put back into the register form after a failed attempt.
#[derive(Default)]
pub struct RegisterValues<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: &'a str,
}

pub fn register(state: RegisterState, values: RegisterValues<'_>) -> Markup {
    let error_msg = match state {
        RegisterState::NoError => None,
        RegisterState::EmptyFields => Some("Username and password are required."),
        RegisterState::UsernameTaken => Some("This username is already taken."),
        RegisterState::WeakPassword => Some("Password must be at least 8 characters long."),
        RegisterState::InvalidRole => Some("Please choose student or teacher."),
    };
    let selected_role = if values.role.is_empty() {
        Role::Student.as_str()
    } else {
        values.role
    };

    html! {
        h1 { "Register" }
        article.narrow {
            (components::form_error(error_msg))
            form action=(names::REGISTER_URL) method="post" {
                label {
                    "Username"
                    input name="username" type="text" autocomplete="username"
                          required="true" value=(values.username);
                }
                label {
                    "Email"
                    input name="email" type="email" autocomplete="email" value=(values.email);
                }
                div.grid {
                    label {
                        "First name"
                        input name="first_name" type="text" autocomplete="given-name"
                              value=(values.first_name);
                    }
                    label {
                        "Last name"
                        input name="last_name" type="text" autocomplete="family-name"
                              value=(values.last_name);
                    }
                }
                label {
                    "Password"
                    input name="password" type="password" autocomplete="new-password"
                          required="true" minlength="8";
                }
                label {
                    "I am a"
                    select name="role" {
                        @for role in [Role::Student, Role::Teacher] {
                            option value=(role.as_str()) selected[selected_role == role.as_str()] {
                                @match role {
                                    Role::Student => { "Student" }
                                    _ => { "Teacher" }
                                }
                            }
                        }
                    }
                }
                button type="submit" { "Create account" }
            }
            p {
                "Already registered? "
                a href=(names::LOGIN_URL) { "Log in" }
            }
        }
    }
}
