pub mod adaptive;
pub mod analytics;
pub mod assessment;
pub mod auth;

/// Why a service turned a request down. These are expected outcomes, not failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refusal {
    NotFound,
    Forbidden,
    Invalid(&'static str),
}

pub type Outcome<T> = std::result::Result<T, Refusal>;
