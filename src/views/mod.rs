pub mod account;
pub mod components;
pub mod content;
pub mod homepage;
pub mod layout;
pub mod student;
pub mod teacher;

// Re-export commonly used functions from layout
pub use layout::{page, page_with_user};
