//! Client for the Always AI Chat API.
//!
//! The centerpiece is [`state::ChatSession`], which streams assistant replies
//! from `POST /message_chat` into an ordered message log. [`api::ApiClient`]
//! is the HTTP transport; it also covers login and the financial endpoints.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod locale;
pub mod state;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ChatError, Result};
