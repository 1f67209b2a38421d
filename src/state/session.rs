mod core;
mod history;
mod state;
mod streaming;

#[cfg(test)]
mod tests;

pub use state::{ChatSession, SendOutcome, SessionSnapshot};
