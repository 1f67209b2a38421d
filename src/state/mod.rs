pub mod event;
mod session;

pub use event::SessionEvent;
pub use session::{ChatSession, SendOutcome, SessionSnapshot};
