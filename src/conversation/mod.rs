//! The complaint dialogue: state machine, texts and per-user sessions.

pub mod prompts;
pub mod sessions;
pub mod state;

pub use sessions::SessionStore;
pub use state::{CompleteDraft, Draft, Input, Reply, Session, SessionState};
