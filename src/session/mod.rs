//! Per-owner conversation sessions

mod store;

pub use store::{ConversationState, Session, SessionStore};
