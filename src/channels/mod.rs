//! Channel message adapters
//!
//! Provides a unified interface for receiving chat events and sending
//! prompts/menus back to the messaging platform.

mod adapter;
mod message;
pub mod supervisor;
mod telegram;

pub use adapter::{AdapterBase, AdapterStatus, ChannelAdapter, ChannelEvent};
pub use message::{Choice, ChoiceToken, Command, EventKind, InboundEvent, OutboundResponse};
pub use telegram::TelegramAdapter;
