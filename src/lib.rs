//! TagIt - chat bot that organizes links under user-defined tags
//!
//! Users file URLs under their own tags through a multi-step chat
//! conversation: add tags, send a link, pick (or create) a tag for it,
//! browse, rename and delete.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      Bot runtime                      │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │               Channel adapters                 │  │
//! │  │  ┌────────────┐                                │  │
//! │  │  │  Telegram  │  (long polling, inline menus)  │  │
//! │  │  └─────┬──────┘                                │  │
//! │  └────────┼───────────────────────────────────────┘  │
//! │           │ ChannelEvent (mpsc)                       │
//! │  ┌────────▼───────────────────────────────────────┐  │
//! │  │             Conversation engine                │  │
//! │  │  - per-owner session state machine             │  │
//! │  │  - validates input, computes prompts/menus     │  │
//! │  └────────┬──────────────────────┬────────────────┘  │
//! │  ┌────────▼────────┐    ┌────────▼────────┐          │
//! │  │  Session store  │    │     Storage     │          │
//! │  │  (in-memory,    │    │  (SQLite: users,│          │
//! │  │   lock per      │    │   tags, links)  │          │
//! │  │   owner)        │    │                 │          │
//! │  └─────────────────┘    └─────────────────┘          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`bot`]: runtime wiring adapters to the engine
//! - [`channels`]: channel adapters and the event/response types
//! - [`engine`]: the conversation state machine
//! - [`session`]: per-owner transient session state
//! - [`storage`]: SQLite-backed users/tags/links store
//! - [`config`]: configuration management

pub mod bot;
pub mod channels;
pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod storage;

pub use bot::{Bot, BotState};
pub use config::TagItConfig;
pub use error::{Error, Result};
