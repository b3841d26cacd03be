//! Inbound event and outbound response abstractions
//!
//! Adapters translate platform payloads into `InboundEvent`s and render
//! `OutboundResponse`s back out. Button payloads carry a serde-encoded
//! `ChoiceToken`; the adapter parses the echoed payload so the engine
//! dispatches on a closed enum, never on string prefixes.

use serde::{Deserialize, Serialize};

/// Commands recognized by name (case-sensitive); the leading slash is an
/// adapter concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Add,
    Show,
    Update,
    Done,
}

impl Command {
    /// Parse a bare command name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "add" => Some(Self::Add),
            "show" => Some(Self::Show),
            "update" => Some(Self::Update),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// Opaque button payload, defined by the engine and echoed back verbatim
/// by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "k", content = "v", rename_all = "snake_case")]
pub enum ChoiceToken {
    /// Enter the add-tags flow
    BeginAddTags,
    /// File the pending URL under an existing tag
    AssignTag(String),
    /// File the pending URL under a tag to be named next
    NewTag,
    /// Show the links filed under a tag
    ShowLinks(String),
    /// Open the rename-tag picker
    RenameTag,
    /// Rename this tag; new name arrives as the next text input
    RenameTarget(String),
    /// Open the delete-tag picker
    DeleteTag,
    /// Delete this tag and everything filed under it
    DeleteTagTarget(String),
    /// Open the delete-link picker
    DeleteLink,
    /// List this tag's links for deletion
    DeleteLinkTag(String),
    /// Delete this link row
    DeleteLinkTarget(i64),
}

impl ChoiceToken {
    /// Encode into a button payload string
    pub fn encode(&self) -> String {
        // Infallible for this enum shape
        serde_json::to_string(self).expect("choice token serializes")
    }

    /// Parse an echoed payload; returns None for anything malformed
    pub fn parse(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }
}

/// What kind of input an inbound event carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A recognized command
    Command(Command),
    /// Free text
    Text(String),
    /// A button press echoing a choice token
    Choice(ChoiceToken),
}

/// An inbound event from a channel
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Channel name (e.g. "telegram")
    pub channel: String,
    /// Stable platform identity of the sender
    pub owner_id: i64,
    /// Channel-specific reply address
    pub chat_id: String,
    /// The input itself
    pub kind: EventKind,
    /// Sender's platform username, if known
    pub username: Option<String>,
    /// Sender's display name, if known
    pub first_name: Option<String>,
    /// Unix timestamp (seconds)
    pub timestamp: i64,
}

impl InboundEvent {
    /// Create a new inbound event
    pub fn new(channel: impl Into<String>, owner_id: i64, chat_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            channel: channel.into(),
            owner_id,
            chat_id: chat_id.into(),
            kind,
            username: None,
            first_name: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Attach sender identity details
    pub fn with_sender(mut self, username: Option<String>, first_name: Option<String>) -> Self {
        self.username = username;
        self.first_name = first_name;
        self
    }
}

/// A labeled button offered to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Button label
    pub label: String,
    /// Token echoed back when pressed
    pub token: ChoiceToken,
}

impl Choice {
    /// Create a labeled choice
    pub fn new(label: impl Into<String>, token: ChoiceToken) -> Self {
        Self {
            label: label.into(),
            token,
        }
    }
}

/// The engine's reply to one inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundResponse {
    /// Message text
    pub text: String,
    /// Buttons to offer, if any
    pub choices: Vec<Choice>,
}

impl OutboundResponse {
    /// A plain text reply
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    /// A reply with buttons
    pub fn with_choices(text: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self {
            text: text.into(),
            choices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("start"), Some(Command::Start));
        assert_eq!(Command::parse("done"), Some(Command::Done));
        assert_eq!(Command::parse("Start"), None); // case-sensitive
        assert_eq!(Command::parse("unknown"), None);
    }

    #[test]
    fn test_choice_token_roundtrip() {
        let tokens = [
            ChoiceToken::BeginAddTags,
            ChoiceToken::AssignTag("news".to_string()),
            ChoiceToken::NewTag,
            ChoiceToken::ShowLinks("tools".to_string()),
            ChoiceToken::RenameTarget("a b".to_string()),
            ChoiceToken::DeleteLinkTarget(42),
        ];
        for token in tokens {
            let encoded = token.encode();
            assert_eq!(ChoiceToken::parse(&encoded), Some(token));
        }
    }

    #[test]
    fn test_malformed_token_is_dropped() {
        assert_eq!(ChoiceToken::parse("rename_tag_select_news"), None);
        assert_eq!(ChoiceToken::parse(""), None);
        assert_eq!(ChoiceToken::parse("{\"k\":\"nope\"}"), None);
    }

    #[test]
    fn test_inbound_event_builder() {
        let event = InboundEvent::new("telegram", 7, "7", EventKind::Text("hi".to_string()))
            .with_sender(Some("alice".to_string()), Some("Alice".to_string()));
        assert_eq!(event.owner_id, 7);
        assert_eq!(event.username.as_deref(), Some("alice"));
    }
}
