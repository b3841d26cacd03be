//! Conversation engine
//!
//! Interprets inbound events against the owner's session state, issues
//! storage reads/writes, and computes the next state plus the outbound
//! prompt or menu. The owner's session mutex is held for the whole turn,
//! so two messages from the same user can never interleave a flow.
//!
//! Session state is only mutated after the storage call it depends on
//! has succeeded; a failed write leaves the session on the step that
//! failed instead of advancing past it.

use crate::channels::{Choice, ChoiceToken, Command, EventKind, InboundEvent, OutboundResponse};
use crate::error::{Error, Result};
use crate::session::{ConversationState, Session, SessionStore};
use crate::storage::Storage;
use std::sync::Arc;

/// Longest label rendered on a link button
const LINK_LABEL_MAX: usize = 32;

/// The conversation state machine
pub struct ConversationEngine {
    storage: Arc<Storage>,
    sessions: Arc<SessionStore>,
}

impl ConversationEngine {
    /// Create an engine over the given storage and session store
    pub fn new(storage: Arc<Storage>, sessions: Arc<SessionStore>) -> Self {
        Self { storage, sessions }
    }

    /// Handle one inbound event and produce the reply
    pub async fn handle_event(&self, event: InboundEvent) -> Result<OutboundResponse> {
        let cell = self.sessions.get(event.owner_id).await;
        let mut session = cell.lock().await;

        match &event.kind {
            EventKind::Command(command) => {
                self.handle_command(&mut session, &event, *command).await
            }
            EventKind::Text(text) => self.handle_text(&mut session, event.owner_id, text).await,
            EventKind::Choice(token) => {
                self.handle_choice(&mut session, event.owner_id, token).await
            }
        }
    }

    async fn handle_command(
        &self,
        session: &mut Session,
        event: &InboundEvent,
        command: Command,
    ) -> Result<OutboundResponse> {
        let owner = event.owner_id;
        match command {
            Command::Start => {
                self.storage
                    .upsert_user(owner, event.username.as_deref(), event.first_name.as_deref())
                    .await?;
                let tags = self.storage.list_tag_names(owner).await?;
                session.reset();

                let name = event.first_name.as_deref().unwrap_or("there");
                let text = if tags.is_empty() {
                    format!("Hi {}, welcome to TagIt! Add some tags to get started.", name)
                } else {
                    let link_count = self.storage.count_links(owner).await?;
                    format!(
                        "Hi {}, welcome back! Your tags: {} ({} links saved).",
                        name,
                        tags.join(", "),
                        link_count
                    )
                };
                Ok(OutboundResponse::with_choices(
                    text,
                    vec![Choice::new("Add tags", ChoiceToken::BeginAddTags)],
                ))
            }
            Command::Help => Ok(OutboundResponse::text(HELP_TEXT)),
            Command::Add => {
                session.pending_url = None;
                session.state = ConversationState::WaitingForLink;
                Ok(OutboundResponse::text("Send the link you want to save."))
            }
            Command::Show => {
                let tags = self.storage.list_tag_names(owner).await?;
                if tags.is_empty() {
                    return Ok(OutboundResponse::text("You don't have any tags yet."));
                }
                Ok(OutboundResponse::with_choices(
                    "Choose a tag to view its links:",
                    tags.into_iter()
                        .map(|tag| Choice::new(tag.clone(), ChoiceToken::ShowLinks(tag)))
                        .collect(),
                ))
            }
            Command::Update => Ok(OutboundResponse::with_choices(
                "Choose what you want to update:",
                vec![
                    Choice::new("Rename tag", ChoiceToken::RenameTag),
                    Choice::new("Delete tag", ChoiceToken::DeleteTag),
                    Choice::new("Delete link", ChoiceToken::DeleteLink),
                ],
            )),
            Command::Done => {
                let tags = self.storage.list_tag_names(owner).await?;
                session.reset();
                if tags.is_empty() {
                    Ok(OutboundResponse::text("You haven't added any tags yet."))
                } else {
                    Ok(OutboundResponse::text(format!(
                        "Done! Your tags: {}.",
                        tags.join(", ")
                    )))
                }
            }
        }
    }

    async fn handle_text(
        &self,
        session: &mut Session,
        owner: i64,
        text: &str,
    ) -> Result<OutboundResponse> {
        let trimmed = text.trim();

        match session.state {
            ConversationState::AddingTag => {
                if trimmed.is_empty() {
                    return Ok(OutboundResponse::text(
                        "A tag name cannot be empty. Type a name, or send /done to finish.",
                    ));
                }
                let inserted = self.storage.upsert_tag(owner, trimmed).await?;
                let verdict = if inserted {
                    format!("Tag '{}' added.", trimmed)
                } else {
                    format!("Tag '{}' already exists.", trimmed)
                };
                Ok(OutboundResponse::text(format!(
                    "{} Type another tag or send /done when finished.",
                    verdict
                )))
            }
            ConversationState::WaitingForLink => {
                if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
                    let tags = self.storage.list_tag_names(owner).await?;
                    session.pending_url = Some(trimmed.to_string());
                    session.state = ConversationState::WaitingForTag;

                    let mut choices: Vec<Choice> = tags
                        .into_iter()
                        .map(|tag| Choice::new(tag.clone(), ChoiceToken::AssignTag(tag)))
                        .collect();
                    choices.push(Choice::new("Add new tag", ChoiceToken::NewTag));
                    Ok(OutboundResponse::with_choices(
                        "Link received. Now choose a tag for it:",
                        choices,
                    ))
                } else {
                    session.reset();
                    Ok(OutboundResponse::text(
                        "That doesn't look like a link. Send /add to try again.",
                    ))
                }
            }
            ConversationState::WaitingForNewTag => {
                if trimmed.is_empty() {
                    return Ok(OutboundResponse::text("A tag name cannot be empty. Type a name:"));
                }
                let url = match session.pending_url.clone() {
                    Some(url) => url,
                    None => {
                        session.reset();
                        return Ok(OutboundResponse::text(
                            "There is no pending link. Send /add to save one.",
                        ));
                    }
                };
                let inserted = self.storage.upsert_tag(owner, trimmed).await?;
                self.storage.insert_link(owner, &url, trimmed).await?;
                session.pending_url = None;
                session.state = ConversationState::Idle;

                let verdict = if inserted {
                    format!("Tag '{}' added.", trimmed)
                } else {
                    format!("Tag '{}' already exists.", trimmed)
                };
                Ok(OutboundResponse::text(format!(
                    "{} Link saved under '{}'. Send /add to save another.",
                    verdict, trimmed
                )))
            }
            ConversationState::AwaitingNewTagName => {
                if trimmed.is_empty() {
                    return Ok(OutboundResponse::text(
                        "The new name cannot be empty. Type a name:",
                    ));
                }
                let old = match session.pending_old_tag.clone() {
                    Some(old) => old,
                    None => {
                        session.reset();
                        return Ok(OutboundResponse::text(
                            "There is no rename in progress. Send /update to start one.",
                        ));
                    }
                };
                match self.storage.rename_tag(owner, &old, trimmed).await {
                    Ok(moved) => {
                        session.pending_old_tag = None;
                        session.state = ConversationState::Idle;
                        Ok(OutboundResponse::text(format!(
                            "Tag '{}' renamed to '{}' ({} links updated).",
                            old, trimmed, moved
                        )))
                    }
                    Err(Error::InvalidInput(_)) => Ok(OutboundResponse::text(format!(
                        "A tag named '{}' already exists. Type a different name:",
                        trimmed
                    ))),
                    Err(Error::NotFound(_)) => {
                        session.reset();
                        Ok(OutboundResponse::text(format!(
                            "Tag '{}' no longer exists. Send /update to start over.",
                            old
                        )))
                    }
                    Err(e) => Err(e),
                }
            }
            ConversationState::WaitingForTag => Ok(OutboundResponse::text(
                "Pick a tag with the buttons above, or send /add to start over.",
            )),
            ConversationState::Idle => Ok(OutboundResponse::text(
                "I didn't understand that. Send /help to see what I can do.",
            )),
        }
    }

    async fn handle_choice(
        &self,
        session: &mut Session,
        owner: i64,
        token: &ChoiceToken,
    ) -> Result<OutboundResponse> {
        match token {
            ChoiceToken::BeginAddTags => {
                session.state = ConversationState::AddingTag;
                Ok(OutboundResponse::text(
                    "Type the name of the tag you want to add:",
                ))
            }
            ChoiceToken::AssignTag(tag) => {
                let url = match session.pending_url.clone() {
                    Some(url) => url,
                    None => {
                        return Ok(OutboundResponse::text(
                            "There is no pending link. Send /add to save one.",
                        ));
                    }
                };
                // A stale button can name a tag that was deleted since the
                // menu was shown; filing under it would break the tag
                // invariant.
                let tags = self.storage.list_tag_names(owner).await?;
                if !tags.iter().any(|t| t == tag) {
                    return Ok(OutboundResponse::text(format!(
                        "Tag '{}' no longer exists. Pick another tag.",
                        tag
                    )));
                }
                self.storage.insert_link(owner, &url, tag).await?;
                session.pending_url = None;
                session.state = ConversationState::Idle;
                Ok(OutboundResponse::text(format!(
                    "Link saved under '{}'. Send /add to save another.",
                    tag
                )))
            }
            ChoiceToken::NewTag => {
                if session.pending_url.is_none() {
                    return Ok(OutboundResponse::text(
                        "There is no pending link. Send /add to save one.",
                    ));
                }
                session.state = ConversationState::WaitingForNewTag;
                Ok(OutboundResponse::text("Type your new tag:"))
            }
            ChoiceToken::ShowLinks(tag) => {
                let links = self.storage.list_links(owner, tag).await?;
                if links.is_empty() {
                    return Ok(OutboundResponse::text(format!(
                        "No links found under '{}'.",
                        tag
                    )));
                }
                let listing: Vec<String> = links.into_iter().map(|link| link.url).collect();
                Ok(OutboundResponse::text(format!(
                    "Links under '{}':\n{}",
                    tag,
                    listing.join("\n")
                )))
            }
            ChoiceToken::RenameTag => {
                let tags = self.storage.list_tag_names(owner).await?;
                if tags.is_empty() {
                    return Ok(OutboundResponse::text("You have no tags to rename."));
                }
                Ok(OutboundResponse::with_choices(
                    "Select a tag to rename:",
                    tags.into_iter()
                        .map(|tag| Choice::new(tag.clone(), ChoiceToken::RenameTarget(tag)))
                        .collect(),
                ))
            }
            ChoiceToken::RenameTarget(tag) => {
                session.pending_old_tag = Some(tag.clone());
                session.state = ConversationState::AwaitingNewTagName;
                Ok(OutboundResponse::text(format!(
                    "Type the new name for tag '{}':",
                    tag
                )))
            }
            ChoiceToken::DeleteTag => {
                let tags = self.storage.list_tag_names(owner).await?;
                if tags.is_empty() {
                    return Ok(OutboundResponse::text("You have no tags to delete."));
                }
                Ok(OutboundResponse::with_choices(
                    "Select a tag to delete. Its links are removed with it:",
                    tags.into_iter()
                        .map(|tag| Choice::new(tag.clone(), ChoiceToken::DeleteTagTarget(tag)))
                        .collect(),
                ))
            }
            ChoiceToken::DeleteTagTarget(tag) => {
                let removal = self.storage.delete_tag(owner, tag).await?;
                if removal.deleted {
                    Ok(OutboundResponse::text(format!(
                        "Deleted tag '{}' and {} links.",
                        tag, removal.removed_links
                    )))
                } else {
                    Ok(OutboundResponse::text(format!(
                        "Tag '{}' no longer exists.",
                        tag
                    )))
                }
            }
            ChoiceToken::DeleteLink => {
                let tags = self.storage.list_tag_names(owner).await?;
                if tags.is_empty() {
                    return Ok(OutboundResponse::text("You don't have any tags yet."));
                }
                Ok(OutboundResponse::with_choices(
                    "Select the tag holding the link:",
                    tags.into_iter()
                        .map(|tag| Choice::new(tag.clone(), ChoiceToken::DeleteLinkTag(tag)))
                        .collect(),
                ))
            }
            ChoiceToken::DeleteLinkTag(tag) => {
                let links = self.storage.list_links(owner, tag).await?;
                if links.is_empty() {
                    return Ok(OutboundResponse::text(format!(
                        "No links found under '{}'.",
                        tag
                    )));
                }
                Ok(OutboundResponse::with_choices(
                    "Select the link to delete:",
                    links
                        .into_iter()
                        .map(|link| {
                            Choice::new(link_label(&link.url), ChoiceToken::DeleteLinkTarget(link.id))
                        })
                        .collect(),
                ))
            }
            ChoiceToken::DeleteLinkTarget(link_id) => {
                if self.storage.delete_link(owner, *link_id).await? {
                    Ok(OutboundResponse::text("Link deleted."))
                } else {
                    Ok(OutboundResponse::text("That link is already gone."))
                }
            }
        }
    }
}

const HELP_TEXT: &str = "TagIt keeps your links organized under tags.\n\
    /start - register and see your tags\n\
    /add - save a link under a tag\n\
    /show - browse links by tag\n\
    /update - rename or delete tags and links\n\
    /done - finish adding tags\n\
    /help - show this guide";

/// Shorten a URL for use as a button label
fn link_label(url: &str) -> String {
    if url.chars().count() <= LINK_LABEL_MAX {
        return url.to_string();
    }
    let truncated: String = url.chars().take(LINK_LABEL_MAX - 1).collect();
    format!("{}…", truncated)
}
