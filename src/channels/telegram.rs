//! Telegram channel adapter
//!
//! Long-polls the Bot API for updates, translates messages and callback
//! queries into `InboundEvent`s, and renders choice menus as inline
//! keyboards.

use super::adapter::{AdapterBase, AdapterStatus, ChannelAdapter, ChannelEvent};
use super::message::{ChoiceToken, Command, EventKind, InboundEvent, OutboundResponse};
use crate::config::TelegramConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const API_BASE: &str = "https://api.telegram.org";

/// Telegram channel adapter
pub struct TelegramAdapter {
    config: TelegramConfig,
    base: Arc<AdapterBase>,
    client: reqwest::Client,
    token: Arc<tokio::sync::RwLock<Option<String>>>,
}

impl TelegramAdapter {
    /// Create a new Telegram adapter
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            base: Arc::new(AdapterBase::new("telegram")),
            client: reqwest::Client::new(),
            token: Arc::new(tokio::sync::RwLock::new(None)),
        }
    }

    /// Resolve the bot token from the configured environment variable
    fn resolve_credential(credential_ref: &str) -> Result<String> {
        std::env::var(credential_ref).map_err(|_| {
            Error::Channel(format!(
                "Failed to resolve Telegram bot token from env var: {}",
                credential_ref
            ))
        })
    }

    /// Check if a user is allowed
    #[allow(dead_code)]
    fn is_user_allowed(&self, user_id: i64) -> bool {
        self.config.allowed_users.is_empty() || self.config.allowed_users.contains(&user_id)
    }

    fn api_url(token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, token, method)
    }

    /// Translate one Bot API update into an inbound event.
    /// Returns None for payloads the bot does not react to.
    fn parse_update(update: &Update) -> Option<InboundEvent> {
        if let Some(message) = &update.message {
            let from = message.from.as_ref()?;
            let text = message.text.as_deref()?;
            let kind = parse_text(text);
            return Some(
                InboundEvent::new("telegram", from.id, message.chat.id.to_string(), kind)
                    .with_sender(from.username.clone(), from.first_name.clone()),
            );
        }

        if let Some(callback) = &update.callback_query {
            let data = callback.data.as_deref()?;
            let token = match ChoiceToken::parse(data) {
                Some(token) => token,
                None => {
                    tracing::warn!("Dropping malformed callback payload: {}", data);
                    return None;
                }
            };
            let chat_id = callback
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(callback.from.id);
            return Some(
                InboundEvent::new(
                    "telegram",
                    callback.from.id,
                    chat_id.to_string(),
                    EventKind::Choice(token),
                )
                .with_sender(
                    callback.from.username.clone(),
                    callback.from.first_name.clone(),
                ),
            );
        }

        None
    }

    /// Fetch the next batch of updates
    async fn get_updates(
        client: &reqwest::Client,
        token: &str,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>> {
        let response = client
            .post(Self::api_url(token, "getUpdates"))
            .json(&serde_json::json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }))
            .timeout(Duration::from_secs(timeout_secs + 10))
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getUpdates failed: {}", e)))?;

        let result: ApiResponse<Vec<Update>> = response
            .json()
            .await
            .map_err(|e| Error::Channel(format!("Failed to parse Telegram updates: {}", e)))?;

        if !result.ok {
            return Err(Error::Channel(format!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            )));
        }

        Ok(result.result.unwrap_or_default())
    }

    /// Acknowledge a callback query so the client stops its spinner
    async fn answer_callback(client: &reqwest::Client, token: &str, callback_id: &str) {
        let outcome = client
            .post(Self::api_url(token, "answerCallbackQuery"))
            .json(&serde_json::json!({ "callback_query_id": callback_id }))
            .send()
            .await;
        if let Err(e) = outcome {
            tracing::debug!("answerCallbackQuery failed: {}", e);
        }
    }

    /// The long-poll loop; runs until the adapter leaves Running
    async fn poll_loop(
        client: reqwest::Client,
        token: String,
        config: TelegramConfig,
        base: Arc<AdapterBase>,
        event_tx: mpsc::Sender<ChannelEvent>,
    ) {
        let mut offset = 0i64;

        while base.is_running() {
            let updates =
                match Self::get_updates(&client, &token, offset, config.poll_timeout_secs).await {
                    Ok(updates) => updates,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {}", e);
                        let _ = event_tx
                            .send(ChannelEvent::Error {
                                channel: "telegram".to_string(),
                                error: e.to_string(),
                            })
                            .await;
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        continue;
                    }
                };

            for update in &updates {
                offset = offset.max(update.update_id + 1);

                if let Some(callback) = &update.callback_query {
                    Self::answer_callback(&client, &token, &callback.id).await;
                }

                let event = match Self::parse_update(update) {
                    Some(event) => event,
                    None => continue,
                };

                let allowed = config.allowed_users.is_empty()
                    || config.allowed_users.contains(&event.owner_id);
                if !allowed {
                    tracing::debug!(owner = event.owner_id, "Dropping event from disallowed user");
                    continue;
                }

                if event_tx.send(ChannelEvent::Event(event)).await.is_err() {
                    // Receiver gone; the bot is shutting down.
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, event_tx: mpsc::Sender<ChannelEvent>) -> Result<()> {
        self.base.set_status(AdapterStatus::Starting);

        let token = Self::resolve_credential(&self.config.bot_token_ref)?;
        *self.token.write().await = Some(token.clone());

        tracing::info!("Telegram adapter starting");

        let _ = event_tx
            .send(ChannelEvent::Connected {
                channel: "telegram".to_string(),
            })
            .await;

        self.base.set_status(AdapterStatus::Running);

        tokio::spawn(Self::poll_loop(
            self.client.clone(),
            token,
            self.config.clone(),
            self.base.clone(),
            event_tx,
        ));

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.base.set_status(AdapterStatus::Stopping);
        *self.token.write().await = None;
        self.base.set_status(AdapterStatus::Stopped);

        tracing::info!("Telegram adapter stopped");
        Ok(())
    }

    async fn send_response(&self, chat_id: &str, response: &OutboundResponse) -> Result<String> {
        if !self.base.is_running() {
            return Err(Error::Channel("Telegram adapter not running".to_string()));
        }

        let token = self
            .token
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::Channel("Telegram token not initialized".to_string()))?;

        let mut payload = serde_json::json!({
            "chat_id": chat_id,
            "text": response.text,
        });
        if !response.choices.is_empty() {
            payload["reply_markup"] = serde_json::json!({
                "inline_keyboard": build_keyboard(response),
            });
        }

        let api_response = self
            .client
            .post(Self::api_url(&token, "sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Failed to send Telegram message: {}", e)))?;

        let result: ApiResponse<Message> = api_response
            .json()
            .await
            .map_err(|e| Error::Channel(format!("Failed to parse Telegram response: {}", e)))?;

        if !result.ok {
            return Err(Error::Channel(format!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            )));
        }

        Ok(result
            .result
            .map(|m| m.message_id.to_string())
            .unwrap_or_default())
    }

    fn is_connected(&self) -> bool {
        self.base.is_running()
    }
}

/// Render choices as inline keyboard rows, two buttons per row
fn build_keyboard(response: &OutboundResponse) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = response
        .choices
        .chunks(2)
        .map(|row| {
            let buttons: Vec<serde_json::Value> = row
                .iter()
                .map(|choice| {
                    serde_json::json!({
                        "text": choice.label,
                        "callback_data": choice.token.encode(),
                    })
                })
                .collect();
            serde_json::Value::Array(buttons)
        })
        .collect();
    serde_json::Value::Array(rows)
}

/// Classify free text: a leading slash with a recognized name is a
/// command; everything else (unknown commands included) stays text and
/// falls through to the engine's fallback.
fn parse_text(text: &str) -> EventKind {
    if let Some(rest) = text.strip_prefix('/') {
        let name = rest
            .split_whitespace()
            .next()
            .unwrap_or("")
            .split('@')
            .next()
            .unwrap_or("");
        if let Some(command) = Command::parse(name) {
            return EventKind::Command(command);
        }
    }
    EventKind::Text(text.to_string())
}

// --- Bot API payloads ---

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    #[serde(default)]
    from: Option<User>,
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    data: Option<String>,
}
