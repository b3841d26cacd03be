//! Bot runtime
//!
//! Wires channel adapters to the conversation engine: owns the event
//! channel, starts supervised adapters, and dispatches one task per
//! inbound event so owners never wait on each other.

use crate::channels::{
    supervisor, ChannelAdapter, ChannelEvent, OutboundResponse, TelegramAdapter,
};
use crate::config::TagItConfig;
use crate::engine::ConversationEngine;
use crate::error::{Error, Result};
use crate::session::SessionStore;
use crate::storage::Storage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Bot runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    /// Not started
    Stopped,
    /// Starting up
    Starting,
    /// Running
    Running,
    /// Shutting down
    ShuttingDown,
}

/// The TagIt bot
pub struct Bot {
    config: TagItConfig,
    state: Arc<RwLock<BotState>>,
    engine: Arc<ConversationEngine>,
    sessions: Arc<SessionStore>,
    channels: Arc<RwLock<HashMap<String, Arc<dyn ChannelAdapter>>>>,
    event_tx: mpsc::Sender<ChannelEvent>,
    event_rx: Arc<RwLock<Option<mpsc::Receiver<ChannelEvent>>>>,
    supervisors: Arc<RwLock<Vec<tokio::task::JoinHandle<()>>>>,
}

impl Bot {
    /// Create a bot: opens storage and builds the engine
    pub async fn new(config: TagItConfig) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(1000);

        let storage = Arc::new(Storage::connect(&config.storage.db_path).await?);
        let sessions = Arc::new(SessionStore::new());
        let engine = Arc::new(ConversationEngine::new(storage, sessions.clone()));

        Ok(Self {
            config,
            state: Arc::new(RwLock::new(BotState::Stopped)),
            engine,
            sessions,
            channels: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            event_rx: Arc::new(RwLock::new(Some(event_rx))),
            supervisors: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Get current state
    pub async fn state(&self) -> BotState {
        *self.state.read().await
    }

    /// Start the bot
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != BotState::Stopped {
            return Err(Error::Bot("Bot already running".to_string()));
        }
        *state = BotState::Starting;
        drop(state);

        tracing::info!("Starting TagIt bot");

        self.init_channels().await;
        self.start_event_processor().await;

        *self.state.write().await = BotState::Running;

        tracing::info!("TagIt bot started");
        Ok(())
    }

    /// Stop the bot
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != BotState::Running {
            return Ok(());
        }
        *state = BotState::ShuttingDown;
        drop(state);

        tracing::info!("Stopping TagIt bot");

        // Stop supervision first so a deliberate stop is not mistaken
        // for a crash and restarted.
        for handle in self.supervisors.write().await.drain(..) {
            handle.abort();
        }

        let channels: Vec<Arc<dyn ChannelAdapter>> = {
            let channels = self.channels.read().await;
            channels.values().cloned().collect()
        };
        for channel in channels {
            if let Err(e) = channel.stop().await {
                tracing::warn!("Failed to stop channel {}: {}", channel.name(), e);
            }
        }

        *self.state.write().await = BotState::Stopped;

        tracing::info!("TagIt bot stopped");
        Ok(())
    }

    /// Register and supervise the configured channel adapters
    async fn init_channels(&self) {
        let mut channels = self.channels.write().await;

        if let Some(telegram_config) = &self.config.channels.telegram {
            let adapter: Arc<dyn ChannelAdapter> =
                Arc::new(TelegramAdapter::new(telegram_config.clone()));
            let handle = supervisor::spawn_supervised(adapter.clone(), self.event_tx.clone());
            self.supervisors.write().await.push(handle);
            channels.insert("telegram".to_string(), adapter);
        }

        if channels.is_empty() {
            tracing::warn!("No channels configured; the bot will receive no events");
        }
    }

    /// Start the event processor loop
    async fn start_event_processor(&self) {
        let event_rx = self.event_rx.write().await.take();
        if let Some(mut rx) = event_rx {
            let engine = self.engine.clone();
            let channels = self.channels.clone();

            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    match event {
                        ChannelEvent::Event(inbound) => {
                            // One task per event: a slow storage call for
                            // one owner must not stall the others.
                            let engine = engine.clone();
                            let channels = channels.clone();
                            tokio::spawn(async move {
                                Self::dispatch(inbound, &engine, &channels).await;
                            });
                        }
                        ChannelEvent::Connected { channel } => {
                            tracing::info!("Channel {} connected", channel);
                        }
                        ChannelEvent::Disconnected { channel, reason } => {
                            tracing::warn!("Channel {} disconnected: {}", channel, reason);
                        }
                        ChannelEvent::Error { channel, error } => {
                            tracing::error!("Channel {} error: {}", channel, error);
                        }
                    }
                }
            });
        }
    }

    /// Run one inbound event through the engine and send the reply
    async fn dispatch(
        event: crate::channels::InboundEvent,
        engine: &Arc<ConversationEngine>,
        channels: &Arc<RwLock<HashMap<String, Arc<dyn ChannelAdapter>>>>,
    ) {
        let channel_name = event.channel.clone();
        let chat_id = event.chat_id.clone();
        let owner = event.owner_id;

        let response = match engine.handle_event(event).await {
            Ok(response) => response,
            Err(e) => {
                // The failed step did not advance the session; tell the
                // user and let them retry.
                tracing::error!(owner, "Engine error: {}", e);
                OutboundResponse::text("Something went wrong. Please try again.")
            }
        };

        let channels = channels.read().await;
        if let Some(channel) = channels.get(&channel_name) {
            if let Err(e) = channel.send_response(&chat_id, &response).await {
                tracing::error!(owner, "Failed to send response: {}", e);
            }
        } else {
            tracing::warn!("No adapter registered for channel {}", channel_name);
        }
    }

    /// Get the conversation engine
    pub fn engine(&self) -> &Arc<ConversationEngine> {
        &self.engine
    }

    /// Get the session store
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Get configuration
    pub fn config(&self) -> &TagItConfig {
        &self.config
    }

    /// Get the event sender for injecting events (tests, webhooks)
    pub fn event_sender(&self) -> &mpsc::Sender<ChannelEvent> {
        &self.event_tx
    }

    /// Get active channel names
    pub async fn active_channel_names(&self) -> Vec<String> {
        self.channels.read().await.keys().cloned().collect()
    }
}
