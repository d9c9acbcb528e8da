//! Messaging Trait Definitions
//!
//! The narrow contract the incident core consumes from the chat transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error types for messaging operations
///
/// `Clone` so a failed channel probe can be handed to every caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Slack API error on {method}: {error}")]
    Api { method: String, error: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChannelError {
    pub fn api(method: &str, error: impl Into<String>) -> Self {
        Self::Api {
            method: method.to_string(),
            error: error.into(),
        }
    }
}

/// A chat message as the dispatch loop sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender user ID
    pub author_id: String,

    /// Transport ordering token (Slack `ts`, e.g. `1700000000.000200`)
    pub timestamp: String,

    /// Raw message text
    pub text: String,

    /// Channel the message was posted in
    pub channel_id: String,
}

impl InboundMessage {
    pub fn new(author_id: &str, timestamp: &str, text: &str, channel_id: &str) -> Self {
        Self {
            author_id: author_id.to_string(),
            timestamp: timestamp.to_string(),
            text: text.to_string(),
            channel_id: channel_id.to_string(),
        }
    }
}

/// Reference to a message the bot posted, used for pinning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

/// Channel metadata
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

/// A pinned item on a channel
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PinnedItem {
    pub text: String,
    pub ts: Option<String>,
    pub created_by: Option<String>,
}

/// Resolved user profile
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub id: String,
    /// Handle used in `@name` mentions
    pub name: String,
    pub real_name: Option<String>,
    pub email: Option<String>,
}

/// Messaging service the incident core talks to
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Post a plain text message to a channel
    async fn post_message(&self, channel: &str, text: &str) -> Result<PostedMessage, ChannelError>;

    /// Create a public channel; fails if the name is taken
    async fn create_channel(&self, name: &str) -> Result<ChannelInfo, ChannelError>;

    /// Set a channel's topic
    async fn set_topic(&self, channel: &str, topic: &str) -> Result<(), ChannelError>;

    /// Pin a previously posted message
    async fn add_pin(&self, channel: &str, message_ts: &str) -> Result<(), ChannelError>;

    /// List pinned items on a channel
    async fn list_pins(&self, channel: &str) -> Result<Vec<PinnedItem>, ChannelError>;

    /// Fetch channel metadata
    async fn channel_info(&self, channel: &str) -> Result<ChannelInfo, ChannelError>;

    /// Resolve a user ID to a profile
    async fn user_info(&self, user: &str) -> Result<UserProfile, ChannelError>;

    /// Display name for a user, falling back to the raw ID
    async fn display_name(&self, user: &str) -> String {
        match self.user_info(user).await {
            Ok(profile) if !profile.name.is_empty() => profile.name,
            Ok(_) => user.to_string(),
            Err(e) => {
                tracing::debug!("Could not resolve user {}: {}", user, e);
                user.to_string()
            }
        }
    }
}
