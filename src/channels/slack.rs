//! Slack Channel Implementation
//!
//! Slack Web API client implementing [`MessagingService`].
//!
//! # Configuration
//!
//! Environment variables:
//! - `SLACK_FLAREBOT_BOT_ACCESS_TOKEN`: bot token (`xoxb-...`)
//! - `SLACK_API_BASE`: API base URL (default: `https://slack.com/api`)

use super::traits::*;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

/// Slack Web API configuration
#[derive(Debug, Clone)]
pub struct SlackConfig {
    /// Bot token used for every Web API call
    pub bot_token: String,
    /// API base URL
    pub api_base: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl SlackConfig {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot_token: bot_token.trim().to_string(),
            api_base: DEFAULT_SLACK_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Who the bot token belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
    pub name: Option<String>,
}

/// Slack Web API channel
#[derive(Clone)]
pub struct SlackChannel {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new(config: SlackConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChannelError::Internal(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Resolve the bot's own user ID
    pub async fn auth_test(&self) -> Result<BotIdentity, ChannelError> {
        let response: AuthTestResponse = self
            .post("auth.test", &json!({}))
            .await
            .map_err(|e| match e {
                ChannelError::Api { error, .. } => ChannelError::AuthenticationFailed(error),
                other => other,
            })?;

        if response.user_id.trim().is_empty() {
            return Err(ChannelError::AuthenticationFailed(
                "auth.test did not return user_id".to_string(),
            ));
        }

        Ok(BotIdentity {
            user_id: response.user_id,
            name: response.user,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.config.api_base, method)
    }

    /// POST a JSON body to a write method
    async fn post<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, ChannelError> {
        debug!("Slack POST {}", method);
        let response = self
            .client
            .post(self.endpoint(method))
            .bearer_auth(&self.config.bot_token)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        Self::read_envelope(method, response).await
    }

    /// GET a read method with query parameters
    async fn get<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ChannelError> {
        debug!("Slack GET {}", method);
        let response = self
            .client
            .get(self.endpoint(method))
            .bearer_auth(&self.config.bot_token)
            .query(query)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        Self::read_envelope(method, response).await
    }

    async fn read_envelope<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, ChannelError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChannelError::api(
                method,
                format!("HTTP {}: {}", status, error_text),
            ));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ChannelError::Internal(e.to_string()))?;

        if !value.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(ChannelError::api(method, error));
        }

        serde_json::from_value(value).map_err(|e| ChannelError::Internal(e.to_string()))
    }
}

#[async_trait]
impl MessagingService for SlackChannel {
    async fn post_message(&self, channel: &str, text: &str) -> Result<PostedMessage, ChannelError> {
        let payload = json!({
            "channel": channel,
            "text": text,
            "link_names": true,
            "unfurl_links": false,
        });

        let response: ChatPostResponse = self
            .post("chat.postMessage", &payload)
            .await
            .map_err(|e| match e {
                ChannelError::Api { error, .. } => ChannelError::SendFailed(error),
                other => other,
            })?;

        Ok(PostedMessage {
            channel: response.channel.unwrap_or_else(|| channel.to_string()),
            ts: response.ts,
        })
    }

    async fn create_channel(&self, name: &str) -> Result<ChannelInfo, ChannelError> {
        let response: ConversationResponse = self
            .post(
                "conversations.create",
                &json!({ "name": name, "is_private": false }),
            )
            .await?;
        Ok(response.channel.into())
    }

    async fn set_topic(&self, channel: &str, topic: &str) -> Result<(), ChannelError> {
        let _: Value = self
            .post(
                "conversations.setTopic",
                &json!({ "channel": channel, "topic": topic }),
            )
            .await?;
        Ok(())
    }

    async fn add_pin(&self, channel: &str, message_ts: &str) -> Result<(), ChannelError> {
        let _: Value = self
            .post(
                "pins.add",
                &json!({ "channel": channel, "timestamp": message_ts }),
            )
            .await?;
        Ok(())
    }

    async fn list_pins(&self, channel: &str) -> Result<Vec<PinnedItem>, ChannelError> {
        let response: PinsListResponse = self.get("pins.list", &[("channel", channel)]).await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let message = item.message?;
                Some(PinnedItem {
                    text: message.text,
                    ts: message.ts,
                    created_by: item.created_by,
                })
            })
            .collect())
    }

    async fn channel_info(&self, channel: &str) -> Result<ChannelInfo, ChannelError> {
        let response: ConversationResponse = self
            .get("conversations.info", &[("channel", channel)])
            .await
            .map_err(|e| match e {
                ChannelError::Api { error, .. } if error == "channel_not_found" => {
                    ChannelError::NotFound(channel.to_string())
                }
                other => other,
            })?;
        Ok(response.channel.into())
    }

    async fn user_info(&self, user: &str) -> Result<UserProfile, ChannelError> {
        let response: UsersInfoResponse = self
            .get("users.info", &[("user", user)])
            .await
            .map_err(|e| match e {
                ChannelError::Api { error, .. } if error == "user_not_found" => {
                    ChannelError::NotFound(user.to_string())
                }
                other => other,
            })?;

        let SlackUser {
            id,
            name,
            real_name,
            profile,
        } = response.user;
        let profile = profile.unwrap_or_default();

        Ok(UserProfile {
            id,
            name,
            real_name: real_name.or(profile.real_name),
            email: profile.email,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatPostResponse {
    #[serde(default)]
    channel: Option<String>,
    ts: String,
}

#[derive(Debug, Deserialize)]
struct ConversationResponse {
    channel: SlackConversation,
}

#[derive(Debug, Deserialize)]
struct SlackConversation {
    id: String,
    #[serde(default)]
    name: String,
}

impl From<SlackConversation> for ChannelInfo {
    fn from(c: SlackConversation) -> Self {
        ChannelInfo {
            id: c.id,
            name: c.name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PinsListResponse {
    #[serde(default)]
    items: Vec<SlackPinItem>,
}

#[derive(Debug, Deserialize)]
struct SlackPinItem {
    #[serde(default)]
    created_by: Option<String>,
    #[serde(default)]
    message: Option<SlackPinMessage>,
}

#[derive(Debug, Deserialize)]
struct SlackPinMessage {
    #[serde(default)]
    text: String,
    #[serde(default)]
    ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsersInfoResponse {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<SlackUserProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackUserProfile {
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}
