//! Configuration management

use crate::clock;
use crate::reminders::{default_reminders, Reminder};
use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use std::time::Duration;

pub const DEFAULT_TIMEZONE: &str = "US/Pacific";

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket Mode app-level token (`xapp-...`)
    pub slack_app_token: String,

    /// Bot user token (`xoxb-...`)
    pub slack_bot_token: String,

    /// Name people mention the bot by
    pub slack_username: String,

    /// Main flares channel ID
    pub main_channel: String,

    pub slack_api_base: String,

    /// Service-account JSON, inline or a file path
    pub google_service_account: String,

    /// Domain documents are shared with
    pub google_domain: String,

    pub tracking_template_id: String,
    pub transcript_template_id: String,

    pub resources_url: Option<String>,
    pub status_page_url: Option<String>,

    pub timezone: Tz,

    pub first_reminder: Duration,
    pub second_reminder: Duration,

    /// Client timeout for every outbound HTTP request
    pub http_timeout: Duration,

    pub reconnect_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| optional(key).with_context(|| format!("{} is not set", key));
        let seconds = |key: &str, default: u64| -> Result<Duration> {
            match optional(key) {
                Some(raw) => raw
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a number of seconds, got `{}`", key, raw)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let slack_app_token = required("SLACK_FLAREBOT_APP_ACCESS_TOKEN")?;
        if !slack_app_token.starts_with("xapp-") {
            bail!("SLACK_FLAREBOT_APP_ACCESS_TOKEN must have the prefix \"xapp-\"");
        }

        let slack_bot_token = required("SLACK_FLAREBOT_BOT_ACCESS_TOKEN")?;
        if !slack_bot_token.starts_with("xoxb-") {
            bail!("SLACK_FLAREBOT_BOT_ACCESS_TOKEN must have the prefix \"xoxb-\"");
        }

        let timezone_name = optional("FLAREBOT_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = clock::parse_zone(&timezone_name).map_err(anyhow::Error::msg)?;

        Ok(Self {
            slack_app_token,
            slack_bot_token,
            slack_username: required("SLACK_USERNAME")?,
            main_channel: required("SLACK_CHANNEL")?,
            slack_api_base: optional("SLACK_API_BASE")
                .unwrap_or_else(|| crate::channels::slack::DEFAULT_SLACK_API_BASE.to_string()),
            google_service_account: required("GOOGLE_FLAREBOT_SERVICE_ACCOUNT_CONF")?,
            google_domain: required("GOOGLE_DOMAIN")?,
            tracking_template_id: required("GOOGLE_TEMPLATE_DOC_ID")?,
            transcript_template_id: required("GOOGLE_SLACK_HISTORY_DOC_ID")?,
            resources_url: optional("FLARE_RESOURCES_URL"),
            status_page_url: optional("STATUS_PAGE_LOGIN_URL"),
            timezone,
            first_reminder: seconds("FLAREBOT_FIRST_REMINDER_SECS", 180)?,
            second_reminder: seconds("FLAREBOT_SECOND_REMINDER_SECS", 300)?,
            http_timeout: seconds("FLAREBOT_HTTP_TIMEOUT_SECS", 30)?,
            reconnect_delay: seconds("FLAREBOT_RECONNECT_DELAY_SECS", 5)?,
        })
    }

    pub fn reminders(&self) -> Vec<Reminder> {
        default_reminders(self.first_reminder, self.second_reminder)
    }
}
