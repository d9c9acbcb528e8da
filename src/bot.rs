//! Command Handlers
//!
//! One handler per [`Command`] variant. Handlers reply through the messaging
//! service and absorb every failure; nothing here stops the dispatch loop.

use crate::channels::{InboundMessage, MessagingService};
use crate::commands::{help_all_listing, help_listing, not_understood, HelpScope};
use crate::documents::{DocumentService, CSV_MIME, HTML_MIME};
use crate::incident::{FireRequest, IncidentOrchestrator, IncidentReport, CHANNEL_PREFIX};
use crate::router::Command;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const LEAD_PENDING: &str = "working on assigning incident lead....";
pub const MITIGATED_NOTICE: &str = "Flare has been mitigated";
pub const NOT_A_FLARE_NOTICE: &str = "turns out this is not a Flare";

/// What a handler did with a command
#[derive(Debug)]
pub enum Handled {
    Replied,
    /// Fire command outside the main channel
    Ignored,
    Fired(IncidentReport),
}

/// Command handlers bound to one bot identity
pub struct FlareBot {
    messaging: Arc<dyn MessagingService>,
    documents: Arc<dyn DocumentService>,
    orchestrator: IncidentOrchestrator,
    main_channel: String,
}

impl FlareBot {
    pub fn new(
        messaging: Arc<dyn MessagingService>,
        documents: Arc<dyn DocumentService>,
        orchestrator: IncidentOrchestrator,
        main_channel: &str,
    ) -> Self {
        Self {
            messaging,
            documents,
            orchestrator,
            main_channel: main_channel.to_string(),
        }
    }

    fn bot_name(&self) -> &str {
        &self.orchestrator.settings().bot_name
    }

    /// Run the handler for `command`
    pub async fn handle(&self, message: &InboundMessage, command: Command) -> Handled {
        debug!("Handling {} from {}", command.kind().as_str(), message.author_id);

        match command {
            Command::FireFlare { priority, topic } => {
                if message.channel_id != self.main_channel {
                    debug!("Ignoring fire command outside the main channel");
                    return Handled::Ignored;
                }
                let request = FireRequest {
                    origin_channel: message.channel_id.clone(),
                    author_id: message.author_id.clone(),
                    text: message.text.clone(),
                    priority,
                    topic,
                };
                return Handled::Fired(self.orchestrator.fire(&request).await);
            }
            Command::TakeLead => self.take_lead(message).await,
            Command::Mitigated => self.send(&self.main_channel, MITIGATED_NOTICE).await,
            Command::NotAFlare => self.send(&self.main_channel, NOT_A_FLARE_NOTICE).await,
            Command::Help => {
                let scope = self.help_scope(&message.channel_id).await;
                self.send_lines(&message.channel_id, help_listing(self.bot_name(), scope))
                    .await;
            }
            Command::HelpAll => {
                self.send_lines(&message.channel_id, help_all_listing(self.bot_name()))
                    .await;
            }
            Command::Test { note } => self.diagnose(message, note.as_deref()).await,
            Command::Fallback => {
                self.send(&message.channel_id, &not_understood(self.bot_name()))
                    .await
            }
        }

        Handled::Replied
    }

    async fn send(&self, channel: &str, text: &str) {
        if let Err(e) = self.messaging.post_message(channel, text).await {
            warn!("Failed to send message to {}: {}", channel, e);
        }
    }

    async fn send_lines(&self, channel: &str, lines: Vec<String>) {
        for line in lines {
            self.send(channel, &line).await;
        }
    }

    /// Main channel, a `flare-` room, or anywhere else
    pub async fn help_scope(&self, channel_id: &str) -> HelpScope {
        if channel_id == self.main_channel {
            return HelpScope::Main;
        }
        match self.messaging.channel_info(channel_id).await {
            Ok(channel) if channel.name.starts_with(CHANNEL_PREFIX) => HelpScope::Flare,
            Ok(_) => HelpScope::Other,
            Err(e) => {
                debug!("No channel info for {}: {}", channel_id, e);
                HelpScope::Other
            }
        }
    }

    async fn take_lead(&self, message: &InboundMessage) {
        let name = self.messaging.display_name(&message.author_id).await;
        info!("{} is taking incident lead in {}", name, message.channel_id);

        self.send(&message.channel_id, LEAD_PENDING).await;
        self.send(
            &message.channel_id,
            &format!(
                "Oh Captain My Captain! @{} is now incident lead. Please confirm all actions with them.",
                name
            ),
        )
        .await;
    }

    /// Check that the bot can see the author, the channel and both templates
    async fn diagnose(&self, message: &InboundMessage, note: Option<&str>) {
        let channel = message.channel_id.as_str();

        match self.messaging.user_info(&message.author_id).await {
            Ok(profile) => {
                let email = profile.email.unwrap_or_default();
                self.send(
                    channel,
                    &format!("I see you're using the test command. Excellent: {}", email),
                )
                .await;
            }
            Err(e) => {
                warn!("Test command author lookup failed: {}", e);
                self.send(channel, "Unable to determine author of Slack message")
                    .await;
            }
        }

        if let Some(note) = note {
            self.send(channel, &format!("you told me: {}", note)).await;
        }

        match self.messaging.channel_info(channel).await {
            Ok(info) => {
                self.send(channel, &format!("this channel is {}", info.name))
                    .await
            }
            Err(_) => self.send(channel, "Unable to determine channel info").await,
        }

        let settings = self.orchestrator.settings();
        let templates = [
            ("Flare Template", settings.tracking_template_id.as_str(), HTML_MIME),
            (
                "Slack History Template",
                settings.transcript_template_id.as_str(),
                CSV_MIME,
            ),
        ];
        for (label, doc_id, mime) in templates {
            if let Err(e) = self.documents.fetch_content(doc_id, mime).await {
                warn!("Test command could not read {}: {}", doc_id, e);
                self.send(
                    channel,
                    &format!("Unable to read the Google {}. ID: {}", label, doc_id),
                )
                .await;
                return;
            }
        }
    }
}
