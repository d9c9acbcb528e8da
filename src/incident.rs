//! Incident Bootstrap
//!
//! Stands up a flare: tracking document, transcript document, a fresh
//! `flare-<token>` channel with its pins and help text, and an announcement back
//! in the room the flare was fired from.
//!
//! The run is a forward-only saga. Every step's failure is logged and recorded in
//! the [`IncidentReport`]; only the steps that need the missing artifact are
//! skipped. Nothing created earlier is ever cleaned up.

use crate::cache::TranscriptCache;
use crate::channels::{ChannelInfo, MessagingService, PostedMessage};
use crate::clock;
use crate::commands::{help_listing, HelpScope};
use crate::documents::{Document, DocumentService, HTML_MIME};
use crate::reminders::{Reminder, ReminderScheduler};
use crate::router::Priority;
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Every incident channel name starts with this
pub const CHANNEL_PREFIX: &str = "flare-";

/// Pin label carrying the transcript document ID
pub const TRANSCRIPT_PIN_LABEL: &str = "Slack log: ";

/// Pin label carrying the tracking document link
pub const TRACKING_DOC_LABEL: &str = "Flare doc: ";

pub const ROLLBACK_SCALE_RESTART: &str = "Remember: Rollback, Scale or Restart!";

pub const ACK_PLAIN: &str = "OK, let me get my flaregun";
pub const ACK_RETROACTIVE: &str =
    "OK, let me quietly set up the Flare documents. Nobody freak out, this is retroactive.";
pub const ACK_PREEMPTIVE: &str =
    "OK, let me quietly set up the Flare documents. Nobody freak out, this is preemptive.";

pub const TRACKING_DOC_FAILED: &str = "I'm having trouble connecting to google docs right now, \
so I can't make a flare doc for tracking. I'll try my best to recover.";

pub const CHANNEL_FAILED: &str = "Slack is giving me some trouble right now, so I couldn't create \
a channel for you. It could be that the channel already exists, but hopefully no one did that \
already. If you need to make a new channel to discuss, please don't use the next flare-number \
channel, that'll confuse me later on.";

pub const RETROACTIVE_NOTICE: &str = "This is a RETROACTIVE Flare. All is well.";

const START_DATE_TOKEN: &str = "[START-DATE]";
const SUMMARY_TOKEN: &str = "[SUMMARY]";
const HISTORY_DOC_TOKEN: &str = "[HISTORY-DOC]";

const WRITER_ROLE: &str = "writer";

static PREEMPTIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"pre-?emptive").unwrap());

/// Source of unique channel-name suffixes
pub trait TokenSource: Send + Sync {
    fn next_token(&self) -> String;
}

/// Random UUID v4 tokens
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTokens;

impl TokenSource for UuidTokens {
    fn next_token(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Flags that quiet a flare down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub retroactive: bool,
    pub preemptive: bool,
}

impl Modifiers {
    /// Literal, case-sensitive substring detection
    pub fn detect(text: &str) -> Self {
        Self {
            retroactive: text.contains("retroactive"),
            preemptive: PREEMPTIVE.is_match(text),
        }
    }

    pub fn any(&self) -> bool {
        self.retroactive || self.preemptive
    }

    pub fn acknowledgment(&self) -> &'static str {
        if self.retroactive {
            ACK_RETROACTIVE
        } else if self.preemptive {
            ACK_PREEMPTIVE
        } else {
            ACK_PLAIN
        }
    }
}

/// A fire-a-flare request
#[derive(Debug, Clone)]
pub struct FireRequest {
    /// Where the flare was fired; acknowledgments and the announcement go here
    pub origin_channel: String,
    pub author_id: String,
    /// Full message text, scanned for modifiers
    pub text: String,
    pub priority: Priority,
    pub topic: String,
}

/// Saga steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SagaStep {
    Acknowledge,
    TrackingDoc,
    TranscriptDoc,
    FillTrackingDoc,
    ShareTrackingDoc,
    ShareTranscriptDoc,
    CreateChannel,
    ChannelSetup,
    Pin,
    Announce,
}

impl SagaStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::Acknowledge => "acknowledge",
            SagaStep::TrackingDoc => "tracking_doc",
            SagaStep::TranscriptDoc => "transcript_doc",
            SagaStep::FillTrackingDoc => "fill_tracking_doc",
            SagaStep::ShareTrackingDoc => "share_tracking_doc",
            SagaStep::ShareTranscriptDoc => "share_transcript_doc",
            SagaStep::CreateChannel => "create_channel",
            SagaStep::ChannelSetup => "channel_setup",
            SagaStep::Pin => "pin",
            SagaStep::Announce => "announce",
        }
    }
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An absorbed step failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: SagaStep,
    pub message: String,
}

/// What one flare run produced
#[derive(Debug, Default)]
pub struct IncidentReport {
    pub modifiers: Modifiers,
    pub tracking_doc: Option<Document>,
    pub transcript_doc: Option<Document>,
    pub channel: Option<ChannelInfo>,
    /// Texts posted into the new channel, in order
    pub channel_messages: Vec<String>,
    /// Texts of the messages pinned in the new channel, in order
    pub pinned: Vec<String>,
    pub announcement: Option<String>,
    pub reminders: Vec<JoinHandle<()>>,
    pub failures: Vec<StepFailure>,
}

impl IncidentReport {
    fn fail(&mut self, step: SagaStep, error: impl fmt::Display) {
        self.failures.push(StepFailure {
            step,
            message: error.to_string(),
        });
    }

    pub fn failed(&self, step: SagaStep) -> bool {
        self.failures.iter().any(|f| f.step == step)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fixed inputs of every flare run
#[derive(Debug, Clone)]
pub struct IncidentSettings {
    pub bot_name: String,
    pub google_domain: String,
    pub tracking_template_id: String,
    pub transcript_template_id: String,
    pub zone: Tz,
    pub resources_url: Option<String>,
    pub status_page_url: Option<String>,
    pub reminders: Vec<Reminder>,
}

/// `Flare: <topic>`, suffixed for retroactive flares
pub fn tracking_title(topic: &str, retroactive: bool) -> String {
    let title = format!("Flare: {}", topic);
    if retroactive {
        format!("{} - Retroactive", title)
    } else {
        title
    }
}

pub fn transcript_title(topic: &str) -> String {
    format!("Flare: {} (transcript)", topic)
}

/// Substitute the tracking template placeholders (first occurrence each)
///
/// `transcript` is `(link, title)`; without it the history placeholder stays.
pub fn fill_tracking_template(
    html: &str,
    start_date: &str,
    topic: &str,
    transcript: Option<(&str, &str)>,
) -> String {
    let mut html = html.replacen(START_DATE_TOKEN, start_date, 1);
    html = html.replacen(SUMMARY_TOKEN, topic, 1);
    if let Some((link, title)) = transcript {
        html = html.replacen(
            HISTORY_DOC_TOKEN,
            &format!(r#"<a href="{}">{}</a>"#, link, title),
            1,
        );
    }
    html
}

/// Runs the flare saga
pub struct IncidentOrchestrator {
    messaging: Arc<dyn MessagingService>,
    documents: Arc<dyn DocumentService>,
    cache: TranscriptCache,
    tokens: Arc<dyn TokenSource>,
    reminders: ReminderScheduler,
    settings: IncidentSettings,
}

impl IncidentOrchestrator {
    pub fn new(
        messaging: Arc<dyn MessagingService>,
        documents: Arc<dyn DocumentService>,
        cache: TranscriptCache,
        tokens: Arc<dyn TokenSource>,
        settings: IncidentSettings,
    ) -> Self {
        Self {
            reminders: ReminderScheduler::new(messaging.clone()),
            messaging,
            documents,
            cache,
            tokens,
            settings,
        }
    }

    pub fn settings(&self) -> &IncidentSettings {
        &self.settings
    }

    /// Fire a flare. Never fails; see the report for what was created.
    pub async fn fire(&self, request: &FireRequest) -> IncidentReport {
        info!(
            "starting flare process ({}). I was told {}",
            request.priority.as_str(),
            request.text
        );

        let modifiers = Modifiers::detect(&request.text);
        let mut report = IncidentReport {
            modifiers,
            ..Default::default()
        };
        let topic = request.topic.as_str();
        let origin = request.origin_channel.as_str();

        self.post(&mut report, SagaStep::Acknowledge, origin, modifiers.acknowledgment())
            .await;

        self.create_tracking_doc(&mut report, origin, topic).await;
        self.create_transcript_doc(&mut report, topic).await;

        if let Some(tracking) = report.tracking_doc.clone() {
            self.fill_tracking_doc(&mut report, &tracking, topic).await;
            self.share(&mut report, SagaStep::ShareTrackingDoc, &tracking)
                .await;
            if let Some(transcript) = report.transcript_doc.clone() {
                self.share(&mut report, SagaStep::ShareTranscriptDoc, &transcript)
                    .await;
            }
        }

        let Some(channel) = self.create_channel(&mut report, origin).await else {
            return report;
        };

        self.set_up_channel(&mut report, &channel, topic).await;

        if let Some(transcript) = &report.transcript_doc {
            self.cache.set(&channel.id, &transcript.id).await;
        }

        for reminder in self.settings.reminders.iter().cloned() {
            report
                .reminders
                .push(self.reminders.schedule(&channel.id, reminder));
        }

        let target = if modifiers.any() {
            self.messaging.display_name(&request.author_id).await
        } else {
            "channel".to_string()
        };
        let announcement = format!(
            "@{}: Flare fired. Please visit #{} -- {}",
            target, channel.name, topic
        );
        if self
            .post(&mut report, SagaStep::Announce, origin, &announcement)
            .await
            .is_some()
        {
            report.announcement = Some(announcement);
        }

        info!(
            "Flare #{} ready with {} absorbed failure(s)",
            channel.name,
            report.failures.len()
        );
        report
    }

    async fn post(
        &self,
        report: &mut IncidentReport,
        step: SagaStep,
        channel: &str,
        text: &str,
    ) -> Option<PostedMessage> {
        match self.messaging.post_message(channel, text).await {
            Ok(posted) => Some(posted),
            Err(e) => {
                warn!("Failed to post during {}: {}", step, e);
                report.fail(step, e);
                None
            }
        }
    }

    /// Post into the new channel, keeping the text for the report
    async fn post_in_channel(
        &self,
        report: &mut IncidentReport,
        channel: &str,
        text: &str,
    ) -> Option<(String, PostedMessage)> {
        let posted = self
            .post(report, SagaStep::ChannelSetup, channel, text)
            .await?;
        report.channel_messages.push(text.to_string());
        Some((text.to_string(), posted))
    }

    async fn create_tracking_doc(&self, report: &mut IncidentReport, origin: &str, topic: &str) {
        info!("Attempting to create flare doc");
        let title = tracking_title(topic, report.modifiers.retroactive);

        match self
            .documents
            .create_from_template(&title, &self.settings.tracking_template_id)
            .await
        {
            Ok(doc) => {
                info!("Flare doc created: {}", doc.id);
                report.tracking_doc = Some(doc);
            }
            Err(e) => {
                warn!("No flare doc created: {}", e);
                report.fail(SagaStep::TrackingDoc, &e);
                self.post(report, SagaStep::TrackingDoc, origin, TRACKING_DOC_FAILED)
                    .await;
            }
        }
    }

    async fn create_transcript_doc(&self, report: &mut IncidentReport, topic: &str) {
        info!("Attempting to create transcript doc");
        let title = transcript_title(topic);

        match self
            .documents
            .create_from_template(&title, &self.settings.transcript_template_id)
            .await
        {
            Ok(doc) => {
                info!("Transcript doc created: {}", doc.id);
                report.transcript_doc = Some(doc);
            }
            Err(e) => {
                warn!("No transcript doc created: {}", e);
                report.fail(SagaStep::TranscriptDoc, e);
            }
        }
    }

    async fn fill_tracking_doc(&self, report: &mut IncidentReport, tracking: &Document, topic: &str) {
        let html = match self.documents.fetch_content(&tracking.id, HTML_MIME).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Unexpected error getting content from the flare doc: {}", e);
                report.fail(SagaStep::FillTrackingDoc, e);
                return;
            }
        };

        let title = transcript_title(topic);
        let transcript = report
            .transcript_doc
            .as_ref()
            .map(|doc| (doc.link.as_str(), title.as_str()));
        let start_date = clock::now_in_zone(self.settings.zone);
        let filled = fill_tracking_template(&html, &start_date, topic, transcript);

        if let Err(e) = self.documents.replace_content(&tracking.id, &filled).await {
            warn!("Couldn't update flare doc content: {}", e);
            report.fail(SagaStep::FillTrackingDoc, e);
        }
    }

    async fn share(&self, report: &mut IncidentReport, step: SagaStep, doc: &Document) {
        if let Err(e) = self
            .documents
            .share_with_domain(&doc.id, &self.settings.google_domain, WRITER_ROLE)
            .await
        {
            // Sharing is optional; people can still request access.
            warn!("Couldn't share doc {}: {}", doc.id, e);
            report.fail(step, e);
        }
    }

    async fn create_channel(&self, report: &mut IncidentReport, origin: &str) -> Option<ChannelInfo> {
        info!("Attempting to create flare channel");
        let name = format!("{}{}", CHANNEL_PREFIX, self.tokens.next_token()).to_lowercase();

        match self.messaging.create_channel(&name).await {
            Ok(mut channel) => {
                if channel.name.is_empty() {
                    channel.name = name;
                }
                info!("Flare channel created: #{}", channel.name);
                report.channel = Some(channel.clone());
                Some(channel)
            }
            Err(e) => {
                warn!("Couldn't create Flare channel {}: {}", name, e);
                report.fail(SagaStep::CreateChannel, e);
                self.post(report, SagaStep::CreateChannel, origin, CHANNEL_FAILED)
                    .await;
                None
            }
        }
    }

    async fn set_up_channel(&self, report: &mut IncidentReport, channel: &ChannelInfo, topic: &str) {
        let id = channel.id.as_str();

        if report.modifiers.retroactive {
            self.post_in_channel(report, id, RETROACTIVE_NOTICE).await;
        }

        if let Err(e) = self.messaging.set_topic(id, topic).await {
            warn!("Couldn't set topic of #{}: {}", channel.name, e);
            report.fail(SagaStep::ChannelSetup, e);
        }

        let mut to_pin = Vec::new();

        if let Some(doc) = report.tracking_doc.clone() {
            let text = format!("{}{}", TRACKING_DOC_LABEL, doc.link);
            to_pin.push(self.post_in_channel(report, id, &text).await);
        }
        if let Some(doc) = report.transcript_doc.clone() {
            let text = format!("{}{}", TRANSCRIPT_PIN_LABEL, doc.id);
            to_pin.push(self.post_in_channel(report, id, &text).await);
        }
        if let Some(url) = self.settings.resources_url.as_deref() {
            self.post_in_channel(report, id, &format!("Flare resources: {}", url))
                .await;
        }
        if let Some(url) = self.settings.status_page_url.as_deref() {
            let text = format!("Manage status page: {}", url);
            to_pin.push(self.post_in_channel(report, id, &text).await);
        }
        to_pin.push(
            self.post_in_channel(report, id, ROLLBACK_SCALE_RESTART)
                .await,
        );

        for (text, posted) in to_pin.into_iter().flatten() {
            match self.messaging.add_pin(id, &posted.ts).await {
                Ok(()) => report.pinned.push(text),
                Err(e) => {
                    warn!("Couldn't pin {:?} in #{}: {}", text, channel.name, e);
                    report.fail(SagaStep::Pin, e);
                }
            }
        }

        for line in help_listing(&self.settings.bot_name, HelpScope::Flare) {
            self.post_in_channel(report, id, &line).await;
        }

        let note = format!(
            "NOTE: you can rename this channel as long as it starts with {}",
            CHANNEL_PREFIX
        );
        self.post_in_channel(report, id, &note).await;
    }
}
