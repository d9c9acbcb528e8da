//! Shared in-memory fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use flarebot::documents::{Document, DocumentError, DocumentService};
use flarebot::incident::TokenSource;
use flarebot::reminders::Reminder;
use flarebot::{
    ChannelError, ChannelInfo, CommandRouter, Dispatcher, FlareBot, HistoryRecorder,
    IncidentOrchestrator, IncidentSettings, MessagingService, PinnedItem, PostedMessage,
    TranscriptCache, UserProfile,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BOT_NAME: &str = "flarebot";
pub const BOT_ID: &str = "UBOT";
pub const MAIN_CHANNEL: &str = "CFLARES";
pub const DOMAIN: &str = "example.com";
pub const TRACKING_TEMPLATE: &str = "tmpl-flare";
pub const TRANSCRIPT_TEMPLATE: &str = "tmpl-history";
pub const TEMPLATE_HTML: &str =
    "<p>Start: [START-DATE]</p><p>Summary: [SUMMARY]</p><p>Log: [HISTORY-DOC]</p>";

/// In-memory Slack
#[derive(Default)]
pub struct FakeMessaging {
    next_ts: AtomicUsize,
    next_channel: AtomicUsize,
    /// (channel, text, ts) in post order
    pub posts: Mutex<Vec<(String, String, String)>>,
    /// (channel, ts)
    pub pins_added: Mutex<Vec<(String, String)>>,
    pub topics: Mutex<Vec<(String, String)>>,
    pub created: Mutex<Vec<String>>,
    /// channel id -> name
    pub channels: Mutex<HashMap<String, String>>,
    /// channel id -> existing pins
    pub pins: Mutex<HashMap<String, Vec<PinnedItem>>>,
    pub users: Mutex<HashMap<String, UserProfile>>,
    pub channel_info_calls: AtomicUsize,
    pub list_pins_calls: AtomicUsize,
    pub fail_create_channel: AtomicBool,
    pub fail_list_pins: AtomicBool,
    pub fail_channel_info: AtomicBool,
}

impl FakeMessaging {
    pub fn new() -> Arc<Self> {
        let fake = Self::default();
        fake.add_channel(MAIN_CHANNEL, "flares");
        Arc::new(fake)
    }

    pub fn add_channel(&self, id: &str, name: &str) {
        self.channels
            .lock()
            .unwrap()
            .insert(id.to_string(), name.to_string());
    }

    /// Pin a message that was posted before the bot started
    pub fn seed_pin(&self, channel: &str, text: &str) {
        self.pins
            .lock()
            .unwrap()
            .entry(channel.to_string())
            .or_default()
            .push(PinnedItem {
                text: text.to_string(),
                ts: None,
                created_by: None,
            });
    }

    pub fn add_user(&self, id: &str, name: &str, email: &str) {
        self.users.lock().unwrap().insert(
            id.to_string(),
            UserProfile {
                id: id.to_string(),
                name: name.to_string(),
                real_name: None,
                email: Some(email.to_string()),
            },
        );
    }

    pub fn texts_in(&self, channel: &str) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _, _)| c == channel)
            .map(|(_, text, _)| text.clone())
            .collect()
    }

    /// Texts of the messages pinned through `add_pin`, in pin order
    pub fn pinned_texts(&self, channel: &str) -> Vec<String> {
        let posts = self.posts.lock().unwrap();
        self.pins_added
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == channel)
            .filter_map(|(_, ts)| {
                posts
                    .iter()
                    .find(|(_, _, posted_ts)| posted_ts == ts)
                    .map(|(_, text, _)| text.clone())
            })
            .collect()
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }
}

#[async_trait]
impl MessagingService for FakeMessaging {
    async fn post_message(&self, channel: &str, text: &str) -> Result<PostedMessage, ChannelError> {
        let n = self.next_ts.fetch_add(1, Ordering::SeqCst);
        let ts = format!("1700000000.{:06}", n);
        self.posts
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string(), ts.clone()));
        Ok(PostedMessage {
            channel: channel.to_string(),
            ts,
        })
    }

    async fn create_channel(&self, name: &str) -> Result<ChannelInfo, ChannelError> {
        if self.fail_create_channel.load(Ordering::SeqCst) {
            return Err(ChannelError::api("conversations.create", "name_taken"));
        }
        let id = format!("CNEW{}", self.next_channel.fetch_add(1, Ordering::SeqCst));
        self.created.lock().unwrap().push(name.to_string());
        self.add_channel(&id, name);
        Ok(ChannelInfo {
            id,
            name: name.to_string(),
        })
    }

    async fn set_topic(&self, channel: &str, topic: &str) -> Result<(), ChannelError> {
        self.topics
            .lock()
            .unwrap()
            .push((channel.to_string(), topic.to_string()));
        Ok(())
    }

    async fn add_pin(&self, channel: &str, message_ts: &str) -> Result<(), ChannelError> {
        self.pins_added
            .lock()
            .unwrap()
            .push((channel.to_string(), message_ts.to_string()));
        Ok(())
    }

    async fn list_pins(&self, channel: &str) -> Result<Vec<PinnedItem>, ChannelError> {
        self.list_pins_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_pins.load(Ordering::SeqCst) {
            return Err(ChannelError::api("pins.list", "channel_not_found"));
        }
        Ok(self
            .pins
            .lock()
            .unwrap()
            .get(channel)
            .cloned()
            .unwrap_or_default())
    }

    async fn channel_info(&self, channel: &str) -> Result<ChannelInfo, ChannelError> {
        self.channel_info_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_channel_info.load(Ordering::SeqCst) {
            return Err(ChannelError::ConnectionFailed("slack unavailable".to_string()));
        }
        let name = self
            .channels
            .lock()
            .unwrap()
            .get(channel)
            .cloned()
            .ok_or_else(|| ChannelError::NotFound(channel.to_string()))?;
        Ok(ChannelInfo {
            id: channel.to_string(),
            name,
        })
    }

    async fn user_info(&self, user: &str) -> Result<UserProfile, ChannelError> {
        self.users
            .lock()
            .unwrap()
            .get(user)
            .cloned()
            .ok_or_else(|| ChannelError::NotFound(user.to_string()))
    }
}

/// In-memory Drive
#[derive(Default)]
pub struct FakeDocuments {
    next_id: AtomicUsize,
    /// (title, template id) in creation order
    pub created: Mutex<Vec<(String, String)>>,
    /// doc id -> current HTML
    pub contents: Mutex<HashMap<String, String>>,
    pub fetches: Mutex<Vec<(String, String)>>,
    /// (doc id, domain, role)
    pub shared: Mutex<Vec<(String, String, String)>>,
    pub rows: Mutex<Vec<(String, Vec<String>)>>,
    /// Templates whose copy fails
    pub failing_templates: Mutex<HashSet<String>>,
    /// Docs whose content cannot be read
    pub unreadable: Mutex<HashSet<String>>,
}

impl FakeDocuments {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_template(&self, template_id: &str) {
        self.failing_templates
            .lock()
            .unwrap()
            .insert(template_id.to_string());
    }

    pub fn make_unreadable(&self, doc_id: &str) {
        self.unreadable.lock().unwrap().insert(doc_id.to_string());
    }

    pub fn content(&self, doc_id: &str) -> Option<String> {
        self.contents.lock().unwrap().get(doc_id).cloned()
    }

    pub fn rows_for(&self, doc_id: &str) -> Vec<Vec<String>> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == doc_id)
            .map(|(_, row)| row.clone())
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentService for FakeDocuments {
    async fn create_from_template(
        &self,
        title: &str,
        template_id: &str,
    ) -> Result<Document, DocumentError> {
        if self.failing_templates.lock().unwrap().contains(template_id) {
            return Err(DocumentError::Api {
                status: 500,
                message: "backend error".to_string(),
            });
        }
        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.created
            .lock()
            .unwrap()
            .push((title.to_string(), template_id.to_string()));
        self.contents
            .lock()
            .unwrap()
            .insert(id.clone(), TEMPLATE_HTML.to_string());
        Ok(Document {
            link: format!("https://docs.example.com/{}", id),
            id,
        })
    }

    async fn fetch_content(&self, doc_id: &str, mime: &str) -> Result<String, DocumentError> {
        self.fetches
            .lock()
            .unwrap()
            .push((doc_id.to_string(), mime.to_string()));
        if self.unreadable.lock().unwrap().contains(doc_id) {
            return Err(DocumentError::NotFound(doc_id.to_string()));
        }
        Ok(self
            .contents
            .lock()
            .unwrap()
            .get(doc_id)
            .cloned()
            .unwrap_or_else(|| TEMPLATE_HTML.to_string()))
    }

    async fn replace_content(&self, doc_id: &str, html: &str) -> Result<(), DocumentError> {
        self.contents
            .lock()
            .unwrap()
            .insert(doc_id.to_string(), html.to_string());
        Ok(())
    }

    async fn share_with_domain(
        &self,
        doc_id: &str,
        domain: &str,
        role: &str,
    ) -> Result<(), DocumentError> {
        self.shared
            .lock()
            .unwrap()
            .push((doc_id.to_string(), domain.to_string(), role.to_string()));
        Ok(())
    }

    async fn append_row(&self, doc_id: &str, row: Vec<String>) -> Result<(), DocumentError> {
        self.rows.lock().unwrap().push((doc_id.to_string(), row));
        Ok(())
    }
}

/// Always hands out the same token
pub struct FixedToken(pub &'static str);

impl TokenSource for FixedToken {
    fn next_token(&self) -> String {
        self.0.to_string()
    }
}

pub fn settings(reminders: Vec<Reminder>) -> IncidentSettings {
    IncidentSettings {
        bot_name: BOT_NAME.to_string(),
        google_domain: DOMAIN.to_string(),
        tracking_template_id: TRACKING_TEMPLATE.to_string(),
        transcript_template_id: TRANSCRIPT_TEMPLATE.to_string(),
        zone: chrono_tz::US::Pacific,
        resources_url: None,
        status_page_url: None,
        reminders,
    }
}

/// Reminders that will not fire during a test
pub fn distant_reminders() -> Vec<Reminder> {
    flarebot::reminders::default_reminders(Duration::from_secs(3600), Duration::from_secs(7200))
}

/// Fully wired bot over the fakes
pub struct Harness {
    pub messaging: Arc<FakeMessaging>,
    pub documents: Arc<FakeDocuments>,
    pub cache: TranscriptCache,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(settings(distant_reminders()))
    }

    pub fn with_settings(settings: IncidentSettings) -> Self {
        Self::with_fakes(FakeMessaging::new(), FakeDocuments::new(), settings)
    }

    pub fn with_fakes(
        messaging: Arc<FakeMessaging>,
        documents: Arc<FakeDocuments>,
        settings: IncidentSettings,
    ) -> Self {
        let cache = TranscriptCache::new();
        let zone = settings.zone;
        let orchestrator = IncidentOrchestrator::new(
            messaging.clone(),
            documents.clone(),
            cache.clone(),
            Arc::new(FixedToken("ABC123")),
            settings,
        );
        let bot = FlareBot::new(
            messaging.clone(),
            documents.clone(),
            orchestrator,
            MAIN_CHANNEL,
        );
        let recorder =
            HistoryRecorder::new(messaging.clone(), documents.clone(), cache.clone(), zone);
        let router = CommandRouter::new(BOT_NAME, BOT_ID).unwrap();

        Self {
            messaging,
            documents,
            cache,
            dispatcher: Dispatcher::new(router, bot, recorder, BOT_ID),
        }
    }

    pub fn orchestrator(&self, settings: IncidentSettings) -> IncidentOrchestrator {
        IncidentOrchestrator::new(
            self.messaging.clone(),
            self.documents.clone(),
            self.cache.clone(),
            Arc::new(FixedToken("ABC123")),
            settings,
        )
    }
}
