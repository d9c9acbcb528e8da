//! Flarebot
//!
//! Chat-driven incident response bot for Slack.
//!
//! # Features
//!
//! - **Fire a flare**: tracking doc, transcript doc and a fresh `flare-` channel in one command
//! - **Transcripts**: every message in a flare channel is appended to its transcript
//! - **Pin recovery**: channel → transcript mapping rebuilt from pins after a restart
//! - **Reminders**: deferred nudges posted into new flare channels
//!
//! # Architecture
//!
//! ```text
//! Slack ──► Socket Mode ──► Dispatcher ──► Router ──► FlareBot handlers
//!            (websocket)        │                          │
//!                               │                          ├── IncidentOrchestrator
//!                               │                          │     ├── Slack Web API
//!                               │                          │     ├── Google Drive / Sheets
//!                               │                          │     └── Reminders
//!                               └── HistoryRecorder ──► TranscriptCache (Moka)
//! ```

pub mod bot;
pub mod cache;
pub mod channels;
pub mod clock;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod documents;
pub mod history;
pub mod incident;
pub mod reminders;
pub mod router;

pub use bot::{FlareBot, Handled};
pub use cache::{CacheStats, TranscriptCache};
pub use channels::{
    ChannelError, ChannelInfo, InboundMessage, MessagingService, PinnedItem, PostedMessage,
    SlackChannel, SlackConfig, SlackSocket, UserProfile,
};
pub use config::Config;
pub use dispatch::{Dispatcher, Processed};
pub use documents::{Document, DocumentError, DocumentService, GoogleDocs, GoogleEndpoints};
pub use history::{HistoryError, HistoryRecorder, RecordOutcome};
pub use incident::{
    FireRequest, IncidentOrchestrator, IncidentReport, IncidentSettings, SagaStep, StepFailure,
    TokenSource, UuidTokens,
};
pub use reminders::{Reminder, ReminderScheduler};
pub use router::{Command, CommandKind, CommandRouter, Priority};
