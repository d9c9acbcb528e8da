//! History Recorder
//!
//! Appends every message seen in an incident channel to that channel's transcript
//! document as `[raw ts, formatted ts, author, text]`.

use crate::cache::TranscriptCache;
use crate::channels::{ChannelError, InboundMessage, MessagingService};
use crate::clock;
use crate::documents::{DocumentError, DocumentService};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Could not resolve transcript for {channel}: {source}")]
    Resolve {
        channel: String,
        #[source]
        source: ChannelError,
    },

    #[error("Could not append to transcript {doc_id}: {source}")]
    Append {
        doc_id: String,
        #[source]
        source: DocumentError,
    },
}

/// What recording a message did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Channel has no transcript
    Skipped,
    Recorded { doc_id: String },
}

/// Transcript row for one message
pub fn transcript_row(message: &InboundMessage, author: &str, zone: Tz) -> Vec<String> {
    vec![
        message.timestamp.clone(),
        clock::format_message_ts(&message.timestamp, zone),
        author.to_string(),
        message.text.clone(),
    ]
}

pub struct HistoryRecorder {
    messaging: Arc<dyn MessagingService>,
    documents: Arc<dyn DocumentService>,
    cache: TranscriptCache,
    zone: Tz,
}

impl HistoryRecorder {
    pub fn new(
        messaging: Arc<dyn MessagingService>,
        documents: Arc<dyn DocumentService>,
        cache: TranscriptCache,
        zone: Tz,
    ) -> Self {
        Self {
            messaging,
            documents,
            cache,
            zone,
        }
    }

    /// Record one (non-self) message
    pub async fn record(&self, message: &InboundMessage) -> Result<RecordOutcome, HistoryError> {
        let doc_id = self
            .cache
            .resolve(&message.channel_id, self.messaging.as_ref())
            .await
            .map_err(|source| HistoryError::Resolve {
                channel: message.channel_id.clone(),
                source,
            })?;

        let Some(doc_id) = doc_id else {
            return Ok(RecordOutcome::Skipped);
        };

        let author = self.messaging.display_name(&message.author_id).await;
        let row = transcript_row(message, &author, self.zone);

        self.documents
            .append_row(&doc_id, row)
            .await
            .map_err(|source| HistoryError::Append {
                doc_id: doc_id.clone(),
                source,
            })?;

        debug!("Recorded message {} to transcript {}", message.timestamp, doc_id);
        Ok(RecordOutcome::Recorded { doc_id })
    }
}
