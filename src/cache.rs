//! Transcript Cache
//!
//! Channel ID → transcript document ID, populated lazily. A miss is resolved with
//! the pin-scan recovery protocol: incident channels carry a pinned
//! `Slack log: <doc id>` message, so the mapping survives restarts without any
//! server-side storage.
//!
//! Negative results are stored as an empty string and never re-probed. Only
//! [`TranscriptCache::set`] can replace them.

use crate::channels::{ChannelError, MessagingService};
use crate::incident::{CHANNEL_PREFIX, TRANSCRIPT_PIN_LABEL};
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stored for channels resolved to "no transcript"
const NO_TRANSCRIPT: &str = "";

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
}

/// Shared channel → transcript mapping
///
/// Clones share the same storage.
#[derive(Clone)]
pub struct TranscriptCache {
    cache: Cache<String, String>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl Default for TranscriptCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Transcript document for `channel_id`, if it has one
    ///
    /// Concurrent misses for the same channel share a single probe. A failed
    /// channel lookup is returned as an error and nothing is cached.
    pub async fn resolve(
        &self,
        channel_id: &str,
        messaging: &dyn MessagingService,
    ) -> Result<Option<String>, ChannelError> {
        if let Some(doc_id) = self.cache.get(channel_id).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Transcript cache HIT: {}", channel_id);
            return Ok(non_empty(doc_id));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Transcript cache MISS: {}", channel_id);

        let doc_id = self
            .cache
            .try_get_with(
                channel_id.to_string(),
                recover_from_pins(channel_id, messaging),
            )
            .await
            .map_err(|e| (*e).clone())?;

        Ok(non_empty(doc_id))
    }

    /// Record the transcript for a channel, replacing any earlier result
    pub async fn set(&self, channel_id: &str, doc_id: &str) {
        self.cache
            .insert(channel_id.to_string(), doc_id.to_string())
            .await;
        debug!("Transcript cache SET: {} -> {}", channel_id, doc_id);
    }

    /// Cached value without probing; `Some("")` means "known to have none"
    pub async fn peek(&self, channel_id: &str) -> Option<String> {
        self.cache.get(channel_id).await
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            entries: self.cache.entry_count(),
            hits,
            misses,
            hit_rate_percent: if total > 0 {
                (hits as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        }
    }
}

fn non_empty(doc_id: String) -> Option<String> {
    if doc_id.is_empty() {
        None
    } else {
        Some(doc_id)
    }
}

/// Pin-scan recovery for one channel
async fn recover_from_pins(
    channel_id: &str,
    messaging: &dyn MessagingService,
) -> Result<String, ChannelError> {
    let channel = messaging.channel_info(channel_id).await?;

    if !channel.name.starts_with(CHANNEL_PREFIX) {
        debug!("#{} is not an incident channel", channel.name);
        return Ok(NO_TRANSCRIPT.to_string());
    }

    let pins = match messaging.list_pins(channel_id).await {
        Ok(pins) => pins,
        Err(e) => {
            // There might not be a pin in this channel, just ignore it.
            warn!("Unable to list pins for #{}, skipping: {}", channel.name, e);
            return Ok(NO_TRANSCRIPT.to_string());
        }
    };

    let doc_id = pins
        .iter()
        .filter_map(|pin| pin.text.strip_prefix(TRANSCRIPT_PIN_LABEL))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .last()
        .map(str::to_string);

    match doc_id {
        Some(doc_id) => {
            info!("Recovered transcript {} for #{} from pins", doc_id, channel.name);
            Ok(doc_id)
        }
        None => {
            info!("No transcript pin in #{}", channel.name);
            Ok(NO_TRANSCRIPT.to_string())
        }
    }
}
