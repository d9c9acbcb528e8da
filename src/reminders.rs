//! Deferred Reminders
//!
//! One-shot reminders posted into a flare channel after a delay. Each reminder is
//! its own tokio task so the dispatch loop never waits on it. There is no
//! cancellation: a reminder fires even if the flare was already resolved.

use crate::channels::MessagingService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub const PAGE_PEOPLE_REMINDER: &str =
    "Are the right people in the flare channel? Consider using the /page Slack command.";

pub const ROLLBACK_REMINDER: &str =
    "Have you tried rolling back, scaling or restarting? (consider SSO version too)";

/// A reminder to post once a flare channel exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub message: String,
    pub delay: Duration,
}

impl Reminder {
    pub fn new(message: &str, delay: Duration) -> Self {
        Self {
            message: message.to_string(),
            delay,
        }
    }
}

/// The reminders every new flare channel gets
pub fn default_reminders(first: Duration, second: Duration) -> Vec<Reminder> {
    vec![
        Reminder::new(PAGE_PEOPLE_REMINDER, first),
        Reminder::new(ROLLBACK_REMINDER, second),
    ]
}

/// Spawns reminder tasks
#[derive(Clone)]
pub struct ReminderScheduler {
    messaging: Arc<dyn MessagingService>,
}

impl ReminderScheduler {
    pub fn new(messaging: Arc<dyn MessagingService>) -> Self {
        Self { messaging }
    }

    /// Post `reminder` into `channel` after its delay
    pub fn schedule(&self, channel: &str, reminder: Reminder) -> JoinHandle<()> {
        let messaging = self.messaging.clone();
        let channel = channel.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(reminder.delay).await;
            match messaging.post_message(&channel, &reminder.message).await {
                Ok(_) => info!("Reminder posted to {}", channel),
                Err(e) => warn!("Failed to post reminder to {}: {}", channel, e),
            }
        })
    }
}
