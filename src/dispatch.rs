//! Dispatch Loop
//!
//! Consumes inbound messages one at a time: drop the bot's own messages, route,
//! run the matched handler, then always record history. Handler and history
//! failures are logged; only a closed inbound channel ends the loop.

use crate::bot::{FlareBot, Handled};
use crate::channels::InboundMessage;
use crate::history::{HistoryRecorder, RecordOutcome};
use crate::router::CommandRouter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Result of processing one message
#[derive(Debug)]
pub enum Processed {
    /// Authored by the bot itself; nothing ran
    SelfAuthored,
    Done {
        handled: Option<Handled>,
        recorded: bool,
    },
}

pub struct Dispatcher {
    router: CommandRouter,
    bot: FlareBot,
    recorder: HistoryRecorder,
    bot_user_id: String,
}

impl Dispatcher {
    pub fn new(
        router: CommandRouter,
        bot: FlareBot,
        recorder: HistoryRecorder,
        bot_user_id: &str,
    ) -> Self {
        Self {
            router,
            bot,
            recorder,
            bot_user_id: bot_user_id.to_string(),
        }
    }

    /// Classify, handle and record one message
    pub async fn process(&self, message: &InboundMessage) -> Processed {
        if !self.bot_user_id.is_empty() && message.author_id == self.bot_user_id {
            debug!("Skipping own message {}", message.timestamp);
            return Processed::SelfAuthored;
        }

        let handled = match self.router.route(&message.text) {
            Some(command) => Some(self.bot.handle(message, command).await),
            None => None,
        };

        let recorded = match self.recorder.record(message).await {
            Ok(RecordOutcome::Recorded { .. }) => true,
            Ok(RecordOutcome::Skipped) => false,
            Err(e) => {
                warn!("Failed to record history for {}: {}", message.channel_id, e);
                false
            }
        };

        Processed::Done { handled, recorded }
    }

    /// Run until the sender side closes
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>) {
        info!("Dispatch loop started");
        while let Some(message) = inbound.recv().await {
            self.process(&message).await;
        }
        info!("Inbound stream closed, dispatch loop stopping");
    }
}
