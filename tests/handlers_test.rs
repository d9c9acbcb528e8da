//! Secondary command handler tests

mod common;

use common::*;
use flarebot::bot::{LEAD_PENDING, MITIGATED_NOTICE, NOT_A_FLARE_NOTICE};
use flarebot::commands::{help_all_listing, help_listing, not_understood, HelpScope};
use flarebot::InboundMessage;
use std::sync::atomic::Ordering;

const FLARE_CHANNEL: &str = "CF1";

async fn say(harness: &Harness, channel: &str, text: &str) {
    let message = InboundMessage::new("U1", "1700000000.000100", text, channel);
    harness.dispatcher.process(&message).await;
}

fn harness() -> Harness {
    let harness = Harness::new();
    harness.messaging.add_channel(FLARE_CHANNEL, "flare-abc");
    harness.messaging.add_channel("CRANDOM", "random");
    harness.messaging.add_user("U1", "alice", "alice@example.com");
    harness
}

#[tokio::test]
async fn test_help_is_scoped_by_channel() {
    let h = harness();

    say(&h, MAIN_CHANNEL, "@flarebot help").await;
    say(&h, FLARE_CHANNEL, "@flarebot help").await;
    say(&h, "CRANDOM", "@flarebot help").await;

    assert_eq!(h.messaging.texts_in(MAIN_CHANNEL), help_listing(BOT_NAME, HelpScope::Main));
    assert_eq!(h.messaging.texts_in(FLARE_CHANNEL), help_listing(BOT_NAME, HelpScope::Flare));
    assert_eq!(h.messaging.texts_in("CRANDOM"), help_listing(BOT_NAME, HelpScope::Other));
}

#[tokio::test]
async fn test_help_without_channel_info_uses_other_scope() {
    let h = harness();
    h.messaging.fail_channel_info.store(true, Ordering::SeqCst);

    say(&h, FLARE_CHANNEL, "@flarebot help").await;

    assert_eq!(h.messaging.texts_in(FLARE_CHANNEL), help_listing(BOT_NAME, HelpScope::Other));
}

#[tokio::test]
async fn test_help_all_lists_every_section() {
    let h = harness();
    say(&h, "CRANDOM", "@flarebot help all").await;

    let posted = h.messaging.texts_in("CRANDOM");
    assert_eq!(posted, help_all_listing(BOT_NAME));
    assert_eq!(posted[0], "Commands Available in the #flares channel:");
    assert!(posted.iter().any(|l| l == "Commands Available in other channels:"));
}

#[tokio::test]
async fn test_take_lead() {
    let h = harness();
    say(&h, FLARE_CHANNEL, "@flarebot I'm incident lead").await;

    assert_eq!(
        h.messaging.texts_in(FLARE_CHANNEL),
        vec![
            LEAD_PENDING.to_string(),
            "Oh Captain My Captain! @alice is now incident lead. Please confirm all actions with them."
                .to_string(),
        ]
    );
}

#[tokio::test]
async fn test_status_changes_notify_main_channel() {
    let h = harness();
    say(&h, FLARE_CHANNEL, "@flarebot flare is mitigated").await;
    say(&h, FLARE_CHANNEL, "@flarebot flare is not a flare").await;

    assert!(h.messaging.texts_in(FLARE_CHANNEL).is_empty());
    assert_eq!(
        h.messaging.texts_in(MAIN_CHANNEL),
        vec![MITIGATED_NOTICE.to_string(), NOT_A_FLARE_NOTICE.to_string()]
    );
}

#[tokio::test]
async fn test_not_a_flare() {
    let h = harness();
    say(&h, FLARE_CHANNEL, "@flarebot not a flare").await;

    assert_eq!(
        h.messaging.texts_in(MAIN_CHANNEL),
        vec![NOT_A_FLARE_NOTICE.to_string()]
    );
}

#[tokio::test]
async fn test_fallback_reply() {
    let h = harness();
    say(&h, "CRANDOM", "@flarebot what's up").await;

    let posted = h.messaging.texts_in("CRANDOM");
    assert_eq!(posted, vec![not_understood(BOT_NAME)]);
    assert!(posted[0].starts_with("I'm sorry, I didn't understand that command."));
}

#[tokio::test]
async fn test_diagnostic_command() {
    let h = harness();
    say(&h, FLARE_CHANNEL, "@flarebot test checking in").await;

    assert_eq!(
        h.messaging.texts_in(FLARE_CHANNEL),
        vec![
            "I see you're using the test command. Excellent: alice@example.com".to_string(),
            "you told me: checking in".to_string(),
            "this channel is flare-abc".to_string(),
        ]
    );
    assert_eq!(
        h.documents.fetches.lock().unwrap().clone(),
        vec![
            (TRACKING_TEMPLATE.to_string(), "text/html".to_string()),
            (TRANSCRIPT_TEMPLATE.to_string(), "text/csv".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_diagnostic_reports_first_unreadable_template() {
    let h = harness();
    h.documents.make_unreadable(TRACKING_TEMPLATE);
    say(&h, "CRANDOM", "@flarebot test").await;

    let posted = h.messaging.texts_in("CRANDOM");
    assert_eq!(
        posted.last().unwrap(),
        "Unable to read the Google Flare Template. ID: tmpl-flare"
    );
    assert!(!posted.iter().any(|t| t.starts_with("you told me")));
    assert_eq!(h.documents.fetches.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_diagnostic_unknown_author() {
    let h = harness();
    let message = InboundMessage::new("U404", "1700000000.000100", "@flarebot test", "CRANDOM");
    h.dispatcher.process(&message).await;

    assert_eq!(
        h.messaging.texts_in("CRANDOM")[0],
        "Unable to determine author of Slack message"
    );
}
