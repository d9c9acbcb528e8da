//! Flarebot - Entry Point
//!
//! Options:
//! - --json-logs: JSON log lines instead of ANSI text
//! - --help / -h: usage

use flarebot::documents::{ServiceAccountKey, ServiceAccountTokens};
use flarebot::{
    CommandRouter, Config, Dispatcher, FlareBot, GoogleDocs, GoogleEndpoints, HistoryRecorder,
    IncidentOrchestrator, IncidentSettings, SlackChannel, SlackConfig, SlackSocket,
    TranscriptCache, UuidTokens,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Inbound messages buffered between the socket and the dispatch loop
const INBOUND_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let json_logs = args.iter().any(|a| a == "--json-logs");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("Flarebot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: flarebot [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --json-logs        Log as JSON lines");
        println!("  --help, -h         Show this help");
        println!();
        println!("Environment variables:");
        println!("  SLACK_FLAREBOT_APP_ACCESS_TOKEN       Socket Mode token (xapp-...)");
        println!("  SLACK_FLAREBOT_BOT_ACCESS_TOKEN       Bot token (xoxb-...)");
        println!("  SLACK_USERNAME                        Bot name used in mentions");
        println!("  SLACK_CHANNEL                         Main flares channel ID");
        println!("  GOOGLE_FLAREBOT_SERVICE_ACCOUNT_CONF  Service account JSON or path");
        println!("  GOOGLE_DOMAIN                         Domain documents are shared with");
        println!("  GOOGLE_TEMPLATE_DOC_ID                Flare doc template");
        println!("  GOOGLE_SLACK_HISTORY_DOC_ID           Transcript sheet template");
        println!("  FLAREBOT_TIMEZONE                     IANA zone (default: US/Pacific)");
        return Ok(());
    }

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Flarebot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    // Slack Web API
    let slack = SlackChannel::new(
        SlackConfig::new(&config.slack_bot_token)
            .with_api_base(&config.slack_api_base)
            .with_timeout(config.http_timeout),
    )?;
    let identity = slack.auth_test().await?;
    let bot_name = config.slack_username.clone();
    info!("Authenticated as {} ({})", bot_name, identity.user_id);
    let messaging = Arc::new(slack);

    // Google Drive / Sheets
    let key = ServiceAccountKey::load(&config.google_service_account)?;
    let tokens = Arc::new(ServiceAccountTokens::new(key)?);
    let documents = Arc::new(GoogleDocs::new(
        tokens,
        GoogleEndpoints::default(),
        config.http_timeout,
    )?);

    let cache = TranscriptCache::new();
    let router = CommandRouter::new(&bot_name, &identity.user_id)?;

    let orchestrator = IncidentOrchestrator::new(
        messaging.clone(),
        documents.clone(),
        cache.clone(),
        Arc::new(UuidTokens),
        IncidentSettings {
            bot_name: bot_name.clone(),
            google_domain: config.google_domain.clone(),
            tracking_template_id: config.tracking_template_id.clone(),
            transcript_template_id: config.transcript_template_id.clone(),
            zone: config.timezone,
            resources_url: config.resources_url.clone(),
            status_page_url: config.status_page_url.clone(),
            reminders: config.reminders(),
        },
    );
    let bot = FlareBot::new(
        messaging.clone(),
        documents.clone(),
        orchestrator,
        &config.main_channel,
    );
    let recorder = HistoryRecorder::new(messaging, documents, cache, config.timezone);
    let dispatcher = Dispatcher::new(router, bot, recorder, &identity.user_id);

    let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
    let socket = SlackSocket::new(&config.slack_app_token)
        .with_api_base(&config.slack_api_base)
        .with_reconnect_delay(config.reconnect_delay);

    tokio::spawn(async move {
        if let Err(e) = socket.run(tx).await {
            error!("Socket Mode client stopped: {:#}", e);
        }
    });

    tokio::select! {
        _ = dispatcher.run(rx) => info!("Dispatcher finished"),
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}

