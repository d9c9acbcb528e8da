//! Command Router
//!
//! Classifies inbound text into at most one [`Command`]. Every binding is the
//! bot-mention prefix followed by a command pattern from [`crate::commands`];
//! bindings are tried in [`ROUTING_TABLE`] order and the first match wins.

use crate::commands::{self, CommandDefinition};
use regex::{Captures, Regex};
use tracing::debug;

/// Flare priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    P0,
    P1,
    P2,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P0 => "p0",
            Priority::P1 => "p1",
            Priority::P2 => "p2",
        }
    }

    fn from_digit(digit: &str) -> Option<Self> {
        match digit {
            "0" => Some(Priority::P0),
            "1" => Some(Priority::P1),
            "2" => Some(Priority::P2),
            _ => None,
        }
    }
}

/// Which binding matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    FireFlare,
    TakeLead,
    Mitigated,
    NotAFlare,
    Help,
    HelpAll,
    Test,
    Fallback,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::FireFlare => "fire_flare",
            CommandKind::TakeLead => "take_lead",
            CommandKind::Mitigated => "mitigated",
            CommandKind::NotAFlare => "not_a_flare",
            CommandKind::Help => "help",
            CommandKind::HelpAll => "help_all",
            CommandKind::Test => "test",
            CommandKind::Fallback => "fallback",
        }
    }

    pub fn definition(&self) -> &'static CommandDefinition {
        match self {
            CommandKind::FireFlare => &commands::FIRE_FLARE,
            CommandKind::TakeLead => &commands::TAKE_LEAD,
            CommandKind::Mitigated => &commands::MITIGATED,
            CommandKind::NotAFlare => &commands::NOT_A_FLARE,
            CommandKind::Help => &commands::HELP,
            CommandKind::HelpAll => &commands::HELP_ALL,
            CommandKind::Test => &commands::TEST,
            CommandKind::Fallback => &commands::FALLBACK,
        }
    }
}

/// Registration order. Never reorder; `Fallback` must stay last.
pub static ROUTING_TABLE: &[CommandKind] = &[
    CommandKind::FireFlare,
    CommandKind::TakeLead,
    CommandKind::Mitigated,
    CommandKind::NotAFlare,
    CommandKind::Help,
    CommandKind::HelpAll,
    CommandKind::Test,
    CommandKind::Fallback,
];

/// A classified message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FireFlare { priority: Priority, topic: String },
    TakeLead,
    Mitigated,
    NotAFlare,
    Help,
    HelpAll,
    Test { note: Option<String> },
    Fallback,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::FireFlare { .. } => CommandKind::FireFlare,
            Command::TakeLead => CommandKind::TakeLead,
            Command::Mitigated => CommandKind::Mitigated,
            Command::NotAFlare => CommandKind::NotAFlare,
            Command::Help => CommandKind::Help,
            Command::HelpAll => CommandKind::HelpAll,
            Command::Test { .. } => CommandKind::Test,
            Command::Fallback => CommandKind::Fallback,
        }
    }
}

struct HandlerBinding {
    pattern: Regex,
    kind: CommandKind,
}

/// Ordered pattern router
pub struct CommandRouter {
    bindings: Vec<HandlerBinding>,
}

/// Regex source for "directed at the bot"
///
/// Accepts `<@ID>`, `<@ID|label>`, `@ID` or `@name` at the start of the message,
/// then an optional colon and whitespace.
pub fn mention_prefix(bot_name: &str, bot_user_id: &str) -> String {
    let name = regex::escape(bot_name.trim());
    let id = regex::escape(bot_user_id.trim());

    if id.is_empty() {
        format!(r"^\s*@{}\b\s*:?\s*", name)
    } else {
        format!(
            r"^\s*(?:<@{id}(?:\|[^>]*)?>|@(?:{name}|{id})\b)\s*:?\s*",
            id = id,
            name = name
        )
    }
}

impl CommandRouter {
    /// Compile all bindings for this bot identity
    pub fn new(bot_name: &str, bot_user_id: &str) -> Result<Self, regex::Error> {
        let prefix = mention_prefix(bot_name, bot_user_id);
        let bindings = ROUTING_TABLE
            .iter()
            .map(|kind| {
                Ok(HandlerBinding {
                    pattern: Regex::new(&format!("{}{}", prefix, kind.definition().pattern))?,
                    kind: *kind,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self { bindings })
    }

    /// First matching command, or `None` when the bot was not addressed
    pub fn route(&self, text: &str) -> Option<Command> {
        for binding in &self.bindings {
            if let Some(captures) = binding.pattern.captures(text) {
                if let Some(command) = build_command(binding.kind, &captures) {
                    debug!("Routed message to {}", binding.kind.as_str());
                    return Some(command);
                }
            }
        }
        None
    }
}

fn capture(captures: &Captures<'_>, index: usize) -> Option<String> {
    captures
        .get(index)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn build_command(kind: CommandKind, captures: &Captures<'_>) -> Option<Command> {
    let command = match kind {
        CommandKind::FireFlare => Command::FireFlare {
            priority: Priority::from_digit(captures.get(1)?.as_str())?,
            topic: capture(captures, 2).unwrap_or_default(),
        },
        CommandKind::TakeLead => Command::TakeLead,
        CommandKind::Mitigated => Command::Mitigated,
        CommandKind::NotAFlare => Command::NotAFlare,
        CommandKind::Help => Command::Help,
        CommandKind::HelpAll => Command::HelpAll,
        CommandKind::Test => Command::Test {
            note: capture(captures, 1),
        },
        CommandKind::Fallback => Command::Fallback,
    };
    Some(command)
}
