//! Command Table
//!
//! Static trigger patterns with their help text, and the per-room help sets.
//! Patterns are matched after the bot-mention prefix, see [`crate::router`].

/// One chat command
#[derive(Debug, PartialEq, Eq)]
pub struct CommandDefinition {
    /// Regex matched right after the mention prefix
    pub pattern: &'static str,
    pub example: &'static str,
    pub description: &'static str,
}

pub static FIRE_FLARE: CommandDefinition = CommandDefinition {
    pattern: r"[fF]ire (?:a )?(?:retroactive )?(?:.+emptive )?[fF]lare [pP]([012]) *(.*)",
    example: "fire a flare p2 there is still no hottub on the roof",
    description: "Fire a new Flare with the given priority and description",
};

pub static TAKE_LEAD: CommandDefinition = CommandDefinition {
    pattern: r"[iI]('?m?| am?) (the )?incident lead",
    example: "I am incident lead",
    description: "Declare yourself incident lead.",
};

pub static MITIGATED: CommandDefinition = CommandDefinition {
    pattern: r"([Ff]lare )?(is )?mitigated",
    example: "flare mitigated",
    description: "Mark the Flare mitigated.",
};

pub static NOT_A_FLARE: CommandDefinition = CommandDefinition {
    pattern: r"([Ff]lare )?(is )?not a [Ff]lare",
    example: "not a flare",
    description: "Mark the Flare not-a-flare.",
};

pub static HELP: CommandDefinition = CommandDefinition {
    pattern: r"[Hh]elp *$",
    example: "help",
    description: "display the list of commands available in this channel.",
};

pub static HELP_ALL: CommandDefinition = CommandDefinition {
    pattern: r"[Hh]elp [Aa]ll",
    example: "help all",
    description: "display the list of all commands and the channels where they're available.",
};

/// Diagnostics; deliberately absent from every help set
pub static TEST: CommandDefinition = CommandDefinition {
    pattern: r"test *(.*)",
    example: "",
    description: "",
};

/// Catch-all, must stay last in the routing table
pub static FALLBACK: CommandDefinition = CommandDefinition {
    pattern: r".*",
    example: "",
    description: "",
};

/// Commands offered in the main flares channel
pub static MAIN_CHANNEL_COMMANDS: &[&CommandDefinition] = &[&HELP, &HELP_ALL, &FIRE_FLARE];

/// Commands offered inside a single flare channel
pub static FLARE_CHANNEL_COMMANDS: &[&CommandDefinition] =
    &[&HELP, &TAKE_LEAD, &MITIGATED, &NOT_A_FLARE];

/// Commands offered everywhere else
pub static OTHER_CHANNEL_COMMANDS: &[&CommandDefinition] = &[&HELP_ALL];

/// Reply for addressed messages nothing else matched
pub fn not_understood(bot_name: &str) -> String {
    format!(
        "I'm sorry, I didn't understand that command.\n\
         To fire a flare: @{bot} fire a flare <p0|p1|p2> [pre-emptive|retroactive] <problem>\n\
         For other commands: @{bot} help [all]",
        bot = bot_name
    )
}

/// Which help set applies to a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpScope {
    Main,
    Flare,
    Other,
}

impl HelpScope {
    pub fn commands(&self) -> &'static [&'static CommandDefinition] {
        match self {
            Self::Main => MAIN_CHANNEL_COMMANDS,
            Self::Flare => FLARE_CHANNEL_COMMANDS,
            Self::Other => OTHER_CHANNEL_COMMANDS,
        }
    }
}

/// One help line per command: `"@bot: example" - description`
pub fn command_lines(bot_name: &str, commands: &[&CommandDefinition]) -> Vec<String> {
    commands
        .iter()
        .map(|c| format!("\"@{}: {}\" - {}", bot_name, c.example, c.description))
        .collect()
}

/// Full room-scoped help listing, header first
pub fn help_listing(bot_name: &str, scope: HelpScope) -> Vec<String> {
    let commands = scope.commands();
    if commands.is_empty() {
        return vec!["no available commands in this channel.".to_string()];
    }

    let mut lines = vec!["Available commands:".to_string()];
    lines.extend(command_lines(bot_name, commands));
    lines
}

/// Listing of every help set with its section header
pub fn help_all_listing(bot_name: &str) -> Vec<String> {
    let sections = [
        ("Commands Available in the #flares channel:", HelpScope::Main),
        ("Commands Available in a single Flare channel:", HelpScope::Flare),
        ("Commands Available in other channels:", HelpScope::Other),
    ];

    let mut lines = Vec::new();
    for (header, scope) in sections {
        lines.push(header.to_string());
        lines.extend(command_lines(bot_name, scope.commands()));
    }
    lines
}
