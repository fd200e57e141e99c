//! Command patterns and parsing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::chain::Lamports;

/// Base-58 alphabet, 32 to 44 characters (a Solana public key or mint).
const ADDRESS: &str = r"[1-9A-HJ-NP-Za-km-z]{32,44}";

static CREATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?i:create)\s+({ADDRESS})\b")).expect("create regex is valid")
});

static FUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?i:fund)\s+([0-9.]+)\s+({ADDRESS})\b")).expect("fund regex is valid")
});

static EXPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?i:export)\s+([0-9]{6})\b").expect("export regex is valid"));

static WITHDRAW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:withdraw)\s+([0-9]{6})\b").expect("withdraw regex is valid")
});

static UPDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?i:update)\s+([0-9]{6})\b").expect("update regex is valid"));

static ADDRESS_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{ADDRESS}$")).expect("address regex is valid"));

/// A recognized command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open a campaign for a token.
    Create { target: String },
    /// Contribute `amount` (whole SOL, fractional allowed) to the token's active campaign.
    Fund { amount: Lamports, target: String },
    /// Prove authorship for a pending key export.
    Export { code: String },
    /// Prove authorship for a pending withdrawal.
    Withdraw { code: String },
    /// Prove authorship for a pending metadata update.
    Update { code: String },
}

/// Command discriminant, as recorded on processed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    Create,
    Fund,
    Export,
    Withdraw,
    Update,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Create => "CREATE",
            CommandKind::Fund => "FUND",
            CommandKind::Export => "EXPORT",
            CommandKind::Withdraw => "WITHDRAW",
            CommandKind::Update => "UPDATE",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Create { .. } => CommandKind::Create,
            Command::Fund { .. } => CommandKind::Fund,
            Command::Export { .. } => CommandKind::Export,
            Command::Withdraw { .. } => CommandKind::Withdraw,
            Command::Update { .. } => CommandKind::Update,
        }
    }
}

/// Parse post text into a command. The first pattern that matches decides the result.
pub fn parse(text: &str) -> Option<Command> {
    if let Some(caps) = CREATE.captures(text) {
        return Some(Command::Create {
            target: caps[1].to_string(),
        });
    }

    if let Some(caps) = FUND.captures(text) {
        let amount = Lamports::parse_sol(&caps[1])?;
        // Positive but below one lamport still parses; funding rejects it
        if !caps[1].bytes().any(|b| matches!(b, b'1'..=b'9')) {
            return None;
        }
        return Some(Command::Fund {
            amount,
            target: caps[2].to_string(),
        });
    }

    if let Some(caps) = EXPORT.captures(text) {
        return Some(Command::Export {
            code: caps[1].to_string(),
        });
    }

    if let Some(caps) = WITHDRAW.captures(text) {
        return Some(Command::Withdraw {
            code: caps[1].to_string(),
        });
    }

    if let Some(caps) = UPDATE.captures(text) {
        return Some(Command::Update {
            code: caps[1].to_string(),
        });
    }

    None
}

/// Whether `s` is shaped like a base-58 address.
pub fn is_valid_address(s: &str) -> bool {
    ADDRESS_ONLY.is_match(s)
}
