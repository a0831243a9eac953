// Link-moderation domain models - data structures for the scan engine.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts serenity messages into `InboundMessage`
// and renders `ScanOutcome` into logs.

/// A platform message as the moderation core sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: u64,
    pub channel_id: u64,
    /// `None` for direct messages - those are never moderated.
    pub guild_id: Option<u64>,
    pub author_id: u64,
    pub author_is_bot: bool,
    /// Role ids of the author, for allowlist checks.
    pub author_role_ids: Vec<u64>,
    /// `None` when the message carries no readable text
    /// (embed-only message, missing MESSAGE_CONTENT intent).
    pub text: Option<String>,
}

/// Which rule set produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// A rule scoped to the message's channel.
    Channel,
    /// A server-wide rule.
    Global,
}

impl std::fmt::Display for RuleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleScope::Channel => write!(f, "channel"),
            RuleScope::Global => write!(f, "global"),
        }
    }
}

/// Why a scan ended without a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Authored by a bot (including this one).
    BotAuthor,
    /// Direct message - no guild context.
    NoGuild,
    /// Message text unavailable.
    NoText,
    /// The author is exempt via the guild allowlist.
    Allowlisted,
    /// No rule matched.
    NoMatch,
    /// The bot lacks manage-messages permission in the guild.
    MissingPermission,
    /// The matched message could not be removed.
    DeleteFailed,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::BotAuthor => write!(f, "bot author"),
            SkipReason::NoGuild => write!(f, "no guild context"),
            SkipReason::NoText => write!(f, "text unavailable"),
            SkipReason::Allowlisted => write!(f, "author allowlisted"),
            SkipReason::NoMatch => write!(f, "no rule matched"),
            SkipReason::MissingPermission => write!(f, "missing manage-messages permission"),
            SkipReason::DeleteFailed => write!(f, "delete failed"),
        }
    }
}

/// Terminal result of a moderation scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The matched message was removed.
    Deleted {
        message_id: u64,
        /// The blocked partial that fired, lowercased.
        partial: String,
        scope: RuleScope,
    },
    /// No action was taken.
    Skipped(SkipReason),
}

impl ScanOutcome {
    pub fn deleted(&self) -> bool {
        matches!(self, ScanOutcome::Deleted { .. })
    }
}
