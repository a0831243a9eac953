// Link moderation service - core decision logic for deleting messages
// whose links match configured blocked partials.
//
// This service handles:
// - The allowlist -> rule-selection -> scan -> delete/skip state machine
// - Watchman mode (re-scanning a short window of recent messages)
// - Persisting the rule state after every mutation
//
// NO Discord dependencies here - the platform is reached through the
// `MessageGateway` port.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use super::match_engine::find_blocked_partial;
use super::moderation_models::{InboundMessage, RuleScope, ScanOutcome, SkipReason};
use super::rule_store::{AllowList, RuleError, RuleStats, RuleStore};
use super::snapshot::{RuleSnapshot, SnapshotStore, StoreError};

/// How many recent messages a watchman scan covers: the newest message
/// plus five predecessors.
pub const WATCHMAN_WINDOW: usize = 6;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("History fetch failed: {0}")]
    FetchFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),
}

#[derive(Debug, Error)]
pub enum LinkGuardError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("Failed to persist rule state: {0}")]
    Persist(#[from] StoreError),
}

// ============================================================================
// GATEWAY TRAIT (PORT)
// ============================================================================

/// Platform operations the decision engine needs.
///
/// The core only decides *whether* to delete and *which* message; fetching
/// history and performing the delete belong to the adapter behind this
/// trait.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Whether the bot itself may delete messages in the guild.
    async fn can_manage_messages(&self, guild_id: u64) -> bool;

    /// The `limit` most recent messages in a channel, newest first.
    async fn fetch_recent(
        &self,
        channel_id: u64,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, GatewayError>;

    async fn delete_message(&self, channel_id: u64, message_id: u64)
        -> Result<(), GatewayError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Link moderation service: owns the rule state and runs the per-message
/// scan. Shared by the command path and the message-monitoring path.
pub struct LinkGuardService<P: SnapshotStore> {
    rules: RwLock<RuleStore>,
    snapshots: P,
}

impl<P: SnapshotStore> LinkGuardService<P> {
    /// Load the persisted rule state. An unreadable or malformed snapshot
    /// is logged and degrades to an empty store - startup never aborts
    /// over bad rule data.
    pub async fn load(snapshots: P) -> Self {
        let snapshot = match snapshots.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("Failed to load rule snapshot, starting empty: {}", e);
                RuleSnapshot::default()
            }
        };

        Self {
            rules: RwLock::new(RuleStore::from_snapshot(snapshot)),
            snapshots,
        }
    }

    /// Apply a mutation and write the full snapshot. The in-memory change
    /// is kept even when the write fails; the caller reports the failure
    /// and the next successful save catches up.
    async fn mutate<F>(&self, op: F) -> Result<(), LinkGuardError>
    where
        F: FnOnce(&mut RuleStore) -> Result<(), RuleError>,
    {
        let snapshot = {
            let mut rules = self.rules.write().await;
            op(&mut rules)?;
            rules.snapshot()
        };

        self.snapshots.save(&snapshot).await?;
        Ok(())
    }

    pub async fn block_channel(
        &self,
        channel_id: u64,
        partial: &str,
    ) -> Result<(), LinkGuardError> {
        self.mutate(|rules| {
            rules.add_channel_rule(channel_id, partial);
            Ok(())
        })
        .await
    }

    pub async fn unblock_channel(
        &self,
        channel_id: u64,
        partial: &str,
    ) -> Result<(), LinkGuardError> {
        self.mutate(|rules| rules.remove_channel_rule(channel_id, partial))
            .await
    }

    pub async fn block_global(&self, guild_id: u64, partial: &str) -> Result<(), LinkGuardError> {
        self.mutate(|rules| {
            rules.add_global_rule(guild_id, partial);
            Ok(())
        })
        .await
    }

    pub async fn unblock_global(&self, guild_id: u64, partial: &str) -> Result<(), LinkGuardError> {
        self.mutate(|rules| rules.remove_global_rule(guild_id, partial))
            .await
    }

    pub async fn allow_user(&self, guild_id: u64, user_id: u64) -> Result<(), LinkGuardError> {
        self.mutate(|rules| {
            rules.allow_user(guild_id, user_id);
            Ok(())
        })
        .await
    }

    pub async fn disallow_user(&self, guild_id: u64, user_id: u64) -> Result<(), LinkGuardError> {
        self.mutate(|rules| rules.disallow_user(guild_id, user_id)).await
    }

    pub async fn allow_role(&self, guild_id: u64, role_id: u64) -> Result<(), LinkGuardError> {
        self.mutate(|rules| {
            rules.allow_role(guild_id, role_id);
            Ok(())
        })
        .await
    }

    pub async fn disallow_role(&self, guild_id: u64, role_id: u64) -> Result<(), LinkGuardError> {
        self.mutate(|rules| rules.disallow_role(guild_id, role_id)).await
    }

    pub async fn set_watchman(
        &self,
        channel_id: u64,
        enabled: bool,
    ) -> Result<(), LinkGuardError> {
        self.mutate(|rules| rules.set_watchman(channel_id, enabled)).await
    }

    pub async fn channel_rules(&self, channel_id: u64) -> Vec<String> {
        self.rules.read().await.channel_rules(channel_id).to_vec()
    }

    pub async fn global_rules(&self, guild_id: u64) -> Vec<String> {
        self.rules.read().await.global_rules(guild_id).to_vec()
    }

    pub async fn allowlist(&self, guild_id: u64) -> AllowList {
        self.rules.read().await.allowlist(guild_id)
    }

    pub async fn watchman_enabled(&self, channel_id: u64) -> bool {
        self.rules.read().await.watchman_enabled(channel_id)
    }

    pub async fn stats(&self) -> RuleStats {
        self.rules.read().await.stats()
    }

    /// Write a timestamp-named copy of the current state. Failures are
    /// logged and swallowed - a failed backup never crashes the caller.
    pub async fn backup(&self) -> Option<String> {
        let snapshot = self.rules.read().await.snapshot();
        match self.snapshots.backup(&snapshot).await {
            Ok(name) => Some(name),
            Err(e) => {
                tracing::warn!("Rule backup failed: {}", e);
                None
            }
        }
    }

    /// Run the moderation state machine for a newly arrived message.
    ///
    /// Allowlist exemption is absolute and short-circuits everything.
    /// Without watchman mode only the new message is evaluated - channel
    /// rules first, and only if they did not delete, global rules. With
    /// watchman mode the recent window is re-scanned instead: the channel
    /// pass covers the whole window before the global pass starts, and the
    /// first match ends the scan whether or not its delete succeeds.
    pub async fn scan_message<G: MessageGateway>(
        &self,
        gateway: &G,
        message: &InboundMessage,
    ) -> ScanOutcome {
        if message.author_is_bot {
            return ScanOutcome::Skipped(SkipReason::BotAuthor);
        }
        let Some(guild_id) = message.guild_id else {
            return ScanOutcome::Skipped(SkipReason::NoGuild);
        };
        let Some(text) = message.text.as_deref() else {
            return ScanOutcome::Skipped(SkipReason::NoText);
        };

        // Copy what the scan needs out of the lock before any suspension
        // point (history fetch, delete).
        let (exempt, watchman, channel_rules, global_rules) = {
            let rules = self.rules.read().await;
            (
                rules.is_exempt(guild_id, message.author_id, &message.author_role_ids),
                rules.watchman_enabled(message.channel_id),
                rules.channel_rules(message.channel_id).to_vec(),
                rules.global_rules(guild_id).to_vec(),
            )
        };

        if exempt {
            return ScanOutcome::Skipped(SkipReason::Allowlisted);
        }

        if !watchman {
            if let Some(partial) = find_blocked_partial(text, &channel_rules) {
                return attempt_delete(gateway, guild_id, message, partial, RuleScope::Channel)
                    .await;
            }
            if let Some(partial) = find_blocked_partial(text, &global_rules) {
                return attempt_delete(gateway, guild_id, message, partial, RuleScope::Global)
                    .await;
            }
            return ScanOutcome::Skipped(SkipReason::NoMatch);
        }

        // Watchman: re-examine recent history instead of only the new
        // message. Edit events are not reliably delivered for this
        // deployment's intents, so the window is re-scanned on every
        // arrival in the channel.
        let window = match gateway.fetch_recent(message.channel_id, WATCHMAN_WINDOW).await {
            Ok(window) => window,
            Err(e) => {
                tracing::warn!(
                    channel_id = message.channel_id,
                    "History fetch failed, scanning newest message only: {}",
                    e
                );
                vec![message.clone()]
            }
        };

        for (rules, scope) in [
            (&channel_rules, RuleScope::Channel),
            (&global_rules, RuleScope::Global),
        ] {
            for candidate in &window {
                if candidate.author_is_bot {
                    continue;
                }
                let Some(text) = candidate.text.as_deref() else {
                    continue;
                };
                if let Some(partial) = find_blocked_partial(text, rules) {
                    return attempt_delete(gateway, guild_id, candidate, partial, scope).await;
                }
            }
        }

        ScanOutcome::Skipped(SkipReason::NoMatch)
    }
}

/// Confirm permission, then ask the gateway to remove the matched message.
/// A missing permission abandons the decision; a rejected delete is logged
/// and reported as a skip, which also halts a watchman scan.
async fn attempt_delete<G: MessageGateway>(
    gateway: &G,
    guild_id: u64,
    message: &InboundMessage,
    partial: &str,
    scope: RuleScope,
) -> ScanOutcome {
    if !gateway.can_manage_messages(guild_id).await {
        tracing::warn!(
            guild_id,
            channel_id = message.channel_id,
            "Missing manage-messages permission, leaving matched message in place"
        );
        return ScanOutcome::Skipped(SkipReason::MissingPermission);
    }

    match gateway
        .delete_message(message.channel_id, message.message_id)
        .await
    {
        Ok(()) => ScanOutcome::Deleted {
            message_id: message.message_id,
            partial: partial.to_string(),
            scope,
        },
        Err(e) => {
            tracing::warn!(
                channel_id = message.channel_id,
                message_id = message.message_id,
                "Could not delete matched message: {}",
                e
            );
            ScanOutcome::Skipped(SkipReason::DeleteFailed)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
