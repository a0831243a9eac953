// In-memory rule state for link moderation.
//
// The store owns four structures: per-channel block rules, per-guild
// global block rules, per-guild allowlists, and the set of channels with
// watchman mode enabled. All mutation goes through the explicit add/remove
// operations below; persistence is layered on top via the snapshot
// projection in `snapshot.rs`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("No matching entry to remove")]
    NotFound,

    #[error("Watchman mode is already enabled for that channel")]
    AlreadyEnabled,

    #[error("Watchman mode is not enabled for that channel")]
    NotEnabled,
}

/// Per-guild exemption lists. Users and roles on the list bypass every
/// block rule in the guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowList {
    pub users: Vec<u64>,
    pub roles: Vec<u64>,
}

impl AllowList {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.roles.is_empty()
    }
}

/// Aggregate counts over the store, for the stats command.
///
/// Emptied rule sets stay in their maps, so "with rules" counts only
/// sets that still hold at least one entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleStats {
    pub channels_with_rules: usize,
    pub guilds_with_global_rules: usize,
    pub guilds_with_allowlists: usize,
    pub watchman_channels: usize,
    pub channel_rule_total: usize,
    pub global_rule_total: usize,
}

/// The single shared mutable resource of the bot.
///
/// Partials are stored lowercased and unique, in insertion order - match
/// evaluation iterates them in that order. Rule sets and allowlists are
/// created lazily on first add and never pruned when emptied.
#[derive(Debug, Default, PartialEq)]
pub struct RuleStore {
    pub(crate) block_rules: HashMap<u64, Vec<String>>,
    pub(crate) global_block_rules: HashMap<u64, Vec<String>>,
    pub(crate) allow_lists: HashMap<u64, AllowList>,
    pub(crate) watchman_channels: HashSet<u64>,
}

fn insert_partial(rules: &mut Vec<String>, partial: &str) {
    let partial = partial.to_lowercase();
    if !rules.contains(&partial) {
        rules.push(partial);
    }
}

fn remove_partial(rules: Option<&mut Vec<String>>, partial: &str) -> Result<(), RuleError> {
    let rules = rules.ok_or(RuleError::NotFound)?;
    let partial = partial.to_lowercase();
    let idx = rules
        .iter()
        .position(|p| *p == partial)
        .ok_or(RuleError::NotFound)?;
    rules.remove(idx);
    // An emptied set stays in the map; re-querying returns the existing
    // empty set rather than recreating it.
    Ok(())
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block links containing `partial` in a channel. Idempotent: re-adding
    /// an existing partial is a no-op success.
    pub fn add_channel_rule(&mut self, channel_id: u64, partial: &str) {
        insert_partial(self.block_rules.entry(channel_id).or_default(), partial);
    }

    pub fn remove_channel_rule(&mut self, channel_id: u64, partial: &str) -> Result<(), RuleError> {
        remove_partial(self.block_rules.get_mut(&channel_id), partial)
    }

    /// Block links containing `partial` everywhere in a guild.
    pub fn add_global_rule(&mut self, guild_id: u64, partial: &str) {
        insert_partial(self.global_block_rules.entry(guild_id).or_default(), partial);
    }

    pub fn remove_global_rule(&mut self, guild_id: u64, partial: &str) -> Result<(), RuleError> {
        remove_partial(self.global_block_rules.get_mut(&guild_id), partial)
    }

    /// Exempt a user from all block rules in a guild. Creates the guild's
    /// allowlist on first use.
    pub fn allow_user(&mut self, guild_id: u64, user_id: u64) {
        let list = self.allow_lists.entry(guild_id).or_default();
        if !list.users.contains(&user_id) {
            list.users.push(user_id);
        }
    }

    pub fn disallow_user(&mut self, guild_id: u64, user_id: u64) -> Result<(), RuleError> {
        let list = self.allow_lists.get_mut(&guild_id).ok_or(RuleError::NotFound)?;
        let idx = list
            .users
            .iter()
            .position(|u| *u == user_id)
            .ok_or(RuleError::NotFound)?;
        list.users.remove(idx);
        Ok(())
    }

    pub fn allow_role(&mut self, guild_id: u64, role_id: u64) {
        let list = self.allow_lists.entry(guild_id).or_default();
        if !list.roles.contains(&role_id) {
            list.roles.push(role_id);
        }
    }

    pub fn disallow_role(&mut self, guild_id: u64, role_id: u64) -> Result<(), RuleError> {
        let list = self.allow_lists.get_mut(&guild_id).ok_or(RuleError::NotFound)?;
        let idx = list
            .roles
            .iter()
            .position(|r| *r == role_id)
            .ok_or(RuleError::NotFound)?;
        list.roles.remove(idx);
        Ok(())
    }

    /// Toggle watchman mode for a channel. Fails when the requested state
    /// already holds so the caller can report the no-op.
    pub fn set_watchman(&mut self, channel_id: u64, enabled: bool) -> Result<(), RuleError> {
        if enabled {
            if !self.watchman_channels.insert(channel_id) {
                return Err(RuleError::AlreadyEnabled);
            }
        } else if !self.watchman_channels.remove(&channel_id) {
            return Err(RuleError::NotEnabled);
        }
        Ok(())
    }

    pub fn watchman_enabled(&self, channel_id: u64) -> bool {
        self.watchman_channels.contains(&channel_id)
    }

    /// Blocked partials for a channel, empty when none were ever added.
    pub fn channel_rules(&self, channel_id: u64) -> &[String] {
        self.block_rules
            .get(&channel_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Server-wide blocked partials for a guild.
    pub fn global_rules(&self, guild_id: u64) -> &[String] {
        self.global_block_rules
            .get(&guild_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The guild's allowlist; empty lists when the guild has none.
    pub fn allowlist(&self, guild_id: u64) -> AllowList {
        self.allow_lists.get(&guild_id).cloned().unwrap_or_default()
    }

    /// Whether a user bypasses block rules in a guild, either directly or
    /// through one of their roles.
    pub fn is_exempt(&self, guild_id: u64, user_id: u64, role_ids: &[u64]) -> bool {
        match self.allow_lists.get(&guild_id) {
            Some(list) => {
                list.users.contains(&user_id)
                    || role_ids.iter().any(|role| list.roles.contains(role))
            }
            None => false,
        }
    }

    pub fn stats(&self) -> RuleStats {
        RuleStats {
            channels_with_rules: self.block_rules.values().filter(|r| !r.is_empty()).count(),
            guilds_with_global_rules: self
                .global_block_rules
                .values()
                .filter(|r| !r.is_empty())
                .count(),
            guilds_with_allowlists: self.allow_lists.values().filter(|l| !l.is_empty()).count(),
            watchman_channels: self.watchman_channels.len(),
            channel_rule_total: self.block_rules.values().map(Vec::len).sum(),
            global_rule_total: self.global_block_rules.values().map(Vec::len).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_channel_rule_is_idempotent() {
        let mut store = RuleStore::new();
        store.add_channel_rule(1, "tiktok");
        store.add_channel_rule(1, "tiktok");

        assert_eq!(store.channel_rules(1), ["tiktok"]);
    }

    #[test]
    fn test_partials_are_stored_lowercased() {
        let mut store = RuleStore::new();
        store.add_channel_rule(1, "TikTok");
        store.add_channel_rule(1, "tiktok");

        assert_eq!(store.channel_rules(1), ["tiktok"]);
    }

    #[test]
    fn test_add_remove_symmetry_and_third_call_fails() {
        let mut store = RuleStore::new();
        store.add_channel_rule(1, "tiktok");

        assert_eq!(store.remove_channel_rule(1, "tiktok"), Ok(()));
        assert!(store.channel_rules(1).is_empty());
        assert_eq!(
            store.remove_channel_rule(1, "tiktok"),
            Err(RuleError::NotFound)
        );
    }

    #[test]
    fn test_remove_from_unknown_channel_fails() {
        let mut store = RuleStore::new();
        assert_eq!(
            store.remove_channel_rule(99, "tiktok"),
            Err(RuleError::NotFound)
        );
    }

    #[test]
    fn test_rules_keep_insertion_order() {
        let mut store = RuleStore::new();
        store.add_global_rule(7, "zebra");
        store.add_global_rule(7, "aardvark");

        assert_eq!(store.global_rules(7), ["zebra", "aardvark"]);
    }

    #[test]
    fn test_channel_and_global_scopes_are_independent() {
        let mut store = RuleStore::new();
        store.add_channel_rule(1, "tiktok");
        store.add_global_rule(1, "spam");

        assert_eq!(store.channel_rules(1), ["tiktok"]);
        assert_eq!(store.global_rules(1), ["spam"]);
        assert!(store.channel_rules(2).is_empty());
        assert!(store.global_rules(2).is_empty());
    }

    #[test]
    fn test_allowlist_created_lazily_and_queried_safely() {
        let mut store = RuleStore::new();
        assert!(store.allowlist(5).is_empty());

        store.allow_user(5, 100);
        store.allow_role(5, 200);
        let list = store.allowlist(5);
        assert_eq!(list.users, [100]);
        assert_eq!(list.roles, [200]);
    }

    #[test]
    fn test_disallow_absent_entry_fails() {
        let mut store = RuleStore::new();
        assert_eq!(store.disallow_user(5, 100), Err(RuleError::NotFound));

        store.allow_user(5, 100);
        assert_eq!(store.disallow_user(5, 100), Ok(()));
        assert_eq!(store.disallow_user(5, 100), Err(RuleError::NotFound));
        assert_eq!(store.disallow_role(5, 200), Err(RuleError::NotFound));
    }

    #[test]
    fn test_is_exempt_matches_user_or_role() {
        let mut store = RuleStore::new();
        store.allow_user(5, 100);
        store.allow_role(5, 200);

        assert!(store.is_exempt(5, 100, &[]));
        assert!(store.is_exempt(5, 999, &[200, 201]));
        assert!(!store.is_exempt(5, 999, &[201]));
        // Scoped per guild.
        assert!(!store.is_exempt(6, 100, &[200]));
    }

    #[test]
    fn test_watchman_toggle_rejects_redundant_state() {
        let mut store = RuleStore::new();
        assert_eq!(store.set_watchman(1, false), Err(RuleError::NotEnabled));

        assert_eq!(store.set_watchman(1, true), Ok(()));
        assert!(store.watchman_enabled(1));
        assert_eq!(store.set_watchman(1, true), Err(RuleError::AlreadyEnabled));

        assert_eq!(store.set_watchman(1, false), Ok(()));
        assert!(!store.watchman_enabled(1));
    }

    #[test]
    fn test_stats_count_only_non_empty_sets() {
        let mut store = RuleStore::new();
        store.add_channel_rule(1, "a");
        store.add_channel_rule(2, "b");
        store.add_channel_rule(2, "c");
        store.add_global_rule(10, "d");
        store.allow_user(10, 100);
        store.set_watchman(1, true).unwrap();

        // Empty out channel 1; the entry stays but no longer counts.
        store.remove_channel_rule(1, "a").unwrap();
        // Same for an emptied allowlist.
        store.allow_user(11, 101);
        store.disallow_user(11, 101).unwrap();

        let stats = store.stats();
        assert_eq!(stats.channels_with_rules, 1);
        assert_eq!(stats.guilds_with_global_rules, 1);
        assert_eq!(stats.guilds_with_allowlists, 1);
        assert_eq!(stats.watchman_channels, 1);
        assert_eq!(stats.channel_rule_total, 2);
        assert_eq!(stats.global_rule_total, 1);
    }
}
