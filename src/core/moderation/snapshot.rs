// Durable projection of the rule state.
//
// The snapshot is the on-disk contract: every set becomes an ordered
// sequence, every map a key-ordered record. The projection in both
// directions is pure; reading and writing bytes is the `SnapshotStore`
// port, implemented in the infra layer.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::rule_store::{AllowList, RuleStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Serializable form of a [`RuleStore`].
///
/// Field names stay camelCase so snapshot files written by earlier
/// deployments of the bot load unchanged. Every field defaults, so older
/// snapshots that predate a field (e.g. `watchmanChannels`) still
/// deserialize to empty collections instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleSnapshot {
    pub block_rules: BTreeMap<u64, Vec<String>>,
    pub global_block_rules: BTreeMap<u64, Vec<String>>,
    pub allow_lists: BTreeMap<u64, AllowList>,
    pub watchman_channels: Vec<u64>,
}

impl RuleStore {
    /// Project the store into its durable form. Pure and total.
    pub fn snapshot(&self) -> RuleSnapshot {
        let mut watchman_channels: Vec<u64> = self.watchman_channels.iter().copied().collect();
        watchman_channels.sort_unstable();

        RuleSnapshot {
            block_rules: self
                .block_rules
                .iter()
                .map(|(id, rules)| (*id, rules.clone()))
                .collect(),
            global_block_rules: self
                .global_block_rules
                .iter()
                .map(|(id, rules)| (*id, rules.clone()))
                .collect(),
            allow_lists: self
                .allow_lists
                .iter()
                .map(|(id, list)| (*id, list.clone()))
                .collect(),
            watchman_channels,
        }
    }

    /// Inverse projection.
    pub fn from_snapshot(snapshot: RuleSnapshot) -> Self {
        Self {
            block_rules: snapshot.block_rules.into_iter().collect(),
            global_block_rules: snapshot.global_block_rules.into_iter().collect(),
            allow_lists: snapshot.allow_lists.into_iter().collect(),
            watchman_channels: snapshot.watchman_channels.into_iter().collect(),
        }
    }
}

/// Port for reading and writing durable snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the canonical snapshot. A missing snapshot is the expected
    /// first-run state and yields the empty default, not an error.
    async fn load(&self) -> Result<RuleSnapshot, StoreError>;

    /// Overwrite the canonical snapshot with the full current state -
    /// never incremental, never append.
    async fn save(&self, snapshot: &RuleSnapshot) -> Result<(), StoreError>;

    /// Write a timestamp-named copy next to the canonical snapshot without
    /// touching it. Returns the backup file name.
    async fn backup(&self, snapshot: &RuleSnapshot) -> Result<String, StoreError>;
}
