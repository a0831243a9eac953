// Discord layer - commands and event handlers.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "moderation/mod.rs"]
pub mod moderation;

use std::sync::Arc;

use crate::core::moderation::LinkGuardService;
use crate::infra::moderation::JsonSnapshotStore;

/// Type alias for our bot's context.
/// This is what every command receives as its first parameter.
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Data that's shared across all commands and event handlers.
pub struct Data {
    pub linkguard: Arc<LinkGuardService<JsonSnapshotStore>>,
}
