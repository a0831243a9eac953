// Discord-specific link handling - translates serenity messages into the
// core's view and carries out its delete decisions.

use anyhow::Result;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;

use crate::core::moderation::{GatewayError, InboundMessage, MessageGateway, ScanOutcome};
use crate::discord::Data;

/// Serenity-backed implementation of the core's platform port.
pub struct SerenityGateway<'a> {
    ctx: &'a serenity::Context,
}

impl<'a> SerenityGateway<'a> {
    pub fn new(ctx: &'a serenity::Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl MessageGateway for SerenityGateway<'_> {
    async fn can_manage_messages(&self, guild_id: u64) -> bool {
        let bot_id = self.ctx.cache.current_user().id;
        let guild_id = serenity::GuildId::new(guild_id);

        // Cache first - permissions need the full guild either way.
        if let Some(guild) = self.ctx.cache.guild(guild_id) {
            if let Some(member) = guild.members.get(&bot_id) {
                return guild.member_permissions(member).manage_messages();
            }
        }

        // Cache miss on our own member - fetch it over HTTP, then compute
        // against the cached guild.
        if let Ok(member) = self.ctx.http.get_member(guild_id, bot_id).await {
            if let Some(guild) = self.ctx.cache.guild(guild_id) {
                return guild.member_permissions(&member).manage_messages();
            }
        }

        tracing::warn!("Could not resolve own permissions in guild {}", guild_id);
        false
    }

    async fn fetch_recent(
        &self,
        channel_id: u64,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, GatewayError> {
        let messages = serenity::ChannelId::new(channel_id)
            .messages(
                &self.ctx.http,
                serenity::GetMessages::new().limit(limit as u8),
            )
            .await
            .map_err(|e| GatewayError::FetchFailed(e.to_string()))?;

        Ok(messages.iter().map(to_inbound).collect())
    }

    async fn delete_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<(), GatewayError> {
        serenity::ChannelId::new(channel_id)
            .delete_message(&self.ctx.http, serenity::MessageId::new(message_id))
            .await
            .map_err(|e| GatewayError::DeleteFailed(e.to_string()))
    }
}

/// Core view of a serenity message. Empty content counts as unavailable
/// text (embed-only message, missing MESSAGE_CONTENT intent).
fn to_inbound(msg: &serenity::Message) -> InboundMessage {
    InboundMessage {
        message_id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        guild_id: msg.guild_id.map(|g| g.get()),
        author_id: msg.author.id.get(),
        author_is_bot: msg.author.bot,
        author_role_ids: msg
            .member
            .as_ref()
            .map(|m| m.roles.iter().map(|r| r.get()).collect())
            .unwrap_or_default(),
        text: if msg.content.is_empty() {
            None
        } else {
            Some(msg.content.clone())
        },
    }
}

/// Run the moderation scan for a newly arrived message.
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<()> {
    let inbound = to_inbound(msg);
    let gateway = SerenityGateway::new(ctx);

    match data.linkguard.scan_message(&gateway, &inbound).await {
        ScanOutcome::Deleted {
            message_id,
            partial,
            scope,
        } => {
            tracing::info!(
                message_id,
                channel_id = msg.channel_id.get(),
                rule_scope = %scope,
                partial = %partial,
                "Deleted message with blocked link"
            );
        }
        ScanOutcome::Skipped(reason) => {
            tracing::debug!(
                channel_id = msg.channel_id.get(),
                reason = %reason,
                "Link scan took no action"
            );
        }
    }

    Ok(())
}
