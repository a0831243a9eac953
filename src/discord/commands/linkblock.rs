// Slash commands for configuring link moderation.
//
// **Notice the pattern:**
// 1. Extract primitive data from Discord types
// 2. Call core service
// 3. Format the response based on the result
//
// This layer is THIN - no business logic, just translation.

use crate::core::moderation::{LinkGuardError, WATCHMAN_WINDOW};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Render a mutation result. Expected no-op cases (removing something
/// that isn't there, toggling watchman to its current state) become a
/// warning reply; a failed snapshot write is reported but the change
/// stays active in memory.
fn mutation_text(result: Result<(), LinkGuardError>, ok: String, noop: String) -> String {
    match result {
        Ok(()) => ok,
        Err(LinkGuardError::Rule(_)) => format!("⚠️ {}", noop),
        Err(LinkGuardError::Persist(e)) => {
            tracing::error!("Failed to persist rule change: {}", e);
            format!(
                "⚠️ The change is active, but writing it to disk failed: {}",
                e
            )
        }
    }
}

fn format_partials(partials: &[String]) -> String {
    if partials.is_empty() {
        "*(none)*".to_string()
    } else {
        partials
            .iter()
            .map(|p| format!("`{}`", p))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Link block rules.
///
/// Delete messages whose links contain blocked substrings.
#[poise::command(
    slash_command,
    subcommands("add", "remove", "add_global", "remove_global", "list", "stats", "backup"),
    required_permissions = "MANAGE_MESSAGES",
    guild_only
)]
pub async fn linkblock(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

/// Block links containing a substring in a channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Substring to block (e.g. tiktok)"] partial: String,
    #[description = "Channel to block it in (defaults to this one)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let channel_id = channel
        .as_ref()
        .map(|c| c.id.get())
        .unwrap_or_else(|| ctx.channel_id().get());

    let result = ctx.data().linkguard.block_channel(channel_id, &partial).await;
    let partial = partial.to_lowercase();

    ctx.say(mutation_text(
        result,
        format!(
            "🔒 Links containing `{}` are now blocked in <#{}>.",
            partial, channel_id
        ),
        String::new(),
    ))
    .await?;
    Ok(())
}

/// Unblock a substring in a channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Substring to unblock"] partial: String,
    #[description = "Channel to unblock it in (defaults to this one)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let channel_id = channel
        .as_ref()
        .map(|c| c.id.get())
        .unwrap_or_else(|| ctx.channel_id().get());

    let result = ctx
        .data()
        .linkguard
        .unblock_channel(channel_id, &partial)
        .await;
    let partial = partial.to_lowercase();

    ctx.say(mutation_text(
        result,
        format!(
            "🔓 Links containing `{}` are no longer blocked in <#{}>.",
            partial, channel_id
        ),
        format!("`{}` was not blocked in <#{}>.", partial, channel_id),
    ))
    .await?;
    Ok(())
}

/// Block links containing a substring everywhere in this server.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn add_global(
    ctx: Context<'_>,
    #[description = "Substring to block server-wide"] partial: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();

    let result = ctx.data().linkguard.block_global(guild_id, &partial).await;
    let partial = partial.to_lowercase();

    ctx.say(mutation_text(
        result,
        format!(
            "🔒 Links containing `{}` are now blocked server-wide.",
            partial
        ),
        String::new(),
    ))
    .await?;
    Ok(())
}

/// Unblock a server-wide substring.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn remove_global(
    ctx: Context<'_>,
    #[description = "Substring to unblock"] partial: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();

    let result = ctx.data().linkguard.unblock_global(guild_id, &partial).await;
    let partial = partial.to_lowercase();

    ctx.say(mutation_text(
        result,
        format!(
            "🔓 Links containing `{}` are no longer blocked server-wide.",
            partial
        ),
        format!("`{}` was not blocked server-wide.", partial),
    ))
    .await?;
    Ok(())
}

/// Show the blocked substrings for a channel and this server.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn list(
    ctx: Context<'_>,
    #[description = "Channel to inspect (defaults to this one)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();
    let channel_id = channel
        .as_ref()
        .map(|c| c.id.get())
        .unwrap_or_else(|| ctx.channel_id().get());

    let linkguard = &ctx.data().linkguard;
    let channel_rules = linkguard.channel_rules(channel_id).await;
    let global_rules = linkguard.global_rules(guild_id).await;
    let watchman = linkguard.watchman_enabled(channel_id).await;

    let embed = serenity::CreateEmbed::new()
        .title("🔗 Blocked Link Substrings")
        .color(0x5865F2)
        .field(
            format!("In <#{}>", channel_id),
            format_partials(&channel_rules),
            false,
        )
        .field("Server-wide", format_partials(&global_rules), false)
        .field(
            "Watchman",
            if watchman {
                format!("👁️ Enabled (last {} messages re-scanned)", WATCHMAN_WINDOW)
            } else {
                "Disabled".to_string()
            },
            false,
        );

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show aggregate link-moderation counts.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn stats(ctx: Context<'_>) -> Result<(), Error> {
    let stats = ctx.data().linkguard.stats().await;

    let embed = serenity::CreateEmbed::new()
        .title("📊 Link Moderation Stats")
        .color(0x5865F2)
        .field(
            "Channels with rules",
            stats.channels_with_rules.to_string(),
            true,
        )
        .field(
            "Servers with global rules",
            stats.guilds_with_global_rules.to_string(),
            true,
        )
        .field(
            "Servers with allowlists",
            stats.guilds_with_allowlists.to_string(),
            true,
        )
        .field(
            "Watchman channels",
            stats.watchman_channels.to_string(),
            true,
        )
        .field(
            "Channel rules total",
            stats.channel_rule_total.to_string(),
            true,
        )
        .field(
            "Global rules total",
            stats.global_rule_total.to_string(),
            true,
        );

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Write a timestamped backup of the rule state.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn backup(ctx: Context<'_>) -> Result<(), Error> {
    match ctx.data().linkguard.backup().await {
        Some(name) => {
            ctx.say(format!("💾 Rule backup written to `{}`.", name))
                .await?
        }
        None => ctx.say("⚠️ Backup failed - see the logs.").await?,
    };
    Ok(())
}

/// Allowlist for link moderation.
///
/// Exempt users and roles from all link block rules.
#[poise::command(
    slash_command,
    subcommands("user", "remove_user", "role", "remove_role", "show"),
    required_permissions = "MANAGE_MESSAGES",
    guild_only
)]
pub async fn allowlist(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

/// Exempt a user from link blocking.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn user(
    ctx: Context<'_>,
    #[description = "User to exempt"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();

    let result = ctx.data().linkguard.allow_user(guild_id, user.id.get()).await;

    ctx.say(mutation_text(
        result,
        format!("✅ <@{}> is now exempt from link blocking.", user.id),
        String::new(),
    ))
    .await?;
    Ok(())
}

/// Remove a user from the allowlist.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn remove_user(
    ctx: Context<'_>,
    #[description = "User to remove"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();

    let result = ctx
        .data()
        .linkguard
        .disallow_user(guild_id, user.id.get())
        .await;

    ctx.say(mutation_text(
        result,
        format!("✅ <@{}> is no longer exempt from link blocking.", user.id),
        format!("<@{}> was not on the allowlist.", user.id),
    ))
    .await?;
    Ok(())
}

/// Exempt a role from link blocking.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn role(
    ctx: Context<'_>,
    #[description = "Role to exempt"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();

    let result = ctx.data().linkguard.allow_role(guild_id, role.id.get()).await;

    ctx.say(mutation_text(
        result,
        format!("✅ <@&{}> is now exempt from link blocking.", role.id),
        String::new(),
    ))
    .await?;
    Ok(())
}

/// Remove a role from the allowlist.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn remove_role(
    ctx: Context<'_>,
    #[description = "Role to remove"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();

    let result = ctx
        .data()
        .linkguard
        .disallow_role(guild_id, role.id.get())
        .await;

    ctx.say(mutation_text(
        result,
        format!("✅ <@&{}> is no longer exempt from link blocking.", role.id),
        format!("<@&{}> was not on the allowlist.", role.id),
    ))
    .await?;
    Ok(())
}

/// Show this server's allowlist.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn show(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();

    let list = ctx.data().linkguard.allowlist(guild_id).await;

    let users = if list.users.is_empty() {
        "*(none)*".to_string()
    } else {
        list.users
            .iter()
            .map(|id| format!("<@{}>", id))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let roles = if list.roles.is_empty() {
        "*(none)*".to_string()
    } else {
        list.roles
            .iter()
            .map(|id| format!("<@&{}>", id))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let embed = serenity::CreateEmbed::new()
        .title("✅ Link Moderation Allowlist")
        .color(0x57F287)
        .field("Users", users, false)
        .field("Roles", roles, false);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Watchman mode.
///
/// Re-scan recent messages in a channel on every new arrival to catch
/// edit-based evasion.
#[poise::command(
    slash_command,
    subcommands("enable", "disable"),
    required_permissions = "MANAGE_MESSAGES",
    guild_only
)]
pub async fn watchman(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

/// Enable watchman mode for a channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn enable(
    ctx: Context<'_>,
    #[description = "Channel to watch (defaults to this one)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let channel_id = channel
        .as_ref()
        .map(|c| c.id.get())
        .unwrap_or_else(|| ctx.channel_id().get());

    let result = ctx.data().linkguard.set_watchman(channel_id, true).await;

    ctx.say(mutation_text(
        result,
        format!(
            "👁️ Watchman mode enabled for <#{}>: the last {} messages are re-scanned on every new arrival.",
            channel_id, WATCHMAN_WINDOW
        ),
        format!("Watchman mode is already enabled for <#{}>.", channel_id),
    ))
    .await?;
    Ok(())
}

/// Disable watchman mode for a channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn disable(
    ctx: Context<'_>,
    #[description = "Channel to stop watching (defaults to this one)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let channel_id = channel
        .as_ref()
        .map(|c| c.id.get())
        .unwrap_or_else(|| ctx.channel_id().get());

    let result = ctx.data().linkguard.set_watchman(channel_id, false).await;

    ctx.say(mutation_text(
        result,
        format!("👁️ Watchman mode disabled for <#{}>.", channel_id),
        format!("Watchman mode is not enabled for <#{}>.", channel_id),
    ))
    .await?;
    Ok(())
}
