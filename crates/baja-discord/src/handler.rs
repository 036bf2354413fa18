use std::collections::HashSet;
use std::sync::Arc;

use baja_core::ChatPlatform;
use baja_scheduler::TargetType;
use baja_summarizer::summarizer::MAX_TITLE_LEN;
use serenity::async_trait;
use serenity::builder::EditThread;
use serenity::model::application::Interaction;
use serenity::model::channel::{Channel, ChannelType, GuildChannel, Message};
use serenity::model::gateway::Ready;
use serenity::model::id::{GuildId, MessageId, UserId};
use serenity::prelude::{Context, EventHandler};
use tracing::{debug, info, warn};

use crate::context::BotContext;
use crate::error::Result;

/// Messages fetched past the rename threshold, so a busier thread is seen
/// as past it rather than at it.
const RENAME_SLACK: usize = 5;

/// Serenity event handler: commands, thread titling, subscription fan-out.
pub struct DiscordHandler {
    pub app: Arc<BotContext>,
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(name = %ready.user.name, guilds = ready.guilds.len(), "Discord bot connected");
        let guild = self.app.config.guild_id.map(GuildId::new);
        crate::commands::register_commands(&ctx, guild).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.guild_id.is_none() || !self.app.config.rename_threads {
            return;
        }
        if let Err(e) = maybe_rename_thread(&self.app, &ctx, &msg).await {
            warn!(thread_id = msg.channel_id.get(), error = %e, "thread rename failed");
        }
    }

    async fn thread_create(&self, ctx: Context, thread: GuildChannel) {
        if let Err(e) = add_subscribers(&self.app, &ctx, &thread).await {
            warn!(
                guild_id = thread.guild_id.get(),
                thread_id = thread.id.get(),
                error = %e,
                "subscription fan-out failed"
            );
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                crate::commands::handle_command(&self.app, &ctx, &command).await
            }
            Interaction::Component(component) => {
                crate::commands::handle_component(&self.app, &ctx, &component).await
            }
            _ => {}
        }
    }
}

fn is_thread(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    )
}

/// A thread still named after its starter message, at exactly the
/// threshold message count, gets a generated title.
///
/// Discord truncates long starter text when it becomes the name, so a name
/// at the length cap only has to be a prefix of the starter.
pub fn should_rename(thread_name: &str, starter: &str, messages: usize, threshold: usize) -> bool {
    if messages != threshold {
        return false;
    }
    let starter = starter.trim();
    if starter.is_empty() {
        return false;
    }
    starter == thread_name
        || (thread_name.chars().count() == MAX_TITLE_LEN && starter.starts_with(thread_name))
}

async fn maybe_rename_thread(app: &BotContext, ctx: &Context, msg: &Message) -> Result<()> {
    let Channel::Guild(thread) = msg.channel_id.to_channel(ctx).await? else {
        return Ok(());
    };
    if !is_thread(thread.kind) {
        return Ok(());
    }
    let threshold = app.config.rename_after_messages;
    if thread
        .message_count
        .is_some_and(|n| n as usize > threshold + RENAME_SLACK)
    {
        return Ok(());
    }
    let Some(parent) = thread.parent_id else {
        return Ok(());
    };

    // A thread started from a message shares that message's id.
    let starter = match parent
        .message(&ctx.http, MessageId::new(thread.id.get()))
        .await
    {
        Ok(m) => m,
        Err(_) => return Ok(()),
    };

    let messages = app
        .platform
        .history(thread.id.get(), None, threshold + RENAME_SLACK)
        .await?;
    if !should_rename(&thread.name, &starter.content, messages.len(), threshold) {
        return Ok(());
    }

    let Some(title) = app.summarizer.title(&messages).await? else {
        debug!(thread_id = thread.id.get(), "no title generated");
        return Ok(());
    };
    thread
        .id
        .edit_thread(&ctx.http, EditThread::new().name(&title))
        .await?;
    info!(thread_id = thread.id.get(), %title, "thread renamed");
    Ok(())
}

/// Channel subscribers first, then category subscribers, without repeats
/// and without the thread's creator.
pub fn merge_subscribers(
    channel: Vec<u64>,
    category: Vec<u64>,
    owner: Option<u64>,
) -> Vec<u64> {
    let mut seen: HashSet<u64> = owner.into_iter().collect();
    channel
        .into_iter()
        .chain(category)
        .filter(|id| seen.insert(*id))
        .collect()
}

async fn add_subscribers(app: &BotContext, ctx: &Context, thread: &GuildChannel) -> Result<()> {
    let Some(parent) = thread.parent_id else {
        return Ok(());
    };
    let guild = thread.guild_id.get();
    let category = match parent.to_channel(ctx).await? {
        Channel::Guild(channel) => channel.parent_id,
        _ => None,
    };

    let store = app.store();
    let channel_subs = store.subscribers(guild, parent.get(), TargetType::Channel)?;
    let category_subs = match category {
        Some(c) => store.subscribers(guild, c.get(), TargetType::Category)?,
        None => Vec::new(),
    };
    let users = merge_subscribers(channel_subs, category_subs, thread.owner_id.map(|u| u.get()));
    if users.is_empty() {
        return Ok(());
    }

    let mut added = 0;
    for user in &users {
        match thread
            .id
            .add_thread_member(&ctx.http, UserId::new(*user))
            .await
        {
            Ok(()) => added += 1,
            Err(e) => warn!(
                thread_id = thread.id.get(),
                user_id = *user,
                error = %e,
                "failed to add subscriber to thread"
            ),
        }
    }
    info!(
        guild_id = guild,
        thread_id = thread.id.get(),
        added,
        subscribers = users.len(),
        "subscribers added to new thread"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renames_only_at_threshold_while_named_after_starter() {
        assert!(should_rename("Brake lines?", "Brake lines?", 3, 3));
        assert!(!should_rename("Brake lines?", "Brake lines?", 2, 3));
        assert!(!should_rename("Brake lines?", "Brake lines?", 4, 3));
        assert!(!should_rename("Brakes", "Brake lines?", 3, 3));
        assert!(!should_rename("", "", 3, 3));
    }

    #[test]
    fn truncated_names_still_match_their_starter() {
        let starter = "x".repeat(150);
        let name = "x".repeat(MAX_TITLE_LEN);
        assert!(should_rename(&name, &starter, 3, 3));
        assert!(!should_rename(&"x".repeat(40), &starter, 3, 3));
    }

    #[test]
    fn subscribers_are_merged_without_repeats_or_owner() {
        let users = merge_subscribers(vec![1, 2, 3], vec![3, 4, 1, 5], Some(2));
        assert_eq!(users, vec![1, 3, 4, 5]);
        assert!(merge_subscribers(vec![], vec![], None).is_empty());
    }
}
