//! Slash commands and component clicks.
//!
//! Registration happens in `ready()`. Every handler returns
//! [`Result`](crate::error::Result); the dispatcher turns an `Err` into a
//! reply so no command fails silently.

use std::sync::Arc;

use baja_core::duration::DURATION_HELP;
use baja_core::types::MAX_MESSAGE_LEN;
use baja_core::{parse_duration, window_start, ChatPlatform};
use baja_parts::{NotionClient, Part, StatusField};
use baja_scheduler::schedule::{interval_hours, parse_start_time, parse_timezone};
use baja_scheduler::{NewSchedule, Schedule, ScheduleKind, TargetType, TaskState};
use baja_summarizer::SummaryError;
use chrono::{NaiveTime, Utc};
use serenity::builder::{
    CreateAttachment, CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
};
use serenity::model::application::{
    CommandInteraction, CommandOptionType, ComponentInteraction, ComponentInteractionDataKind,
};
use serenity::model::channel::ChannelType;
use serenity::model::id::{ChannelId, GuildId};
use serenity::model::permissions::Permissions;
use serenity::prelude::Context;
use tracing::{info, warn};

use crate::context::BotContext;
use crate::embed::{part_embed, search_buttons, search_message, update_components, PartAction};
use crate::error::{DiscordError, Result};
use crate::send::split_chunks;

const TEXT_CHANNELS: [ChannelType; 2] = [ChannelType::Text, ChannelType::News];

// --- registration ------------------------------------------------------------

fn channel_option(name: &str, description: &str, kinds: &[ChannelType]) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::Channel, name, description)
        .channel_types(kinds.to_vec())
        .required(true)
}

fn string_option(name: &str, description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::String, name, description).required(true)
}

fn schedule_options(command: CreateCommand) -> CreateCommand {
    command
        .add_option(string_option("time", "First run, 24-hour HH:MM in the server timezone"))
        .add_option(string_option("interval", "How often to run, at least 1h (e.g. 24h, 1w)"))
        .add_option(string_option("lookback", "How far back to read (e.g. 24h, 3d)"))
        .add_option(channel_option("output", "Where to post the summary", &TEXT_CHANNELS))
}

/// Every command the bot registers.
pub fn definitions() -> Vec<CreateCommand> {
    let manage = Permissions::MANAGE_GUILD;
    vec![
        CreateCommand::new("summarize")
            .description("Summarizes the conversation in the current thread or channel."),
        CreateCommand::new("summarize-period")
            .description("Summarizes messages within a time period (e.g., 2h, 1d).")
            .add_option(string_option("duration", "Time period, e.g. 30m, 12h, 1d, 2w, 1mo")),
        schedule_options(
            CreateCommand::new("schedule-channel")
                .description("Post a recurring summary of one channel.")
                .default_member_permissions(manage)
                .dm_permission(false)
                .add_option(channel_option("channel", "Channel to summarize", &TEXT_CHANNELS)),
        ),
        schedule_options(
            CreateCommand::new("schedule-category")
                .description("Post a recurring summary of every channel in a category.")
                .default_member_permissions(manage)
                .dm_permission(false)
                .add_option(channel_option(
                    "category",
                    "Category to summarize",
                    &[ChannelType::Category],
                )),
        ),
        CreateCommand::new("schedules")
            .description("List the scheduled summaries of this server.")
            .dm_permission(false),
        CreateCommand::new("schedule-remove")
            .description("Remove a scheduled summary.")
            .default_member_permissions(manage)
            .dm_permission(false)
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "id", "Schedule number")
                    .min_int_value(1)
                    .required(true),
            ),
        CreateCommand::new("timezone")
            .description("Show or set the timezone used by scheduled summaries.")
            .default_member_permissions(manage)
            .dm_permission(false)
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "zone",
                    "IANA zone name, e.g. America/New_York",
                )
                .required(false),
            ),
        CreateCommand::new("subscribe")
            .description("Get added to every new thread in a channel or category.")
            .dm_permission(false)
            .add_option(subscription_target()),
        CreateCommand::new("unsubscribe")
            .description("Stop getting added to new threads in a channel or category.")
            .dm_permission(false)
            .add_option(subscription_target()),
        CreateCommand::new("subscriptions")
            .description("List your thread subscriptions.")
            .dm_permission(false),
        CreateCommand::new("get-part")
            .description("Gets information about a specified part from notion.")
            .add_option(string_option("search_term", "Part number or name")),
        CreateCommand::new("update-part")
            .description("Set a status of a part.")
            .add_option(string_option("part", "Part number or name"))
            .add_option(
                string_option("field", "Which status to change")
                    .add_string_choice(StatusField::Design.label(), StatusField::Design.key())
                    .add_string_choice(StatusField::Po.label(), StatusField::Po.key())
                    .add_string_choice(StatusField::Mfg.label(), StatusField::Mfg.key()),
            )
            .add_option(string_option("status", "New status")),
        CreateCommand::new("make-part")
            .description("Add one to the quantity made of a part.")
            .add_option(string_option("part", "Part number or name")),
    ]
}

fn subscription_target() -> CreateCommandOption {
    channel_option(
        "target",
        "Channel or category",
        &[ChannelType::Text, ChannelType::News, ChannelType::Category],
    )
}

/// Register the commands on one guild, or globally. Call from `ready()`.
pub async fn register_commands(ctx: &Context, guild_id: Option<GuildId>) {
    let commands = definitions();
    match guild_id {
        Some(gid) => match gid.set_commands(&ctx.http, commands).await {
            Ok(cmds) => info!(guild = %gid, count = cmds.len(), "registered guild slash commands"),
            Err(e) => warn!(guild = %gid, error = %e, "failed to register guild commands"),
        },
        None => {
            match serenity::model::application::Command::set_global_commands(&ctx.http, commands)
                .await
            {
                Ok(cmds) => info!(count = cmds.len(), "registered global slash commands"),
                Err(e) => warn!(error = %e, "failed to register global slash commands"),
            }
        }
    }
}

// --- dispatch ----------------------------------------------------------------

/// Dispatch a slash command interaction to the appropriate handler.
pub async fn handle_command(app: &Arc<BotContext>, ctx: &Context, command: &CommandInteraction) {
    info!(
        command = %command.data.name,
        user = %command.user.name,
        channel_id = command.channel_id.get(),
        "slash command"
    );

    let result = match command.data.name.as_str() {
        "summarize" => summarize(app, ctx, command).await,
        "summarize-period" => summarize_period(app, ctx, command).await,
        "schedule-channel" => schedule_channel(app, ctx, command).await,
        "schedule-category" => schedule_category(app, ctx, command).await,
        "schedules" => list_schedules(app, ctx, command).await,
        "schedule-remove" => remove_schedule(app, ctx, command).await,
        "timezone" => timezone(app, ctx, command).await,
        "subscribe" => subscribe(app, ctx, command).await,
        "unsubscribe" => unsubscribe(app, ctx, command).await,
        "subscriptions" => list_subscriptions(app, ctx, command).await,
        "get-part" => get_part(app, ctx, command).await,
        "update-part" => update_part(app, ctx, command).await,
        "make-part" => make_part(app, ctx, command).await,
        _ => respond(ctx, command, "Unknown command.", true).await,
    };

    if let Err(e) = result {
        warn!(command = %command.data.name, error = %e, "slash command error");
        report_error(ctx, command, &e.user_message()).await;
    }
}

/// Reply with `text`, or follow up when the interaction was already answered.
async fn report_error(ctx: &Context, command: &CommandInteraction, text: &str) {
    let first = command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await;
    if first.is_err() {
        let _ = command
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new()
                    .content(text)
                    .ephemeral(true),
            )
            .await;
    }
}

// --- option and reply helpers ------------------------------------------------

fn string_arg<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required_str<'a>(command: &'a CommandInteraction, name: &str) -> Result<&'a str> {
    string_arg(command, name).ok_or_else(|| DiscordError::Usage(format!("Missing `{name}`.")))
}

fn channel_arg(command: &CommandInteraction, name: &str) -> Result<ChannelId> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_channel_id())
        .ok_or_else(|| DiscordError::Usage(format!("Missing `{name}`.")))
}

/// Name and type of a channel option, from the interaction's resolved data.
fn resolved_channel(command: &CommandInteraction, id: ChannelId) -> (String, ChannelType) {
    match command.data.resolved.channels.get(&id) {
        Some(c) => (
            c.name.clone().unwrap_or_else(|| id.to_string()),
            c.kind,
        ),
        None => (id.to_string(), ChannelType::Text),
    }
}

fn guild_of(command: &CommandInteraction) -> Result<GuildId> {
    command
        .guild_id
        .ok_or_else(|| DiscordError::Usage("This command only works in a server.".to_string()))
}

/// Answer immediately; text past the first message goes out as follow-ups.
async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    text: &str,
    ephemeral: bool,
) -> Result<()> {
    let chunks = split_chunks(text, MAX_MESSAGE_LEN);
    let mut iter = chunks.iter();
    let first = iter.next().map(String::as_str).unwrap_or("(no response)");
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(first)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    for chunk in iter {
        command
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new()
                    .content(chunk)
                    .ephemeral(ephemeral),
            )
            .await?;
    }
    Ok(())
}

/// Show "thinking..." while a slow command runs.
async fn defer(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;
    Ok(())
}

/// Send `text` after [`defer`], chunked to the message limit.
async fn followup(ctx: &Context, command: &CommandInteraction, text: &str) -> Result<()> {
    for chunk in split_chunks(text, MAX_MESSAGE_LEN) {
        command
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new().content(chunk),
            )
            .await?;
    }
    Ok(())
}

// --- summaries ---------------------------------------------------------------

async fn summarize(app: &Arc<BotContext>, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    defer(ctx, command).await?;
    let messages = app
        .platform
        .history(command.channel_id.get(), None, app.history_limit)
        .await?;
    if messages.is_empty() {
        return followup(ctx, command, "No messages found in this thread to summarize.").await;
    }

    match app.summarizer.summarize_flat(&messages).await {
        Ok(summary) => followup(ctx, command, &summary).await,
        Err(SummaryError::EmptyTranscript) => {
            followup(ctx, command, "No messages found in this thread to summarize.").await
        }
        Err(e) => Err(e.into()),
    }
}

async fn summarize_period(
    app: &Arc<BotContext>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let duration = required_str(command, "duration")?;
    let Ok(cutoff) = window_start(Utc::now(), duration) else {
        let text = format!("Invalid time period: '{duration}'.\n{DURATION_HELP}");
        return respond(ctx, command, &text, true).await;
    };

    defer(ctx, command).await?;
    let messages = app
        .platform
        .history(command.channel_id.get(), Some(cutoff), app.history_limit)
        .await?;
    if messages.is_empty() {
        return followup(ctx, command, &format!("No messages found in the last {duration}.")).await;
    }

    match app.summarizer.summarize_flat(&messages).await {
        Ok(summary) => followup(ctx, command, &summary).await,
        Err(SummaryError::EmptyTranscript) => {
            followup(ctx, command, &format!("No messages found in the last {duration}.")).await
        }
        Err(e) => Err(e.into()),
    }
}

// --- schedules ---------------------------------------------------------------

/// Validated `time`, `interval` and `lookback` arguments of a schedule command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleArgs {
    pub start_time: NaiveTime,
    pub interval_hours: u32,
    pub lookback: String,
}

pub fn parse_schedule_args(
    time: &str,
    interval: &str,
    lookback: &str,
) -> baja_scheduler::Result<ScheduleArgs> {
    let start_time = parse_start_time(time)?;
    let interval_hours = interval_hours(parse_duration(interval.trim())?)?;
    let lookback = lookback.trim();
    window_start(Utc::now(), lookback)?;
    Ok(ScheduleArgs {
        start_time,
        interval_hours,
        lookback: lookback.to_string(),
    })
}

fn schedule_args(command: &CommandInteraction) -> Result<ScheduleArgs> {
    Ok(parse_schedule_args(
        required_str(command, "time")?,
        required_str(command, "interval")?,
        required_str(command, "lookback")?,
    )?)
}

fn created_message(schedule: &Schedule, timezone: &str) -> String {
    format!(
        "\u{2705} Scheduled summary **#{}** for {}\nFirst run at {} ({}), then every {}h, covering the last {}. Posting in <#{}>.",
        schedule.id,
        target_label(schedule),
        schedule.start_time.format("%H:%M"),
        timezone,
        schedule.interval_hours,
        schedule.lookback,
        schedule.output_channel_id,
    )
}

fn target_label(schedule: &Schedule) -> String {
    match schedule.kind {
        ScheduleKind::Channel => schedule
            .channel_ids
            .first()
            .map(|id| format!("<#{id}>"))
            .unwrap_or_else(|| schedule.target_name.clone()),
        ScheduleKind::Category => format!("category **{}**", schedule.target_name),
    }
}

async fn schedule_channel(
    app: &Arc<BotContext>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let guild = guild_of(command)?;
    let args = schedule_args(command)?;
    let channel = channel_arg(command, "channel")?;
    let output = channel_arg(command, "output")?;
    let (name, _) = resolved_channel(command, channel);

    let schedule = app.manager.create(&NewSchedule {
        guild_id: guild.get(),
        channel_ids: vec![channel.get()],
        target_name: name,
        kind: ScheduleKind::Channel,
        output_channel_id: output.get(),
        start_time: args.start_time,
        interval_hours: args.interval_hours,
        lookback: args.lookback,
        created_by: command.user.id.get(),
    })?;
    let timezone = app.store().get_timezone(guild.get())?;
    info!(schedule_id = schedule.id, guild_id = guild.get(), "channel schedule created");
    respond(ctx, command, &created_message(&schedule, &timezone), false).await
}

async fn schedule_category(
    app: &Arc<BotContext>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let guild = guild_of(command)?;
    let args = schedule_args(command)?;
    let category = channel_arg(command, "category")?;
    let output = channel_arg(command, "output")?;
    let (name, kind) = resolved_channel(command, category);
    if kind != ChannelType::Category {
        return Err(DiscordError::Usage(format!("'{name}' is not a category.")));
    }

    defer(ctx, command).await?;
    let channels = app
        .platform
        .category_channels(guild.get(), category.get())
        .await?;
    if channels.is_empty() {
        return Err(DiscordError::Usage(format!(
            "Category '{name}' has no text channels to summarize."
        )));
    }

    let schedule = app.manager.create(&NewSchedule {
        guild_id: guild.get(),
        channel_ids: channels.iter().map(|c| c.id).collect(),
        target_name: name,
        kind: ScheduleKind::Category,
        output_channel_id: output.get(),
        start_time: args.start_time,
        interval_hours: args.interval_hours,
        lookback: args.lookback,
        created_by: command.user.id.get(),
    })?;
    let timezone = app.store().get_timezone(guild.get())?;
    info!(
        schedule_id = schedule.id,
        guild_id = guild.get(),
        channels = channels.len(),
        "category schedule created"
    );
    followup(ctx, command, &created_message(&schedule, &timezone)).await
}

/// One line of the `/schedules` listing.
pub fn schedule_line(schedule: &Schedule, state: Option<TaskState>) -> String {
    let last_run = schedule
        .last_run
        .map(|at| format!("<t:{}:R>", at.timestamp()))
        .unwrap_or_else(|| "never".to_string());
    let state = state
        .map(|s| s.to_string())
        .unwrap_or_else(|| "not running".to_string());
    format!(
        "`#{}` {} every {}h from {}, last {} \u{2192} <#{}> (last run: {}, {})",
        schedule.id,
        target_label(schedule),
        schedule.interval_hours,
        schedule.start_time.format("%H:%M"),
        schedule.lookback,
        schedule.output_channel_id,
        last_run,
        state,
    )
}

async fn list_schedules(
    app: &Arc<BotContext>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let guild = guild_of(command)?.get();
    let schedules = app.store().list_active(Some(guild))?;
    let timezone = app.store().get_timezone(guild)?;

    let text = if schedules.is_empty() {
        format!("No scheduled summaries for this server. (Timezone: {timezone})")
    } else {
        let lines: Vec<String> = schedules
            .iter()
            .map(|s| schedule_line(s, app.manager.state(s.id)))
            .collect();
        format!(
            "**Scheduled summaries** (timezone: {timezone})\n{}",
            lines.join("\n")
        )
    };
    respond(ctx, command, &text, true).await
}

async fn remove_schedule(
    app: &Arc<BotContext>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let guild = guild_of(command)?.get();
    let id = command
        .data
        .options
        .iter()
        .find(|o| o.name == "id")
        .and_then(|o| o.value.as_i64())
        .ok_or_else(|| DiscordError::Usage("Missing `id`.".to_string()))?;

    let schedule = app
        .store()
        .get(id)?
        .filter(|s| s.guild_id == guild && s.active)
        .ok_or_else(|| DiscordError::Usage(format!("Schedule #{id} not found in this server.")))?;

    app.manager.remove(schedule.id)?;
    info!(schedule_id = id, guild_id = guild, "schedule removed");
    respond(
        ctx,
        command,
        &format!("\u{1f5d1}\u{fe0f} Removed schedule #{id} ({}).", target_label(&schedule)),
        false,
    )
    .await
}

async fn timezone(app: &Arc<BotContext>, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let guild = guild_of(command)?.get();
    let Some(zone) = string_arg(command, "zone") else {
        let current = app.store().get_timezone(guild)?;
        return respond(ctx, command, &format!("Timezone: **{current}**"), true).await;
    };

    let tz = parse_timezone(zone)?;
    app.store().set_timezone(guild, tz.name())?;

    // Sleeping tasks keep their cadence; only unfired ones pick up the zone.
    let rescheduled = app.manager.restart_waiting(guild)?;
    info!(guild_id = guild, timezone = tz.name(), rescheduled, "guild timezone changed");

    respond(
        ctx,
        command,
        &format!(
            "\u{1f552} Timezone set to **{}**. {rescheduled} schedule(s) not yet run will use it.",
            tz.name()
        ),
        false,
    )
    .await
}

// --- subscriptions -----------------------------------------------------------

fn subscription_target_of(command: &CommandInteraction) -> Result<(u64, TargetType, String)> {
    let id = channel_arg(command, "target")?;
    let (name, kind) = resolved_channel(command, id);
    Ok(match kind {
        ChannelType::Category => (id.get(), TargetType::Category, format!("category **{name}**")),
        _ => (id.get(), TargetType::Channel, format!("<#{id}>")),
    })
}

async fn subscribe(app: &Arc<BotContext>, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let guild = guild_of(command)?.get();
    let (target, kind, label) = subscription_target_of(command)?;
    let added = app
        .store()
        .add_subscription(guild, command.user.id.get(), target, kind)?;
    let text = if added {
        format!("\u{1f514} Subscribed to {label}. You'll be added to new threads there.")
    } else {
        format!("You are already subscribed to {label}.")
    };
    respond(ctx, command, &text, true).await
}

async fn unsubscribe(
    app: &Arc<BotContext>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let guild = guild_of(command)?.get();
    let (target, kind, label) = subscription_target_of(command)?;
    let removed = app
        .store()
        .remove_subscription(guild, command.user.id.get(), target, kind)?;
    let text = if removed {
        format!("\u{1f515} Unsubscribed from {label}.")
    } else {
        format!("You are not subscribed to {label}.")
    };
    respond(ctx, command, &text, true).await
}

async fn list_subscriptions(
    app: &Arc<BotContext>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let guild = guild_of(command)?.get();
    let subs = app.store().user_subscriptions(guild, command.user.id.get())?;
    let text = if subs.is_empty() {
        "You have no subscriptions in this server.".to_string()
    } else {
        let lines: Vec<String> = subs
            .iter()
            .map(|s| format!("\u{2022} <#{}> ({})", s.target_id, s.target_type))
            .collect();
        format!("**Your subscriptions:**\n{}", lines.join("\n"))
    };
    respond(ctx, command, &text, true).await
}

// --- parts -------------------------------------------------------------------

fn parts_client(app: &BotContext) -> Result<&Arc<NotionClient>> {
    app.parts
        .as_ref()
        .ok_or_else(|| DiscordError::Usage("Parts lookup is not configured.".to_string()))
}

/// Choose the single part a command should act on.
///
/// One result wins outright; otherwise an exact part number or title match
/// is required.
pub fn pick_part<'a>(term: &str, parts: &'a [Part]) -> std::result::Result<&'a Part, String> {
    match parts {
        [] => Err(format!("No results found for part '{term}'.")),
        [only] => Ok(only),
        many => {
            let term = term.trim();
            many.iter()
                .find(|p| {
                    p.part_number().trim().eq_ignore_ascii_case(term)
                        || p.title().eq_ignore_ascii_case(term)
                })
                .ok_or_else(|| {
                    let titles: Vec<String> =
                        many.iter().map(|p| format!("\u{2022} {}", p.title())).collect();
                    format!(
                        "'{term}' matches {} parts. Be more specific or use /get-part:\n{}",
                        many.len(),
                        titles.join("\n")
                    )
                })
        }
    }
}

async fn find_part(parts: &NotionClient, term: &str) -> Result<Part> {
    let search = parts.query_parts(term).await?;
    pick_part(term, &search.parts)
        .cloned()
        .map_err(DiscordError::Usage)
}

/// Embed, drawing and edit controls for one part.
pub(crate) async fn part_view(
    parts: &NotionClient,
    part: &Part,
) -> Result<CreateInteractionResponseFollowup> {
    let schema = parts.retrieve_schema().await?;
    let mut message = CreateInteractionResponseFollowup::new()
        .embed(part_embed(part))
        .components(update_components(part, &schema));

    if let Some(drawing) = part.drawing() {
        match parts.download_drawing(&drawing).await {
            Ok(bytes) => message = message.add_file(CreateAttachment::bytes(bytes, drawing.name)),
            Err(e) => warn!(page_id = %part.id, error = %e, "drawing download failed"),
        }
    }
    Ok(message)
}

pub(crate) fn status_updated_message(part: &Part, field: StatusField, requested: &str) -> String {
    let option = part.status(field).unwrap_or(requested);
    format!(
        "Updated {} for \"{}\" to \"{}\"",
        field.label().to_lowercase(),
        part.title(),
        option
    )
}

pub(crate) fn quantity_updated_message(title: &str, qty: i64) -> String {
    format!("Updated Qty Made for \"{title}\" to {qty}")
}

async fn get_part(app: &Arc<BotContext>, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let parts = parts_client(app)?;
    let term = required_str(command, "search_term")?;

    defer(ctx, command).await?;
    let search = parts.query_parts(term).await?;

    match search.parts.as_slice() {
        [] => followup(ctx, command, &format!("No results found for part '{term}'.")).await,
        [only] => {
            let view = part_view(parts, only).await?;
            command.create_followup(&ctx.http, view).await?;
            Ok(())
        }
        many => {
            command
                .create_followup(
                    &ctx.http,
                    CreateInteractionResponseFollowup::new()
                        .content(search_message(term, &search))
                        .components(search_buttons(many)),
                )
                .await?;
            Ok(())
        }
    }
}

async fn update_part(
    app: &Arc<BotContext>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let parts = parts_client(app)?;
    let term = required_str(command, "part")?;
    let field: StatusField = required_str(command, "field")?
        .parse()
        .map_err(DiscordError::Usage)?;
    let status = required_str(command, "status")?;

    defer(ctx, command).await?;
    let part = find_part(parts, term).await?;
    let updated = parts.update_status(&part.id, field, status).await?;
    followup(ctx, command, &status_updated_message(&updated, field, status)).await
}

async fn make_part(app: &Arc<BotContext>, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let parts = parts_client(app)?;
    let term = required_str(command, "part")?;

    defer(ctx, command).await?;
    let part = find_part(parts, term).await?;
    let qty = parts.increment_quantity(&part.id).await?;
    followup(ctx, command, &quantity_updated_message(&part.title(), qty)).await
}

// --- components --------------------------------------------------------------

/// Handle a click on a part button or select menu.
pub async fn handle_component(
    app: &Arc<BotContext>,
    ctx: &Context,
    component: &ComponentInteraction,
) {
    let Some(action) = PartAction::parse(&component.data.custom_id) else {
        return;
    };

    let result = run_component(app, ctx, component, &action).await;
    if let Err(e) = result {
        warn!(custom_id = %component.data.custom_id, error = %e, "component error");
        let _ = component
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new()
                    .content(e.user_message())
                    .ephemeral(true),
            )
            .await;
    }
}

async fn run_component(
    app: &Arc<BotContext>,
    ctx: &Context,
    component: &ComponentInteraction,
    action: &PartAction,
) -> Result<()> {
    component.defer(&ctx.http).await?;
    let parts = parts_client(app)?;

    let message = match action {
        PartAction::Show { page_id } => {
            let part = parts.get_part(page_id).await?;
            part_view(parts, &part).await?
        }
        PartAction::SetStatus { field, page_id } => {
            let selected = match &component.data.kind {
                ComponentInteractionDataKind::StringSelect { values } => values.first().cloned(),
                _ => None,
            }
            .ok_or_else(|| DiscordError::Usage("Nothing selected.".to_string()))?;
            let updated = parts.update_status(page_id, *field, &selected).await?;
            CreateInteractionResponseFollowup::new()
                .content(status_updated_message(&updated, *field, &selected))
        }
        PartAction::Make { page_id } => {
            let qty = parts.increment_quantity(page_id).await?;
            let title = parts.get_part(page_id).await?.title();
            CreateInteractionResponseFollowup::new()
                .content(quantity_updated_message(&title, qty))
        }
    };

    component.create_followup(&ctx.http, message).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn part(number: &str, name: &str) -> Part {
        Part::from_json(json!({
            "id": format!("page-{number}"),
            "properties": {
                "Part Number": {"type": "rich_text", "rich_text": [{"plain_text": number}]},
                "Part Name": {"type": "title", "title": [{"plain_text": name}]},
                "PO Status": {"type": "status", "status": {"name": "Ordered"}}
            }
        }))
        .unwrap()
    }

    fn schedule(kind: ScheduleKind) -> Schedule {
        Schedule {
            id: 3,
            guild_id: 1,
            channel_ids: vec![10, 11],
            target_name: "Chassis".to_string(),
            kind,
            output_channel_id: 20,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            interval_hours: 24,
            lookback: "1d".to_string(),
            created_by: 7,
            active: true,
            last_run: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn registers_every_command_once() {
        let names: Vec<String> = definitions()
            .iter()
            .map(|c| serde_json::to_value(c).unwrap()["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "summarize",
                "summarize-period",
                "schedule-channel",
                "schedule-category",
                "schedules",
                "schedule-remove",
                "timezone",
                "subscribe",
                "unsubscribe",
                "subscriptions",
                "get-part",
                "update-part",
                "make-part",
            ]
        );
    }

    #[test]
    fn schedule_args_are_validated() {
        let args = parse_schedule_args("09:30", "1d", " 12h ").unwrap();
        assert_eq!(args.start_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(args.interval_hours, 24);
        assert_eq!(args.lookback, "12h");

        assert!(parse_schedule_args("9.30", "1d", "12h").is_err());
        assert!(parse_schedule_args("09:30", "30m", "12h").is_err());
        assert!(parse_schedule_args("09:30", "1d", "soon").is_err());
    }

    #[test]
    fn lookback_reaching_before_the_calendar_is_refused() {
        let err = parse_schedule_args("09:30", "1d", "99999999w").unwrap_err();
        assert!(matches!(err, baja_scheduler::SchedulerError::InvalidDuration(_)));
    }

    #[test]
    fn schedule_line_describes_target_and_cadence() {
        let line = schedule_line(&schedule(ScheduleKind::Category), Some(TaskState::Sleeping));
        assert_eq!(
            line,
            "`#3` category **Chassis** every 24h from 09:00, last 1d \u{2192} <#20> (last run: never, sleeping)"
        );

        let mut channel = schedule(ScheduleKind::Channel);
        channel.last_run = Some(Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap());
        let line = schedule_line(&channel, None);
        assert!(line.starts_with("`#3` <#10> every 24h"));
        assert!(line.ends_with("(last run: <t:1740906000:R>, not running)"));
    }

    #[test]
    fn pick_part_prefers_single_or_exact_match() {
        let parts = vec![part("BAJA-10", "Hub"), part("BAJA-100", "Hub Cap")];
        assert_eq!(pick_part("baja-10", &parts).unwrap().id, "page-BAJA-10");
        assert_eq!(pick_part("x", &parts[1..]).unwrap().id, "page-BAJA-100");

        let err = pick_part("hub", &parts).unwrap_err();
        assert!(err.starts_with("'hub' matches 2 parts"));
        assert_eq!(pick_part("nope", &[]).unwrap_err(), "No results found for part 'nope'.");
    }

    #[test]
    fn update_messages_read_like_the_bot() {
        let p = part("BAJA-1", "Hub");
        assert_eq!(
            status_updated_message(&p, StatusField::Po, "ordered"),
            "Updated po status for \"BAJA-1 - Hub\" to \"Ordered\""
        );
        assert_eq!(
            quantity_updated_message("BAJA-1 - Hub", 4),
            "Updated Qty Made for \"BAJA-1 - Hub\" to 4"
        );
    }
}
