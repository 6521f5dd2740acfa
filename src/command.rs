use crate::{
    db::{self, Claim},
    discord,
    help::{CommandDescriptor, HelpReply},
    moderator::{self, Member, ModerationError, OutfitChecker},
    reaction_roles, sort, Context, Data, Error, Result,
};
use futures::future;
use poise::{command, serenity_prelude as serenity};

/// All commands, in the order the help command lists them.
pub(crate) fn list() -> Vec<poise::Command<Data, Error>> {
    vec![
        claim(),
        revalidate(),
        whois(),
        claims(),
        unclaim(),
        outfit(),
        sort(),
        sortcategory(),
        reactionrole(),
        onjoin(),
        boostmessage(),
        help(),
    ]
}

const GENERIC_FAILURE: &str =
    "Something went wrong while running this command. Please try again later.";

/// What the requester is told when a command fails.
///
/// Only moderation outcomes are shown as is; storage and lookup failures stay in the log.
pub(crate) fn failure_reply(error: &(dyn std::error::Error + 'static)) -> String {
    match error.downcast_ref::<ModerationError>() {
        Some(e) if e.is_user_facing() => e.to_string(),
        _ => GENERIC_FAILURE.to_string(),
    }
}

async fn reply_with_failure(ctx: Context<'_>, error: ModerationError) -> Result<()> {
    if !error.is_user_facing() {
        log::error!("Error in `{}`: {}", ctx.command().qualified_name, error);
    }
    ctx.say(failure_reply(&error)).await?;
    Ok(())
}

async fn reply_with_claim(
    ctx: Context<'_>,
    member: &Member,
    result: moderator::Result<Claim>,
) -> Result<()> {
    match result {
        Ok(claim) => {
            ctx.say(format!(
                "{} is now verified as **{}**.",
                member.mention(),
                claim.character_name
            ))
            .await?;
            Ok(())
        }
        Err(e) => reply_with_failure(ctx, e).await,
    }
}

/// Claims a PlanetSide 2 character as your own
///
/// The character must be a member of this server's outfit and must not hold a protected rank.
#[command(slash_command, prefix_command, guild_only, user_cooldown = 10)]
pub async fn claim(
    ctx: Context<'_>,
    #[description = "Character name"] name: String,
) -> Result<()> {
    let member = discord::member_of(ctx, ctx.author())?;
    let result = ctx.data().moderator.make_claim(&member, &name).await;
    reply_with_claim(ctx, &member, result).await
}

/// Verifies a character again, replacing your current claim
#[command(slash_command, prefix_command, guild_only, user_cooldown = 10)]
pub async fn revalidate(
    ctx: Context<'_>,
    #[description = "Character name"] name: String,
) -> Result<()> {
    let member = discord::member_of(ctx, ctx.author())?;
    let result = ctx.data().moderator.revalidate_claim(&member, &name).await;
    reply_with_claim(ctx, &member, result).await
}

/// Shows the character a member has claimed
#[command(slash_command, prefix_command, guild_only)]
pub async fn whois(ctx: Context<'_>, #[description = "Member"] user: serenity::User) -> Result<()> {
    let member = discord::member_of(ctx, &user)?;
    let claim = ctx.data().moderator.claims().find_by_member(&member)?;
    let nick = discord::get_nick_or_name(ctx, user).await;

    match claim {
        Some(claim) => ctx.say(discord::describe_claim(&nick, &claim)).await?,
        None => ctx.say(format!("{} has not claimed a character.", nick)).await?,
    };
    Ok(())
}

/// Lists every claimed character of this server
#[command(slash_command, prefix_command, guild_only, global_cooldown = 30)]
pub async fn claims(ctx: Context<'_>) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or("This command can only be used in a server")?;
    let claims = ctx.data().moderator.claims().list(guild_id.get())?;
    if claims.is_empty() {
        ctx.say("No claims yet").await?;
        return Ok(());
    }

    let claim_futures = claims
        .iter()
        .map(|claim| async move {
            let user = discord::get_user(ctx, claim.user_id).await?;
            let nick = discord::get_nick_or_name(ctx, user).await;
            Ok::<_, Error>(discord::describe_claim(&nick, claim))
        })
        .collect::<Vec<_>>();

    let lines = future::try_join_all(claim_futures).await?;

    log::debug!("Sending {} claims", claims.len());
    for message in discord::chunk_lines(&lines, discord::MAX_MESSAGE_LEN) {
        ctx.say(message).await?;
    }
    Ok(())
}

/// Revokes a member's claim
#[command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_ROLES"
)]
pub async fn unclaim(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
) -> Result<()> {
    let member = discord::member_of(ctx, &user)?;

    let revoked = match ctx.data().moderator.revoke(&member) {
        Ok(revoked) => revoked,
        Err(e) => return reply_with_failure(ctx, e).await,
    };

    match revoked {
        Some(claim) => {
            ctx.say(format!(
                "Revoked {}'s claim on **{}**.",
                user.name, claim.character_name
            ))
            .await?;
        }
        None => {
            ctx.say(format!("{} has not claimed a character.", user.name))
                .await?;
        }
    }
    Ok(())
}

/// Splits a comma separated rank list, dropping blanks and repeats.
fn parse_ranks(ranks: &str) -> Vec<String> {
    let mut parsed: Vec<String> = Vec::new();
    for rank in ranks.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        if !parsed.iter().any(|r| r == rank) {
            parsed.push(rank.to_string());
        }
    }
    parsed
}

/// Sets the outfit members must belong to, and the ranks that cannot be claimed
#[command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn outfit(
    ctx: Context<'_>,
    #[description = "Outfit id"] outfit_id: String,
    #[description = "Protected ranks, comma separated"] protected_ranks: Option<String>,
) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or("This command can only be used in a server")?;
    let checker = OutfitChecker {
        outfit: outfit_id.trim().to_string(),
        filter_rank: protected_ranks.as_deref().map(parse_ranks).unwrap_or_default(),
    };

    ctx.data()
        .moderator
        .settings()
        .set_outfit_checker(guild_id.get(), &checker)?;

    log::info!("Outfit checker of guild {} set to {:?}", guild_id, checker);
    let ranks = if checker.filter_rank.is_empty() {
        "none".to_string()
    } else {
        checker.filter_rank.join(", ")
    };
    ctx.say(format!(
        "Claims now require outfit `{}`. Protected ranks: {}.",
        checker.outfit, ranks
    ))
    .await?;
    Ok(())
}

/// Sorts the channels of every configured category
#[command(slash_command, prefix_command, guild_only, global_cooldown = 60)]
pub async fn sort(ctx: Context<'_>) -> Result<()> {
    if !ctx.data().config.channel_positions_enforcement {
        ctx.say("Sorry but the channel position enforcement feature is currently disabled")
            .await?;
        return Ok(());
    }

    let http = ctx.serenity_context().http.clone();
    let pool = ctx.data().pool.clone();
    tokio::spawn(async move {
        match sort::enforce_all(&http, &pool).await {
            Ok(moved) => log::info!("Global sort moved {} channels", moved),
            Err(e) => log::error!("Global sort failed: {}", e),
        }
    });

    ctx.say("Sent global sort request").await?;
    Ok(())
}

/// Keeps the channels of a category sorted by name
#[command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_CHANNELS"
)]
pub async fn sortcategory(
    ctx: Context<'_>,
    #[description = "Category"]
    #[channel_types("Category")]
    category: serenity::GuildChannel,
    #[description = "Sort this category"] enabled: bool,
) -> Result<()> {
    if category.kind != serenity::ChannelType::Category {
        ctx.say(format!("{} is not a category.", category.name))
            .await?;
        return Ok(());
    }

    {
        let conn = ctx.data().pool.get()?;
        db::set_sorted_category(&conn, category.guild_id.get(), category.id.get(), enabled)?;
    }

    let state = if enabled { "now" } else { "no longer" };
    ctx.say(format!("Channels in **{}** are {} kept sorted.", category.name, state))
        .await?;
    Ok(())
}

/// Manages roles granted by reacting to a message
#[command(
    slash_command,
    prefix_command,
    guild_only,
    subcommands("add_reaction_role", "remove_reaction_role", "list_reaction_roles"),
    subcommand_required,
    required_permissions = "MANAGE_ROLES"
)]
pub async fn reactionrole(_ctx: Context<'_>) -> Result<()> {
    Ok(())
}

/// Grants a role to members who react to a message
#[command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "add",
    required_permissions = "MANAGE_ROLES"
)]
pub async fn add_reaction_role(
    ctx: Context<'_>,
    #[description = "Channel of the message"] channel: serenity::GuildChannel,
    #[description = "Message id"] message_id: String,
    #[description = "Emoji"] emoji: String,
    #[description = "Role to grant"] role: serenity::Role,
) -> Result<()> {
    let Ok(message_id) = message_id.trim().parse::<u64>() else {
        ctx.say("That is not a message id.").await?;
        return Ok(());
    };

    let reaction_role = db::ReactionRole {
        guild_id: channel.guild_id.get(),
        channel_id: channel.id.get(),
        message_id,
        emoji: reaction_roles::parse_emoji_key(&emoji),
        role_id: role.id.get(),
        member_id: None,
        expires_at: None,
    };

    {
        let conn = ctx.data().pool.get()?;
        db::upsert_reaction_role(&conn, &reaction_role)?;
    }

    match serenity::ReactionType::try_from(emoji.trim()) {
        Ok(reaction) => {
            if let Err(e) = channel
                .id
                .create_reaction(ctx.serenity_context(), serenity::MessageId::new(message_id), reaction)
                .await
            {
                log::warn!("Unable to react to message {}: {}", message_id, e);
            }
        }
        Err(e) => log::warn!("Unable to parse emoji `{}`: {}", emoji, e),
    }

    ctx.say(format!("Reacting with {} now grants **{}**.", emoji.trim(), role.name))
        .await?;
    Ok(())
}

/// Stops granting a role for a message reaction
#[command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "remove",
    required_permissions = "MANAGE_ROLES"
)]
pub async fn remove_reaction_role(
    ctx: Context<'_>,
    #[description = "Message id"] message_id: String,
    #[description = "Emoji"] emoji: String,
) -> Result<()> {
    let Ok(message_id) = message_id.trim().parse::<u64>() else {
        ctx.say("That is not a message id.").await?;
        return Ok(());
    };

    let removed = {
        let conn = ctx.data().pool.get()?;
        db::delete_reaction_role(&conn, message_id, &reaction_roles::parse_emoji_key(&emoji))?
    };

    if removed {
        ctx.say("Reaction role removed.").await?;
    } else {
        ctx.say("No reaction role is set up for that message and emoji.")
            .await?;
    }
    Ok(())
}

/// Lists the reaction roles of this server that anyone can use
#[command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "list",
    required_permissions = "MANAGE_ROLES"
)]
pub async fn list_reaction_roles(ctx: Context<'_>) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or("This command can only be used in a server")?;
    let roles = {
        let conn = ctx.data().pool.get()?;
        db::get_static_reaction_roles(&conn, guild_id.get())?
    };

    if roles.is_empty() {
        ctx.say("No reaction roles are set up.").await?;
        return Ok(());
    }

    let lines: Vec<String> = roles
        .iter()
        .map(|role| {
            format!(
                "<#{}> message {}: {} grants <@&{}>",
                role.channel_id,
                role.message_id,
                reaction_roles::display_emoji_key(&role.emoji),
                role.role_id
            )
        })
        .collect();
    for message in discord::chunk_lines(&lines, discord::MAX_MESSAGE_LEN) {
        ctx.say(message).await?;
    }
    Ok(())
}

/// Greets new members and offers them roles to react for
#[command(
    slash_command,
    prefix_command,
    guild_only,
    subcommands(
        "set_greeting",
        "disable_greeting",
        "add_join_role",
        "remove_join_role",
        "list_join_roles"
    ),
    subcommand_required,
    required_permissions = "MANAGE_ROLES"
)]
pub async fn onjoin(_ctx: Context<'_>) -> Result<()> {
    Ok(())
}

/// Sets where new members are greeted
///
/// `{member}` in the message is replaced by a mention of the new member. The roles offered on a
/// greeting can be taken for `expire_minutes` minutes, or forever when it is 0.
#[command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "greeting",
    required_permissions = "MANAGE_ROLES"
)]
pub async fn set_greeting(
    ctx: Context<'_>,
    #[description = "Channel to greet in"] channel: serenity::GuildChannel,
    #[description = "Minutes the offered roles stay available, 0 for no limit"]
    expire_minutes: u32,
    #[description = "Greeting message"]
    #[rest]
    message: String,
) -> Result<()> {
    let settings = db::JoinSettings {
        guild_id: channel.guild_id.get(),
        channel_id: channel.id.get(),
        message: message.trim().to_string(),
        expire_minutes: (expire_minutes > 0).then_some(expire_minutes),
    };

    {
        let conn = ctx.data().pool.get()?;
        db::set_join_settings(&conn, &settings)?;
    }

    log::info!("Greeting of guild {} set to {:?}", settings.guild_id, settings);
    ctx.say(format!("New members are now greeted in <#{}>.", settings.channel_id))
        .await?;
    Ok(())
}

/// Stops greeting new members
#[command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "disable",
    required_permissions = "MANAGE_ROLES"
)]
pub async fn disable_greeting(ctx: Context<'_>) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or("This command can only be used in a server")?;
    let removed = {
        let conn = ctx.data().pool.get()?;
        db::delete_join_settings(&conn, guild_id.get())?
    };

    if removed {
        ctx.say("New members are no longer greeted.").await?;
    } else {
        ctx.say("New members are not being greeted.").await?;
    }
    Ok(())
}

/// Offers a role on the greeting of new members
#[command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "addrole",
    required_permissions = "MANAGE_ROLES"
)]
pub async fn add_join_role(
    ctx: Context<'_>,
    #[description = "Emoji"] emoji: String,
    #[description = "Role to grant"] role: serenity::Role,
) -> Result<()> {
    let join_role = db::JoinRole {
        guild_id: role.guild_id.get(),
        emoji: emoji.trim().to_string(),
        role_id: role.id.get(),
    };

    {
        let conn = ctx.data().pool.get()?;
        db::upsert_join_role(&conn, &join_role)?;
    }

    ctx.say(format!(
        "New members can now react with {} for **{}**.",
        join_role.emoji, role.name
    ))
    .await?;
    Ok(())
}

/// Stops offering a role on the greeting of new members
#[command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "removerole",
    required_permissions = "MANAGE_ROLES"
)]
pub async fn remove_join_role(
    ctx: Context<'_>,
    #[description = "Emoji"] emoji: String,
) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or("This command can only be used in a server")?;
    let removed = {
        let conn = ctx.data().pool.get()?;
        db::delete_join_role(&conn, guild_id.get(), emoji.trim())?
    };

    if removed {
        ctx.say("Join role removed.").await?;
    } else {
        ctx.say("No join role is set up for that emoji.").await?;
    }
    Ok(())
}

/// Lists the roles offered to new members
#[command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "roles",
    required_permissions = "MANAGE_ROLES"
)]
pub async fn list_join_roles(ctx: Context<'_>) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or("This command can only be used in a server")?;
    let (settings, roles) = {
        let conn = ctx.data().pool.get()?;
        (
            db::get_join_settings(&conn, guild_id.get())?,
            db::get_join_roles(&conn, guild_id.get())?,
        )
    };

    let mut lines = vec![match &settings {
        Some(settings) => format!("New members are greeted in <#{}>.", settings.channel_id),
        None => "New members are not being greeted.".to_string(),
    }];
    lines.extend(
        roles
            .iter()
            .map(|role| format!("{} grants <@&{}>", role.emoji, role.role_id)),
    );
    for message in discord::chunk_lines(&lines, discord::MAX_MESSAGE_LEN) {
        ctx.say(message).await?;
    }
    Ok(())
}

/// Manages the messages sent when a member boosts this server
#[command(
    slash_command,
    prefix_command,
    guild_only,
    subcommands("set_boost_message", "remove_boost_message", "list_boost_messages"),
    subcommand_required,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn boostmessage(_ctx: Context<'_>) -> Result<()> {
    Ok(())
}

/// Thanks boosting members in a channel
///
/// `{member}` in the message is replaced by a mention of the booster.
#[command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "set",
    required_permissions = "MANAGE_GUILD"
)]
pub async fn set_boost_message(
    ctx: Context<'_>,
    #[description = "Channel to post in"] channel: serenity::GuildChannel,
    #[description = "Message"]
    #[rest]
    message: String,
) -> Result<()> {
    let boost = db::BoostMessage {
        guild_id: channel.guild_id.get(),
        channel_id: channel.id.get(),
        message: message.trim().to_string(),
    };

    {
        let conn = ctx.data().pool.get()?;
        db::upsert_boost_message(&conn, &boost)?;
    }

    ctx.say(format!("Boosts are now announced in <#{}>.", boost.channel_id))
        .await?;
    Ok(())
}

/// Stops thanking boosting members in a channel
#[command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "remove",
    required_permissions = "MANAGE_GUILD"
)]
pub async fn remove_boost_message(
    ctx: Context<'_>,
    #[description = "Channel"] channel: serenity::GuildChannel,
) -> Result<()> {
    let removed = {
        let conn = ctx.data().pool.get()?;
        db::delete_boost_message(&conn, channel.guild_id.get(), channel.id.get())?
    };

    if removed {
        ctx.say("Boost message removed.").await?;
    } else {
        ctx.say(format!("Boosts are not announced in <#{}>.", channel.id))
            .await?;
    }
    Ok(())
}

/// Lists the channels boosts are announced in
#[command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "list",
    required_permissions = "MANAGE_GUILD"
)]
pub async fn list_boost_messages(ctx: Context<'_>) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or("This command can only be used in a server")?;
    let boosts = {
        let conn = ctx.data().pool.get()?;
        db::get_boost_messages(&conn, guild_id.get())?
    };

    if boosts.is_empty() {
        ctx.say("Boosts are not announced anywhere.").await?;
        return Ok(());
    }

    let lines: Vec<String> = boosts
        .iter()
        .map(|boost| format!("<#{}>: {}", boost.channel_id, boost.message))
        .collect();
    for message in discord::chunk_lines(&lines, discord::MAX_MESSAGE_LEN) {
        ctx.say(message).await?;
    }
    Ok(())
}

/// Lists the available commands
///
/// Will give a more detailed explanation of the command.
#[command(slash_command, prefix_command, hide_in_help, global_cooldown = 30)]
pub async fn help(ctx: Context<'_>) -> Result<()> {
    let descriptors = ctx
        .framework()
        .options()
        .commands
        .iter()
        .map(CommandDescriptor::from_command)
        .collect::<Vec<_>>();

    let reply = HelpReply::new(&ctx.data().config.command_prefix, &descriptors);
    let builder = reply
        .embeds()
        .into_iter()
        .fold(poise::CreateReply::default(), |builder, embed| builder.embed(embed));

    ctx.send(builder).await?;
    Ok(())
}
