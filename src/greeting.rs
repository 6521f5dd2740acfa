//! Greets new members with reaction roles, and thanks members who boost the server.

use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;

use crate::{db, moderator::Member, reaction_roles, Data, Result};

/// Placeholder replaced by a mention of the member being greeted or thanked.
pub(crate) const MEMBER_PLACEHOLDER: &str = "{member}";

/// Fills in a configured message for `member`.
///
/// Messages without the placeholder get the mention prepended.
pub(crate) fn render_message(template: &str, member: &Member) -> String {
    if template.contains(MEMBER_PLACEHOLDER) {
        template.replace(MEMBER_PLACEHOLDER, &member.mention())
    } else {
        format!("{} {}", member.mention(), template)
    }
}

/// Whether the message is the system message Discord posts for a boost.
pub(crate) fn is_boost(kind: serenity::MessageType) -> bool {
    matches!(
        kind,
        serenity::MessageType::NitroBoost
            | serenity::MessageType::NitroTier1
            | serenity::MessageType::NitroTier2
            | serenity::MessageType::NitroTier3
    )
}

/// Reaction roles to store for a greeting posted as `message_id`.
pub(crate) fn greeting_roles(
    settings: &db::JoinSettings,
    roles: &[db::JoinRole],
    member: &Member,
    message_id: u64,
    now: DateTime<Utc>,
) -> Vec<db::ReactionRole> {
    let expires_at = settings
        .expire_minutes
        .map(|minutes| now + chrono::Duration::minutes(i64::from(minutes)));

    roles
        .iter()
        .map(|role| db::ReactionRole {
            guild_id: settings.guild_id,
            channel_id: settings.channel_id,
            message_id,
            emoji: reaction_roles::parse_emoji_key(&role.emoji),
            role_id: role.role_id,
            member_id: Some(member.user_id),
            expires_at,
        })
        .collect()
}

/// Posts the guild's greeting for a new member and offers the join roles on it.
pub(crate) async fn greet(
    ctx: &serenity::Context,
    data: &Data,
    new_member: &serenity::Member,
) -> Result<()> {
    if new_member.user.bot {
        return Ok(());
    }
    let member = Member::new(new_member.guild_id.get(), new_member.user.id.get());
    let now = Utc::now();

    let (settings, roles) = {
        let conn = data.pool.get()?;
        let expired = db::delete_expired_reaction_roles(&conn, now)?;
        if expired > 0 {
            log::debug!("Deleted {} expired reaction roles", expired);
        }
        (
            db::get_join_settings(&conn, member.guild_id)?,
            db::get_join_roles(&conn, member.guild_id)?,
        )
    };
    let Some(settings) = settings else {
        return Ok(());
    };

    log::info!("Greeting user {} in guild {}", member.user_id, member.guild_id);
    let channel = serenity::ChannelId::new(settings.channel_id);
    let message = channel
        .say(ctx, render_message(&settings.message, &member))
        .await?;

    {
        let conn = data.pool.get()?;
        for role in greeting_roles(&settings, &roles, &member, message.id.get(), now) {
            db::upsert_reaction_role(&conn, &role)?;
        }
    }

    for role in &roles {
        match serenity::ReactionType::try_from(role.emoji.as_str()) {
            Ok(reaction) => {
                if let Err(e) = message.react(ctx, reaction).await {
                    log::warn!("Unable to react with {} on greeting: {}", role.emoji, e);
                }
            }
            Err(e) => log::warn!("Unable to parse join role emoji `{}`: {}", role.emoji, e),
        }
    }
    Ok(())
}

/// Posts the guild's boost messages when a member boosts the server.
pub(crate) async fn thank_booster(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
) -> Result<()> {
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };
    if !is_boost(message.kind) {
        return Ok(());
    }

    let boosts = {
        let conn = data.pool.get()?;
        db::get_boost_messages(&conn, guild_id.get())?
    };

    let member = Member::new(guild_id.get(), message.author.id.get());
    log::info!(
        "User {} boosted guild {}, sending {} messages",
        member.user_id,
        member.guild_id,
        boosts.len()
    );
    for boost in boosts {
        let channel = serenity::ChannelId::new(boost.channel_id);
        if let Err(e) = channel
            .say(ctx, render_message(&boost.message, &member))
            .await
        {
            log::error!("Error sending boost message to channel {}: {}", channel, e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn renders_member_mentions() {
        let member = Member::new(1, 10);

        assert_eq!(
            render_message("Welcome {member}, pick a role!", &member),
            "Welcome <@10>, pick a role!"
        );
        assert_eq!(render_message("Thanks for boosting!", &member), "<@10> Thanks for boosting!");
    }

    #[test]
    fn recognizes_boost_messages() {
        assert!(is_boost(serenity::MessageType::NitroBoost));
        assert!(is_boost(serenity::MessageType::NitroTier3));
        assert!(!is_boost(serenity::MessageType::Regular));
        assert!(!is_boost(serenity::MessageType::MemberJoin));
    }

    #[test]
    fn greeting_roles_belong_to_the_new_member() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let settings = db::JoinSettings {
            guild_id: 1,
            channel_id: 2,
            message: "Welcome {member}".to_string(),
            expire_minutes: Some(30),
        };
        let roles = vec![
            db::JoinRole {
                guild_id: 1,
                emoji: "👍".to_string(),
                role_id: 20,
            },
            db::JoinRole {
                guild_id: 1,
                emoji: "<:outfit:123>".to_string(),
                role_id: 21,
            },
        ];

        let stored = greeting_roles(&settings, &roles, &Member::new(1, 10), 99, now);

        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|role| role.message_id == 99
            && role.channel_id == 2
            && role.member_id == Some(10)
            && role.expires_at == Some(now + chrono::Duration::minutes(30))));
        assert_eq!(stored[0].emoji, "👍");
        assert_eq!(stored[1].emoji, "123");
        assert_eq!(stored[1].role_id, 21);

        let forever = db::JoinSettings {
            expire_minutes: None,
            ..settings
        };
        let stored = greeting_roles(&forever, &roles, &Member::new(1, 10), 99, now);
        assert!(stored.iter().all(|role| role.expires_at.is_none()));
    }
}
