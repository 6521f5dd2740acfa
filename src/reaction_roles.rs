use poise::serenity_prelude as serenity;

use crate::{db, Data, Result};

const AUDIT_REASON: &str = "Reaction role";

/// Key a reaction is stored under: the emoji id for custom emoji, the emoji itself otherwise.
pub(crate) fn emoji_key(emoji: &serenity::ReactionType) -> Option<String> {
    match emoji {
        serenity::ReactionType::Custom { id, .. } => Some(id.get().to_string()),
        serenity::ReactionType::Unicode(unicode) => Some(unicode.clone()),
        _ => None,
    }
}

/// Key for an emoji typed into a command, e.g. `👍` or `<:name:123>`.
pub(crate) fn parse_emoji_key(input: &str) -> String {
    let input = input.trim();
    input
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .and_then(|inner| inner.rsplit(':').next())
        .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(input)
        .to_string()
}

/// Message text showing the emoji stored under `key`.
pub(crate) fn display_emoji_key(key: &str) -> String {
    if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
        format!("<:emoji:{}>", key)
    } else {
        key.to_string()
    }
}

/// Adds or removes the role configured for a reaction.
pub(crate) async fn apply(
    ctx: &serenity::Context,
    data: &Data,
    reaction: &serenity::Reaction,
    added: bool,
) -> Result<()> {
    let (Some(guild_id), Some(user_id)) = (reaction.guild_id, reaction.user_id) else {
        return Ok(());
    };
    if user_id == ctx.cache.current_user().id {
        return Ok(());
    }
    let Some(key) = emoji_key(&reaction.emoji) else {
        return Ok(());
    };

    let role = {
        let conn = data.pool.get()?;
        db::find_reaction_role(&conn, reaction.message_id.get(), &key)?
    };
    let Some(role) = role.filter(|r| {
        r.guild_id == guild_id.get() && r.applies_to(user_id.get(), chrono::Utc::now())
    }) else {
        return Ok(());
    };

    let role_id = serenity::RoleId::new(role.role_id);
    if added {
        log::info!("Granting role {} to user {} in guild {}", role_id, user_id, guild_id);
        ctx.http
            .add_member_role(guild_id, user_id, role_id, Some(AUDIT_REASON))
            .await?;
    } else {
        log::info!("Removing role {} from user {} in guild {}", role_id, user_id, guild_id);
        ctx.http
            .remove_member_role(guild_id, user_id, role_id, Some(AUDIT_REASON))
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_typed_emoji() {
        assert_eq!(parse_emoji_key(" 👍 "), "👍");
        assert_eq!(parse_emoji_key("<:outfit:123456789>"), "123456789");
        assert_eq!(parse_emoji_key("<a:dance:42>"), "42");
        assert_eq!(parse_emoji_key("<not an emoji>"), "<not an emoji>");
    }

    #[test]
    fn keys_reactions_like_typed_emoji() {
        let unicode = serenity::ReactionType::Unicode("👍".to_string());
        assert_eq!(emoji_key(&unicode), Some(parse_emoji_key("👍")));

        let custom = serenity::ReactionType::Custom {
            animated: false,
            id: serenity::EmojiId::new(123456789),
            name: Some("outfit".to_string()),
        };
        assert_eq!(emoji_key(&custom), Some(parse_emoji_key("<:outfit:123456789>")));
    }

    #[test]
    fn displays_stored_keys() {
        assert_eq!(display_emoji_key("👍"), "👍");
        assert_eq!(display_emoji_key("123456789"), "<:emoji:123456789>");
        assert_eq!(parse_emoji_key(&display_emoji_key("123456789")), "123456789");
    }
}
