use poise::serenity_prelude as serenity;

use crate::{db::Claim, moderator::Member, Context, Error, Result};

/// Gets the guild membership of `user` for the guild the command runs in.
pub(crate) fn member_of(ctx: Context<'_>, user: &serenity::User) -> Result<Member> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command can only be used in a server")?;
    Ok(Member::new(guild_id.get(), user.id.get()))
}

/// Gets a user by id from Discord.
pub(crate) async fn get_user(ctx: Context<'_>, id: u64) -> Result<serenity::User> {
    log::debug!("Getting name for user {id}");
    serenity::UserId::new(id)
        .to_user(ctx.serenity_context())
        .await
        .map_err(Error::from)
}

/// Gets a user's nickname for the current guild, or defaults to name, from Discord.
pub(crate) async fn get_nick_or_name(ctx: Context<'_>, user: serenity::User) -> String {
    if let Some(guild_id) = ctx.guild_id() {
        if log::log_enabled!(log::Level::Debug) {
            if let Some(guild) = guild_id.to_guild_cached(&ctx) {
                log::debug!(
                    "Getting nickname for {user} in Guild {guild}",
                    user = user.name,
                    guild = guild.name
                );
            }
        }
        user.nick_in(ctx.serenity_context(), guild_id)
            .await
            .unwrap_or(user.name)
    } else {
        user.name
    }
}

/// One line describing a claim.
pub(crate) fn describe_claim(holder: &str, claim: &Claim) -> String {
    format!(
        "{}: **{}** (since {})",
        holder,
        claim.character_name,
        claim.claimed_at.format("%Y-%m-%d")
    )
}

/// Discord rejects message bodies longer than this many characters.
pub(crate) const MAX_MESSAGE_LEN: usize = 2000;

/// Joins lines into as few messages as possible, each at most `limit` characters.
///
/// A single line over the limit is cut short.
pub(crate) fn chunk_lines<S: AsRef<str>>(lines: &[S], limit: usize) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in lines {
        let line: String = line.as_ref().chars().take(limit).collect();
        let len = line.chars().count();

        if !current.is_empty() && current_len + 1 + len > limit {
            messages.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(&line);
        current_len += len;
    }

    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn claim_description() {
        let claim = Claim {
            guild_id: 1,
            user_id: 2,
            character_id: "1001".to_string(),
            character_name: "Foo".to_string(),
            outfit_id: "OUT1".to_string(),
            claimed_at: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
        };

        assert_eq!(describe_claim("Nick", &claim), "Nick: **Foo** (since 2024-03-09)");
    }

    #[test]
    fn chunks_respect_the_message_limit() {
        let lines: Vec<String> = (0..60)
            .map(|i| format!("Member{i:02}: **Character{i:02}** (since 2024-03-09)"))
            .collect();

        let messages = chunk_lines(&lines, MAX_MESSAGE_LEN);

        assert!(messages.len() > 1);
        assert!(messages.iter().all(|m| m.chars().count() <= MAX_MESSAGE_LEN));
        assert_eq!(messages.join("\n"), lines.join("\n"));
    }

    #[test]
    fn joins_lines_up_to_the_limit() {
        assert_eq!(chunk_lines(&["a", "b"], 3), vec!["a\nb"]);
        assert_eq!(chunk_lines(&["a", "b", "c"], 3), vec!["a\nb", "c"]);
        assert_eq!(chunk_lines(&["abcdef"], 4), vec!["abcd"]);
        assert!(chunk_lines::<&str>(&[], 4).is_empty());
    }
}
