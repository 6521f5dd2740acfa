use poise::serenity_prelude as serenity;

use crate::{greeting, reaction_roles, Data, Result};

/// Gateway events the bot reacts to outside of commands.
pub(crate) async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<()> {
    match event {
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            reaction_roles::apply(ctx, data, add_reaction, true).await
        }
        serenity::FullEvent::ReactionRemove { removed_reaction } => {
            reaction_roles::apply(ctx, data, removed_reaction, false).await
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            greeting::greet(ctx, data, new_member).await
        }
        serenity::FullEvent::Message { new_message } => {
            greeting::thank_booster(ctx, data, new_message).await
        }
        serenity::FullEvent::GuildCreate { guild, .. } => {
            log::info!("Available in guild {} ({})", guild.name, guild.id);
            Ok(())
        }
        _ => Ok(()),
    }
}
