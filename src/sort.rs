//! Keeps the channels of configured categories in alphabetical order.

use std::collections::BTreeMap;

use poise::serenity_prelude as serenity;

use crate::{db, Result};

/// A channel and its current position within its category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ChannelSlot {
    pub id: u64,
    pub name: String,
    pub position: u16,
}

/// Computes the moves that put `channels` in name order.
///
/// The category keeps the positions it already occupies; they are handed out
/// again in name order. When channels share a position, consecutive positions
/// starting at the lowest one are used instead. Only channels whose position
/// changes are returned.
pub(crate) fn plan_positions(channels: &[ChannelSlot]) -> Vec<(u64, u16)> {
    let mut positions: Vec<u16> = channels.iter().map(|c| c.position).collect();
    positions.sort_unstable();
    if positions.windows(2).any(|w| w[0] == w[1]) {
        // Shared slots cannot express an order; spread them out from the lowest one.
        let first = positions[0];
        positions = (0..channels.len())
            .map(|i| first.saturating_add(i as u16))
            .collect();
    }

    let mut ordered: Vec<&ChannelSlot> = channels.iter().collect();
    ordered.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.id.cmp(&b.id))
    });

    ordered
        .into_iter()
        .zip(positions)
        .filter(|(channel, position)| channel.position != *position)
        .map(|(channel, position)| (channel.id, position))
        .collect()
}

fn is_sortable(channel: &serenity::GuildChannel) -> bool {
    matches!(
        channel.kind,
        serenity::ChannelType::Text | serenity::ChannelType::News
    )
}

/// Sorts the given categories of one guild. Returns the number of channels moved.
pub(crate) async fn sort_guild(
    http: &serenity::Http,
    guild_id: serenity::GuildId,
    categories: &[u64],
) -> Result<usize> {
    let channels = guild_id.channels(http).await?;
    let mut moves = Vec::new();

    for category in categories {
        let slots: Vec<ChannelSlot> = channels
            .values()
            .filter(|c| is_sortable(c) && c.parent_id.map(|p| p.get()) == Some(*category))
            .map(|c| ChannelSlot {
                id: c.id.get(),
                name: c.name.clone(),
                position: c.position,
            })
            .collect();

        let planned = plan_positions(&slots);
        log::debug!(
            "Category {} of guild {}: {} of {} channels out of place",
            category,
            guild_id,
            planned.len(),
            slots.len()
        );
        moves.extend(planned);
    }

    if moves.is_empty() {
        return Ok(0);
    }

    let moved = moves.len();
    guild_id
        .reorder_channels(
            http,
            moves
                .into_iter()
                .map(|(id, position)| (serenity::ChannelId::new(id), position as u64)),
        )
        .await?;
    Ok(moved)
}

/// Sorts every configured category of every guild.
///
/// A guild that fails is logged and skipped.
pub(crate) async fn enforce_all(http: &serenity::Http, pool: &db::Pool) -> Result<usize> {
    let categories = {
        let conn = pool.get()?;
        db::get_sorted_categories(&conn)?
    };

    let mut by_guild: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
    for (guild_id, category_id) in categories {
        by_guild.entry(guild_id).or_default().push(category_id);
    }

    let mut moved = 0;
    for (guild_id, categories) in by_guild {
        match sort_guild(http, serenity::GuildId::new(guild_id), &categories).await {
            Ok(n) => moved += n,
            Err(e) => log::error!("Error sorting channels of guild {}: {}", guild_id, e),
        }
    }
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: u64, name: &str, position: u16) -> ChannelSlot {
        ChannelSlot {
            id,
            name: name.to_string(),
            position,
        }
    }

    #[test]
    fn sorted_category_needs_no_moves() {
        let channels = vec![slot(1, "alpha", 3), slot(2, "bravo", 4), slot(3, "charlie", 5)];
        assert!(plan_positions(&channels).is_empty());
    }

    #[test]
    fn reuses_the_category_slots() {
        let channels = vec![slot(1, "charlie", 3), slot(2, "alpha", 7), slot(3, "bravo", 5)];

        let mut moves = plan_positions(&channels);
        moves.sort();

        assert_eq!(moves, vec![(1, 7), (2, 3)]);
    }

    #[test]
    fn ignores_case_and_breaks_ties_by_id() {
        let channels = vec![slot(9, "General", 1), slot(4, "general", 2), slot(5, "Art", 3)];

        let mut moves = plan_positions(&channels);
        moves.sort();

        assert_eq!(moves, vec![(5, 1), (9, 3)]);
    }

    #[test]
    fn spreads_out_shared_positions() {
        let channels = vec![slot(1, "zulu", 0), slot(2, "alpha", 0)];

        assert_eq!(plan_positions(&channels), vec![(1, 1)]);

        let channels = vec![slot(1, "charlie", 4), slot(2, "bravo", 4), slot(3, "alpha", 6)];
        let mut moves = plan_positions(&channels);
        moves.sort();

        assert_eq!(moves, vec![(1, 6), (2, 5), (3, 4)]);
    }

    #[test]
    fn empty_category() {
        assert!(plan_positions(&[]).is_empty());
    }
}
