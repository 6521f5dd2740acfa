use std::fmt::Display;

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{named_params, Connection, ErrorCode, OptionalExtension, Row};

pub(crate) type Pool = r2d2::Pool<SqliteConnectionManager>;

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub(crate) enum Error {
    Sqlite(rusqlite::Error),
    Pool(r2d2::Error),
    Chrono(chrono::ParseError),
    Json(serde_json::Error),
    /// The character is already claimed in this guild by `user_id`.
    CharacterTaken { user_id: u64 },
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Sqlite(e)
    }
}

impl From<r2d2::Error> for Error {
    fn from(e: r2d2::Error) -> Self {
        Error::Pool(e)
    }
}

impl From<chrono::ParseError> for Error {
    fn from(e: chrono::ParseError) -> Self {
        Error::Chrono(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Sqlite(e) => write!(f, "Database error: {}", e),
            Error::Pool(e) => write!(f, "Connection pool error: {}", e),
            Error::Chrono(e) => write!(f, "Error parsing datetime: {}", e),
            Error::Json(e) => write!(f, "Error decoding stored value: {}", e),
            Error::CharacterTaken { user_id } => {
                write!(f, "Character is already claimed by user {}", user_id)
            }
        }
    }
}

impl std::error::Error for Error {}

/// A stored character claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Claim {
    pub guild_id: u64,
    pub user_id: u64,
    pub character_id: String,
    pub character_name: String,
    pub outfit_id: String,
    pub claimed_at: DateTime<Utc>,
}

type ClaimRow = (i64, i64, String, String, String, String);

fn claim_row(row: &Row<'_>) -> rusqlite::Result<ClaimRow> {
    Ok((
        row.get("guild_id")?,
        row.get("user_id")?,
        row.get("character_id")?,
        row.get("character_name")?,
        row.get("outfit_id")?,
        row.get("claimed_at")?,
    ))
}

// Timestamps are stored as RFC 3339 text.
fn into_claim(
    (guild_id, user_id, character_id, character_name, outfit_id, claimed_at): ClaimRow,
) -> Result<Claim> {
    Ok(Claim {
        guild_id: guild_id as u64,
        user_id: user_id as u64,
        character_id,
        character_name,
        outfit_id,
        claimed_at: DateTime::parse_from_rfc3339(&claimed_at)?.with_timezone(&Utc),
    })
}

/// A message reaction that grants a role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ReactionRole {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
    pub emoji: String,
    pub role_id: u64,
    /// Only this user gets the role. Set on join greetings; static roles serve everyone.
    pub member_id: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ReactionRole {
    /// Whether reacting as `user_id` at `now` grants or removes the role.
    pub(crate) fn applies_to(&self, user_id: u64, now: DateTime<Utc>) -> bool {
        self.member_id.map_or(true, |member| member == user_id)
            && self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

type ReactionRoleRow = (i64, i64, i64, String, i64, Option<i64>, Option<String>);

const REACTION_ROLE_COLUMNS: &str =
    "guild_id, channel_id, message_id, emoji, role_id, member_id, expires_at";

fn reaction_role_row(row: &Row<'_>) -> rusqlite::Result<ReactionRoleRow> {
    Ok((
        row.get("guild_id")?,
        row.get("channel_id")?,
        row.get("message_id")?,
        row.get("emoji")?,
        row.get("role_id")?,
        row.get("member_id")?,
        row.get("expires_at")?,
    ))
}

fn into_reaction_role(
    (guild_id, channel_id, message_id, emoji, role_id, member_id, expires_at): ReactionRoleRow,
) -> Result<ReactionRole> {
    Ok(ReactionRole {
        guild_id: guild_id as u64,
        channel_id: channel_id as u64,
        message_id: message_id as u64,
        emoji,
        role_id: role_id as u64,
        member_id: member_id.map(|id| id as u64),
        expires_at: expires_at
            .map(|at| DateTime::parse_from_rfc3339(&at).map(|at| at.with_timezone(&Utc)))
            .transpose()?,
    })
}

// Fixed width, so stored expiries compare correctly as text.
fn expiry_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A role offered to new members through a reaction on their greeting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct JoinRole {
    pub guild_id: u64,
    /// The emoji as typed, so it can be reacted with.
    pub emoji: String,
    pub role_id: u64,
}

/// Where and how new members of a guild are greeted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct JoinSettings {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message: String,
    /// Minutes the greeting's reaction roles stay usable. `None` keeps them forever.
    pub expire_minutes: Option<u32>,
}

/// A channel that announces server boosts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BoostMessage {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message: String,
}

const CLAIM_COLUMNS: &str =
    "guild_id, user_id, character_id, character_name, outfit_id, claimed_at";

pub(crate) fn find_claim_by_member(
    conn: &Connection,
    guild_id: u64,
    user_id: u64,
) -> Result<Option<Claim>> {
    conn.query_row(
        &format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE guild_id = :guild AND user_id = :user"),
        named_params! { ":guild": guild_id as i64, ":user": user_id as i64 },
        claim_row,
    )
    .optional()?
    .map(into_claim)
    .transpose()
}

pub(crate) fn find_claim_by_character(
    conn: &Connection,
    guild_id: u64,
    character_id: &str,
) -> Result<Option<Claim>> {
    conn.query_row(
        &format!(
            "SELECT {CLAIM_COLUMNS} FROM claims WHERE guild_id = :guild AND character_id = :character"
        ),
        named_params! { ":guild": guild_id as i64, ":character": character_id },
        claim_row,
    )
    .optional()?
    .map(into_claim)
    .transpose()
}

pub(crate) fn get_claims(conn: &Connection, guild_id: u64) -> Result<Vec<Claim>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CLAIM_COLUMNS} FROM claims WHERE guild_id = :guild ORDER BY claimed_at"
    ))?;
    let rows = stmt.query_map(named_params! { ":guild": guild_id as i64 }, claim_row)?;

    rows.map(|row| into_claim(row?)).collect()
}

/// Stores the claim, replacing any earlier claim the same user holds in the guild.
///
/// The unique index on `(guild_id, character_id)` rejects a character that another
/// user already holds; that surfaces as [`Error::CharacterTaken`].
pub(crate) fn upsert_claim(conn: &Connection, claim: &Claim) -> Result<()> {
    let query = "INSERT INTO claims (guild_id, user_id, character_id, character_name, outfit_id, claimed_at)
        VALUES (:guild, :user, :character, :name, :outfit, :at)
        ON CONFLICT (guild_id, user_id) DO UPDATE SET
            character_id = excluded.character_id,
            character_name = excluded.character_name,
            outfit_id = excluded.outfit_id,
            claimed_at = excluded.claimed_at";

    let result = conn.execute(
        query,
        named_params! {
            ":guild": claim.guild_id as i64,
            ":user": claim.user_id as i64,
            ":character": claim.character_id,
            ":name": claim.character_name,
            ":outfit": claim.outfit_id,
            ":at": claim.claimed_at.to_rfc3339(),
        },
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => {
            match find_claim_by_character(conn, claim.guild_id, &claim.character_id)? {
                Some(existing) => Err(Error::CharacterTaken {
                    user_id: existing.user_id,
                }),
                None => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn delete_claim(conn: &Connection, guild_id: u64, user_id: u64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM claims WHERE guild_id = :guild AND user_id = :user",
        named_params! { ":guild": guild_id as i64, ":user": user_id as i64 },
    )?;
    Ok(deleted > 0)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

/// Gets the outfit checker settings of a guild as `(outfit, protected ranks)`.
pub(crate) fn get_outfit_settings(
    conn: &Connection,
    guild_id: u64,
) -> Result<Option<(String, Vec<String>)>> {
    let row = conn
        .query_row(
            "SELECT outfit_id, filter_rank FROM guild_settings WHERE guild_id = :guild",
            named_params! { ":guild": guild_id as i64 },
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    match row {
        Some((outfit, ranks)) => Ok(Some((outfit, serde_json::from_str(&ranks)?))),
        None => Ok(None),
    }
}

pub(crate) fn set_outfit_settings(
    conn: &Connection,
    guild_id: u64,
    outfit_id: &str,
    filter_rank: &[String],
) -> Result<()> {
    conn.execute(
        "INSERT INTO guild_settings (guild_id, outfit_id, filter_rank) VALUES (:guild, :outfit, :ranks)
        ON CONFLICT (guild_id) DO UPDATE SET outfit_id = excluded.outfit_id, filter_rank = excluded.filter_rank",
        named_params! {
            ":guild": guild_id as i64,
            ":outfit": outfit_id,
            ":ranks": serde_json::to_string(filter_rank)?,
        },
    )?;
    Ok(())
}

pub(crate) fn upsert_reaction_role(conn: &Connection, role: &ReactionRole) -> Result<()> {
    conn.execute(
        "INSERT INTO reaction_roles (guild_id, channel_id, message_id, emoji, role_id, member_id, expires_at)
        VALUES (:guild, :channel, :message, :emoji, :role, :member, :expires)
        ON CONFLICT (message_id, emoji) DO UPDATE SET
            role_id = excluded.role_id,
            member_id = excluded.member_id,
            expires_at = excluded.expires_at",
        named_params! {
            ":guild": role.guild_id as i64,
            ":channel": role.channel_id as i64,
            ":message": role.message_id as i64,
            ":emoji": role.emoji,
            ":role": role.role_id as i64,
            ":member": role.member_id.map(|id| id as i64),
            ":expires": role.expires_at.map(expiry_text),
        },
    )?;
    Ok(())
}

pub(crate) fn find_reaction_role(
    conn: &Connection,
    message_id: u64,
    emoji: &str,
) -> Result<Option<ReactionRole>> {
    conn.query_row(
        &format!(
            "SELECT {REACTION_ROLE_COLUMNS} FROM reaction_roles
            WHERE message_id = :message AND emoji = :emoji"
        ),
        named_params! { ":message": message_id as i64, ":emoji": emoji },
        reaction_role_row,
    )
    .optional()?
    .map(into_reaction_role)
    .transpose()
}

/// Gets the reaction roles of a guild that serve everyone.
pub(crate) fn get_static_reaction_roles(conn: &Connection, guild_id: u64) -> Result<Vec<ReactionRole>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REACTION_ROLE_COLUMNS} FROM reaction_roles
        WHERE guild_id = :guild AND member_id IS NULL
        ORDER BY channel_id, message_id, emoji"
    ))?;
    let rows = stmt.query_map(named_params! { ":guild": guild_id as i64 }, reaction_role_row)?;

    rows.map(|row| into_reaction_role(row?)).collect()
}

/// Deletes reaction roles that expired before `now`. Returns how many were deleted.
pub(crate) fn delete_expired_reaction_roles(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM reaction_roles WHERE expires_at IS NOT NULL AND expires_at <= :now",
        named_params! { ":now": expiry_text(now) },
    )?;
    Ok(deleted)
}

pub(crate) fn delete_reaction_role(conn: &Connection, message_id: u64, emoji: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM reaction_roles WHERE message_id = :message AND emoji = :emoji",
        named_params! { ":message": message_id as i64, ":emoji": emoji },
    )?;
    Ok(deleted > 0)
}

pub(crate) fn set_sorted_category(
    conn: &Connection,
    guild_id: u64,
    category_id: u64,
    enabled: bool,
) -> Result<()> {
    let query = if enabled {
        "INSERT OR IGNORE INTO sorted_categories (guild_id, category_id) VALUES (:guild, :category)"
    } else {
        "DELETE FROM sorted_categories WHERE guild_id = :guild AND category_id = :category"
    };
    conn.execute(
        query,
        named_params! { ":guild": guild_id as i64, ":category": category_id as i64 },
    )?;
    Ok(())
}

/// Gets every sorted category as `(guild_id, category_id)`, grouped by guild.
pub(crate) fn get_sorted_categories(conn: &Connection) -> Result<Vec<(u64, u64)>> {
    let mut stmt = conn
        .prepare("SELECT guild_id, category_id FROM sorted_categories ORDER BY guild_id, category_id")?;
    let rows = stmt.query_map((), |row| {
        Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64))
    })?;

    rows.map(|row| row.map_err(Error::from)).collect()
}

pub(crate) fn upsert_join_role(conn: &Connection, role: &JoinRole) -> Result<()> {
    conn.execute(
        "INSERT INTO on_join_roles (guild_id, emoji, role_id) VALUES (:guild, :emoji, :role)
        ON CONFLICT (guild_id, emoji) DO UPDATE SET role_id = excluded.role_id",
        named_params! {
            ":guild": role.guild_id as i64,
            ":emoji": role.emoji,
            ":role": role.role_id as i64,
        },
    )?;
    Ok(())
}

pub(crate) fn delete_join_role(conn: &Connection, guild_id: u64, emoji: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM on_join_roles WHERE guild_id = :guild AND emoji = :emoji",
        named_params! { ":guild": guild_id as i64, ":emoji": emoji },
    )?;
    Ok(deleted > 0)
}

pub(crate) fn get_join_roles(conn: &Connection, guild_id: u64) -> Result<Vec<JoinRole>> {
    let mut stmt = conn.prepare(
        "SELECT guild_id, emoji, role_id FROM on_join_roles WHERE guild_id = :guild ORDER BY rowid",
    )?;
    let rows = stmt.query_map(named_params! { ":guild": guild_id as i64 }, |row| {
        Ok(JoinRole {
            guild_id: row.get::<_, i64>(0)? as u64,
            emoji: row.get(1)?,
            role_id: row.get::<_, i64>(2)? as u64,
        })
    })?;

    rows.map(|row| row.map_err(Error::from)).collect()
}

pub(crate) fn set_join_settings(conn: &Connection, settings: &JoinSettings) -> Result<()> {
    conn.execute(
        "INSERT INTO on_join_settings (guild_id, channel_id, message, expire_minutes)
        VALUES (:guild, :channel, :message, :expire)
        ON CONFLICT (guild_id) DO UPDATE SET
            channel_id = excluded.channel_id,
            message = excluded.message,
            expire_minutes = excluded.expire_minutes",
        named_params! {
            ":guild": settings.guild_id as i64,
            ":channel": settings.channel_id as i64,
            ":message": settings.message,
            ":expire": settings.expire_minutes,
        },
    )?;
    Ok(())
}

pub(crate) fn get_join_settings(conn: &Connection, guild_id: u64) -> Result<Option<JoinSettings>> {
    let settings = conn
        .query_row(
            "SELECT guild_id, channel_id, message, expire_minutes FROM on_join_settings
            WHERE guild_id = :guild",
            named_params! { ":guild": guild_id as i64 },
            |row| {
                Ok(JoinSettings {
                    guild_id: row.get::<_, i64>(0)? as u64,
                    channel_id: row.get::<_, i64>(1)? as u64,
                    message: row.get(2)?,
                    expire_minutes: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(settings)
}

pub(crate) fn delete_join_settings(conn: &Connection, guild_id: u64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM on_join_settings WHERE guild_id = :guild",
        named_params! { ":guild": guild_id as i64 },
    )?;
    Ok(deleted > 0)
}

pub(crate) fn upsert_boost_message(conn: &Connection, boost: &BoostMessage) -> Result<()> {
    conn.execute(
        "INSERT INTO boost_messages (guild_id, channel_id, message) VALUES (:guild, :channel, :message)
        ON CONFLICT (guild_id, channel_id) DO UPDATE SET message = excluded.message",
        named_params! {
            ":guild": boost.guild_id as i64,
            ":channel": boost.channel_id as i64,
            ":message": boost.message,
        },
    )?;
    Ok(())
}

pub(crate) fn delete_boost_message(conn: &Connection, guild_id: u64, channel_id: u64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM boost_messages WHERE guild_id = :guild AND channel_id = :channel",
        named_params! { ":guild": guild_id as i64, ":channel": channel_id as i64 },
    )?;
    Ok(deleted > 0)
}

pub(crate) fn get_boost_messages(conn: &Connection, guild_id: u64) -> Result<Vec<BoostMessage>> {
    let mut stmt = conn.prepare(
        "SELECT guild_id, channel_id, message FROM boost_messages
        WHERE guild_id = :guild ORDER BY channel_id",
    )?;
    let rows = stmt.query_map(named_params! { ":guild": guild_id as i64 }, |row| {
        Ok(BoostMessage {
            guild_id: row.get::<_, i64>(0)? as u64,
            channel_id: row.get::<_, i64>(1)? as u64,
            message: row.get(2)?,
        })
    })?;

    rows.map(|row| row.map_err(Error::from)).collect()
}

pub(crate) fn setup(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS claims (
            guild_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            character_id TEXT NOT NULL,
            character_name TEXT NOT NULL,
            outfit_id TEXT NOT NULL,
            claimed_at TEXT NOT NULL,
            PRIMARY KEY (guild_id, user_id)
        );
        CREATE UNIQUE INDEX IF NOT EXISTS claims_character ON claims (guild_id, character_id);

        CREATE TABLE IF NOT EXISTS guild_settings (
            guild_id INTEGER PRIMARY KEY,
            outfit_id TEXT NOT NULL,
            filter_rank TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE IF NOT EXISTS reaction_roles (
            guild_id INTEGER NOT NULL,
            channel_id INTEGER NOT NULL,
            message_id INTEGER NOT NULL,
            emoji TEXT NOT NULL,
            role_id INTEGER NOT NULL,
            member_id INTEGER,
            expires_at TEXT,
            PRIMARY KEY (message_id, emoji)
        );

        CREATE TABLE IF NOT EXISTS on_join_roles (
            guild_id INTEGER NOT NULL,
            emoji TEXT NOT NULL,
            role_id INTEGER NOT NULL,
            PRIMARY KEY (guild_id, emoji)
        );

        CREATE TABLE IF NOT EXISTS on_join_settings (
            guild_id INTEGER PRIMARY KEY,
            channel_id INTEGER NOT NULL,
            message TEXT NOT NULL,
            expire_minutes INTEGER
        );

        CREATE TABLE IF NOT EXISTS boost_messages (
            guild_id INTEGER NOT NULL,
            channel_id INTEGER NOT NULL,
            message TEXT NOT NULL,
            UNIQUE (guild_id, channel_id)
        );

        CREATE TABLE IF NOT EXISTS sorted_categories (
            guild_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            PRIMARY KEY (guild_id, category_id)
        );",
    )?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn memory_pool() -> Pool {
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .build(SqliteConnectionManager::memory())
        .expect("Failed to create in-memory pool");
    setup(&pool.get().expect("Failed to get connection")).expect("Failed to setup database");
    pool
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn claim(guild_id: u64, user_id: u64, character_id: &str) -> Claim {
        Claim {
            guild_id,
            user_id,
            character_id: character_id.to_string(),
            character_name: format!("Name{character_id}"),
            outfit_id: "OUT1".to_string(),
            claimed_at: Utc::now(),
        }
    }

    #[test]
    fn claim_lookup_by_member_and_character() -> Result<()> {
        let pool = memory_pool();
        let conn = pool.get()?;

        upsert_claim(&conn, &claim(1, 10, "100"))?;

        let by_member = find_claim_by_member(&conn, 1, 10)?.expect("claim by member");
        assert_eq!(by_member.character_id, "100");
        let by_character = find_claim_by_character(&conn, 1, "100")?.expect("claim by character");
        assert_eq!(by_character.user_id, 10);

        assert!(find_claim_by_member(&conn, 2, 10)?.is_none());
        Ok(())
    }

    #[test]
    fn second_claim_of_character_is_rejected() -> Result<()> {
        let pool = memory_pool();
        let conn = pool.get()?;

        upsert_claim(&conn, &claim(1, 10, "100"))?;
        let result = upsert_claim(&conn, &claim(1, 11, "100"));

        assert!(matches!(result, Err(Error::CharacterTaken { user_id: 10 })));
        assert_eq!(get_claims(&conn, 1)?.len(), 1);

        // Other guilds are independent.
        upsert_claim(&conn, &claim(2, 11, "100"))?;
        Ok(())
    }

    #[test]
    fn reclaiming_replaces_the_members_claim() -> Result<()> {
        let pool = memory_pool();
        let conn = pool.get()?;

        upsert_claim(&conn, &claim(1, 10, "100"))?;
        upsert_claim(&conn, &claim(1, 10, "200"))?;

        let claims = get_claims(&conn, 1)?;
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].character_id, "200");
        assert!(find_claim_by_character(&conn, 1, "100")?.is_none());
        Ok(())
    }

    #[test]
    fn delete_claim_reports_removal() -> Result<()> {
        let pool = memory_pool();
        let conn = pool.get()?;

        upsert_claim(&conn, &claim(1, 10, "100"))?;
        assert!(delete_claim(&conn, 1, 10)?);
        assert!(!delete_claim(&conn, 1, 10)?);
        Ok(())
    }

    #[test]
    fn outfit_settings_round_trip_keeps_rank_order() -> Result<()> {
        let pool = memory_pool();
        let conn = pool.get()?;

        assert!(get_outfit_settings(&conn, 1)?.is_none());

        let ranks = vec!["Leader".to_string(), "Officer".to_string()];
        set_outfit_settings(&conn, 1, "OUT1", &ranks)?;
        set_outfit_settings(&conn, 1, "OUT2", &ranks)?;

        assert_eq!(get_outfit_settings(&conn, 1)?, Some(("OUT2".to_string(), ranks)));
        Ok(())
    }

    #[test]
    fn reaction_roles_are_keyed_by_message_and_emoji() -> Result<()> {
        let pool = memory_pool();
        let conn = pool.get()?;

        let role = ReactionRole {
            guild_id: 1,
            channel_id: 2,
            message_id: 3,
            emoji: "👍".to_string(),
            role_id: 4,
            member_id: None,
            expires_at: None,
        };
        upsert_reaction_role(&conn, &role)?;
        upsert_reaction_role(&conn, &ReactionRole { role_id: 5, ..role.clone() })?;

        let found = find_reaction_role(&conn, 3, "👍")?.expect("reaction role");
        assert_eq!(found.role_id, 5);
        assert!(find_reaction_role(&conn, 3, "👎")?.is_none());

        assert!(delete_reaction_role(&conn, 3, "👍")?);
        assert!(find_reaction_role(&conn, 3, "👍")?.is_none());
        Ok(())
    }

    #[test]
    fn sorted_categories_toggle() -> Result<()> {
        let pool = memory_pool();
        let conn = pool.get()?;

        set_sorted_category(&conn, 1, 20, true)?;
        set_sorted_category(&conn, 1, 20, true)?;
        set_sorted_category(&conn, 1, 10, true)?;
        set_sorted_category(&conn, 2, 30, true)?;
        assert_eq!(get_sorted_categories(&conn)?, vec![(1, 10), (1, 20), (2, 30)]);

        set_sorted_category(&conn, 1, 20, false)?;
        assert_eq!(get_sorted_categories(&conn)?, vec![(1, 10), (2, 30)]);
        Ok(())
    }

    #[test]
    fn static_roles_leave_out_greeting_roles() -> Result<()> {
        let pool = memory_pool();
        let conn = pool.get()?;

        let static_role = ReactionRole {
            guild_id: 1,
            channel_id: 2,
            message_id: 3,
            emoji: "👍".to_string(),
            role_id: 4,
            member_id: None,
            expires_at: None,
        };
        upsert_reaction_role(&conn, &static_role)?;
        upsert_reaction_role(
            &conn,
            &ReactionRole {
                message_id: 9,
                member_id: Some(10),
                ..static_role.clone()
            },
        )?;
        upsert_reaction_role(&conn, &ReactionRole { guild_id: 5, message_id: 6, ..static_role.clone() })?;

        assert_eq!(get_static_reaction_roles(&conn, 1)?, vec![static_role]);
        Ok(())
    }

    #[test]
    fn expired_reaction_roles_are_deleted() -> Result<()> {
        let pool = memory_pool();
        let conn = pool.get()?;
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();

        let role = |message_id, expires_at| ReactionRole {
            guild_id: 1,
            channel_id: 2,
            message_id,
            emoji: "👍".to_string(),
            role_id: 4,
            member_id: Some(10),
            expires_at,
        };
        upsert_reaction_role(&conn, &role(1, Some(now - chrono::Duration::minutes(1))))?;
        upsert_reaction_role(&conn, &role(2, Some(now + chrono::Duration::minutes(1))))?;
        upsert_reaction_role(&conn, &role(3, None))?;

        assert_eq!(delete_expired_reaction_roles(&conn, now)?, 1);
        assert!(find_reaction_role(&conn, 1, "👍")?.is_none());
        let kept = find_reaction_role(&conn, 2, "👍")?.expect("unexpired role");
        assert_eq!(kept.expires_at, Some(now + chrono::Duration::minutes(1)));
        assert!(find_reaction_role(&conn, 3, "👍")?.is_some());
        Ok(())
    }

    #[test]
    fn greeting_roles_only_serve_their_member_until_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let role = ReactionRole {
            guild_id: 1,
            channel_id: 2,
            message_id: 3,
            emoji: "👍".to_string(),
            role_id: 4,
            member_id: Some(10),
            expires_at: Some(now + chrono::Duration::minutes(5)),
        };

        assert!(role.applies_to(10, now));
        assert!(!role.applies_to(11, now));
        assert!(!role.applies_to(10, now + chrono::Duration::minutes(5)));

        let static_role = ReactionRole {
            member_id: None,
            expires_at: None,
            ..role
        };
        assert!(static_role.applies_to(11, now));
    }

    #[test]
    fn join_settings_and_roles() -> Result<()> {
        let pool = memory_pool();
        let conn = pool.get()?;

        assert!(get_join_settings(&conn, 1)?.is_none());
        let settings = JoinSettings {
            guild_id: 1,
            channel_id: 2,
            message: "Welcome {member}!".to_string(),
            expire_minutes: Some(60),
        };
        set_join_settings(&conn, &settings)?;
        set_join_settings(&conn, &JoinSettings { expire_minutes: None, ..settings.clone() })?;
        assert_eq!(
            get_join_settings(&conn, 1)?,
            Some(JoinSettings { expire_minutes: None, ..settings })
        );

        let role = |emoji: &str, role_id| JoinRole {
            guild_id: 1,
            emoji: emoji.to_string(),
            role_id,
        };
        upsert_join_role(&conn, &role("🅰", 10))?;
        upsert_join_role(&conn, &role("🅱", 11))?;
        upsert_join_role(&conn, &role("🅰", 12))?;
        assert_eq!(get_join_roles(&conn, 1)?, vec![role("🅰", 12), role("🅱", 11)]);
        assert!(get_join_roles(&conn, 2)?.is_empty());

        assert!(delete_join_role(&conn, 1, "🅰")?);
        assert!(!delete_join_role(&conn, 1, "🅰")?);
        assert!(delete_join_settings(&conn, 1)?);
        assert!(get_join_settings(&conn, 1)?.is_none());
        Ok(())
    }

    #[test]
    fn boost_messages_are_unique_per_channel() -> Result<()> {
        let pool = memory_pool();
        let conn = pool.get()?;

        let boost = |channel_id, message: &str| BoostMessage {
            guild_id: 1,
            channel_id,
            message: message.to_string(),
        };
        upsert_boost_message(&conn, &boost(20, "Thanks {member}"))?;
        upsert_boost_message(&conn, &boost(10, "Boost!"))?;
        upsert_boost_message(&conn, &boost(20, "Thank you {member}"))?;

        assert_eq!(
            get_boost_messages(&conn, 1)?,
            vec![boost(10, "Boost!"), boost(20, "Thank you {member}")]
        );

        assert!(delete_boost_message(&conn, 1, 10)?);
        assert!(!delete_boost_message(&conn, 1, 10)?);
        assert_eq!(get_boost_messages(&conn, 1)?.len(), 1);
        Ok(())
    }
}
