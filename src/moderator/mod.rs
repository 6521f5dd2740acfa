//! Character claim verification.
//!
//! A guild member claims an in-game character. The claim is accepted when the
//! character exists, belongs to the guild's outfit, does not hold a protected
//! rank and is not already claimed by someone else in the guild.


use std::fmt::Display;

use chrono::Utc;

use crate::{
    census::{self, Character, CharacterDirectory},
    db::{self, Claim},
};

/// A member of a guild, as seen by the moderation workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Member {
    pub guild_id: u64,
    pub user_id: u64,
}

impl Member {
    pub(crate) fn new(guild_id: u64, user_id: u64) -> Self {
        Self { guild_id, user_id }
    }

    pub(crate) fn mention(&self) -> String {
        format!("<@{}>", self.user_id)
    }
}

/// Per-guild settings of the outfit checker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct OutfitChecker {
    /// Id of the outfit a character must belong to.
    pub outfit: String,
    /// Ranks whose characters cannot be claimed.
    pub filter_rank: Vec<String>,
}

/// Storage of character claims.
pub(crate) trait ClaimStore: Send + Sync {
    fn find_by_member(&self, member: &Member) -> db::Result<Option<Claim>>;

    /// Gets the claim on `character_id` in the guild, whoever holds it.
    fn claimant(&self, guild_id: u64, character_id: &str) -> db::Result<Option<Claim>>;

    /// Stores a claim linking the member to the character.
    ///
    /// Fails with [`db::Error::CharacterTaken`] when another member of the guild
    /// holds the character.
    fn claim(&self, member: &Member, character: &Character) -> db::Result<Claim>;

    fn revoke(&self, member: &Member) -> db::Result<Option<Claim>>;

    fn list(&self, guild_id: u64) -> db::Result<Vec<Claim>>;

    fn has_claim(&self, member: &Member) -> db::Result<bool> {
        Ok(self.find_by_member(member)?.is_some())
    }

    fn is_claimed(&self, guild_id: u64, character_id: &str) -> db::Result<bool> {
        Ok(self.claimant(guild_id, character_id)?.is_some())
    }
}

/// Lookup of per-guild outfit checker settings.
pub(crate) trait GuildSettings: Send + Sync {
    fn outfit_checker(&self, guild_id: u64) -> db::Result<Option<OutfitChecker>>;

    fn set_outfit_checker(&self, guild_id: u64, checker: &OutfitChecker) -> db::Result<()>;
}

/// Receives the outcome of every moderation request.
pub(crate) trait ClaimNotifier: Send + Sync {
    fn claimed(&self, member: &Member, claim: &Claim);

    fn rejected(&self, member: &Member, error: &ModerationError);

    fn revoked(&self, member: &Member, claim: &Claim);
}

/// Writes moderation outcomes to the log.
pub(crate) struct LogNotifier;

impl ClaimNotifier for LogNotifier {
    fn claimed(&self, member: &Member, claim: &Claim) {
        log::info!(
            "User {} claimed character {} ({}) in guild {}",
            member.user_id,
            claim.character_name,
            claim.character_id,
            member.guild_id
        );
    }

    fn rejected(&self, member: &Member, error: &ModerationError) {
        if error.is_user_facing() {
            log::info!(
                "Rejected claim of user {} in guild {}: {}",
                member.user_id,
                member.guild_id,
                error
            );
        } else {
            log::error!(
                "Claim of user {} in guild {} failed: {}",
                member.user_id,
                member.guild_id,
                error
            );
        }
    }

    fn revoked(&self, member: &Member, claim: &Claim) {
        log::info!(
            "Revoked claim of user {} on {} in guild {}",
            member.user_id,
            claim.character_name,
            member.guild_id
        );
    }
}

#[derive(Debug)]
pub(crate) enum ModerationError {
    AlreadyClaimed {
        member: Member,
    },
    CharacterNotFound {
        member: Member,
        name: String,
    },
    NotInOutfit {
        member: Member,
        character: Character,
    },
    ProtectedRank {
        member: Member,
        character: Character,
    },
    AlreadyClaimedByOther {
        member: Member,
        claimant: Member,
        character: Character,
    },
    /// The guild has no outfit checker settings.
    NotConfigured {
        guild_id: u64,
    },
    Store(db::Error),
    Directory(census::Error),
}

impl ModerationError {
    /// Whether the error describes the request itself, rather than a failure
    /// of the bot's collaborators.
    pub(crate) fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::Directory(_))
    }
}

impl From<db::Error> for ModerationError {
    fn from(e: db::Error) -> Self {
        ModerationError::Store(e)
    }
}

impl From<census::Error> for ModerationError {
    fn from(e: census::Error) -> Self {
        ModerationError::Directory(e)
    }
}

impl Display for ModerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyClaimed { member } => {
                write!(f, "{} already has a claimed character.", member.mention())
            }
            Self::CharacterNotFound { member, name } => write!(
                f,
                "{}, no character named **{}** was found.",
                member.mention(),
                name
            ),
            Self::NotInOutfit { member, character } => write!(
                f,
                "{}, **{}** is not a member of this server's outfit.",
                member.mention(),
                character.name
            ),
            Self::ProtectedRank { member, character } => write!(
                f,
                "{}, **{}** holds a protected rank and cannot be claimed.",
                member.mention(),
                character.name
            ),
            Self::AlreadyClaimedByOther {
                member,
                claimant,
                character,
            } => write!(
                f,
                "{}, **{}** is already claimed by {}.",
                member.mention(),
                character.name,
                claimant.mention()
            ),
            Self::NotConfigured { .. } => {
                write!(f, "The outfit checker is not configured for this server.")
            }
            Self::Store(e) => write!(f, "{}", e),
            Self::Directory(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ModerationError {}

pub(crate) type Result<T, E = ModerationError> = std::result::Result<T, E>;

pub(crate) struct OutfitModerator {
    directory: Box<dyn CharacterDirectory>,
    claims: Box<dyn ClaimStore>,
    settings: Box<dyn GuildSettings>,
    notifier: Box<dyn ClaimNotifier>,
}

impl OutfitModerator {
    pub(crate) fn new(
        directory: Box<dyn CharacterDirectory>,
        claims: Box<dyn ClaimStore>,
        settings: Box<dyn GuildSettings>,
        notifier: Box<dyn ClaimNotifier>,
    ) -> Self {
        Self {
            directory,
            claims,
            settings,
            notifier,
        }
    }

    pub(crate) fn claims(&self) -> &dyn ClaimStore {
        self.claims.as_ref()
    }

    pub(crate) fn settings(&self) -> &dyn GuildSettings {
        self.settings.as_ref()
    }

    /// Claims a character for a member without a claim.
    ///
    /// Members holding a claim are rejected before the character is looked up.
    pub(crate) async fn make_claim(&self, member: &Member, name: &str) -> Result<Claim> {
        let result = match self.claims.has_claim(member) {
            Ok(true) => Err(ModerationError::AlreadyClaimed { member: *member }),
            Ok(false) => self.validate_and_claim(member, name).await,
            Err(e) => Err(e.into()),
        };
        self.report(member, result)
    }

    /// Claims a character for a member, replacing the member's current claim.
    pub(crate) async fn revalidate_claim(&self, member: &Member, name: &str) -> Result<Claim> {
        let result = self.validate_and_claim(member, name).await;
        self.report(member, result)
    }

    /// Removes the member's claim, if any.
    pub(crate) fn revoke(&self, member: &Member) -> Result<Option<Claim>> {
        let revoked = self.claims.revoke(member)?;
        if let Some(claim) = &revoked {
            self.notifier.revoked(member, claim);
        }
        Ok(revoked)
    }

    /// Checks the character against the outfit checker settings of the member's guild.
    pub(crate) fn filter(&self, member: &Member, character: &Character) -> Result<()> {
        let checker = self
            .settings
            .outfit_checker(member.guild_id)?
            .ok_or(ModerationError::NotConfigured {
                guild_id: member.guild_id,
            })?;

        if character.outfit_id() != Some(checker.outfit.as_str()) {
            return Err(ModerationError::NotInOutfit {
                member: *member,
                character: character.clone(),
            });
        }

        if let Some(rank) = character.rank() {
            if checker.filter_rank.iter().any(|r| r == rank) {
                return Err(ModerationError::ProtectedRank {
                    member: *member,
                    character: character.clone(),
                });
            }
        }

        Ok(())
    }

    async fn validate_and_claim(&self, member: &Member, name: &str) -> Result<Claim> {
        let character = self
            .directory
            .get_character_by_name(name)
            .await?
            .ok_or_else(|| ModerationError::CharacterNotFound {
                member: *member,
                name: name.trim().to_string(),
            })?;

        self.filter(member, &character)?;

        if self.claims.is_claimed(member.guild_id, &character.id)? {
            let holder = self.claims.claimant(member.guild_id, &character.id)?;
            if let Some(existing) = holder.filter(|c| c.user_id != member.user_id) {
                return Err(ModerationError::AlreadyClaimedByOther {
                    member: *member,
                    claimant: Member::new(existing.guild_id, existing.user_id),
                    character,
                });
            }
        }

        // A concurrent claim can still win the race; storage has the final word.
        match self.claims.claim(member, &character) {
            Ok(claim) => Ok(claim),
            Err(db::Error::CharacterTaken { user_id }) => {
                Err(ModerationError::AlreadyClaimedByOther {
                    member: *member,
                    claimant: Member::new(member.guild_id, user_id),
                    character,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn report(&self, member: &Member, result: Result<Claim>) -> Result<Claim> {
        match &result {
            Ok(claim) => self.notifier.claimed(member, claim),
            Err(e) => self.notifier.rejected(member, e),
        }
        result
    }
}

/// Claims and settings kept in the bot's SQLite database.
#[derive(Clone)]
pub(crate) struct SqliteStore {
    pool: db::Pool,
}

impl SqliteStore {
    pub(crate) fn new(pool: db::Pool) -> Self {
        Self { pool }
    }
}

impl ClaimStore for SqliteStore {
    fn find_by_member(&self, member: &Member) -> db::Result<Option<Claim>> {
        let conn = self.pool.get()?;
        db::find_claim_by_member(&conn, member.guild_id, member.user_id)
    }

    fn claimant(&self, guild_id: u64, character_id: &str) -> db::Result<Option<Claim>> {
        let conn = self.pool.get()?;
        db::find_claim_by_character(&conn, guild_id, character_id)
    }

    fn claim(&self, member: &Member, character: &Character) -> db::Result<Claim> {
        let conn = self.pool.get()?;
        let claim = Claim {
            guild_id: member.guild_id,
            user_id: member.user_id,
            character_id: character.id.clone(),
            character_name: character.name.clone(),
            outfit_id: character.outfit_id().unwrap_or_default().to_string(),
            claimed_at: Utc::now(),
        };

        db::upsert_claim(&conn, &claim)?;
        Ok(claim)
    }

    fn revoke(&self, member: &Member) -> db::Result<Option<Claim>> {
        let conn = self.pool.get()?;
        let existing = db::find_claim_by_member(&conn, member.guild_id, member.user_id)?;
        if existing.is_some() {
            db::delete_claim(&conn, member.guild_id, member.user_id)?;
        }
        Ok(existing)
    }

    fn list(&self, guild_id: u64) -> db::Result<Vec<Claim>> {
        let conn = self.pool.get()?;
        db::get_claims(&conn, guild_id)
    }
}

impl GuildSettings for SqliteStore {
    fn outfit_checker(&self, guild_id: u64) -> db::Result<Option<OutfitChecker>> {
        let conn = self.pool.get()?;
        Ok(db::get_outfit_settings(&conn, guild_id)?
            .map(|(outfit, filter_rank)| OutfitChecker {
                outfit,
                filter_rank,
            }))
    }

    fn set_outfit_checker(&self, guild_id: u64, checker: &OutfitChecker) -> db::Result<()> {
        let conn = self.pool.get()?;
        db::set_outfit_settings(&conn, guild_id, &checker.outfit, &checker.filter_rank)
    }
}
