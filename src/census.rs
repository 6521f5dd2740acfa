//! Character lookups against the PlanetSide 2 Census API.

use std::fmt::Display;

use async_trait::async_trait;
use serde::Deserialize;

const CENSUS_URL: &str = "https://census.daybreakgames.com";

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub(crate) enum Error {
    Http(reqwest::Error),
    /// The API answered, but with an error payload instead of data.
    Api(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(e) => write!(f, "Census request failed: {}", e),
            Error::Api(e) => write!(f, "Census returned an error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

/// A character's membership in an outfit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct OutfitMembership {
    pub outfit_id: String,
    pub rank: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Character {
    pub id: String,
    pub name: String,
    pub outfit: Option<OutfitMembership>,
}

impl Character {
    pub(crate) fn outfit_id(&self) -> Option<&str> {
        self.outfit.as_ref().map(|o| o.outfit_id.as_str())
    }

    pub(crate) fn rank(&self) -> Option<&str> {
        self.outfit.as_ref().map(|o| o.rank.as_str())
    }
}

/// Resolves character names to characters, including their outfit membership.
#[async_trait]
pub(crate) trait CharacterDirectory: Send + Sync {
    async fn get_character_by_name(&self, name: &str) -> Result<Option<Character>>;
}

#[derive(Deserialize)]
struct CharacterList {
    #[serde(default)]
    character_list: Vec<CensusCharacter>,
    error: Option<String>,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

#[derive(Deserialize)]
struct CensusCharacter {
    character_id: String,
    name: CensusName,
    outfit_member: Option<CensusOutfitMember>,
}

#[derive(Deserialize)]
struct CensusName {
    first: String,
}

#[derive(Deserialize)]
struct CensusOutfitMember {
    outfit_id: String,
    rank: String,
}

impl From<CensusCharacter> for Character {
    fn from(c: CensusCharacter) -> Self {
        Self {
            id: c.character_id,
            name: c.name.first,
            outfit: c.outfit_member.map(|m| OutfitMembership {
                outfit_id: m.outfit_id,
                rank: m.rank,
            }),
        }
    }
}

impl CharacterList {
    /// The first listed character, or the error the API answered with.
    fn into_character(self) -> Result<Option<Character>> {
        if let Some(error) = self.error.or(self.error_code) {
            return Err(Error::Api(error));
        }

        Ok(self.character_list.into_iter().next().map(Character::from))
    }
}

/// Census names are alphanumeric; anything else can never resolve.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

pub(crate) struct CensusClient {
    http: reqwest::Client,
    base_url: String,
}

impl CensusClient {
    pub(crate) fn new(service_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{CENSUS_URL}/s:{service_id}/get/ps2:v2"),
        }
    }
}

#[async_trait]
impl CharacterDirectory for CensusClient {
    async fn get_character_by_name(&self, name: &str) -> Result<Option<Character>> {
        let name = name.trim();
        if !is_valid_name(name) {
            log::debug!("Skipping Census lookup for invalid name `{name}`");
            return Ok(None);
        }

        log::debug!("Looking up character `{name}`");
        let lower = name.to_lowercase();
        let list = self
            .http
            .get(format!("{}/character/", self.base_url))
            .query(&[
                ("name.first_lower", lower.as_str()),
                ("c:resolve", "outfit_member"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<CharacterList>()
            .await?;

        list.into_character()
    }
}
