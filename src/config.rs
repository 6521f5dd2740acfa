use std::{env, fmt::Display};

/// Longest accepted sort interval: one week.
const MAX_SORT_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Error {
    Missing(&'static str),
    Invalid { var: &'static str, value: String },
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Missing(var) => write!(f, "Expected {} in the environment", var),
            Error::Invalid { var, value } => write!(f, "Invalid value for {}: `{}`", var, value),
        }
    }
}

impl std::error::Error for Error {}

#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub token: String,
    pub database_path: String,
    /// Commands are registered in this guild only, instead of globally.
    pub guild_id: Option<u64>,
    pub census_service_id: String,
    pub command_prefix: String,
    pub channel_positions_enforcement: bool,
    pub sort_interval_minutes: u64,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |var: &'static str| lookup(var).ok_or(Error::Missing(var));
        let optional = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());

        let guild_id = optional("GUILD_ID")
            .map(|value| {
                value.trim().parse::<u64>().map_err(|_| Error::Invalid {
                    var: "GUILD_ID",
                    value,
                })
            })
            .transpose()?;

        let channel_positions_enforcement = optional("CHANNEL_POSITIONS_ENFORCEMENT")
            .map(|value| parse_bool("CHANNEL_POSITIONS_ENFORCEMENT", value))
            .transpose()?
            .unwrap_or(false);

        let sort_interval_minutes = match optional("SORT_INTERVAL_MINUTES") {
            Some(value) => {
                let minutes = value.trim().parse::<u64>();
                match minutes {
                    Ok(minutes) if (1..=MAX_SORT_INTERVAL_MINUTES).contains(&minutes) => minutes,
                    _ => {
                        return Err(Error::Invalid {
                            var: "SORT_INTERVAL_MINUTES",
                            value,
                        })
                    }
                }
            }
            None => 60,
        };

        Ok(Self {
            token: required("DISCORD_TOKEN")?,
            database_path: required("DATABASE_PATH")?,
            guild_id,
            census_service_id: optional("CENSUS_SERVICE_ID").unwrap_or_else(|| "example".into()),
            command_prefix: optional("COMMAND_PREFIX").unwrap_or_else(|| "!".into()),
            channel_positions_enforcement,
            sort_interval_minutes,
        })
    }
}

fn parse_bool(var: &'static str, value: String) -> Result<bool> {
    let normalized = value.trim().to_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    const BASE: [(&str, &str); 2] = [("DISCORD_TOKEN", "token"), ("DATABASE_PATH", "bot.db")];

    #[test]
    fn defaults() {
        let config = config(&BASE).unwrap();

        assert_eq!(config.token, "token");
        assert_eq!(config.database_path, "bot.db");
        assert_eq!(config.guild_id, None);
        assert_eq!(config.census_service_id, "example");
        assert_eq!(config.command_prefix, "!");
        assert!(!config.channel_positions_enforcement);
        assert_eq!(config.sort_interval_minutes, 60);
    }

    #[test]
    fn missing_token() {
        let err = config(&[("DATABASE_PATH", "bot.db")]).unwrap_err();
        assert_eq!(err, Error::Missing("DISCORD_TOKEN"));
    }

    #[test]
    fn overrides() {
        let mut vars = BASE.to_vec();
        vars.extend([
            ("GUILD_ID", "123"),
            ("CHANNEL_POSITIONS_ENFORCEMENT", "Yes"),
            ("SORT_INTERVAL_MINUTES", "15"),
            ("COMMAND_PREFIX", "?"),
            ("CENSUS_SERVICE_ID", "myservice"),
        ]);

        let config = config(&vars).unwrap();

        assert_eq!(config.guild_id, Some(123));
        assert!(config.channel_positions_enforcement);
        assert_eq!(config.sort_interval_minutes, 15);
        assert_eq!(config.command_prefix, "?");
        assert_eq!(config.census_service_id, "myservice");
    }

    #[test]
    fn invalid_values() {
        let mut vars = BASE.to_vec();
        vars.push(("SORT_INTERVAL_MINUTES", "0"));
        assert!(matches!(
            config(&vars),
            Err(Error::Invalid { var: "SORT_INTERVAL_MINUTES", .. })
        ));

        let mut vars = BASE.to_vec();
        vars.push(("SORT_INTERVAL_MINUTES", "200000000000000000"));
        assert!(matches!(
            config(&vars),
            Err(Error::Invalid { var: "SORT_INTERVAL_MINUTES", .. })
        ));

        let mut vars = BASE.to_vec();
        vars.push(("SORT_INTERVAL_MINUTES", "10080"));
        assert_eq!(config(&vars).unwrap().sort_interval_minutes, 10080);

        let mut vars = BASE.to_vec();
        vars.push(("CHANNEL_POSITIONS_ENFORCEMENT", "maybe"));
        assert!(matches!(
            config(&vars),
            Err(Error::Invalid { var: "CHANNEL_POSITIONS_ENFORCEMENT", .. })
        ));

        let mut vars = BASE.to_vec();
        vars.push(("GUILD_ID", "abc"));
        assert!(matches!(config(&vars), Err(Error::Invalid { var: "GUILD_ID", .. })));
    }
}
