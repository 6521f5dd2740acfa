use std::time::Duration;

use poise::serenity_prelude as serenity;

use crate::Data;

/// Discord rejects embeds with more fields than this.
const MAX_EMBED_FIELDS: usize = 25;

const NO_HELP: &str = "No description available.";

/// Rate limit attached to a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Throttle {
    pub attempts: u32,
    pub decay: Duration,
    pub per_user: bool,
}

impl std::fmt::Display for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.attempts {
            1 => write!(f, "once")?,
            n => write!(f, "{} times", n)?,
        }
        write!(f, " every {}s", self.decay.as_secs())?;
        if self.per_user {
            write!(f, " per user")?;
        }
        Ok(())
    }
}

/// What the help command knows about a registered command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CommandDescriptor {
    pub name: String,
    pub help: Option<String>,
    pub throttle: Option<Throttle>,
    /// Special commands are left out of the help listing.
    pub special: bool,
}

impl CommandDescriptor {
    pub(crate) fn from_command(command: &poise::Command<Data, crate::Error>) -> Self {
        // Cooldowns allow a single invocation per window.
        let throttle = command.cooldown_config.read().ok().and_then(|config| {
            let (decay, per_user) = match (config.global, config.user.or(config.member)) {
                (_, Some(decay)) => (decay, true),
                (Some(decay), None) => (decay, false),
                (None, None) => return None,
            };
            Some(Throttle {
                attempts: 1,
                decay,
                per_user,
            })
        });

        Self {
            name: command.name.clone(),
            help: command
                .help_text
                .clone()
                .or_else(|| command.description.clone()),
            throttle,
            special: command.hide_in_help,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct HelpReply {
    pub title: String,
    /// `(name, help)` pairs in registry order.
    pub fields: Vec<(String, String)>,
}

impl HelpReply {
    pub(crate) fn new<'a>(
        prefix: &str,
        commands: impl IntoIterator<Item = &'a CommandDescriptor>,
    ) -> Self {
        let fields = commands
            .into_iter()
            .filter(|command| !command.special)
            .map(|command| {
                let mut help = command.help.clone().unwrap_or_else(|| NO_HELP.to_string());
                if let Some(throttle) = command.throttle {
                    help.push_str(&format!(" _({})_", throttle));
                }
                (format!("{}{}", prefix, command.name), help)
            })
            .collect();

        Self {
            title: "Commands".to_string(),
            fields,
        }
    }

    pub(crate) fn embeds(&self) -> Vec<serenity::CreateEmbed> {
        if self.fields.is_empty() {
            return vec![serenity::CreateEmbed::new()
                .title(&self.title)
                .description("No commands available.")];
        }

        self.fields
            .chunks(MAX_EMBED_FIELDS)
            .map(|chunk| {
                serenity::CreateEmbed::new().title(&self.title).fields(
                    chunk
                        .iter()
                        .map(|(name, help)| (name.clone(), help.clone(), false)),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, help: Option<&str>, special: bool) -> CommandDescriptor {
        CommandDescriptor {
            name: name.to_string(),
            help: help.map(str::to_string),
            throttle: None,
            special,
        }
    }

    #[test]
    fn lists_only_regular_commands() {
        let commands = vec![
            descriptor("help", Some("Lists commands"), true),
            descriptor("sort", Some("Sorts channels"), false),
        ];

        let reply = HelpReply::new("!", &commands);

        assert_eq!(reply.title, "Commands");
        assert_eq!(
            reply.fields,
            vec![("!sort".to_string(), "Sorts channels".to_string())]
        );
    }

    #[test]
    fn keeps_registry_order() {
        let commands = vec![
            descriptor("whois", Some("b"), false),
            descriptor("claim", Some("a"), false),
            descriptor("sort", None, false),
        ];

        let reply = HelpReply::new("/", &commands);

        let names: Vec<_> = reply.fields.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["/whois", "/claim", "/sort"]);
        assert_eq!(reply.fields[2].1, NO_HELP);
    }

    #[test]
    fn mentions_throttle() {
        let mut command = descriptor("claim", Some("Claims a character"), false);
        command.throttle = Some(Throttle {
            attempts: 1,
            decay: Duration::from_secs(60),
            per_user: true,
        });

        let reply = HelpReply::new("!", [&command]);

        assert_eq!(
            reply.fields[0].1,
            "Claims a character _(once every 60s per user)_"
        );

        command.throttle = Some(Throttle {
            attempts: 3,
            decay: Duration::from_secs(30),
            per_user: false,
        });
        let reply = HelpReply::new("!", [&command]);
        assert_eq!(reply.fields[0].1, "Claims a character _(3 times every 30s)_");
    }

    #[test]
    fn splits_long_listings() {
        let commands: Vec<_> = (0..30)
            .map(|i| descriptor(&format!("cmd{i}"), None, false))
            .collect();

        let reply = HelpReply::new("!", &commands);

        assert_eq!(reply.fields.len(), 30);
        assert_eq!(reply.embeds().len(), 2);
    }

    #[test]
    fn reads_poise_command_metadata() {
        let command = crate::command::help();
        let descriptor = CommandDescriptor::from_command(&command);

        assert_eq!(descriptor.name, "help");
        assert!(descriptor.special);
        assert_eq!(
            descriptor.throttle,
            Some(Throttle {
                attempts: 1,
                decay: Duration::from_secs(30),
                per_user: false,
            })
        );
    }
}
