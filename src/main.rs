mod census;
mod command;
mod config;
mod db;
mod discord;
mod exit_on_err;
mod greeting;
mod handler;
mod help;
mod moderator;
mod reaction_roles;
mod scheduler;
mod sort;

use census::CensusClient;
use config::Config;
use dotenvy::dotenv;
use exit_on_err::MapOrExit;
use moderator::{LogNotifier, OutfitModerator, SqliteStore};
use poise::{
    serenity_prelude::{self as serenity, GuildId},
    FrameworkError,
};
use r2d2_sqlite::SqliteConnectionManager;
use scheduler::Scheduler;

// User data, which is stored and accessible in all command invocations
pub(crate) struct Data {
    pool: db::Pool,
    moderator: OutfitModerator,
    config: Config,
    // Kept alive for as long as the bot runs; dropping it cancels the schedule.
    #[allow(dead_code)]
    scheduler: Option<Scheduler<serenity::Context>>,
}

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;
type Result<T> = core::result::Result<T, Error>;

async fn handle_error(error: FrameworkError<'_, Data, Error>) {
    match error {
        FrameworkError::CooldownHit {
            remaining_cooldown,
            ctx,
            ..
        } => {
            let msg = format!(
                "Slow down! Try again in {} seconds.",
                remaining_cooldown.as_secs().max(1)
            );
            if let Err(e) = ctx.say(msg).await {
                log::error!("Error sending cooldown message: {}", e);
            }
        }
        FrameworkError::Command { error, ctx, .. } => {
            log::error!("Error in command `{}`: {}", ctx.command().qualified_name, error);
            if let Err(e) = ctx.say(command::failure_reply(error.as_ref())).await {
                log::error!("Error sending error message: {}", e);
            }
        }
        FrameworkError::UnknownCommand { msg_content, .. } => {
            log::debug!("Ignoring unknown command `{}`", msg_content);
        }
        error => {
            log::error!("Error: {}", error);
            if let Some(ctx) = error.ctx() {
                if let Err(e) = ctx.say(format!("Error: {}", error)).await {
                    log::error!("Error sending error message: {}", e);
                }
            }
        }
    }
}

async fn setup(
    ctx: &serenity::Context,
    ready: &serenity::Ready,
    framework: &poise::Framework<Data, Error>,
    config: Config,
) -> Result<Data> {
    log::info!("Connected to Discord as {}!", ready.user.name);
    let mgr = SqliteConnectionManager::file(&config.database_path);
    let pool = r2d2::Pool::new(mgr)?;

    {
        let conn = pool.get()?;
        db::setup(&conn)?;
    }

    let commands = &framework.options().commands;
    match config.guild_id {
        Some(guild_id) => {
            poise::builtins::register_in_guild(ctx, commands, GuildId::new(guild_id)).await?
        }
        None => poise::builtins::register_globally(ctx, commands).await?,
    }

    let store = SqliteStore::new(pool.clone());
    let moderator = OutfitModerator::new(
        Box::new(CensusClient::new(&config.census_service_id)),
        Box::new(store.clone()),
        Box::new(store),
        Box::new(LogNotifier),
    );

    let scheduler = if config.channel_positions_enforcement {
        let scheduler = Scheduler::new(pool.clone(), ctx.clone());
        scheduler.start(chrono::Duration::minutes(config.sort_interval_minutes as i64))?;
        Some(scheduler)
    } else {
        log::info!("Channel position enforcement is disabled");
        None
    };

    Ok(Data {
        pool,
        moderator,
        config,
        scheduler,
    })
}

#[tokio::main]
async fn main() {
    // Load values from .env, if available.
    dotenv().ok();
    pretty_env_logger::init();

    let config = Config::from_env().map_or_exit("Invalid configuration");
    let token = config.token.clone();
    let prefix = config.command_prefix.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: command::list(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            on_error: |error| Box::pin(handle_error(error)),
            pre_command: |ctx| {
                Box::pin(async move {
                    log::debug!(
                        "Received `{}` from {}",
                        ctx.command().qualified_name,
                        ctx.author().name
                    );
                })
            },
            event_handler: |ctx, event, _framework, data| {
                Box::pin(handler::handle_event(ctx, event, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| Box::pin(setup(ctx, ready, framework, config)))
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS;

    log::info!("Connecting to Discord...");
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .map_or_exit("Failed to create client");

    client.start().await.map_or_exit("Failed to start client");
}
