use std::sync::Arc;

use dotenv::dotenv;
use serenity::all::GatewayIntents;
use serenity::Client;
use tracing_subscriber::EnvFilter;

use bot::config::{ServerConfig, StaticAssets, INITIAL_DABLOONS, STATIC_CONFIG_PATH};
use bot::credit::{reset, CreditGate};
use bot::discord::bot::Handler;
use bot::karma::ReactionLedger;
use bot::ledger::Ledger;
use bot::llm::ChatProvider;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(ServerConfig::new_from_env());
    let assets = Arc::new(StaticAssets::load(STATIC_CONFIG_PATH));
    let ledger = Arc::new(Ledger::connect(&config.database_url)?);

    tokio::spawn(reset::run(
        ledger.clone(),
        reset::ResetSchedule {
            timezone: config.reset_timezone,
            allowance: INITIAL_DABLOONS,
            admin: config
                .admin_user_id
                .map(|id| (id as i64, config.admin_allowance_multiplier)),
        },
    ));

    let credit = Arc::new(CreditGate::new(ledger.clone(), INITIAL_DABLOONS));
    let reactions = Arc::new(ReactionLedger::new(ledger.clone()));
    let provider = ChatProvider::new(&config.openai_api_key, ledger.clone());
    let handler = Handler::new(
        ledger,
        credit,
        reactions,
        provider,
        config.clone(),
        assets,
    );

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_MEMBERS;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await?;
    client.start().await?;
    Ok(())
}
