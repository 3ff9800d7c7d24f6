mod api;
mod chart;
mod config;
mod handlers;
mod models;
mod stats;
mod web;

use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::dispatching::UpdateFilterExt;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::requests::Requester;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::api::ApiClient;
use crate::config::Config;
use crate::stats::{AppState, RegionCache};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    // Init tracing with env filter, e.g. RUST_LOG=info,reqwest=warn
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,reqwest=warn,teloxide=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).compact().init();

    // teloxide reads TELOXIDE_TOKEN from env by default
    let bot = Bot::from_env();

    // Parse CLI args for --config-json
    let mut config_json_arg: Option<String> = None;
    for arg in std::env::args().skip(1) {
        if let Some(rest) = arg.strip_prefix("--config-json=") {
            config_json_arg = Some(rest.to_string());
            break;
        }
        if arg == "--config-json" {
            // support next-arg form
            config_json_arg = std::env::args().skip_while(|a| a != "--config-json").nth(1);
            break;
        }
    }

    let config = if let Some(json) = config_json_arg {
        info!("Loading config from --config-json");
        Config::from_json_str(&json).context("failed to parse --config-json")?
    } else {
        Config::load().context("failed to load config")?
    };

    let state = Arc::new(AppState {
        api: ApiClient::new(&config)?,
        regions: RegionCache::new(),
        rows: RwLock::new(Vec::new()),
        top_limit: config.top_limit,
    });

    // Region cache is populated once, before the bot starts serving.
    // A failed or empty fetch leaves the cache as-is (initially empty);
    // handlers degrade to "service unavailable" in that case.
    let fetched = state.api.regions().await;
    if fetched.is_empty() {
        warn!("список регионов пуст, инлайн-поиск будет недоступен");
    } else {
        info!(count = fetched.len(), "регионы загружены");
        state.regions.replace(fetched).await;
    }

    // Aggregation runs in the background so the bot answers right away.
    if !state.regions.is_empty().await {
        let state_bg = state.clone();
        tokio::spawn(async move {
            stats::refresh_ranking(&state_bg).await;
        });
    }

    // Companion web endpoint (health check + webapp page)
    let bind_addr = config.bind_addr.clone();
    tokio::spawn(async move {
        if let Err(err) = web::serve(&bind_addr).await {
            error!(error = %err, "веб-сервер остановлен");
        }
    });

    // Log bot identity
    match bot.get_me().await {
        Ok(me) => {
            info!(
                id = me.id.0,
                username = me.user.username.as_deref().unwrap_or(""),
                "Bot started"
            );
        }
        Err(err) => warn!(error = %err, "Failed to fetch bot info"),
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message().branch(
                dptree::entry()
                    .filter_command::<handlers::BotCommand>()
                    .endpoint(handlers::handle_command),
            ),
        )
        .branch(Update::filter_inline_query().endpoint(handlers::handle_inline_query))
        .branch(
            Update::filter_chosen_inline_result().endpoint(handlers::handle_chosen_inline_result),
        )
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
