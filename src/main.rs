use std::path::Path;
use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use coursebot::bot::{self, BotState, Command};
use coursebot::config::Config;

const DEFAULT_CONFIG: &str = "coursebot.json";

#[tokio::main]
async fn main() {
    let explicit_path = std::env::args().nth(1);
    let config_path = explicit_path.clone().unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let from_file = explicit_path.is_some() || Path::new(&config_path).exists();
    let config = if from_file {
        Config::load(&config_path)
    } else {
        Config::from_env()
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("coursebot.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting coursebot...");
    if from_file {
        info!("Loaded config from {config_path}");
    } else {
        info!("No {config_path}, using defaults and environment");
    }
    info!("Default API URL: {}", config.default_api_url);
    info!("Preferred qualities: {:?} (fallback {:?})", config.quality.preferred, config.quality.fallback);

    let bot = Bot::new(&config.telegram_bot_token);
    let heartbeat_interval = config.heartbeat_interval;

    let state = match BotState::new(config, bot.clone()) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to build API client: {e}");
            std::process::exit(1);
        }
    };

    let _heartbeat = bot::spawn_heartbeat(heartbeat_interval);

    let handler = Update::filter_message()
        .branch(dptree::entry().filter_command::<Command>().endpoint(bot::handle_command))
        .branch(dptree::endpoint(bot::handle_text));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
