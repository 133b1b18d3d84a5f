mod bot;
mod certificate;
mod config;
mod context;
mod error;
mod quiz;
mod reminders;
mod stats;

use std::sync::Arc;

use dotenv::dotenv;
use teloxide::{dispatching::dialogue::InMemStorage, prelude::*, utils::command::BotCommands};

use bot::{Command, State};
use config::Config;
use context::AppContext;
use quiz::bank::QuestionBank;
use stats::StatsStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting exam bot...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Bad configuration: {}", err);
            std::process::exit(1);
        }
    };

    let thresholds: Vec<f64> = config
        .grade_scale
        .bands()
        .iter()
        .map(|band| band.min_percentage)
        .collect();
    log::info!("Grade thresholds: {:?}", thresholds);

    log::info!("Loading questions from {}", config.question_bank_dir.display());
    let bank = match QuestionBank::load(&config.question_bank_dir) {
        Ok(bank) => bank,
        Err(err) => {
            log::error!("Failed to load the question bank: {}", err);
            std::process::exit(1);
        }
    };
    log::info!(
        "Question bank loaded: {} questions, {} playable specializations",
        bank.question_total(),
        bank.playable_specializations().len()
    );

    let stats = match StatsStore::open(&config.stats_db_path) {
        Ok(stats) => stats,
        Err(err) => {
            log::error!(
                "Failed to open stats database {}: {}",
                config.stats_db_path.display(),
                err
            );
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.token);
    let ctx = Arc::new(AppContext::new(config, bank, stats));

    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Failed to register the command menu: {}", err);
    }

    let storage = InMemStorage::<State>::new();
    let reminders = tokio::spawn(reminders::run(bot.clone(), ctx.clone(), storage.clone()));

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![storage, ctx])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    reminders.abort();
    let _ = reminders.await;
    log::info!("Reminders stopped, bye");
}
