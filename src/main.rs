use std::env;
use teloxide::{prelude::*, utils::command::BotCommands};

mod availability;
mod bot_state;
mod database;
mod handlers;
mod models;
mod payments;
mod webhook;

use crate::bot_state::BotState;
use crate::database::Database;
use crate::handlers::{callback_handler, command_handler, message_handler};
use crate::payments::yookassa::YookassaClient;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "начать запись")]
    Start,
    #[command(description = "показать помощь")]
    Help,
    #[command(description = "админ-панель")]
    Admin,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Загружаем .env и инициализируем логирование
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Starting Lepko studio booking bot...");

    // Реестр услуг проверяется до любой работы: кривой каталог
    // молча портит учёт ёмкости всем услугам
    if let Err(e) = models::service::validate_catalog() {
        log::error!("❌ Invalid service catalog: {}", e);
        return Err(e.into());
    }

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = Database::new(&database_url).await?;
    db.init().await?;
    log::info!("✅ Database initialized");

    // Админы из .env, мусорные значения отбрасываются
    let admin_ids: Vec<i64> = env::var("ADMIN_IDS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect();
    db.seed_admins(&admin_ids).await?;

    let gateway = YookassaClient::from_env();
    let state = BotState::new(db, gateway);

    let bot = Bot::from_env();

    // Недооплаченные брони продолжают поллинг после рестарта
    payments::resume_pending(&bot, &state).await;

    // Фоновая задача напоминаний о завтрашних бронях
    let reminder_bot = bot.clone();
    let reminder_state = state.clone();
    tokio::spawn(async move {
        handlers::reminders_task(reminder_bot, reminder_state).await;
    });

    // Вебхук ЮKassa — опционален, поллинг работает и без него
    if let Ok(addr) = env::var("WEBHOOK_ADDR") {
        let webhook_bot = bot.clone();
        let webhook_state = state.clone();
        tokio::spawn(async move {
            webhook::run_webhook_server(addr, webhook_bot, webhook_state).await;
        });
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
        .branch(Update::filter_message().endpoint(message_handler));

    log::info!("🚀 Starting dispatcher...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Снимаем задачи поллинга при остановке
    state.reconciler.shutdown().await;

    Ok(())
}
