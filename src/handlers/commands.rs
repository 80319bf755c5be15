use std::error::Error;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::bot_state::BotState;
use crate::handlers::utils::{admin_panel_keyboard, main_menu_keyboard};
use crate::Command;

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;
    // Бот работает в личных чатах: id чата и есть id пользователя
    let user_id = chat_id.0;

    match cmd {
        Command::Start => {
            // Начатый диалог сбрасывается, черновик в базу не попадал
            state.clear_draft(chat_id).await;
            let is_admin = state.db.is_admin(user_id).await.unwrap_or(false);

            bot.send_message(chat_id, "Добро пожаловать в студию «Лепко»! 🎨")
                .reply_markup(main_menu_keyboard(is_admin))
                .await?;
        }
        Command::Help => {
            bot.send_message(chat_id, Command::descriptions().to_string())
                .await?;
        }
        Command::Admin => {
            if !state.db.is_admin(user_id).await? {
                bot.send_message(chat_id, "🔒 Доступ запрещён").await?;
                return Ok(());
            }
            bot.send_message(chat_id, "Админ-панель:")
                .reply_markup(admin_panel_keyboard())
                .await?;
        }
    }

    Ok(())
}
