pub mod callbacks;
pub mod commands;
pub mod messages;
pub mod utils;

pub use callbacks::callback_handler;
pub use commands::command_handler;
pub use messages::message_handler;

use chrono::{Duration, Local, NaiveDate, Timelike};
use teloxide::prelude::*;
use tokio::time;

use crate::bot_state::BotState;
use crate::handlers::utils::format_display_date;

const REMINDER_HOUR: u32 = 9;

/// Слать ли напоминания на этом тике. Один раз в день, строго при
/// переходе через 09:00: рестарт днём не даёт повторной рассылки.
fn reminders_due(hour: u32, today: NaiveDate, last_sent: Option<NaiveDate>) -> bool {
    hour >= REMINDER_HOUR && last_sent != Some(today)
}

/// Стартовое значение last_sent: запуск после 09:00 считает
/// сегодняшнюю рассылку уже состоявшейся.
fn initial_last_sent(hour: u32, today: NaiveDate) -> Option<NaiveDate> {
    (hour >= REMINDER_HOUR).then_some(today)
}

/// Ежедневные напоминания: в 09:00 по студии всем, у кого на завтра
/// оплаченная бронь. Ошибки доставки не прерывают рассылку.
pub async fn reminders_task(bot: Bot, state: BotState) {
    let mut interval = time::interval(time::Duration::from_secs(60));
    let start = Local::now();
    let mut last_sent = initial_last_sent(start.hour(), start.date_naive());

    loop {
        interval.tick().await;

        let now = Local::now();
        let today = now.date_naive();
        if !reminders_due(now.hour(), today, last_sent) {
            continue;
        }
        last_sent = Some(today);

        let tomorrow = today + Duration::days(1);
        let bookings = match state.db.bookings_for_date(tomorrow).await {
            Ok(bookings) => bookings,
            Err(e) => {
                log::error!("❌ Error loading tomorrow's bookings: {}", e);
                continue;
            }
        };

        for booking in bookings {
            let Some(slot) = booking.time_slot.as_deref() else {
                continue;
            };
            let msg = format!(
                "🔔 Напоминаем!\nЖдём вас завтра ({}) в {}.",
                format_display_date(tomorrow),
                slot
            );
            if let Err(e) = bot.send_message(ChatId(booking.user_id), msg).await {
                log::warn!("⚠️ Reminder to {} failed: {}", booking.user_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn reminders_fire_once_after_nine() {
        let today = day(13);
        assert!(!reminders_due(8, today, None));
        assert!(reminders_due(9, today, None));
        assert!(reminders_due(9, today, Some(day(12))));
        // Уже отправлено сегодня — до завтра молчим
        assert!(!reminders_due(15, today, Some(today)));
        assert!(reminders_due(9, day(14), Some(today)));
    }

    #[test]
    fn restart_after_nine_does_not_resend() {
        let today = day(13);
        // Перезапуск днём: сегодняшняя рассылка считается состоявшейся
        let last_sent = initial_last_sent(14, today);
        assert_eq!(last_sent, Some(today));
        assert!(!reminders_due(14, today, last_sent));
        // Перезапуск до 09:00 рассылку не съедает
        assert_eq!(initial_last_sent(7, today), None);
    }
}
