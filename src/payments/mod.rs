pub mod yookassa;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;

use crate::bot_state::BotState;
use crate::database::ConfirmOutcome;
use crate::handlers::utils::{admin_notification, user_confirmation};
use crate::models::PaymentStatus;

/// Интервал и потолок поллинга: ~10 минут, как время жизни
/// платёжной страницы ЮKassa.
pub const POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const MAX_POLL_ATTEMPTS: u32 = 40;

/// Держит по одной задаче поллинга на платёж и снимает их при
/// остановке бота. Задачи разных платежей независимы.
#[derive(Clone, Default)]
pub struct ReconciliationSupervisor {
    tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl ReconciliationSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn track(&self, payment_id: String, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        if let Some(old) = tasks.insert(payment_id, handle) {
            old.abort();
        }
    }

    pub async fn forget(&self, payment_id: &str) {
        self.tasks.lock().await.remove(payment_id);
    }

    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        for (payment_id, handle) in tasks.drain() {
            log::info!("🛑 Aborting payment watcher for {}", payment_id);
            handle.abort();
        }
    }
}

/// Запускает поллинг статуса платежа: каждые 15 секунд, не более
/// 40 попыток. Ошибки сети не прерывают цикл; исчерпание попыток —
/// тихий выход без изменения брони.
pub async fn spawn_polling(bot: Bot, state: BotState, payment_id: String) {
    let supervisor = state.reconciler.clone();
    let task_payment_id = payment_id.clone();

    let handle = tokio::spawn(async move {
        let mut interval = time::interval(POLL_INTERVAL);
        // Первый tick срабатывает сразу, платежу нужно время
        interval.tick().await;

        for attempt in 1..=MAX_POLL_ATTEMPTS {
            interval.tick().await;

            match state.gateway.payment_status(&task_payment_id).await {
                Ok(status) => match status.as_str() {
                    "succeeded" => {
                        finalize_succeeded(&bot, &state, &task_payment_id).await;
                        break;
                    }
                    "canceled" | "expired" => {
                        let status = if status == "canceled" {
                            PaymentStatus::Canceled
                        } else {
                            PaymentStatus::Expired
                        };
                        match state.db.mark_payment_terminal(&task_payment_id, status).await {
                            Ok(true) => {
                                let booking =
                                    state.db.get_booking_by_payment_id(&task_payment_id).await;
                                if let Ok(Some(booking)) = booking {
                                    log::info!(
                                        "💤 Payment {} ended as {}, booking {} closed",
                                        task_payment_id,
                                        status.as_str(),
                                        booking.id
                                    );
                                }
                            }
                            Ok(false) => {}
                            Err(e) => log::error!("❌ Error closing booking: {}", e),
                        }
                        break;
                    }
                    _ => {
                        log::debug!(
                            "⏳ Payment {} still {} (attempt {}/{})",
                            task_payment_id,
                            status,
                            attempt,
                            MAX_POLL_ATTEMPTS
                        );
                    }
                },
                Err(e) => {
                    log::warn!(
                        "⚠️ Status check failed for {} (attempt {}/{}): {}",
                        task_payment_id,
                        attempt,
                        MAX_POLL_ATTEMPTS,
                        e
                    );
                }
            }
        }

        state.reconciler.forget(&task_payment_id).await;
    });

    supervisor.track(payment_id, handle).await;
}

/// Запланированное уведомление по исходу подтверждения.
#[derive(Debug)]
enum Notice {
    User { user_id: i64, text: String },
    Admins { text: String },
}

/// Кому и что писать после попытки подтверждения. Повторная доставка
/// (AlreadyFinal) и отсутствие брони не дают ни одного сообщения:
/// уведомление об оплате уходит не больше одного раза.
fn plan_notices(outcome: &ConfirmOutcome, payment_id: &str) -> Vec<Notice> {
    match outcome {
        ConfirmOutcome::Confirmed(booking) => vec![
            Notice::Admins { text: admin_notification(booking) },
            Notice::User {
                user_id: booking.user_id,
                text: user_confirmation(booking),
            },
        ],
        ConfirmOutcome::SlotTaken(booking) => vec![
            Notice::User {
                user_id: booking.user_id,
                text: "😔 К сожалению, пока шла оплата, это время заняли. \
                       Мы свяжемся с вами для возврата или переноса."
                    .to_string(),
            },
            Notice::Admins {
                text: format!(
                    "⚠️ Конфликт брони: оплата {} прошла, но слот уже занят.\n\
                     Клиент: {} ({}), требуется возврат.",
                    payment_id, booking.name, booking.phone
                ),
            },
        ],
        ConfirmOutcome::AlreadyFinal | ConfirmOutcome::NotFound => Vec::new(),
    }
}

/// Единая точка подтверждения для поллинга и вебхука.
/// Переход pending → succeeded условный, уведомления уходят только
/// когда переход действительно случился — гонка двух доставок безопасна.
pub async fn finalize_succeeded(bot: &Bot, state: &BotState, payment_id: &str) {
    let outcome = match state.db.confirm_paid(payment_id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("❌ Error confirming payment {}: {}", payment_id, e);
            return;
        }
    };

    match &outcome {
        ConfirmOutcome::Confirmed(booking) => {
            log::info!("✅ Booking {} confirmed (payment {})", booking.id, payment_id);
        }
        ConfirmOutcome::AlreadyFinal => {
            // Вторая доставка (webhook + polling) — молча игнорируем
            log::debug!("Payment {} already finalized", payment_id);
        }
        ConfirmOutcome::SlotTaken(booking) => {
            log::warn!(
                "⚠️ Slot taken while payment {} was in flight, booking {} canceled",
                payment_id,
                booking.id
            );
        }
        ConfirmOutcome::NotFound => {
            log::warn!("❌ No booking found for payment {}", payment_id);
        }
    }

    for notice in plan_notices(&outcome, payment_id) {
        match notice {
            Notice::User { user_id, text } => {
                if let Err(e) = bot.send_message(ChatId(user_id), text).await {
                    log::warn!("⚠️ Could not notify user {}: {}", user_id, e);
                }
            }
            Notice::Admins { text } => match state.db.all_admins().await {
                Ok(admins) => {
                    for admin_id in admins {
                        if let Err(e) = bot.send_message(ChatId(admin_id), &text).await {
                            log::warn!("⚠️ Could not notify admin {}: {}", admin_id, e);
                        }
                    }
                }
                Err(e) => log::error!("❌ Error listing admins: {}", e),
            },
        }
    }
}

/// Возобновление поллинга по незавершённым оплатам после рестарта.
pub async fn resume_pending(bot: &Bot, state: &BotState) {
    match state.db.awaiting_payments().await {
        Ok(bookings) => {
            for booking in bookings {
                if let Some(payment_id) = booking.payment_id {
                    log::info!("🔁 Resuming payment watch for booking {}", booking.id);
                    spawn_polling(bot.clone(), state.clone(), payment_id).await;
                }
            }
        }
        Err(e) => log::error!("❌ Error loading pending payments: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Booking;
    use chrono::{DateTime, NaiveDate, Utc};

    fn paid_booking() -> Booking {
        Booking {
            id: 7,
            workshop_date: NaiveDate::from_ymd_opt(2026, 1, 13),
            time_slot: Some("14:00".to_string()),
            duration_hours: Some(1),
            user_id: 42,
            name: "Мария".to_string(),
            phone: "+79001234567".to_string(),
            people_count: 2,
            service_type: "mk".to_string(),
            description: None,
            photo_file_id: None,
            payment_status: "succeeded".to_string(),
            payment_id: Some("pay-7".to_string()),
            voucher_number: None,
            is_voucher_redeemed: false,
            amount: 250_000,
            username: None,
            created_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    #[test]
    fn confirmed_notifies_admins_and_user_once() {
        let notices = plan_notices(&ConfirmOutcome::Confirmed(paid_booking()), "pay-7");
        assert_eq!(notices.len(), 2);
        assert!(matches!(notices[0], Notice::Admins { .. }));
        assert!(matches!(&notices[1], Notice::User { user_id: 42, .. }));
    }

    #[test]
    fn repeated_delivery_stays_silent() {
        // Вебхук и поллер наперегонки: проигравший получает AlreadyFinal
        // и никого не уведомляет повторно
        assert!(plan_notices(&ConfirmOutcome::AlreadyFinal, "pay-7").is_empty());
        assert!(plan_notices(&ConfirmOutcome::NotFound, "pay-7").is_empty());
    }

    #[test]
    fn slot_conflict_warns_user_and_admins_about_refund() {
        let notices = plan_notices(&ConfirmOutcome::SlotTaken(paid_booking()), "pay-7");
        assert_eq!(notices.len(), 2);
        let Notice::User { user_id, text } = &notices[0] else {
            panic!("клиенту должно уйти сообщение о возврате");
        };
        assert_eq!(*user_id, 42);
        assert!(text.contains("время заняли"));
        let Notice::Admins { text } = &notices[1] else {
            panic!("админам должен уйти сигнал о конфликте");
        };
        assert!(text.contains("pay-7"));
        assert!(text.contains("возврат"));
    }
}
