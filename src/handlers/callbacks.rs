use std::error::Error;
use std::path::Path;

use teloxide::prelude::*;
use teloxide::types::InputFile;

use crate::bot_state::BotState;
use crate::handlers::utils::{
    admin_panel_keyboard, daily_report, dates_keyboard, denomination_keyboard,
    format_display_date, parse_display_date, time_keyboard, voucher_ledger,
};
use crate::models::{BookingStep, DraftBooking, ServiceType};
use crate::models::voucher::generate_voucher_number;

const RENT_TARIFF: &str = "С 08:00 до 17:00\n\
    - 1-й час — 2000 ₽\n\
    - 2-й час и последующие — +1500 ₽/час\n\n\
    С 17:00 до 00:00\n\
    - 1-й час — 3500 ₽\n\
    - 2-й час и последующие — +1500 ₽/час";

/// Общая картинка студии, когда на дату не загружено своё фото.
const DEFAULT_WORKSHOP_PHOTO: &str = "uploads/default.jpg";

/// Кнопка действует только на том шаге диалога, для которого была
/// выслана: нажатие в старом сообщении после ухода диалога вперёд
/// игнорируется.
fn step_accepts_callback(step: BookingStep, data: &str) -> bool {
    match step {
        BookingStep::SelectingDate => data.starts_with("date_"),
        BookingStep::SelectingTime => data.starts_with("time_"),
        BookingStep::SelectingDenomination => data.starts_with("denom_"),
        _ => false,
    }
}

/// Фото даты: загруженное админом, иначе общее по умолчанию,
/// иначе ничего. Запись в базе без файла на диске не считается.
fn resolve_workshop_photo<F: Fn(&str) -> bool>(stored: Option<String>, exists: F) -> Option<String> {
    stored
        .filter(|p| exists(p))
        .or_else(|| exists(DEFAULT_WORKSHOP_PHOTO).then(|| DEFAULT_WORKSHOP_PHOTO.to_string()))
}

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let user_id = q.from.id.0 as i64;

    match data.as_str() {
        data if data.starts_with("service_") => {
            bot.answer_callback_query(q.id.clone()).await?;
            let tag = data.strip_prefix("service_").unwrap();
            let Some(service) = ServiceType::from_tag(tag) else {
                bot.send_message(chat_id, "Неизвестная услуга.").await?;
                return Ok(());
            };
            start_service_flow(&bot, &state, chat_id, service).await?;
        }

        data if data.starts_with("date_") => {
            let display = data.strip_prefix("date_").unwrap();
            let Some(date) = parse_display_date(display) else {
                bot.answer_callback_query(q.id.clone())
                    .text("Неверная дата")
                    .show_alert(true)
                    .await?;
                return Ok(());
            };

            let Some(mut draft) = state.draft(chat_id).await else {
                bot.answer_callback_query(q.id.clone()).await?;
                return Ok(());
            };
            if !step_accepts_callback(draft.step, &data) {
                bot.answer_callback_query(q.id.clone()).await?;
                return Ok(());
            }
            draft.date = Some(date);

            match time_keyboard(&state, draft.service, date).await? {
                Some(keyboard) => {
                    bot.answer_callback_query(q.id.clone()).await?;
                    draft.step = BookingStep::SelectingTime;
                    let def = draft.service.definition();
                    let caption = format!("{} {}", def.name, format_display_date(date));

                    // Фото мастер-класса, если админ его загрузил,
                    // иначе общая картинка студии
                    let stored = state.db.get_workshop_photo(date).await?;
                    match resolve_workshop_photo(stored, |p| Path::new(p).exists()) {
                        Some(path) => {
                            bot.send_photo(chat_id, InputFile::file(path))
                                .caption(caption)
                                .reply_markup(keyboard)
                                .await?;
                        }
                        None => {
                            bot.send_message(chat_id, format!("Выберите время для «{}»:", def.name))
                                .reply_markup(keyboard)
                                .await?;
                        }
                    }
                    state.set_draft(chat_id, draft).await;
                }
                None => {
                    bot.answer_callback_query(q.id.clone())
                        .text("Все места заняты.")
                        .show_alert(true)
                        .await?;
                    state.clear_draft(chat_id).await;
                }
            }
        }

        data if data.starts_with("time_") => {
            bot.answer_callback_query(q.id.clone()).await?;
            let slot = data.strip_prefix("time_").unwrap().to_string();

            let Some(mut draft) = state.draft(chat_id).await else {
                return Ok(());
            };
            if !step_accepts_callback(draft.step, &data) {
                return Ok(());
            }
            draft.time_slot = Some(slot);
            advance_after_time(&bot, &state, chat_id, &mut draft).await?;
        }

        data if data.starts_with("denom_") => {
            bot.answer_callback_query(q.id.clone()).await?;
            let Ok(kopecks) = data.strip_prefix("denom_").unwrap().parse::<i64>() else {
                return Ok(());
            };

            let Some(mut draft) = state.draft(chat_id).await else {
                return Ok(());
            };
            if !step_accepts_callback(draft.step, &data) {
                return Ok(());
            }
            // Номер талона генерируется при выборе номинала, не при оплате
            draft.voucher_amount = Some(kopecks);
            draft.voucher_number = Some(generate_voucher_number());
            prompt_name(&bot, &state, chat_id, draft).await?;
        }

        "open_admin" => {
            if !state.db.is_admin(user_id).await? {
                bot.answer_callback_query(q.id.clone())
                    .text("🔒 Доступ запрещён")
                    .show_alert(true)
                    .await?;
                return Ok(());
            }
            bot.answer_callback_query(q.id.clone()).await?;
            bot.send_message(chat_id, "Админ-панель:")
                .reply_markup(admin_panel_keyboard())
                .await?;
        }

        "admin_set_photo" | "admin_broadcast" | "admin_report" | "admin_vouchers"
        | "admin_redeem" => {
            if !state.db.is_admin(user_id).await? {
                bot.answer_callback_query(q.id.clone())
                    .text("🔒 Доступ запрещён")
                    .show_alert(true)
                    .await?;
                return Ok(());
            }
            handle_admin_callback(&bot, &q, &state, chat_id, data.as_str()).await?;
        }

        _ => {
            bot.answer_callback_query(q.id.clone()).await?;
        }
    }

    Ok(())
}

/// Вход в оформление услуги: у каждой свой первый шаг.
async fn start_service_flow(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    service: ServiceType,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut draft = DraftBooking::new(service);
    let def = service.definition();

    match service {
        ServiceType::Voucher => {
            draft.step = BookingStep::SelectingDenomination;
            state.set_draft(chat_id, draft).await;
            bot.send_message(chat_id, "Выберите сумму талона:")
                .reply_markup(denomination_keyboard())
                .await?;
        }
        ServiceType::Order | ServiceType::Abonement => {
            prompt_name(bot, state, chat_id, draft).await?;
        }
        ServiceType::Rent => {
            bot.send_message(chat_id, RENT_TARIFF).await?;
            draft.step = BookingStep::SelectingDate;
            state.set_draft(chat_id, draft).await;
            bot.send_message(chat_id, "Выберите дату:")
                .reply_markup(dates_keyboard(30))
                .await?;
        }
        _ => {
            draft.step = BookingStep::SelectingDate;
            state.set_draft(chat_id, draft).await;
            bot.send_message(chat_id, format!("Выберите дату для «{}»:", def.name))
                .reply_markup(dates_keyboard(30))
                .await?;
        }
    }
    Ok(())
}

/// После выбора времени: праздник/семейный спрашивают количество
/// гостей (от 4), остальные групповые — от 1, свой МК просит описание,
/// индивидуальные и аренда идут сразу к имени.
async fn advance_after_time(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    draft: &mut DraftBooking,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let def = draft.service.definition();

    if draft.service == ServiceType::Custom {
        draft.step = BookingStep::CollectingDescription;
        state.set_draft(chat_id, draft.clone()).await;
        bot.send_message(chat_id, "Опишите желаемое изделие или загрузите картинку:")
            .await?;
        return Ok(());
    }

    match def.max_people {
        Some(max) if max > 1 => {
            draft.step = BookingStep::CollectingPartySize;
            state.set_draft(chat_id, draft.clone()).await;
            bot.send_message(
                chat_id,
                format!("Сколько человек будет участвовать? ({}–{}):", def.min_people, max),
            )
            .await?;
        }
        _ => {
            prompt_name(bot, state, chat_id, draft.clone()).await?;
        }
    }
    Ok(())
}

pub async fn prompt_name(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    mut draft: DraftBooking,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    draft.step = BookingStep::CollectingName;
    state.set_draft(chat_id, draft).await;
    bot.send_message(chat_id, "Ваше имя:").await?;
    Ok(())
}

async fn handle_admin_callback(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    chat_id: ChatId,
    data: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match data {
        "admin_set_photo" => {
            bot.answer_callback_query(q.id.clone()).await?;
            state
                .set_draft(chat_id, DraftBooking::admin(BookingStep::AdminAwaitingPhotoDate))
                .await;
            bot.send_message(chat_id, "Введите дату в формате ДД-ММ-ГГГГ (например, 13-01-2026):")
                .await?;
        }
        "admin_broadcast" => {
            bot.answer_callback_query(q.id.clone()).await?;
            state
                .set_draft(chat_id, DraftBooking::admin(BookingStep::AdminAwaitingBroadcast))
                .await;
            bot.send_message(chat_id, "Отправьте сообщение для рассылки:").await?;
        }
        "admin_report" => {
            let today = chrono::Local::now().date_naive();
            let bookings = state.db.bookings_for_date(today).await?;
            if bookings.is_empty() {
                bot.answer_callback_query(q.id.clone())
                    .text(format!("Сегодня ({}) записей нет", format_display_date(today)))
                    .show_alert(true)
                    .await?;
            } else {
                bot.answer_callback_query(q.id.clone()).await?;
                bot.send_message(chat_id, daily_report(today, &bookings)).await?;
            }
        }
        "admin_vouchers" => {
            bot.answer_callback_query(q.id.clone()).await?;
            let vouchers = state.db.list_vouchers().await?;
            bot.send_message(chat_id, voucher_ledger(&vouchers)).await?;
        }
        "admin_redeem" => {
            bot.answer_callback_query(q.id.clone()).await?;
            state
                .set_draft(chat_id, DraftBooking::admin(BookingStep::AdminAwaitingVoucherNumber))
                .await;
            bot.send_message(chat_id, "Введите номер талона:").await?;
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_act_only_on_their_step() {
        assert!(step_accepts_callback(BookingStep::SelectingDate, "date_13-01-2026"));
        assert!(step_accepts_callback(BookingStep::SelectingTime, "time_14:00"));
        assert!(step_accepts_callback(BookingStep::SelectingDenomination, "denom_150000"));
    }

    #[test]
    fn stale_buttons_are_ignored() {
        // Диалог ушёл к имени — старые кнопки времени и номинала молчат
        assert!(!step_accepts_callback(BookingStep::CollectingName, "time_14:00"));
        assert!(!step_accepts_callback(BookingStep::CollectingName, "denom_150000"));
        // Номинал не попадает в бронь, которая выбирает время
        assert!(!step_accepts_callback(BookingStep::SelectingTime, "denom_150000"));
        assert!(!step_accepts_callback(BookingStep::AwaitingPayment, "date_13-01-2026"));
    }

    #[test]
    fn stored_photo_wins_over_default() {
        let resolved = resolve_workshop_photo(Some("uploads/2026-01-13.jpg".into()), |_| true);
        assert_eq!(resolved.as_deref(), Some("uploads/2026-01-13.jpg"));
    }

    #[test]
    fn missing_stored_photo_falls_back_to_default() {
        let resolved = resolve_workshop_photo(Some("uploads/2026-01-13.jpg".into()), |p| {
            p == DEFAULT_WORKSHOP_PHOTO
        });
        assert_eq!(resolved.as_deref(), Some(DEFAULT_WORKSHOP_PHOTO));

        let resolved = resolve_workshop_photo(None, |p| p == DEFAULT_WORKSHOP_PHOTO);
        assert_eq!(resolved.as_deref(), Some(DEFAULT_WORKSHOP_PHOTO));
    }

    #[test]
    fn no_photo_at_all_degrades_to_text() {
        assert_eq!(resolve_workshop_photo(None, |_| false), None);
    }
}
