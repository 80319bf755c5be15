use std::error::Error;

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{KeyboardRemove, ReplyMarkup};

use crate::availability::parse_slot_minutes;
use crate::bot_state::BotState;
use crate::handlers::utils::{
    contact_keyboard, format_display_date, format_rubles, parse_display_date,
};
use crate::models::service::rent_first_hour_price;
use crate::models::{BookingStep, DraftBooking, NewBooking, ServiceType};
use crate::payments::spawn_polling;
use crate::payments::yookassa::PaymentRequest;

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;
    let Some(draft) = state.draft(chat_id).await else {
        return Ok(());
    };

    match draft.step {
        BookingStep::CollectingPartySize => handle_party_size(&bot, &msg, &state, draft).await,
        BookingStep::CollectingDescription => handle_description(&bot, &msg, &state, draft).await,
        BookingStep::CollectingName => handle_name(&bot, &msg, &state, draft).await,
        BookingStep::CollectingPhone => handle_phone(&bot, &msg, &state, draft).await,
        BookingStep::AdminAwaitingPhotoDate => handle_admin_photo_date(&bot, &msg, &state, draft).await,
        BookingStep::AdminAwaitingPhoto => handle_admin_photo(&bot, &msg, &state, draft).await,
        BookingStep::AdminAwaitingBroadcast => handle_admin_broadcast(&bot, &msg, &state).await,
        BookingStep::AdminAwaitingVoucherNumber => handle_admin_redeem(&bot, &msg, &state).await,
        _ => Ok(()),
    }
}

async fn handle_party_size(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    mut draft: DraftBooking,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;
    let def = draft.service.definition();
    let max = def.max_people.unwrap_or(u32::MAX);
    let min = def.min_people;

    let count = msg
        .text()
        .and_then(|t| t.trim().parse::<u32>().ok())
        .filter(|c| (min..=max).contains(c));

    let Some(count) = count else {
        // Плохой ввод — переспрашиваем, состояние не меняется
        bot.send_message(chat_id, format!("Введите число от {} до {}.", min, max))
            .await?;
        return Ok(());
    };

    draft.people_count = Some(count);
    crate::handlers::callbacks::prompt_name(bot, state, chat_id, draft).await
}

async fn handle_description(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    mut draft: DraftBooking,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;

    if let Some(text) = msg.text() {
        draft.description = Some(text.to_string());
    } else if let Some(photos) = msg.photo() {
        if let Some(photo) = photos.last() {
            draft.photo_file_id = Some(photo.file.id.clone());
        }
    } else {
        bot.send_message(chat_id, "Опишите желаемое изделие или загрузите картинку:")
            .await?;
        return Ok(());
    }

    crate::handlers::callbacks::prompt_name(bot, state, chat_id, draft).await
}

async fn handle_name(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    mut draft: DraftBooking,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        bot.send_message(chat_id, "Ваше имя:").await?;
        return Ok(());
    };

    draft.name = Some(text.trim().to_string());
    draft.step = BookingStep::CollectingPhone;
    state.set_draft(chat_id, draft).await;

    bot.send_message(chat_id, "Номер телефона:")
        .reply_markup(contact_keyboard())
        .await?;
    Ok(())
}

/// Получен телефон — ключевой переход: считаем сумму, создаём платёж,
/// пишем бронь pending и запускаем поллинг. Ошибка шлюза прерывает
/// оформление без строки в базе и без повторов.
async fn handle_phone(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    mut draft: DraftBooking,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;

    let phone = match (msg.contact(), msg.text()) {
        (Some(contact), _) => contact.phone_number.clone(),
        (None, Some(text)) if looks_like_phone(text) => text.trim().to_string(),
        _ => {
            bot.send_message(chat_id, "Отправьте контакт или введите номер телефона.")
                .await?;
            return Ok(());
        }
    };

    // Диалог всегда личный: id чата совпадает с id пользователя
    let user_id = chat_id.0;
    let username = msg.chat.username().map(str::to_string);
    let def = draft.service.definition();

    let amount = match chargeable_amount(&draft) {
        Some(amount) => amount,
        None => {
            log::error!("❌ No chargeable amount for service {}", draft.service.tag());
            bot.send_message(chat_id, "❌ Ошибка при создании платежа.").await?;
            state.clear_draft(chat_id).await;
            return Ok(());
        }
    };

    let mut description = format!("«{}»", def.name);
    if let Some(date) = draft.date {
        description.push_str(&format!(" {}", format_display_date(date)));
    }
    if let Some(slot) = draft.time_slot.as_deref() {
        description.push_str(&format!(" в {}", slot));
    }

    let payment = match state
        .gateway
        .create_payment(&PaymentRequest {
            amount,
            description,
            user_id,
        })
        .await
    {
        Ok(payment) => payment,
        Err(e) => {
            log::error!("❌ Payment creation failed: {}", e);
            bot.send_message(chat_id, "❌ Ошибка при создании платежа.")
                .reply_markup(ReplyMarkup::KeyboardRemove(KeyboardRemove::new()))
                .await?;
            state.clear_draft(chat_id).await;
            return Ok(());
        }
    };

    let booking = NewBooking {
        workshop_date: draft.date,
        time_slot: draft.time_slot.clone(),
        duration_hours: def.duration_hours,
        user_id,
        name: draft.name.take().unwrap_or_default(),
        phone,
        people_count: draft.people_count.unwrap_or(1) as i32,
        service_type: draft.service.tag().to_string(),
        description: draft.description.clone(),
        photo_file_id: draft.photo_file_id.clone(),
        payment_id: Some(payment.id.clone()),
        voucher_number: draft.voucher_number.clone(),
        amount,
        username,
    };

    let booking_id = state.db.create_booking(&booking).await?;
    log::info!(
        "💳 Booking {} created pending, payment {} for {}",
        booking_id,
        payment.id,
        format_rubles(amount)
    );

    spawn_polling(bot.clone(), state.clone(), payment.id.clone()).await;

    bot.send_message(
        chat_id,
        format!("Оплата ({}):\n{}", format_rubles(amount), payment.confirmation_url),
    )
    .reply_markup(ReplyMarkup::KeyboardRemove(KeyboardRemove::new()))
    .await?;

    // Дальше бронью занимается поллинг; диалог завершён
    draft.step = BookingStep::AwaitingPayment;
    state.set_draft(chat_id, draft).await;
    Ok(())
}

/// Сумма к оплате: номинал талона, тариф аренды от выбранного часа
/// или базовая цена услуги.
fn chargeable_amount(draft: &DraftBooking) -> Option<i64> {
    match draft.service {
        ServiceType::Voucher => draft.voucher_amount,
        ServiceType::Rent => {
            let start = parse_slot_minutes(draft.time_slot.as_deref()?)?;
            Some(rent_first_hour_price(start))
        }
        _ => draft.service.definition().base_price,
    }
}

fn looks_like_phone(text: &str) -> bool {
    let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
    digits >= 10 && text.chars().all(|c| c.is_ascii_digit() || "+-() ".contains(c))
}

async fn handle_admin_photo_date(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    mut draft: DraftBooking,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;
    let Some(date) = msg.text().and_then(parse_display_date) else {
        bot.send_message(chat_id, "Формат: ДД-ММ-ГГГГ (например, 13-01-2026)")
            .await?;
        return Ok(());
    };

    draft.admin_photo_date = Some(date);
    draft.step = BookingStep::AdminAwaitingPhoto;
    state.set_draft(chat_id, draft).await;
    bot.send_message(chat_id, "Отправьте фото:").await?;
    Ok(())
}

async fn handle_admin_photo(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    draft: DraftBooking,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;
    let Some(date) = draft.admin_photo_date else {
        state.clear_draft(chat_id).await;
        return Ok(());
    };
    let Some(photo) = msg.photo().and_then(|p| p.last()) else {
        bot.send_message(chat_id, "Отправьте фото:").await?;
        return Ok(());
    };

    let file = bot.get_file(photo.file.id.clone()).await?;
    tokio::fs::create_dir_all("uploads").await?;
    let dest = format!("uploads/{}.jpg", date);
    let mut out = tokio::fs::File::create(&dest).await?;

    match bot.download_file(&file.path, &mut out).await {
        Ok(()) => {
            state.db.set_workshop_photo(date, &dest).await?;
            bot.send_message(chat_id, "✅ Фото мастер-класса сохранено!").await?;
            log::info!("📸 Workshop photo saved: {}", dest);
        }
        Err(e) => {
            log::error!("❌ Photo download failed: {}", e);
            bot.send_message(chat_id, "❌ Не удалось сохранить фото.").await?;
        }
    }

    state.clear_draft(chat_id).await;
    Ok(())
}

async fn handle_admin_broadcast(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        bot.send_message(chat_id, "Отправьте текст для рассылки:").await?;
        return Ok(());
    };

    let users = state.db.all_booked_users().await?;
    let mut sent = 0;
    for user_id in users {
        match bot.send_message(ChatId(user_id), text).await {
            Ok(_) => sent += 1,
            Err(e) => log::warn!("⚠️ Broadcast to {} failed: {}", user_id, e),
        }
    }

    bot.send_message(chat_id, format!("📤 Рассылка отправлена {} пользователям.", sent))
        .await?;
    state.clear_draft(chat_id).await;
    Ok(())
}

async fn handle_admin_redeem(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;
    let Some(number) = msg.text().map(str::trim) else {
        bot.send_message(chat_id, "Введите номер талона:").await?;
        return Ok(());
    };

    // Одно условное обновление: «не найден» и «уже погашен» неразличимы
    let redeemed = state.db.redeem_voucher(number).await?;
    let reply = if redeemed {
        "✅ Талон погашен."
    } else {
        "❌ Талон не найден или уже погашен."
    };
    bot.send_message(chat_id, reply).await?;
    state.clear_draft(chat_id).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_heuristic() {
        assert!(looks_like_phone("+7 900 123-45-67"));
        assert!(looks_like_phone("89001234567"));
        assert!(!looks_like_phone("Мария"));
        assert!(!looks_like_phone("12345"));
    }

    #[test]
    fn voucher_amount_comes_from_denomination() {
        let mut draft = DraftBooking::new(ServiceType::Voucher);
        assert_eq!(chargeable_amount(&draft), None);
        draft.voucher_amount = Some(150_000);
        assert_eq!(chargeable_amount(&draft), Some(150_000));
    }

    #[test]
    fn rent_amount_depends_on_slot() {
        let mut draft = DraftBooking::new(ServiceType::Rent);
        draft.time_slot = Some("10:00".to_string());
        assert_eq!(chargeable_amount(&draft), Some(200_000));
        draft.time_slot = Some("19:00".to_string());
        assert_eq!(chargeable_amount(&draft), Some(350_000));
        draft.time_slot = None;
        assert_eq!(chargeable_amount(&draft), None);
    }

    #[test]
    fn workshop_amount_is_flat_base_price() {
        let mut draft = DraftBooking::new(ServiceType::Mk);
        draft.people_count = Some(4);
        assert_eq!(chargeable_amount(&draft), Some(250_000));
    }
}
