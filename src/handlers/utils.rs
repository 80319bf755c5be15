use chrono::{Duration, Local, NaiveDate};
use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
    ReplyMarkup,
};

use crate::availability::is_available;
use crate::bot_state::BotState;
use crate::models::{Booking, ServiceType};
use crate::models::service::VOUCHER_DENOMINATIONS;

/// Клиенту даты показываются как ДД-ММ-ГГГГ, в базе лежит ISO-дата.
pub const DISPLAY_FORMAT: &str = "%d-%m-%Y";

pub fn format_display_date(date: NaiveDate) -> String {
    date.format(DISPLAY_FORMAT).to_string()
}

pub fn parse_display_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DISPLAY_FORMAT).ok()
}

/// Ближайшие дни для записи, начиная с сегодняшнего.
pub fn available_dates(days: u32) -> Vec<NaiveDate> {
    let today = Local::now().date_naive();
    (0..days as i64).map(|i| today + Duration::days(i)).collect()
}

/// Сумма в копейках → "2500 ₽" (копейки показываются только ненулевые).
pub fn format_rubles(kopecks: i64) -> String {
    if kopecks % 100 == 0 {
        format!("{} ₽", kopecks / 100)
    } else {
        format!("{}.{:02} ₽", kopecks / 100, kopecks % 100)
    }
}

/// Главное меню — все услуги студии.
pub fn main_menu_keyboard(is_admin: bool) -> InlineKeyboardMarkup {
    let mut keyboard = vec![
        service_row("Записаться на МК (2500₽)", ServiceType::Mk),
        service_row("Записаться на глазурный МК (1200₽)", ServiceType::Glaze),
        service_row("Купить эл. талон на лепку (от 1000₽)", ServiceType::Voucher),
        service_row("Записаться на свидание (5000₽)", ServiceType::Date),
        service_row("Записаться на индивид. МК (5000₽)", ServiceType::Individual),
        service_row("Предложить свой МК (2500₽)", ServiceType::Custom),
        service_row("Организация праздников (от 6500₽)", ServiceType::Party),
        service_row("Семейный МК (от 6500₽)", ServiceType::Family),
        service_row("Аренда помещения (от 2000₽)", ServiceType::Rent),
        service_row("Изделие на заказ (от 4000₽)", ServiceType::Order),
        service_row("Абонемент 4 занятия (7200₽)", ServiceType::Abonement),
    ];

    if is_admin {
        keyboard.push(vec![InlineKeyboardButton::callback("🛠️ Админка", "open_admin")]);
    }

    InlineKeyboardMarkup::new(keyboard)
}

fn service_row(label: &str, service: ServiceType) -> Vec<InlineKeyboardButton> {
    vec![InlineKeyboardButton::callback(
        label.to_string(),
        format!("service_{}", service.tag()),
    )]
}

pub fn admin_panel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("📸 Установить фото на дату", "admin_set_photo")],
        vec![InlineKeyboardButton::callback("📤 Рассылка", "admin_broadcast")],
        vec![InlineKeyboardButton::callback("📊 Отчёт за сегодня", "admin_report")],
        vec![InlineKeyboardButton::callback("🎫 Талоны", "admin_vouchers")],
        vec![InlineKeyboardButton::callback("✂️ Погасить талон", "admin_redeem")],
    ])
}

pub fn dates_keyboard(days: u32) -> InlineKeyboardMarkup {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = available_dates(days)
        .into_iter()
        .map(|d| {
            let display = format_display_date(d);
            vec![InlineKeyboardButton::callback(display.clone(), format!("date_{display}"))]
        })
        .collect();
    InlineKeyboardMarkup::new(keyboard)
}

/// Кнопки времени: слот предлагается, только если интервал
/// [слот, слот+длительность) не пересекается ни с одной оплаченной
/// бронью этой даты. Занятый слот блокируется целиком.
pub async fn time_keyboard(
    state: &BotState,
    service: ServiceType,
    date: NaiveDate,
) -> Result<Option<InlineKeyboardMarkup>, sqlx::Error> {
    let def = service.definition();
    let Some(slots) = def.time_slots else {
        return Ok(None);
    };

    let mut keyboard = Vec::new();
    for slot in slots {
        if is_available(&state.db, date, slot, def.duration_hours).await? {
            keyboard.push(vec![InlineKeyboardButton::callback(
                slot.to_string(),
                format!("time_{slot}"),
            )]);
        }
    }

    if keyboard.is_empty() {
        return Ok(None);
    }
    Ok(Some(InlineKeyboardMarkup::new(keyboard)))
}

pub fn denomination_keyboard() -> InlineKeyboardMarkup {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = VOUCHER_DENOMINATIONS
        .iter()
        .map(|&kopecks| {
            vec![InlineKeyboardButton::callback(
                format_rubles(kopecks),
                format!("denom_{kopecks}"),
            )]
        })
        .collect();
    InlineKeyboardMarkup::new(keyboard)
}

pub fn contact_keyboard() -> ReplyMarkup {
    ReplyMarkup::Keyboard(
        KeyboardMarkup::new(vec![vec![
            KeyboardButton::new("Отправить контакт").request(ButtonRequest::Contact),
        ]])
        .resize_keyboard()
        .one_time_keyboard(),
    )
}

/// Сообщение админам о новой оплаченной брони.
pub fn admin_notification(booking: &Booking) -> String {
    let service_name = ServiceType::from_tag(&booking.service_type)
        .map(|s| s.definition().name)
        .unwrap_or("Неизвестная услуга");

    let mut msg = format!("✅ Новая запись!\nУслуга: {}\n", service_name);

    if booking.service_type == "voucher" {
        msg.push_str(&format!("Номинал: {}\n", format_rubles(booking.amount)));
        msg.push_str(&format!(
            "Номер талона: {}\n",
            booking.voucher_number.as_deref().unwrap_or("—")
        ));
    } else {
        let date = booking
            .workshop_date
            .map(format_display_date)
            .unwrap_or_else(|| "—".to_string());
        msg.push_str(&format!("Дата: {}\n", date));
        msg.push_str(&format!(
            "Время: {}\n",
            booking.time_slot.as_deref().unwrap_or("—")
        ));
        msg.push_str(&format!("👥 Участников: {}\n", booking.people_count));
    }

    msg.push_str(&format!("Имя: {}\n", booking.name));
    msg.push_str(&format!("Телефон: {}\n", booking.phone));
    msg.push_str(&format!(
        "Username: @{}\n",
        booking.username.as_deref().unwrap_or("не указан")
    ));
    msg.push_str(&format!("User ID: {}", booking.user_id));
    msg
}

/// Сообщение клиенту после оплаты.
pub fn user_confirmation(booking: &Booking) -> String {
    match (booking.workshop_date, booking.time_slot.as_deref()) {
        (Some(date), Some(time)) => format!(
            "✅ Оплата прошла успешно!\nЖдём вас {} в {}.",
            format_display_date(date),
            time
        ),
        _ => {
            if let Some(number) = booking.voucher_number.as_deref() {
                format!(
                    "✅ Оплата прошла успешно!\nВаш талон на {}: {}",
                    format_rubles(booking.amount),
                    number
                )
            } else {
                "✅ Оплата прошла успешно!".to_string()
            }
        }
    }
}

/// Отчёт за день: оплаченные брони по времени, затем по имени.
pub fn daily_report(date: NaiveDate, bookings: &[Booking]) -> String {
    let mut msg = format!("📊 Отчёт на {}:\n\n", format_display_date(date));
    for booking in bookings {
        msg.push_str(&format!(
            "🕒 {} | {} | {}\n",
            booking.time_slot.as_deref().unwrap_or("—"),
            booking.name,
            booking.phone
        ));
    }
    msg
}

pub fn voucher_ledger(vouchers: &[Booking]) -> String {
    if vouchers.is_empty() {
        return "Оплаченных талонов нет.".to_string();
    }
    let mut msg = "🎫 Талоны (свежие сверху):\n\n".to_string();
    for v in vouchers {
        msg.push_str(&format!(
            "{} | {} | {} | {}\n",
            v.voucher_number.as_deref().unwrap_or("—"),
            format_rubles(v.amount),
            v.name,
            if v.is_voucher_redeemed { "погашен" } else { "активен" }
        ));
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    #[test]
    fn display_date_round_trips_next_month() {
        // Дата из отображаемого формата восстанавливается без потерь
        for date in available_dates(30) {
            let display = format_display_date(date);
            assert_eq!(parse_display_date(&display), Some(date));
        }
    }

    #[test]
    fn parses_fixed_display_date() {
        let date = parse_display_date("13-01-2026").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 1, 13).unwrap());
        assert_eq!(date.to_string(), "2026-01-13");
    }

    #[test]
    fn rejects_bad_display_dates() {
        assert!(parse_display_date("2026-01-13").is_none());
        assert!(parse_display_date("32-01-2026").is_none());
        assert!(parse_display_date("").is_none());
    }

    #[test]
    fn formats_rubles() {
        assert_eq!(format_rubles(250_000), "2500 ₽");
        assert_eq!(format_rubles(120_050), "1200.50 ₽");
    }

    fn sample_booking() -> Booking {
        Booking {
            id: 1,
            workshop_date: NaiveDate::from_ymd_opt(2026, 1, 13),
            time_slot: Some("14:00".to_string()),
            duration_hours: Some(1),
            user_id: 42,
            name: "Мария".to_string(),
            phone: "+79001234567".to_string(),
            people_count: 4,
            service_type: "mk".to_string(),
            description: None,
            photo_file_id: None,
            payment_status: "succeeded".to_string(),
            payment_id: Some("pay-1".to_string()),
            voucher_number: None,
            is_voucher_redeemed: false,
            amount: 250_000,
            username: Some("maria".to_string()),
            created_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    #[test]
    fn admin_notification_for_workshop_has_date_and_party() {
        let msg = admin_notification(&sample_booking());
        assert!(msg.contains("Мастер-класс"));
        assert!(msg.contains("13-01-2026"));
        assert!(msg.contains("14:00"));
        assert!(msg.contains("Участников: 4"));
    }

    #[test]
    fn admin_notification_for_voucher_has_number() {
        let mut booking = sample_booking();
        booking.service_type = "voucher".to_string();
        booking.workshop_date = None;
        booking.time_slot = None;
        booking.voucher_number = Some("VTABC123".to_string());
        booking.amount = 150_000;
        let msg = admin_notification(&booking);
        assert!(msg.contains("VTABC123"));
        assert!(msg.contains("1500 ₽"));
        assert!(!msg.contains("Дата"));
    }
}
