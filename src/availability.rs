use chrono::NaiveDate;

use crate::database::Database;
use crate::models::ServiceType;

/// Занятый интервал существующей оплаченной брони.
/// Длительность берётся из строки брони; если она не сохранена,
/// восстанавливается по типу услуги.
#[derive(Debug, Clone)]
pub struct OccupiedSlot {
    pub time_slot: String,
    pub duration_hours: Option<i32>,
    pub service_type: String,
}

impl OccupiedSlot {
    fn effective_duration_hours(&self) -> i32 {
        self.duration_hours
            .filter(|d| *d > 0)
            .unwrap_or_else(|| ServiceType::default_duration_hours(&self.service_type))
    }
}

/// "HH:MM" → минуты с полуночи.
pub fn parse_slot_minutes(slot: &str) -> Option<u32> {
    let (h, m) = slot.split_once(':')?;
    let hours: u32 = h.parse().ok()?;
    let minutes: u32 = m.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Свободен ли интервал [start, start+duration) относительно занятых.
/// Интервалы полуоткрытые: бронь до 15:00 не конфликтует с броней с 15:00.
/// Достаточно одного пересечения, чтобы слот считался занятым целиком.
pub fn slot_is_free(existing: &[OccupiedSlot], start_minutes: u32, duration_hours: i32) -> bool {
    let requested_start = start_minutes as i64;
    let requested_end = requested_start + duration_hours as i64 * 60;

    for occupied in existing {
        let Some(slot_start) = parse_slot_minutes(&occupied.time_slot) else {
            continue;
        };
        let slot_start = slot_start as i64;
        let slot_end = slot_start + occupied.effective_duration_hours() as i64 * 60;

        if !(requested_end <= slot_start || requested_start >= slot_end) {
            return false;
        }
    }
    true
}

/// Проверка по базе: учитываются только брони со статусом succeeded.
pub async fn is_available(
    db: &Database,
    date: NaiveDate,
    time_slot: &str,
    duration_hours: i32,
) -> Result<bool, sqlx::Error> {
    let Some(start_minutes) = parse_slot_minutes(time_slot) else {
        return Ok(false);
    };
    let occupied = db.occupied_slots(date).await?;
    Ok(slot_is_free(&occupied, start_minutes, duration_hours))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied(slot: &str, duration: Option<i32>, service: &str) -> OccupiedSlot {
        OccupiedSlot {
            time_slot: slot.to_string(),
            duration_hours: duration,
            service_type: service.to_string(),
        }
    }

    #[test]
    fn parses_slot_times() {
        assert_eq!(parse_slot_minutes("11:00"), Some(660));
        assert_eq!(parse_slot_minutes("16:30"), Some(990));
        assert_eq!(parse_slot_minutes("00:00"), Some(0));
        assert_eq!(parse_slot_minutes("24:00"), None);
        assert_eq!(parse_slot_minutes("abc"), None);
        assert_eq!(parse_slot_minutes(""), None);
    }

    #[test]
    fn empty_day_is_free() {
        assert!(slot_is_free(&[], 14 * 60, 1));
    }

    // МК 14:00–15:00 уже оплачен: повтор 14:00 занят, 15:00 свободно.
    #[test]
    fn same_slot_blocked_adjacent_free() {
        let existing = vec![occupied("14:00", Some(1), "mk")];
        assert!(!slot_is_free(&existing, 14 * 60, 1));
        assert!(slot_is_free(&existing, 15 * 60, 1));
        assert!(slot_is_free(&existing, 13 * 60, 1));
    }

    // Свидание 11:00–14:00: 13:00 для любой услуги занято, 14:00 свободно.
    #[test]
    fn three_hour_booking_blocks_inner_slots() {
        let existing = vec![occupied("11:00", Some(3), "date")];
        assert!(!slot_is_free(&existing, 11 * 60, 1));
        assert!(!slot_is_free(&existing, 12 * 60, 1));
        assert!(!slot_is_free(&existing, 13 * 60, 1));
        assert!(slot_is_free(&existing, 14 * 60, 1));
    }

    // Запрошенная длинная бронь пересекает существующую короткую.
    #[test]
    fn long_request_conflicts_with_short_existing() {
        let existing = vec![occupied("13:00", Some(1), "mk")];
        assert!(!slot_is_free(&existing, 11 * 60, 3));
        assert!(slot_is_free(&existing, 14 * 60, 3));
        assert!(slot_is_free(&existing, 10 * 60, 3));
    }

    // Длительность не сохранена: восстанавливается по типу услуги,
    // а не по длительности запрашивающего.
    #[test]
    fn missing_duration_falls_back_to_service_default() {
        let existing = vec![occupied("11:00", None, "date")];
        assert!(!slot_is_free(&existing, 13 * 60, 1));
        assert!(slot_is_free(&existing, 14 * 60, 1));

        let existing = vec![occupied("11:00", None, "mk")];
        assert!(slot_is_free(&existing, 12 * 60, 1));
    }

    #[test]
    fn unparseable_existing_slot_is_skipped() {
        let existing = vec![occupied("garbage", Some(1), "mk")];
        assert!(slot_is_free(&existing, 12 * 60, 1));
    }
}
