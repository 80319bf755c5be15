use serde::{Deserialize, Serialize};

/// Все услуги студии. Реестр фиксированный, меняется только с релизом.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Mk,
    Glaze,
    Date,
    Individual,
    Custom,
    Party,
    Family,
    Rent,
    Order,
    Abonement,
    Voucher,
}

#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    pub name: &'static str,
    /// Базовая цена в копейках. None — цена определяется отдельно
    /// (аренда считается от времени, номинал талона выбирает клиент).
    pub base_price: Option<i64>,
    /// None — услуга без привязки ко времени (заказ, абонемент, талон).
    pub time_slots: Option<&'static [&'static str]>,
    pub max_people: Option<u32>,
    pub min_people: u32,
    /// Сколько часов бронь занимает окно конфликтов.
    pub duration_hours: i32,
}

const HOURLY_11_20: &[&str] = &[
    "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00", "18:00", "19:00", "20:00",
];

const RENT_SLOTS: &[&str] = &[
    "08:00", "09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00",
    "18:00", "19:00", "20:00", "21:00", "22:00", "23:00",
];

impl ServiceType {
    pub fn all() -> &'static [ServiceType] {
        &[
            ServiceType::Mk,
            ServiceType::Glaze,
            ServiceType::Voucher,
            ServiceType::Date,
            ServiceType::Individual,
            ServiceType::Custom,
            ServiceType::Party,
            ServiceType::Family,
            ServiceType::Rent,
            ServiceType::Order,
            ServiceType::Abonement,
        ]
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ServiceType::Mk => "mk",
            ServiceType::Glaze => "glaze",
            ServiceType::Date => "date",
            ServiceType::Individual => "individual",
            ServiceType::Custom => "custom",
            ServiceType::Party => "party",
            ServiceType::Family => "family",
            ServiceType::Rent => "rent",
            ServiceType::Order => "order",
            ServiceType::Abonement => "abonement",
            ServiceType::Voucher => "voucher",
        }
    }

    pub fn from_tag(tag: &str) -> Option<ServiceType> {
        ServiceType::all().iter().copied().find(|s| s.tag() == tag)
    }

    pub fn definition(&self) -> ServiceDefinition {
        match self {
            ServiceType::Mk => ServiceDefinition {
                name: "Мастер-класс",
                base_price: Some(250_000),
                time_slots: Some(&["11:00", "14:00", "16:30", "18:30"]),
                max_people: Some(10),
                min_people: 1,
                duration_hours: 1,
            },
            ServiceType::Glaze => ServiceDefinition {
                name: "Глазурный МК",
                base_price: Some(120_000),
                time_slots: Some(&["11:00", "13:00", "15:00", "17:00", "19:00"]),
                max_people: Some(10),
                min_people: 1,
                duration_hours: 1,
            },
            ServiceType::Date => ServiceDefinition {
                name: "Свидание",
                base_price: Some(500_000),
                time_slots: Some(HOURLY_11_20),
                max_people: Some(2),
                min_people: 1,
                duration_hours: 3,
            },
            ServiceType::Individual => ServiceDefinition {
                name: "Индивидуальный МК",
                base_price: Some(500_000),
                time_slots: Some(HOURLY_11_20),
                max_people: Some(1),
                min_people: 1,
                duration_hours: 1,
            },
            ServiceType::Custom => ServiceDefinition {
                name: "Свой МК",
                base_price: Some(250_000),
                time_slots: Some(HOURLY_11_20),
                max_people: Some(10),
                min_people: 1,
                duration_hours: 1,
            },
            ServiceType::Party => ServiceDefinition {
                name: "Праздник/комьюнити",
                base_price: Some(650_000),
                time_slots: Some(HOURLY_11_20),
                max_people: Some(20), // по ТЗ: от 4 до 20
                min_people: 4,
                duration_hours: 1,
            },
            ServiceType::Family => ServiceDefinition {
                name: "Семейный МК",
                base_price: Some(650_000),
                time_slots: Some(HOURLY_11_20),
                max_people: Some(15), // по ТЗ: от 4 до 15
                min_people: 4,
                duration_hours: 1,
            },
            ServiceType::Rent => ServiceDefinition {
                name: "Аренда помещения",
                base_price: None,
                time_slots: Some(RENT_SLOTS),
                max_people: None,
                min_people: 1,
                duration_hours: 1,
            },
            ServiceType::Order => ServiceDefinition {
                name: "Изделие на заказ",
                base_price: Some(400_000),
                time_slots: None,
                max_people: None,
                min_people: 1,
                duration_hours: 1,
            },
            ServiceType::Abonement => ServiceDefinition {
                name: "Абонемент 4 занятия",
                base_price: Some(720_000),
                time_slots: None,
                max_people: None,
                min_people: 1,
                duration_hours: 1,
            },
            ServiceType::Voucher => ServiceDefinition {
                name: "Электронный талон",
                base_price: None,
                time_slots: None,
                max_people: None,
                min_people: 1,
                duration_hours: 1,
            },
        }
    }

    pub fn is_slot_based(&self) -> bool {
        self.definition().time_slots.is_some()
    }

    /// Длительность по типу услуги, когда в строке брони она не сохранена.
    pub fn default_duration_hours(tag: &str) -> i32 {
        match ServiceType::from_tag(tag) {
            Some(s) => s.definition().duration_hours,
            None => 1,
        }
    }
}

/// Номиналы электронного талона, в копейках.
pub const VOUCHER_DENOMINATIONS: &[i64] = &[
    100_000, 150_000, 200_000, 250_000, 300_000, 370_000, 500_000, 1_000_000,
];

/// Тариф аренды: первый час 2000 ₽ до 17:00, 3500 ₽ после.
pub fn rent_first_hour_price(start_minutes: u32) -> i64 {
    if start_minutes < 17 * 60 {
        200_000
    } else {
        350_000
    }
}

/// Проверка реестра при старте. Услуга со слотами обязана их иметь,
/// вечерний тариф аренды обязан попадать в сетку слотов.
pub fn validate_catalog() -> Result<(), String> {
    for service in ServiceType::all() {
        let def = service.definition();
        if let Some(slots) = def.time_slots {
            if slots.is_empty() {
                return Err(format!("service '{}' has an empty slot list", service.tag()));
            }
            for slot in slots {
                if crate::availability::parse_slot_minutes(slot).is_none() {
                    return Err(format!("service '{}' has a bad slot '{}'", service.tag(), slot));
                }
            }
        }
        if def.duration_hours < 1 {
            return Err(format!("service '{}' has a non-positive duration", service.tag()));
        }
        if let Some(max) = def.max_people {
            if def.min_people > max {
                return Err(format!("service '{}' has min_people > max_people", service.tag()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_valid() {
        validate_catalog().unwrap();
    }

    #[test]
    fn date_service_lasts_three_hours() {
        assert_eq!(ServiceType::Date.definition().duration_hours, 3);
        for service in ServiceType::all() {
            if *service != ServiceType::Date {
                assert_eq!(service.definition().duration_hours, 1, "{}", service.tag());
            }
        }
    }

    #[test]
    fn duration_fallback_uses_service_tag() {
        assert_eq!(ServiceType::default_duration_hours("date"), 3);
        assert_eq!(ServiceType::default_duration_hours("mk"), 1);
        assert_eq!(ServiceType::default_duration_hours("unknown"), 1);
    }

    #[test]
    fn tags_round_trip() {
        for service in ServiceType::all() {
            assert_eq!(ServiceType::from_tag(service.tag()), Some(*service));
        }
        assert_eq!(ServiceType::from_tag("nope"), None);
    }

    #[test]
    fn non_slot_services_have_no_time_slots() {
        for tag in ["order", "abonement", "voucher"] {
            let service = ServiceType::from_tag(tag).unwrap();
            assert!(service.definition().time_slots.is_none());
        }
    }

    #[test]
    fn rent_tariff_switches_at_seventeen() {
        assert_eq!(rent_first_hour_price(8 * 60), 200_000);
        assert_eq!(rent_first_hour_price(16 * 60 + 59), 200_000);
        assert_eq!(rent_first_hour_price(17 * 60), 350_000);
        assert_eq!(rent_first_hour_price(23 * 60), 350_000);
    }
}
