use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Статус оплаты. Монотонный: из pending либо в succeeded,
/// либо в canceled/expired, из терминального состояния выхода нет.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Canceled,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<PaymentStatus> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "succeeded" => Some(PaymentStatus::Succeeded),
            "canceled" => Some(PaymentStatus::Canceled),
            "expired" => Some(PaymentStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: i64,
    pub workshop_date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub duration_hours: Option<i32>,
    pub user_id: i64,
    pub name: String,
    pub phone: String,
    pub people_count: i32,
    pub service_type: String,
    pub description: Option<String>,
    pub photo_file_id: Option<String>,
    pub payment_status: String,
    pub payment_id: Option<String>,
    pub voucher_number: Option<String>,
    pub is_voucher_redeemed: bool,
    /// В копейках.
    pub amount: i64,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::parse(&self.payment_status).unwrap_or(PaymentStatus::Pending)
    }
}

/// Поля новой брони. Строка создаётся всегда в статусе pending,
/// id назначает база.
#[derive(Debug, Clone, Default)]
pub struct NewBooking {
    pub workshop_date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub duration_hours: i32,
    pub user_id: i64,
    pub name: String,
    pub phone: String,
    pub people_count: i32,
    pub service_type: String,
    pub description: Option<String>,
    pub photo_file_id: Option<String>,
    pub payment_id: Option<String>,
    pub voucher_number: Option<String>,
    pub amount: i64,
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Succeeded,
            PaymentStatus::Canceled,
            PaymentStatus::Expired,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::parse("waiting_for_capture"), None);
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Succeeded.is_terminal());
        assert!(PaymentStatus::Canceled.is_terminal());
        assert!(PaymentStatus::Expired.is_terminal());
    }
}
