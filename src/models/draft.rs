use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::service::ServiceType;

/// Шаг диалога бронирования. Явная машина состояний вместо
/// разбросанных по сцене полей step/date/time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStep {
    SelectingService,
    SelectingDate,
    SelectingTime,
    SelectingDenomination,
    CollectingPartySize,
    CollectingDescription,
    CollectingName,
    CollectingPhone,
    AwaitingPayment,
    // Админские шаги живут в том же драфте: диалог у чата один
    AdminAwaitingPhotoDate,
    AdminAwaitingPhoto,
    AdminAwaitingBroadcast,
    AdminAwaitingVoucherNumber,
}

/// Черновик брони одного чата. Хранится в памяти до момента
/// создания платежа, в базу попадает только готовая строка.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftBooking {
    pub step: BookingStep,
    pub service: ServiceType,
    pub date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub people_count: Option<u32>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub photo_file_id: Option<String>,
    /// Номинал талона в копейках, выбранный из меню.
    pub voucher_amount: Option<i64>,
    /// Генерируется при выборе номинала, не при оплате.
    pub voucher_number: Option<String>,
    /// Дата для загрузки фото (админский шаг).
    pub admin_photo_date: Option<NaiveDate>,
}

impl DraftBooking {
    pub fn new(service: ServiceType) -> Self {
        Self {
            step: BookingStep::SelectingService,
            service,
            date: None,
            time_slot: None,
            people_count: None,
            name: None,
            description: None,
            photo_file_id: None,
            voucher_amount: None,
            voucher_number: None,
            admin_photo_date: None,
        }
    }

    /// Черновик для админских шагов; тип услуги тут не играет роли.
    pub fn admin(step: BookingStep) -> Self {
        let mut draft = DraftBooking::new(ServiceType::Mk);
        draft.step = step;
        draft
    }
}
