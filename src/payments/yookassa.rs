use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

const API_BASE: &str = "https://api.yookassa.ru/v3";
const DEFAULT_RETURN_URL: &str = "https://t.me/lepko_studio_bot";

/// Клиент ЮKassa. Ключи читаются из .env; без них бот стартует,
/// но создание платежа вернёт ошибку.
#[derive(Clone, Debug)]
pub struct YookassaClient {
    client: Client,
    shop_id: String,
    secret_key: String,
    return_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    /// Сумма в копейках.
    pub amount: i64,
    pub description: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPayment {
    pub id: String,
    pub confirmation_url: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: String,
    status: String,
    confirmation: Option<Confirmation>,
}

#[derive(Debug, Deserialize)]
struct Confirmation {
    confirmation_url: Option<String>,
}

/// Копейки → десятичная строка для API ("250000" → "2500.00").
pub fn format_amount(kopecks: i64) -> String {
    format!("{}.{:02}", kopecks / 100, kopecks % 100)
}

impl YookassaClient {
    pub fn from_env() -> Self {
        let shop_id = env::var("YOO_SHOP_ID").unwrap_or_default().trim().to_string();
        let secret_key = env::var("YOO_SECRET_KEY").unwrap_or_default().trim().to_string();
        let return_url = env::var("YOO_RETURN_URL")
            .unwrap_or_else(|_| DEFAULT_RETURN_URL.to_string());

        if shop_id.is_empty() || secret_key.is_empty() {
            log::warn!("⚠️ YooKassa: YOO_SHOP_ID or YOO_SECRET_KEY is not set");
        }

        Self {
            client: Client::new(),
            shop_id,
            secret_key,
            return_url,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.shop_id.is_empty() && !self.secret_key.is_empty()
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Создание платежа. Без автоматических повторов: неудача
    /// отдаётся наверх и прерывает оформление брони.
    pub async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment> {
        if !self.is_configured() {
            bail!("YooKassa is not configured");
        }
        if request.amount <= 0 {
            bail!("payment amount must be positive");
        }

        let body = serde_json::json!({
            "amount": { "value": format_amount(request.amount), "currency": "RUB" },
            "confirmation": { "type": "redirect", "return_url": self.return_url },
            "description": request.description,
            "metadata": { "user_id": request.user_id.to_string() },
            "capture": true
        });

        let response = self
            .client
            .post(format!("{API_BASE}/payments"))
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .header("Idempotence-Key", Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await
            .context("YooKassa request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            log::error!("❌ YooKassa createPayment failed: {} {}", status, text);
            bail!("YooKassa returned {status}");
        }

        let payment: PaymentResponse = response
            .json()
            .await
            .context("bad YooKassa createPayment response")?;

        let confirmation_url = payment
            .confirmation
            .and_then(|c| c.confirmation_url)
            .context("YooKassa response has no confirmation_url")?;

        Ok(CreatedPayment {
            id: payment.id,
            confirmation_url,
        })
    }

    /// Текущий статус платежа как его отдаёт шлюз
    /// (pending/succeeded/canceled/expired/waiting_for_capture/...).
    pub async fn payment_status(&self, payment_id: &str) -> Result<String> {
        if !self.is_configured() {
            bail!("YooKassa is not configured");
        }

        let response = self
            .client
            .get(format!("{API_BASE}/payments/{payment_id}"))
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .context("YooKassa status request failed")?;

        if !response.status().is_success() {
            bail!("YooKassa returned {}", response.status());
        }

        let payment: PaymentResponse = response
            .json()
            .await
            .context("bad YooKassa status response")?;
        Ok(payment.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_kopecks_as_decimal_rubles() {
        assert_eq!(format_amount(250_000), "2500.00");
        assert_eq!(format_amount(120_050), "1200.50");
        assert_eq!(format_amount(1), "0.01");
        assert_eq!(format_amount(100), "1.00");
    }
}
