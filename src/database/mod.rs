use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::availability::{parse_slot_minutes, slot_is_free, OccupiedSlot};
use crate::models::{Booking, NewBooking, PaymentStatus, ServiceType};

#[derive(Clone, Debug)]
pub struct Database {
    pub pool: PgPool,
}

/// Итог попытки подтвердить оплату. Подтверждение условное:
/// строка переводится в succeeded только из pending и только если
/// слот к этому моменту всё ещё свободен.
#[derive(Debug)]
pub enum ConfirmOutcome {
    Confirmed(Booking),
    /// Статус уже терминальный — повторная доставка (webhook + polling).
    AlreadyFinal,
    /// Пока шла оплата, слот занял другой клиент. Строка помечена canceled.
    SlotTaken(Booking),
    NotFound,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn init(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Таблица workshops: фото на дату
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workshops (
                date DATE PRIMARY KEY,
                photo_path TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Таблица bookings — журнал только на добавление, строки не удаляются
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id BIGSERIAL PRIMARY KEY,
                workshop_date DATE,
                time_slot TEXT,
                duration_hours INTEGER DEFAULT 1,
                user_id BIGINT NOT NULL,
                name TEXT NOT NULL,
                phone TEXT NOT NULL,
                people_count INTEGER NOT NULL DEFAULT 1,
                service_type TEXT NOT NULL,
                description TEXT,
                photo_file_id TEXT,
                payment_status TEXT NOT NULL DEFAULT 'pending',
                payment_id TEXT,
                voucher_number TEXT UNIQUE,
                is_voucher_redeemed BOOLEAN NOT NULL DEFAULT false,
                amount BIGINT NOT NULL DEFAULT 0,
                username TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admins (
                user_id BIGINT PRIMARY KEY
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_bookings_date_status ON bookings (workshop_date, payment_status)"
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_bookings_payment_id ON bookings (payment_id)"
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_bookings_voucher ON bookings (voucher_number)"
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Админы задаются через ADMIN_IDS, повторная вставка игнорируется.
    pub async fn seed_admins(&self, admin_ids: &[i64]) -> Result<(), sqlx::Error> {
        for id in admin_ids {
            sqlx::query("INSERT INTO admins (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Занятые интервалы даты. В ёмкость считаются только оплаченные брони.
    pub async fn occupied_slots(&self, date: NaiveDate) -> Result<Vec<OccupiedSlot>, sqlx::Error> {
        let rows: Vec<(Option<String>, Option<i32>, String)> = sqlx::query_as(
            "SELECT time_slot, duration_hours, service_type
             FROM bookings
             WHERE workshop_date = $1 AND payment_status = 'succeeded'",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(slot, duration, service)| {
                slot.map(|time_slot| OccupiedSlot {
                    time_slot,
                    duration_hours: duration,
                    service_type: service,
                })
            })
            .collect())
    }

    pub async fn create_booking(&self, booking: &NewBooking) -> Result<i64, sqlx::Error> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO bookings (
                workshop_date, time_slot, duration_hours, user_id, name, phone,
                people_count, service_type, description, photo_file_id,
                payment_id, voucher_number, amount, username
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(booking.workshop_date)
        .bind(&booking.time_slot)
        .bind(booking.duration_hours)
        .bind(booking.user_id)
        .bind(&booking.name)
        .bind(&booking.phone)
        .bind(booking.people_count)
        .bind(&booking.service_type)
        .bind(&booking.description)
        .bind(&booking.photo_file_id)
        .bind(&booking.payment_id)
        .bind(&booking.voucher_number)
        .bind(booking.amount)
        .bind(&booking.username)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Терминальная запись canceled/expired. Условная: строка в
    /// терминальном статусе не трогается.
    pub async fn mark_payment_terminal(
        &self,
        payment_id: &str,
        status: PaymentStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bookings SET payment_status = $2
             WHERE payment_id = $1 AND payment_status = 'pending'",
        )
        .bind(payment_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Перевод pending → succeeded с повторной проверкой слота.
    /// Advisory-блокировка по дате сериализует два конкурирующих
    /// подтверждения на один день: без неё оба прошли бы проверку,
    /// не видя succeeded-строки друг друга.
    pub async fn confirm_paid(&self, payment_id: &str) -> Result<ConfirmOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let booking: Option<Booking> = sqlx::query_as(
            "SELECT * FROM bookings WHERE payment_id = $1 FOR UPDATE",
        )
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut booking) = booking else {
            return Ok(ConfirmOutcome::NotFound);
        };

        if booking.status().is_terminal() {
            return Ok(ConfirmOutcome::AlreadyFinal);
        }

        if let (Some(date), Some(slot)) = (booking.workshop_date, booking.time_slot.clone()) {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(date.to_string())
                .execute(&mut *tx)
                .await?;

            let rows: Vec<(Option<String>, Option<i32>, String)> = sqlx::query_as(
                "SELECT time_slot, duration_hours, service_type
                 FROM bookings
                 WHERE workshop_date = $1 AND payment_status = 'succeeded' AND id <> $2",
            )
            .bind(date)
            .bind(booking.id)
            .fetch_all(&mut *tx)
            .await?;

            let occupied: Vec<OccupiedSlot> = rows
                .into_iter()
                .filter_map(|(s, d, t)| {
                    s.map(|time_slot| OccupiedSlot {
                        time_slot,
                        duration_hours: d,
                        service_type: t,
                    })
                })
                .collect();

            let duration = booking
                .duration_hours
                .filter(|d| *d > 0)
                .unwrap_or_else(|| ServiceType::default_duration_hours(&booking.service_type));

            if let Some(start) = parse_slot_minutes(&slot) {
                if !slot_is_free(&occupied, start, duration) {
                    sqlx::query("UPDATE bookings SET payment_status = 'canceled' WHERE id = $1")
                        .bind(booking.id)
                        .execute(&mut *tx)
                        .await?;
                    tx.commit().await?;
                    booking.payment_status = PaymentStatus::Canceled.as_str().to_string();
                    return Ok(ConfirmOutcome::SlotTaken(booking));
                }
            }
        }

        sqlx::query("UPDATE bookings SET payment_status = 'succeeded' WHERE id = $1")
            .bind(booking.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        booking.payment_status = PaymentStatus::Succeeded.as_str().to_string();
        Ok(ConfirmOutcome::Confirmed(booking))
    }

    pub async fn get_booking_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM bookings WHERE payment_id = $1")
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Оплаченные брони даты для отчёта: по времени, затем по имени.
    pub async fn bookings_for_date(&self, date: NaiveDate) -> Result<Vec<Booking>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM bookings
             WHERE workshop_date = $1 AND payment_status = 'succeeded'
             ORDER BY time_slot ASC NULLS LAST, name ASC",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn all_admins(&self) -> Result<Vec<i64>, sqlx::Error> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT user_id FROM admins")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn is_admin(&self, user_id: i64) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM admins WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Все, у кого есть хотя бы одна оплаченная бронь (для рассылки).
    pub async fn all_booked_users(&self) -> Result<Vec<i64>, sqlx::Error> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT user_id FROM bookings WHERE payment_status = 'succeeded'",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn get_workshop_photo(&self, date: NaiveDate) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT photo_path FROM workshops WHERE date = $1")
                .bind(date)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(path,)| path))
    }

    pub async fn set_workshop_photo(&self, date: NaiveDate, path: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO workshops (date, photo_path) VALUES ($1, $2)
             ON CONFLICT (date) DO UPDATE SET photo_path = EXCLUDED.photo_path",
        )
        .bind(date)
        .bind(path)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Реестр талонов: оплаченные, свежие сверху.
    pub async fn list_vouchers(&self) -> Result<Vec<Booking>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM bookings
             WHERE service_type = 'voucher' AND payment_status = 'succeeded'
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Погашение талона одним условным UPDATE: ровно одно true
    /// на любое число конкурирующих вызовов.
    pub async fn redeem_voucher(&self, number: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bookings SET is_voucher_redeemed = true
             WHERE voucher_number = $1 AND is_voucher_redeemed = false
               AND payment_status = 'succeeded'",
        )
        .bind(number)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Незавершённые оплаты для возобновления поллинга после рестарта.
    pub async fn awaiting_payments(&self) -> Result<Vec<Booking>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM bookings
             WHERE payment_status = 'pending' AND payment_id IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
    }
}
