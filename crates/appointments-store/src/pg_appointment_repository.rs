//! `PostgreSQL` implementation of the `AppointmentRepository` trait.

use appointments_booking::domain::events::AppointmentSnapshot;
use appointments_booking::domain::repository::AppointmentRepository;
use appointments_booking::domain::status::AppointmentStatus;
use appointments_core::error::DomainError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

const SELECT_APPOINTMENT: &str = r"
SELECT appointment_id, customer_id, provider_id, start_time, end_time,
       status, version, created_at, updated_at
FROM appointments
WHERE appointment_id = $1
";

const INSERT_APPOINTMENT: &str = r"
INSERT INTO appointments
    (appointment_id, customer_id, provider_id, start_time, end_time,
     status, version, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
ON CONFLICT (appointment_id) DO NOTHING
";

const UPDATE_APPOINTMENT: &str = r"
UPDATE appointments
SET customer_id = $2, provider_id = $3, start_time = $4, end_time = $5,
    status = $6, version = $7, updated_at = $9
WHERE appointment_id = $1 AND created_at = $8 AND version = $10
";

const SELECT_VERSION: &str = "SELECT version FROM appointments WHERE appointment_id = $1";

/// PostgreSQL-backed appointment repository.
#[derive(Debug, Clone)]
pub struct PgAppointmentRepository {
    pool: PgPool,
}

impl PgAppointmentRepository {
    /// Creates a new `PgAppointmentRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    appointment_id: Uuid,
    customer_id: String,
    provider_id: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for AppointmentSnapshot {
    type Error = DomainError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status: AppointmentStatus = row.status.parse().map_err(|_| {
            DomainError::Infrastructure(format!(
                "appointment {} has unrecognised status {:?}",
                row.appointment_id, row.status
            ))
        })?;
        Ok(Self {
            appointment_id: row.appointment_id,
            customer_id: row.customer_id,
            provider_id: row.provider_id,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn infrastructure(context: &str, e: &sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("{context}: {e}"))
}

async fn current_version(
    tx: &mut Transaction<'_, Postgres>,
    appointment_id: Uuid,
) -> Result<Option<i64>, DomainError> {
    sqlx::query_scalar::<_, i64>(SELECT_VERSION)
        .bind(appointment_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| infrastructure("failed to read appointment version", &e))
}

#[async_trait]
impl AppointmentRepository for PgAppointmentRepository {
    async fn find_by_id(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentSnapshot>, DomainError> {
        let row = sqlx::query_as::<_, AppointmentRow>(SELECT_APPOINTMENT)
            .bind(appointment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| infrastructure("failed to load appointment", &e))?;

        row.map(AppointmentSnapshot::try_from).transpose()
    }

    async fn save(
        &self,
        snapshot: &AppointmentSnapshot,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| infrastructure("failed to begin transaction", &e))?;

        let statement = if expected_version == 0 {
            INSERT_APPOINTMENT
        } else {
            UPDATE_APPOINTMENT
        };
        let mut query = sqlx::query(statement)
            .bind(snapshot.appointment_id)
            .bind(&snapshot.customer_id)
            .bind(snapshot.provider_id.as_deref())
            .bind(snapshot.start_time)
            .bind(snapshot.end_time)
            .bind(snapshot.status.as_str())
            .bind(snapshot.version)
            .bind(snapshot.created_at)
            .bind(snapshot.updated_at);
        if expected_version != 0 {
            query = query.bind(expected_version);
        }

        let affected = query
            .execute(&mut *tx)
            .await
            .map_err(|e| infrastructure("failed to write appointment", &e))?
            .rows_affected();

        if affected == 0 {
            let actual = current_version(&mut tx, snapshot.appointment_id).await?;
            tx.rollback()
                .await
                .map_err(|e| infrastructure("failed to roll back transaction", &e))?;
            return Err(match actual {
                None => DomainError::NotFound(snapshot.appointment_id),
                Some(actual) => DomainError::ConcurrencyConflict {
                    aggregate_id: snapshot.appointment_id,
                    expected: expected_version,
                    actual,
                },
            });
        }

        tx.commit()
            .await
            .map_err(|e| infrastructure("failed to commit transaction", &e))?;

        debug!(
            appointment_id = %snapshot.appointment_id,
            version = snapshot.version,
            status = %snapshot.status,
            "appointment row written"
        );
        Ok(())
    }
}
