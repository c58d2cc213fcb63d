use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::records::dto::CreateRecordRequest;

/// One logged training session. `pace` is derived from distance and duration
/// at insert time and is never taken from the caller.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainingRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: Date,
    pub distance_km: f64,
    pub duration: String,
    pub pace: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
}

// Every statement below is scoped by user_id; ownership is enforced in the
// store layer itself, not left to the callers.
impl TrainingRecord {
    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> Result<Vec<TrainingRecord>, sqlx::Error> {
        let rows = sqlx::query_as::<_, TrainingRecord>(
            r#"
            SELECT id, user_id, date, distance_km, duration, pace, location, notes, created_at
            FROM training_records
            WHERE user_id = $1
            ORDER BY date DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        req: &CreateRecordRequest,
        pace: &str,
    ) -> Result<TrainingRecord, sqlx::Error> {
        let record = sqlx::query_as::<_, TrainingRecord>(
            r#"
            INSERT INTO training_records (user_id, date, distance_km, duration, pace, location, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, date, distance_km, duration, pace, location, notes, created_at
            "#,
        )
        .bind(user_id)
        .bind(req.date)
        .bind(req.distance_km)
        .bind(&req.duration)
        .bind(pace)
        .bind(&req.location)
        .bind(&req.notes)
        .fetch_one(db)
        .await?;
        Ok(record)
    }

    /// Delete scoped to the owner. A record owned by someone else matches
    /// zero rows, which the caller treats as a silent no-op.
    pub async fn delete_by_owner(db: &PgPool, user_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM training_records
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }
}
