use chrono::{Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use crate::models::prediction::{PredictionRecord, PredictionStatus, StatusUpdate};

const COLUMNS: &str = "id, status, audio_url, model, options, output, error, logs, \
                       webhook_confirmed, created_at, updated_at";

/// Outcome of funneling a status update through the store.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// Update merged and persisted.
    Applied {
        record: PredictionRecord,
        status_changed: bool,
    },
    /// Update would move the state machine backward; nothing was written.
    Stale {
        id: String,
        stored: PredictionStatus,
        incoming: PredictionStatus,
    },
    /// No record exists for this id; nothing was written.
    Unknown { id: String },
}

/// SQLite-backed store for prediction records.
///
/// The webhook receiver and the reconciliation poller both funnel their
/// mutations through [`apply_update`](Self::apply_update), which serializes
/// writes behind a mutex so the two paths cannot interleave a
/// read-modify-write for the same prediction.
pub struct PredictionStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl PredictionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Insert a freshly created prediction.
    pub async fn insert(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "INSERT INTO predictions \
             (id, status, audio_url, model, options, output, error, logs, \
              webhook_confirmed, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(record.status.to_string())
        .bind(&record.audio_url)
        .bind(&record.model)
        .bind(serde_json::to_string(&record.options)?)
        .bind(record.output.as_ref().map(|o| o.to_string()))
        .bind(&record.error)
        .bind(&record.logs)
        .bind(record.webhook_confirmed)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<PredictionRecord>, StoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM predictions WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| record_from_row(&r)).transpose()
    }

    /// All tracked predictions, newest first.
    pub async fn list(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM predictions ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect()
    }

    /// Active predictions no verified webhook has touched yet; the
    /// reconciliation poller's work list.
    pub async fn list_unconfirmed(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM predictions \
             WHERE status IN ('starting', 'processing') AND webhook_confirmed = 0 \
             ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect()
    }

    /// Merge a status update into the stored record.
    ///
    /// Terminal states absorb: an update that would lower the status rank or
    /// leave a terminal state is discarded as [`ApplyOutcome::Stale`].
    /// Re-applying the current status merges output/error/logs idempotently.
    /// `webhook_confirmed` is sticky and `created_at` is preserved; `output`
    /// is kept only for succeeded predictions and `error` only for failed
    /// ones.
    pub async fn apply_update(&self, update: &StatusUpdate) -> Result<ApplyOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM predictions WHERE id = ?"))
            .bind(&update.id)
            .fetch_optional(&mut *tx)
            .await?;
        let stored = match row {
            Some(r) => record_from_row(&r)?,
            None => {
                return Ok(ApplyOutcome::Unknown {
                    id: update.id.clone(),
                })
            }
        };

        let regresses = update.status.rank() < stored.status.rank()
            || (stored.status.is_terminal() && update.status != stored.status);
        if regresses {
            return Ok(ApplyOutcome::Stale {
                id: stored.id,
                stored: stored.status,
                incoming: update.status,
            });
        }

        let status_changed = update.status != stored.status;
        let PredictionRecord {
            id,
            audio_url,
            model,
            options,
            created_at,
            output: prev_output,
            error: prev_error,
            logs: prev_logs,
            webhook_confirmed: prev_confirmed,
            ..
        } = stored;

        let output = if update.status == PredictionStatus::Succeeded {
            update.output.clone().or(prev_output)
        } else {
            None
        };
        let error = if update.status == PredictionStatus::Failed {
            update.error.clone().or(prev_error)
        } else {
            None
        };
        let logs = update.logs.clone().or(prev_logs);
        let webhook_confirmed = prev_confirmed || update.webhook_confirmed;
        let updated_at = Utc::now();

        sqlx::query(
            "UPDATE predictions \
             SET status = ?, output = ?, error = ?, logs = ?, webhook_confirmed = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(update.status.to_string())
        .bind(output.as_ref().map(|o| o.to_string()))
        .bind(&error)
        .bind(&logs)
        .bind(webhook_confirmed)
        .bind(updated_at)
        .bind(&id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let record = PredictionRecord {
            id,
            status: update.status,
            audio_url,
            model,
            options,
            output,
            error,
            logs,
            webhook_confirmed,
            created_at,
            updated_at,
        };
        Ok(ApplyOutcome::Applied {
            record,
            status_changed,
        })
    }

    /// Remove a prediction from the history.
    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM predictions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete terminal predictions created before the retention window.
    pub async fn prune(&self, older_than: Duration) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - older_than;
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            "DELETE FROM predictions \
             WHERE status IN ('succeeded', 'failed', 'canceled') AND created_at < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<PredictionRecord, StoreError> {
    let status_str: String = row.try_get("status")?;
    let status = status_str
        .parse::<PredictionStatus>()
        .unwrap_or(PredictionStatus::Starting);

    let options_json: String = row.try_get("options")?;
    let options = serde_json::from_str(&options_json).unwrap_or_default();

    let output_json: Option<String> = row.try_get("output")?;
    let output = output_json.and_then(|s| serde_json::from_str(&s).ok());

    Ok(PredictionRecord {
        id: row.try_get("id")?,
        status,
        audio_url: row.try_get("audio_url")?,
        model: row.try_get("model")?,
        options,
        output,
        error: row.try_get("error")?,
        logs: row.try_get("logs")?,
        webhook_confirmed: row.try_get("webhook_confirmed")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
