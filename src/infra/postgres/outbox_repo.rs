use {
    crate::domain::error::OutboxError,
    crate::domain::id::{EntryId, LockId},
    crate::domain::outbox::{Action, BoxFuture, Lock, LogEntry, OutboxLog},
    chrono::{DateTime, Utc},
    serde::Serialize,
    sqlx::{PgPool, Postgres, Transaction},
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    action: String,
    version: i32,
    payload: Vec<u8>,
    attempts: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OutboxRow> for LogEntry {
    fn from(row: OutboxRow) -> Self {
        LogEntry {
            id: row.id.into(),
            action: row.action,
            version: row.version,
            payload: row.payload,
            attempts: row.attempts,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Record a replayable mutation inside the caller's transaction, so the row
/// commits or rolls back together with the mutation it describes.
pub async fn append(
    tx: &mut Transaction<'_, Postgres>,
    action: Action,
    version: i32,
    payload: &[u8],
) -> Result<EntryId, OutboxError> {
    let id = EntryId::new();
    sqlx::query("INSERT INTO outbox (id, action, version, payload) VALUES ($1, $2, $3, $4)")
        .bind(id.as_uuid())
        .bind(action.as_str())
        .bind(version)
        .bind(payload)
        .execute(&mut **tx)
        .await?;
    Ok(id)
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboxStats {
    pub pending: i64,
    pub oldest: Option<DateTime<Utc>>,
    /// Highest attempt counter among pending entries.
    pub highest_attempts: Option<i32>,
}

#[derive(Clone)]
pub struct PgOutboxLog {
    pool: PgPool,
}

impl PgOutboxLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Append a single entry in its own transaction.
    pub async fn publish(
        &self,
        action: Action,
        version: i32,
        payload: &[u8],
    ) -> Result<EntryId, OutboxError> {
        let mut tx = self.pool.begin().await?;
        let id = append(&mut tx, action, version, payload).await?;
        tx.commit().await?;
        Ok(id)
    }

    pub async fn stats(&self) -> Result<OutboxStats, OutboxError> {
        let (pending, oldest, highest_attempts) =
            sqlx::query_as::<_, (i64, Option<DateTime<Utc>>, Option<i32>)>(
                "SELECT COUNT(*), MIN(created_at), MAX(attempts) FROM outbox",
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(OutboxStats {
            pending,
            oldest,
            highest_attempts,
        })
    }

    async fn get_log_inner(&self) -> Result<Vec<LogEntry>, OutboxError> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            r#"
            SELECT id, action, version, payload, attempts, created_at, updated_at
            FROM outbox
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LogEntry::from).collect())
    }

    async fn failed_event_inner(&self, entry: &LogEntry) -> Result<(), OutboxError> {
        sqlx::query(
            "UPDATE outbox SET attempts = attempts + 1, updated_at = clock_timestamp() WHERE id = $1",
        )
        .bind(entry.id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clean_event_inner(&self, entry: &LogEntry) -> Result<(), OutboxError> {
        // Zero rows affected means another pass already removed it.
        sqlx::query("DELETE FROM outbox WHERE id = $1")
            .bind(entry.id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clean_log_inner(&self, n: i64) -> Result<u64, OutboxError> {
        if n < 0 {
            return Err(OutboxError::Validation(format!(
                "cannot remove a negative number of entries: {n}"
            )));
        }
        let result = sqlx::query(
            r#"
            DELETE FROM outbox
            WHERE id IN (
                SELECT id FROM outbox
                ORDER BY created_at, id
                LIMIT $1
            )
            "#,
        )
        .bind(n)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn try_get_lock_inner(
        &self,
        id: LockId,
    ) -> Result<Lock<Transaction<'static, Postgres>>, OutboxError> {
        let mut tx = self.pool.begin().await?;
        // Transaction-scoped: dropped on commit, rollback or lost connection.
        // If this query fails, `tx` is dropped here and rolled back.
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_xact_lock($1)")
            .bind(id.as_i64())
            .fetch_one(&mut *tx)
            .await?;

        Ok(Lock::new(acquired, tx))
    }

    async fn release_lock_inner(
        &self,
        lock: Option<Lock<Transaction<'static, Postgres>>>,
    ) -> Result<(), OutboxError> {
        match lock {
            Some(lock) => {
                lock.into_tx().commit().await?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl OutboxLog for PgOutboxLog {
    type Tx = Transaction<'static, Postgres>;

    fn get_log(&self) -> BoxFuture<'_, Result<Vec<LogEntry>, OutboxError>> {
        Box::pin(self.get_log_inner())
    }

    fn failed_event<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<(), OutboxError>> {
        Box::pin(self.failed_event_inner(entry))
    }

    fn clean_event<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<(), OutboxError>> {
        Box::pin(self.clean_event_inner(entry))
    }

    fn clean_log(&self, n: i64) -> BoxFuture<'_, Result<u64, OutboxError>> {
        Box::pin(self.clean_log_inner(n))
    }

    fn try_get_lock(&self, id: LockId) -> BoxFuture<'_, Result<Lock<Self::Tx>, OutboxError>> {
        Box::pin(self.try_get_lock_inner(id))
    }

    fn release_lock(&self, lock: Option<Lock<Self::Tx>>) -> BoxFuture<'_, Result<(), OutboxError>> {
        Box::pin(self.release_lock_inner(lock))
    }
}
