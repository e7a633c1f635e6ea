use super::ILedgerRepo;
use crate::repos::shared::repo::DeleteResult;
use classwatch_domain::{LedgerEntry, ID};
use sqlx::{types::Uuid, FromRow, PgPool};

pub struct PostgresLedgerRepo {
    pool: PgPool,
}

impl PostgresLedgerRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct LedgerEntryRaw {
    user_uid: Uuid,
    instance_key: String,
    sent_at: i64,
    instance_start_ts: i64,
}

impl Into<LedgerEntry> for LedgerEntryRaw {
    fn into(self) -> LedgerEntry {
        LedgerEntry {
            user_id: self.user_uid.into(),
            instance_key: self.instance_key,
            sent_at: self.sent_at,
            instance_start_ts: self.instance_start_ts,
        }
    }
}

#[async_trait::async_trait]
impl ILedgerRepo for PostgresLedgerRepo {
    async fn is_new(&self, user_id: &ID, instance_key: &str) -> anyhow::Result<bool> {
        let existing = sqlx::query_as::<_, LedgerEntryRaw>(
            r#"
            SELECT * FROM notification_ledger
            WHERE user_uid = $1 AND instance_key = $2
            "#,
        )
        .bind(user_id.inner_ref())
        .bind(instance_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(existing.is_none())
    }

    async fn commit(&self, entry: &LedgerEntry) -> anyhow::Result<bool> {
        // The primary key makes this a race-free insert-if-absent
        let res = sqlx::query(
            r#"
            INSERT INTO notification_ledger
            (user_uid, instance_key, sent_at, instance_start_ts)
            VALUES($1, $2, $3, $4)
            ON CONFLICT (user_uid, instance_key) DO NOTHING
            "#,
        )
        .bind(entry.user_id.inner_ref())
        .bind(&entry.instance_key)
        .bind(entry.sent_at)
        .bind(entry.instance_start_ts)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn clear(&self, user_id: &ID, instance_key: &str) -> Option<LedgerEntry> {
        sqlx::query_as::<_, LedgerEntryRaw>(
            r#"
            DELETE FROM notification_ledger
            WHERE user_uid = $1 AND instance_key = $2
            RETURNING *
            "#,
        )
        .bind(user_id.inner_ref())
        .bind(instance_key)
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten()
        .map(|entry| entry.into())
    }

    async fn clear_user(&self, user_id: &ID) -> anyhow::Result<DeleteResult> {
        let res = sqlx::query(
            r#"
            DELETE FROM notification_ledger
            WHERE user_uid = $1
            "#,
        )
        .bind(user_id.inner_ref())
        .execute(&self.pool)
        .await?;
        Ok(DeleteResult {
            deleted_count: res.rows_affected() as i64,
        })
    }

    async fn delete_all_before(&self, instance_start_before: i64) -> Vec<LedgerEntry> {
        sqlx::query_as::<_, LedgerEntryRaw>(
            r#"
            DELETE FROM notification_ledger AS l
            WHERE l.instance_start_ts <= $1
            RETURNING *
            "#,
        )
        .bind(instance_start_before)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|entry| entry.into())
        .collect()
    }
}
