use super::ICatalogRepo;
use classwatch_domain::{CatalogDimension, CatalogEntry, CatalogSnapshot};
use sqlx::{types::Json, FromRow, PgPool};

pub struct PostgresCatalogRepo {
    pool: PgPool,
}

impl PostgresCatalogRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CatalogSnapshotRaw {
    entries: Json<Vec<CatalogEntry>>,
    refreshed_at: i64,
}

#[async_trait::async_trait]
impl ICatalogRepo for PostgresCatalogRepo {
    async fn save(&self, snapshot: &CatalogSnapshot) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO filter_catalog
            (dimension, entries, refreshed_at)
            VALUES($1, $2, $3)
            ON CONFLICT (dimension) DO UPDATE SET
                entries = EXCLUDED.entries,
                refreshed_at = EXCLUDED.refreshed_at
            "#,
        )
        .bind(snapshot.dimension.to_string())
        .bind(Json(&snapshot.entries))
        .bind(snapshot.refreshed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, dimension: CatalogDimension) -> Option<CatalogSnapshot> {
        sqlx::query_as::<_, CatalogSnapshotRaw>(
            r#"
            SELECT entries, refreshed_at FROM filter_catalog
            WHERE dimension = $1
            "#,
        )
        .bind(dimension.to_string())
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten()
        .map(|raw| CatalogSnapshot {
            dimension,
            entries: raw.entries.0,
            refreshed_at: raw.refreshed_at,
        })
    }
}
