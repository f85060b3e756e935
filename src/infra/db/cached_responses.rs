use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use sqlx::types::Json;
use time::OffsetDateTime;

use crate::application::repos::{CachedResponsesRepo, RepoError};
use crate::domain::cache::CacheEntry;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct CachedResponseRow {
    key: String,
    headers: Json<BTreeMap<String, Vec<String>>>,
    body: Vec<u8>,
    updated_at: OffsetDateTime,
}

impl From<CachedResponseRow> for CacheEntry {
    fn from(row: CachedResponseRow) -> Self {
        CacheEntry {
            key: row.key,
            headers: row.headers.0,
            body: Bytes::from(row.body),
            updated_at: row.updated_at,
        }
    }
}

#[async_trait::async_trait]
impl CachedResponsesRepo for PostgresRepositories {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, RepoError> {
        let row = sqlx::query_as::<_, CachedResponseRow>(
            r#"
            SELECT key, headers, body, updated_at
            FROM cached_responses
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CacheEntry::from))
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO cached_responses (key, headers, body, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key) DO UPDATE
            SET headers = EXCLUDED.headers,
                body = EXCLUDED.body,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&entry.key)
        .bind(Json(&entry.headers))
        .bind(entry.body.as_ref())
        .bind(entry.updated_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete_many(&self, keys: &BTreeSet<String>) -> Result<u64, RepoError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = keys.iter().cloned().collect();

        let result = sqlx::query("DELETE FROM cached_responses WHERE key = ANY($1)")
            .bind(keys)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
