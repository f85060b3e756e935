use sqlx::types::Json;

use crate::application::repos::{MatchesRepo, MatchesWriteRepo, RepoError, UpsertOutcome};
use crate::domain::matches::{Alliances, CompLevel, MatchRecord, MatchVideo};

use super::util::{from_db_int, to_db_int};
use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct MatchRow {
    key: String,
    comp_level: String,
    set_number: i32,
    match_number: i32,
    alliances: Json<Alliances>,
    team_key_names: Vec<String>,
    videos: Json<Vec<MatchVideo>>,
}

impl TryFrom<MatchRow> for MatchRecord {
    type Error = RepoError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        let comp_level = row
            .comp_level
            .parse::<CompLevel>()
            .map_err(|_| RepoError::Integrity {
                message: format!("match {} has unknown comp_level `{}`", row.key, row.comp_level),
            })?;

        Ok(MatchRecord {
            comp_level,
            set_number: from_db_int(row.set_number, "set_number")?,
            match_number: from_db_int(row.match_number, "match_number")?,
            alliances: row.alliances.0,
            team_key_names: row.team_key_names,
            videos: row.videos.0,
        })
    }
}

#[async_trait::async_trait]
impl MatchesRepo for PostgresRepositories {
    async fn list_event_matches(&self, event_key: &str) -> Result<Vec<MatchRecord>, RepoError> {
        let rows = sqlx::query_as::<_, MatchRow>(
            r#"
            SELECT key, comp_level, set_number, match_number, alliances, team_key_names, videos
            FROM matches
            WHERE event_key = $1
            "#,
        )
        .bind(event_key)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut matches = rows
            .into_iter()
            .map(MatchRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        // comp_level order is not alphabetical, so sort here rather than in SQL.
        matches.sort_by_key(MatchRecord::sort_key);
        Ok(matches)
    }
}

#[async_trait::async_trait]
impl MatchesWriteRepo for PostgresRepositories {
    async fn upsert_matches(
        &self,
        event_key: &str,
        matches: &[MatchRecord],
    ) -> Result<UpsertOutcome, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let keys: Vec<String> = matches
            .iter()
            .map(|record| record.key_name(event_key))
            .collect();
        let replaced = sqlx::query_as::<_, MatchRow>(
            r#"
            SELECT key, comp_level, set_number, match_number, alliances, team_key_names, videos
            FROM matches
            WHERE key = ANY($1)
            FOR UPDATE
            "#,
        )
        .bind(&keys)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(MatchRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        let mut written = 0;

        for record in matches {
            let teams = record.teams();
            sqlx::query(
                r#"
                INSERT INTO matches (key, event_key, comp_level, set_number, match_number, alliances, team_key_names, videos, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
                ON CONFLICT (key) DO UPDATE
                SET alliances = EXCLUDED.alliances,
                    team_key_names = EXCLUDED.team_key_names,
                    videos = EXCLUDED.videos,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(record.key_name(event_key))
            .bind(event_key)
            .bind(record.comp_level.as_str())
            .bind(to_db_int(record.set_number, "set_number")?)
            .bind(to_db_int(record.match_number, "match_number")?)
            .bind(Json(&record.alliances))
            .bind(&teams)
            .bind(Json(&record.videos))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            written += 1;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(UpsertOutcome { written, replaced })
    }
}
