use crate::application::repos::{AuthCredentialsRepo, RepoError};
use crate::domain::auth::AuthCredential;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct AuthAccessRow {
    id: String,
    secret: String,
    event_keys: Vec<String>,
}

impl From<AuthAccessRow> for AuthCredential {
    fn from(row: AuthAccessRow) -> Self {
        AuthCredential {
            id: row.id,
            secret: row.secret,
            authorized_resource_keys: row.event_keys.into_iter().collect(),
        }
    }
}

#[async_trait::async_trait]
impl AuthCredentialsRepo for PostgresRepositories {
    async fn find_credential(&self, id: &str) -> Result<Option<AuthCredential>, RepoError> {
        let row = sqlx::query_as::<_, AuthAccessRow>(
            "SELECT id, secret, event_keys FROM api_auth_access WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(AuthCredential::from))
    }
}
