use crate::application::repos::RepoError;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::Database(db)
            if db.message().contains("violates check constraint")
                || db.message().contains("invalid input syntax") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("violates") => RepoError::Integrity {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        other => RepoError::from_persistence(other),
    }
}

/// Postgres `INTEGER` columns hold match numbering.
pub fn to_db_int(value: u32, field: &str) -> Result<i32, RepoError> {
    i32::try_from(value).map_err(|_| RepoError::InvalidInput {
        message: format!("{field} {value} is out of range"),
    })
}

pub fn from_db_int(value: i32, field: &str) -> Result<u32, RepoError> {
    u32::try_from(value).map_err(|_| RepoError::Integrity {
        message: format!("stored {field} {value} is negative"),
    })
}
