use crate::application::repos::RepoError;

/// Postgres SQLSTATE classes this crate reacts to.
mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const INVALID_TEXT_REPRESENTATION: &str = "22P02";
    pub const QUERY_CANCELED: &str = "57014";
    pub const INTEGRITY_CLASS: &str = "23";
}

/// Translate a driver error into the repository vocabulary.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    let db = match err {
        sqlx::Error::RowNotFound => return RepoError::NotFound,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            return RepoError::Unavailable(err.to_string());
        }
        sqlx::Error::Database(db) => db,
        other => return RepoError::from_persistence(other),
    };

    let code = db.code().map(|code| code.into_owned()).unwrap_or_default();
    match code.as_str() {
        sqlstate::UNIQUE_VIOLATION => RepoError::Duplicate {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        sqlstate::FOREIGN_KEY_VIOLATION | sqlstate::INVALID_TEXT_REPRESENTATION => {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlstate::QUERY_CANCELED => RepoError::Timeout,
        class if class.starts_with(sqlstate::INTEGRITY_CLASS) => RepoError::Integrity {
            message: db.message().to_string(),
        },
        _ => RepoError::from_persistence(sqlx::Error::Database(db)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_unavailable() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            RepoError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            RepoError::NotFound
        ));
    }
}
