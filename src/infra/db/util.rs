use sqlx::error::ErrorKind;

use crate::application::repos::RepoError;

const QUERY_CANCELED: &str = "57014";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    let db = match err {
        sqlx::Error::RowNotFound => return RepoError::NotFound,
        sqlx::Error::PoolTimedOut => return RepoError::Timeout,
        sqlx::Error::Database(db) => db,
        other => return RepoError::from_persistence(other),
    };

    let code = db.code().map(|code| code.into_owned());
    match (db.kind(), code.as_deref()) {
        (ErrorKind::ForeignKeyViolation | ErrorKind::CheckViolation | ErrorKind::NotNullViolation, _)
        | (_, Some(INVALID_TEXT_REPRESENTATION)) => RepoError::invalid_input(db.message()),
        (_, Some(QUERY_CANCELED)) => RepoError::Timeout,
        _ => RepoError::from_persistence(sqlx::Error::Database(db)),
    }
}

/// Aggregates come back as BIGINT; a negative value means the query is wrong.
pub fn count(value: i64) -> Result<i64, RepoError> {
    if value < 0 {
        return Err(RepoError::from_persistence("negative count returned"));
    }
    Ok(value)
}
