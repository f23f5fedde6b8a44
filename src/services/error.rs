use thiserror::Error;

use crate::database::DatabaseError;

/// Outcome kinds of every service operation
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    MissingProfile(String),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        ServiceError::InvalidState(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn missing_profile(message: impl Into<String>) -> Self {
        ServiceError::MissingProfile(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::Internal(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::InvalidState(_) => "INVALID_STATE",
            ServiceError::Validation(_) => "VALIDATION",
            ServiceError::MissingProfile(_) => "MISSING_PROFILE",
            ServiceError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_codes() {
        assert_eq!(ServiceError::invalid_state("x").kind(), "INVALID_STATE");
        assert_eq!(ServiceError::missing_profile("x").kind(), "MISSING_PROFILE");
        let db: ServiceError = DatabaseError::Unavailable("down".to_string()).into();
        assert_eq!(db.kind(), "INTERNAL");
    }
}
