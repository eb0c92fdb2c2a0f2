//! Error taxonomy shared by the stores, the index, and the synchronizer.
//!
//! Every variant except [`Error::IndexPropagation`] is reported to the
//! caller. Propagation failures are absorbed by the
//! [`Synchronizer`](crate::sync::Synchronizer) and only ever logged.

use thiserror::Error;

/// A record failed field-level validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} must be >= {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: i64,
        value: i64,
    },
    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must be at most {max} characters, got {len}")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },
    #[error("invalid heading: {0}")]
    InvalidHeading(String),
    #[error("invalid timestamp for occurredAt: {0}")]
    InvalidTimestamp(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// The identity precondition of a create or update was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentityConflict {
    #[error("a new sighting cannot already have an ID")]
    AlreadyAssigned,
    #[error("invalid id: an existing sighting must carry its ID")]
    Missing,
}

impl IdentityConflict {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyAssigned => "idexists",
            Self::Missing => "idnull",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    IdentityConflict(#[from] IdentityConflict),
    #[error("sighting not found: {0}")]
    NotFound(String),
    #[error("query syntax error: {0}")]
    QuerySyntax(String),
    #[error("invalid sort: {0}")]
    InvalidSort(String),
    #[error("invalid page request: {0}")]
    InvalidPage(String),
    #[error("index propagation failed: {0}")]
    IndexPropagation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Machine-readable code distinguishing the error class.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::IdentityConflict(conflict) => conflict.code(),
            Self::NotFound(_) => "not_found",
            Self::QuerySyntax(_) => "query_syntax",
            Self::InvalidSort(_) => "invalid_sort",
            Self::InvalidPage(_) => "invalid_page",
            Self::IndexPropagation(_) => "index_propagation",
            Self::Storage(_) => "storage",
        }
    }

    /// True for errors caused by the request itself rather than a backend.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::IndexPropagation(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_conflict_codes_distinguish_direction() {
        let on_create: Error = IdentityConflict::AlreadyAssigned.into();
        let on_update: Error = IdentityConflict::Missing.into();
        assert_eq!(on_create.code(), "idexists");
        assert_eq!(on_update.code(), "idnull");
        assert!(on_create.is_client_error());
    }

    #[test]
    fn backend_errors_are_not_client_errors() {
        assert!(!Error::Storage("disk full".into()).is_client_error());
        assert!(!Error::IndexPropagation("down".into()).is_client_error());
        assert!(Error::NotFound("x".into()).is_client_error());
    }
}
