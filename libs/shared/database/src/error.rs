use serde::Deserialize;
use thiserror::Error;

/// SQLSTATE raised by Postgres on a unique index violation.
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Unique constraint violated: {message}")]
    UniqueViolation {
        constraint: Option<String>,
        message: String,
    },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DatabaseError {
    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        matches!(
            self,
            DatabaseError::UniqueViolation { constraint: Some(c), .. } if c == name
        )
    }
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
pub struct PostgrestError {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
}

impl PostgrestError {
    /// Extracts the constraint name from
    /// `duplicate key value violates unique constraint "name"`.
    pub fn constraint_name(&self) -> Option<String> {
        let message = self.message.as_deref()?;
        let start = message.find("unique constraint \"")? + "unique constraint \"".len();
        let rest = &message[start..];
        let end = rest.find('"')?;
        Some(rest[..end].to_string())
    }
}

/// Maps a failed PostgREST response to a typed error.
pub fn classify_error(status: u16, body: &str) -> DatabaseError {
    let parsed: Option<PostgrestError> = serde_json::from_str(body).ok();

    if let Some(err) = parsed.as_ref() {
        if err.code.as_deref() == Some(UNIQUE_VIOLATION) {
            return DatabaseError::UniqueViolation {
                constraint: err.constraint_name(),
                message: err
                    .details
                    .clone()
                    .or_else(|| err.message.clone())
                    .unwrap_or_else(|| body.to_string()),
            };
        }
    }

    match status {
        401 | 403 => DatabaseError::Auth(body.to_string()),
        404 => DatabaseError::NotFound(body.to_string()),
        409 => DatabaseError::UniqueViolation {
            constraint: parsed.as_ref().and_then(PostgrestError::constraint_name),
            message: body.to_string(),
        },
        _ => DatabaseError::Api {
            status,
            message: body.to_string(),
        },
    }
}
