use thiserror::Error;

use crate::registration::FieldError;

/// Errors raised by the storage, remote and registration layers.
///
/// The listing fetch in [`crate::cache::ParkingLotCache`] never surfaces
/// these; it logs them and falls back to an empty listing.
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration {name} failed: {source}")]
    Migration {
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The document store answered with a non-success status.
    #[error("document store returned {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("validation failed: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
