//! Crate-wide error type.

pub type Result<T> = std::result::Result<T, Error>;

/// A field-level validation failure, raised before any SQL is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        ValidationError {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid value for {0}")]
    Validation(#[from] ValidationError),

    #[error("{model} with id {id} does not exist")]
    NotFound { model: &'static str, id: i64 },

    /// A request that could not be read: bad JSON, missing fields, bad path segments.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("no admin registered for `{0}`")]
    UnknownModel(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

impl Error {
    pub fn not_found(model: &'static str, id: i64) -> Self {
        Error::NotFound { model, id }
    }

    /// True when the underlying database error is a UNIQUE constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

/// Checks a required char field against its `max_length`.
pub(crate) fn check_required(
    field: &'static str,
    value: &str,
    max_length: usize,
) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "this field may not be blank"));
    }
    check_length(field, value, max_length)
}

pub(crate) fn check_length(
    field: &'static str,
    value: &str,
    max_length: usize,
) -> std::result::Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max_length {
        return Err(ValidationError::new(
            field,
            format!("ensure this value has at most {max_length} characters (it has {len})"),
        ));
    }
    Ok(())
}
