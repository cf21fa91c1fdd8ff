use thiserror::Error;

/// A single row rejected by a warehouse streaming insert.
#[derive(Debug, Clone, PartialEq)]
pub struct RowInsertionError {
    pub insert_id: Option<String>,
    pub row_index: usize,
    pub reasons: Vec<String>,
}

impl std::fmt::Display for RowInsertionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "row {} (insert id {:?}): {}",
            self.row_index,
            self.insert_id,
            self.reasons.join("; ")
        )
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("datastore: no such entity")]
    NoSuchEntity,

    #[error("datastore: transaction has already been committed or rolled back")]
    TransactionFinished,

    #[error("{}", describe_put_multi(.0))]
    PutMulti(Vec<RowInsertionError>),

    #[error("{method} is not implemented")]
    Unimplemented { method: &'static str },

    #[error("argument was not produced by this adapter family (expected {expected})")]
    AdapterMismatch { expected: &'static str },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl Error {
    /// HTTP status of a service error, if the error came from the service.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NoSuchEntity) || self.status() == Some(404)
    }

    /// Whether the service rejected the call because of contention
    /// (`ABORTED`), which transactional callers may retry.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Api { code, .. } if code == "ABORTED")
    }

    pub(crate) fn invalid_response(message: impl Into<String>) -> Self {
        Error::InvalidResponse {
            message: message.into(),
        }
    }

    /// A copy that can be handed out again. Variants owning foreign error
    /// types keep their HTTP status and message.
    pub(crate) fn replay(&self) -> Error {
        match self {
            Error::Api {
                status,
                code,
                message,
            } => Error::Api {
                status: *status,
                code: code.clone(),
                message: message.clone(),
            },
            Error::NoSuchEntity => Error::NoSuchEntity,
            Error::TransactionFinished => Error::TransactionFinished,
            Error::PutMulti(rows) => Error::PutMulti(rows.clone()),
            Error::Unimplemented { method } => Error::Unimplemented { method: *method },
            Error::AdapterMismatch { expected } => Error::AdapterMismatch {
                expected: *expected,
            },
            Error::InvalidResponse { message } => Error::invalid_response(message.clone()),
            Error::Config { message } => Error::Config {
                message: message.clone(),
            },
            Error::InvalidConfigValue {
                field,
                value,
                reason,
            } => Error::InvalidConfigValue {
                field: field.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Error::Transport(e) => match e.status() {
                Some(status) => Error::Api {
                    status: status.as_u16(),
                    code: canonical_code(status.as_u16()).to_string(),
                    message: e.to_string(),
                },
                None => Error::invalid_response(e.to_string()),
            },
            other => Error::invalid_response(other.to_string()),
        }
    }
}

/// gRPC-style status name for an HTTP status, used when a service error body
/// does not carry one.
pub(crate) fn canonical_code(status: u16) -> &'static str {
    match status {
        400 => "INVALID_ARGUMENT",
        401 => "UNAUTHENTICATED",
        403 => "PERMISSION_DENIED",
        404 => "NOT_FOUND",
        409 => "ABORTED",
        412 => "FAILED_PRECONDITION",
        429 => "RESOURCE_EXHAUSTED",
        499 => "CANCELLED",
        501 => "UNIMPLEMENTED",
        503 => "UNAVAILABLE",
        504 => "DEADLINE_EXCEEDED",
        _ => "UNKNOWN",
    }
}

fn describe_put_multi(rows: &[RowInsertionError]) -> String {
    let details = rows
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} row(s) failed to insert: {}", rows.len(), details)
}

pub type Result<T> = std::result::Result<T, Error>;

/// Body of a trait method that an implementation did not override.
pub(crate) fn unimplemented<T>(method: &'static str) -> Result<T> {
    tracing::warn!(method, "called a method the implementation does not provide");
    Err(Error::Unimplemented { method })
}

/// Body of an infallible trait method that an implementation did not override.
pub(crate) fn unimplemented_default<T: Default>(method: &'static str) -> T {
    tracing::warn!(method, "called a method the implementation does not provide");
    T::default()
}
