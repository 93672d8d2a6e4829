use {
    crate::Hash256,
    serde::{Deserialize, Serialize},
};

/// Classification shared by every error the gateway client can surface.
///
/// Callers (and the event stream) only ever see these codes plus a message;
/// the engine decides whether to retry purely from the code.
#[derive(
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MalformedValue,
    MissingField,
    UnsupportedChainRole,
    TransientChainError,
    TransientNetworkError,
    PermanentChainError,
    PermanentNetworkError,
    TransactionNotFound,
    Config,
    Store,
}

impl ErrorCode {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorCode::TransientChainError | ErrorCode::TransientNetworkError
        )
    }
}

// ----------------------------------- codec -----------------------------------

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("malformed value at `{path}`: {reason}")]
    MalformedValue { path: String, reason: String },

    #[error("missing field `{field}` at `{path}`")]
    MissingField { path: String, field: String },
}

impl CodecError {
    pub fn malformed<P, R>(path: P, reason: R) -> Self
    where
        P: Into<String>,
        R: ToString,
    {
        Self::MalformedValue {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_field<P, F>(path: P, field: F) -> Self
    where
        P: Into<String>,
        F: Into<String>,
    {
        Self::MissingField {
            path: path.into(),
            field: field.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            CodecError::MalformedValue { .. } => ErrorCode::MalformedValue,
            CodecError::MissingField { .. } => ErrorCode::MissingField,
        }
    }
}

// ---------------------------------- network ----------------------------------

/// JSON-RPC code the network uses for internal failures. Worth retrying.
pub const RPC_INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error! code: {code}, message: {message}")]
    Rpc { code: i64, message: String },

    #[error("transaction not found: {0}")]
    TxNotFound(Hash256),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl NetworkError {
    /// Transport failures and server-side JSON-RPC errors are worth retrying.
    /// Codec failures mean a protocol mismatch and are never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Transport(_) => true,
            NetworkError::Rpc { code, .. } => {
                *code == RPC_INTERNAL_ERROR || (-32099..=-32000).contains(code)
            },
            NetworkError::TxNotFound(_)
            | NetworkError::UnexpectedResponse(_)
            | NetworkError::Codec(_) => false,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            NetworkError::Codec(err) => err.code(),
            NetworkError::TxNotFound(_) => ErrorCode::TransactionNotFound,
            _ if self.is_transient() => ErrorCode::TransientNetworkError,
            _ => ErrorCode::PermanentNetworkError,
        }
    }
}

// ----------------------------------- tests -----------------------------------
