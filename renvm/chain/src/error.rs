use {
    renvm_types::ErrorCode,
    std::{fmt, sync::Arc},
};

/// A capability a chain integration may or may not offer.
#[derive(strum_macros::Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum ChainRole {
    /// Accepting deposits and deriving gateway identifiers.
    Input,
    /// Settling outputs.
    Output,
    /// Calling contracts with a payload.
    Contract,
}

/// Errors raised by chain integrations.
///
/// The engine never inspects the underlying cause; it only asks whether the
/// error is worth retrying.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("transient chain error: {0}")]
    Transient(Arc<anyhow::Error>),

    #[error("permanent chain error: {0}")]
    Permanent(Arc<anyhow::Error>),

    #[error("transaction not found: {0}")]
    TxNotFound(String),

    #[error("chain `{chain}` does not support the {role} role")]
    UnsupportedRole { chain: String, role: ChainRole },
}

impl ChainError {
    pub fn transient<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Transient(Arc::new(err.into()))
    }

    pub fn permanent<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Permanent(Arc::new(err.into()))
    }

    pub fn tx_not_found<T>(tx: T) -> Self
    where
        T: fmt::Display,
    {
        Self::TxNotFound(tx.to_string())
    }

    pub fn unsupported_role<C>(chain: C, role: ChainRole) -> Self
    where
        C: Into<String>,
    {
        Self::UnsupportedRole {
            chain: chain.into(),
            role,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Transient(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ChainError::Transient(_) => ErrorCode::TransientChainError,
            ChainError::Permanent(_) => ErrorCode::PermanentChainError,
            ChainError::TxNotFound(_) => ErrorCode::TransactionNotFound,
            ChainError::UnsupportedRole { .. } => ErrorCode::UnsupportedChainRole,
        }
    }
}
