use {
    renvm_chain::ChainError,
    renvm_types::{CodecError, ErrorCode, NetworkError},
};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] config_parser::Error),

    #[error("no integration registered for chain `{0}`")]
    UnknownChain(String),

    #[error("asset `{asset}` is native to both {from} and {to}")]
    AmbiguousDirection {
        asset: String,
        from: String,
        to: String,
    },
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Codec(err) => err.code(),
            GatewayError::Network(err) => err.code(),
            GatewayError::Chain(err) => err.code(),
            GatewayError::Store(_) => ErrorCode::Store,
            GatewayError::Config(_) | GatewayError::UnknownChain(_) => ErrorCode::Config,
            GatewayError::AmbiguousDirection { .. } => ErrorCode::UnsupportedChainRole,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
