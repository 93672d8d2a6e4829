use {
    renvm_chain::ChainError,
    renvm_types::{CodecError, ErrorCode, NetworkError},
    std::fmt,
};

/// Errors the transfer loop knows how to react to. Whether to retry is read
/// off the error code alone.
pub(crate) trait Classify: fmt::Display {
    fn code(&self) -> ErrorCode;

    fn is_transient(&self) -> bool {
        self.code().is_transient()
    }
}

impl Classify for NetworkError {
    fn code(&self) -> ErrorCode {
        NetworkError::code(self)
    }
}

impl Classify for ChainError {
    fn code(&self) -> ErrorCode {
        ChainError::code(self)
    }
}

impl Classify for CodecError {
    fn code(&self) -> ErrorCode {
        CodecError::code(self)
    }
}

/// Why a transfer stopped making progress.
#[derive(Debug)]
pub(crate) enum Interrupt {
    /// The gateway was closed. The transfer keeps its current state.
    Cancelled,
    /// The transfer can't go on and must be marked failed.
    Failed { code: ErrorCode, message: String },
}

impl Interrupt {
    pub fn failed<M>(code: ErrorCode, message: M) -> Self
    where
        M: Into<String>,
    {
        Interrupt::Failed {
            code,
            message: message.into(),
        }
    }
}

impl<E> From<E> for Interrupt
where
    E: Classify,
{
    fn from(err: E) -> Self {
        Interrupt::failed(err.code(), err.to_string())
    }
}

// ----------------------------------- tests -----------------------------------

#[cfg(test)]
mod tests {
    use {super::*, anyhow::anyhow, renvm_types::Hash256, test_case::test_case};

    #[test_case(NetworkError::Transport("connection reset".into()), true)]
    #[test_case(NetworkError::Rpc { code: -32603, message: "internal".into() }, true)]
    #[test_case(NetworkError::Rpc { code: -32602, message: "bad params".into() }, false)]
    #[test_case(NetworkError::TxNotFound(Hash256::ZERO), false)]
    fn network_errors(err: NetworkError, transient: bool) {
        assert_eq!(Classify::is_transient(&err), transient);
        assert_eq!(Classify::is_transient(&err), err.is_transient());
    }

    #[test]
    fn chain_and_codec_errors() {
        assert!(Classify::is_transient(&ChainError::transient(anyhow!("timeout"))));
        assert!(!Classify::is_transient(&ChainError::permanent(anyhow!("bad script"))));
        assert!(!Classify::is_transient(&ChainError::tx_not_found("abc")));
        assert!(!Classify::is_transient(&CodecError::missing_field("$", "out")));
    }

    #[test]
    fn failures_keep_code_and_message() {
        let interrupt = Interrupt::from(CodecError::missing_field("$.tx", "out"));

        match interrupt {
            Interrupt::Failed { code, message } => {
                assert_eq!(code, ErrorCode::MissingField);
                assert_eq!(message, "missing field `out` at `$.tx`");
            },
            Interrupt::Cancelled => panic!("expected a failure"),
        }
    }
}
