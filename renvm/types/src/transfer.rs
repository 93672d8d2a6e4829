use {
    crate::{Binary, ChainTransaction, ErrorCode, Hash256, TxRef},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    serde_with::{DisplayFromStr, serde_as},
};

/// Lifecycle of a single deposit. Variants are declared in the order they're
/// reached; `Failed` is terminal and may be entered from any other state.
#[derive(
    Serialize,
    Deserialize,
    strum_macros::Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    Detected,
    Confirmed,
    SubmittedToNetwork,
    Signed,
    SubmittingOutput,
    Settled,
    Failed,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Settled | TransferState::Failed)
    }
}

/// Funds observed at a gateway's identifier.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub transaction: ChainTransaction,
    #[serde_as(as = "DisplayFromStr")]
    pub amount: u128,
    pub detected_at: DateTime<Utc>,
}

impl Deposit {
    pub fn reference(&self) -> TxRef {
        self.transaction.reference()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransferFailure {
    pub code: ErrorCode,
    pub message: String,
    /// The state the transfer was in when it failed.
    pub state: TransferState,
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub state: TransferState,
    pub input: ChainTransaction,
    pub confirmations: u64,
    pub custody_proof_hash: Option<Hash256>,
    pub network_tx_hash: Option<Hash256>,
    pub sighash: Option<Hash256>,
    pub signature: Option<Binary>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub output_amount: Option<u128>,
    pub output: Option<ChainTransaction>,
    pub failure: Option<TransferFailure>,
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    pub fn new(input: ChainTransaction) -> Self {
        Self {
            state: TransferState::Detected,
            input,
            confirmations: 0,
            custody_proof_hash: None,
            network_tx_hash: None,
            sighash: None,
            signature: None,
            output_amount: None,
            output: None,
            failure: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move forward to `next`. Returns `false`, leaving the transfer
    /// untouched, if that would be a step backwards or the transfer is
    /// already terminal.
    pub fn advance(&mut self, next: TransferState) -> bool {
        if self.is_terminal() || next == TransferState::Failed || next <= self.state {
            return false;
        }

        self.state = next;
        self.updated_at = Utc::now();

        true
    }

    pub fn fail<M>(&mut self, code: ErrorCode, message: M) -> bool
    where
        M: Into<String>,
    {
        if self.is_terminal() {
            return false;
        }

        self.failure = Some(TransferFailure {
            code,
            message: message.into(),
            state: self.state,
        });
        self.state = TransferState::Failed;
        self.updated_at = Utc::now();

        true
    }
}

// ----------------------------------- tests -----------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer() -> Transfer {
        Transfer::new(ChainTransaction::new("Bitcoin", vec![1u8; 32], 0, "01..01"))
    }

    #[test]
    fn advances_monotonically() {
        let mut transfer = transfer();

        assert!(transfer.advance(TransferState::Confirmed));
        assert!(transfer.advance(TransferState::Signed));
        assert!(!transfer.advance(TransferState::SubmittedToNetwork));
        assert!(!transfer.advance(TransferState::Signed));
        assert_eq!(transfer.state, TransferState::Signed);

        assert!(transfer.advance(TransferState::Settled));
        assert!(!transfer.fail(ErrorCode::PermanentChainError, "too late"));
        assert_eq!(transfer.state, TransferState::Settled);
    }

    #[test]
    fn failure_records_state() {
        let mut transfer = transfer();
        transfer.advance(TransferState::SubmittedToNetwork);

        assert!(transfer.fail(ErrorCode::PermanentNetworkError, "reverted"));
        assert_eq!(transfer.state, TransferState::Failed);
        assert_eq!(
            transfer.failure,
            Some(TransferFailure {
                code: ErrorCode::PermanentNetworkError,
                message: "reverted".to_string(),
                state: TransferState::SubmittedToNetwork,
            })
        );
        assert!(!transfer.advance(TransferState::Settled));
    }

    #[test]
    fn serializes_amounts_as_strings() {
        let mut transfer = transfer();
        transfer.output_amount = Some(u128::MAX);

        let json = serde_json::to_value(&transfer).unwrap();
        assert_eq!(json["state"], "DETECTED");
        assert_eq!(json["output_amount"], u128::MAX.to_string());

        let de: Transfer = serde_json::from_value(json).unwrap();
        assert_eq!(de, transfer);
    }
}
