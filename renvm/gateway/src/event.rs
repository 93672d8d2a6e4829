use {
    renvm_types::{Deposit, Transfer, TxRef},
    serde::{Deserialize, Serialize},
};

/// Everything a gateway reports, in one continuous stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A deposit was observed for the first time (or replayed from the
    /// store after reopening the gateway).
    Deposit(Deposit),
    /// A transfer changed: a state transition, new confirmations or a
    /// terminal outcome.
    Transfer(Transfer),
}

impl GatewayEvent {
    /// The deposit this event is about.
    pub fn reference(&self) -> TxRef {
        match self {
            GatewayEvent::Deposit(deposit) => deposit.reference(),
            GatewayEvent::Transfer(transfer) => transfer.input.reference(),
        }
    }

    pub fn as_transfer(&self) -> Option<&Transfer> {
        match self {
            GatewayEvent::Transfer(transfer) => Some(transfer),
            GatewayEvent::Deposit(_) => None,
        }
    }
}
