use metrics::{describe_counter, describe_gauge, describe_histogram};

pub const GATEWAYS_OPEN: &str = "renvm.gateway.open";
pub const DEPOSITS_DETECTED: &str = "renvm.gateway.deposits.total";
pub const TRANSFERS_SETTLED: &str = "renvm.gateway.transfers.settled";
pub const TRANSFERS_FAILED: &str = "renvm.gateway.transfers.failed";
pub const TRANSFER_DURATION: &str = "renvm.gateway.transfer.duration";
pub const WATCH_RECONNECTS: &str = "renvm.gateway.watch.reconnects";

pub fn init_metrics() {
    describe_gauge!(GATEWAYS_OPEN, "Gateways currently watching for deposits");
    describe_counter!(DEPOSITS_DETECTED, "Distinct deposits observed");
    describe_counter!(TRANSFERS_SETTLED, "Transfers that reached SETTLED");
    describe_counter!(TRANSFERS_FAILED, "Transfers that reached FAILED, by error code");
    describe_histogram!(
        TRANSFER_DURATION,
        "Time from resuming a transfer to settlement in seconds"
    );
    describe_counter!(WATCH_RECONNECTS, "Times a deposit watch was re-established");
}
