use {
    renvm_testing::{
        BITCOIN, Behavior, ETHEREUM, TestSuite, btc_to_ethereum, run_until_terminal,
        setup_tracing_subscriber,
    },
    renvm_types::{Direction, ErrorCode, TransferState},
};

/// 0.01 BTC in satoshis.
const CENTI_BTC: u128 = 1_000_000;

#[tokio::test]
async fn btc_deposit_settles_with_net_amount() {
    setup_tracing_subscriber(tracing::Level::INFO);

    let suite = TestSuite::new();
    let engine = suite.engine();

    let mut gateway = engine.open(btc_to_ethereum(4)).await.unwrap();
    assert_eq!(gateway.direction(), Direction::LockAndMint);

    let expected = gateway.fees().estimate_output(CENTI_BTC);
    assert_eq!(expected, 995_500);

    let deposit = suite.bitcoin.deposit(gateway.identifier(), 1, CENTI_BTC);
    let observed = run_until_terminal(&mut gateway, 1).await;

    assert_eq!(observed.deposits(), 1);
    assert_eq!(observed.count_state(TransferState::Settled), 1);
    assert_eq!(observed.count_state(TransferState::Failed), 0);

    let transfer = &observed.transfers[&deposit.reference()];
    assert_eq!(transfer.state, TransferState::Settled);
    assert_eq!(transfer.output_amount, Some(expected));
    assert!(transfer.confirmations >= 3);
    assert!(transfer.custody_proof_hash.is_some());
    assert!(transfer.network_tx_hash.is_some());
    assert!(transfer.signature.is_some());
    assert_eq!(transfer.output.as_ref().unwrap().chain, ETHEREUM);

    // Every intermediate state was reported, in order.
    let states = observed
        .events
        .iter()
        .filter_map(|event| event.as_transfer())
        .map(|transfer| transfer.state)
        .collect::<Vec<_>>();
    assert!(states.windows(2).all(|pair| pair[0] <= pair[1]));
    for state in [
        TransferState::Detected,
        TransferState::Confirmed,
        TransferState::SubmittedToNetwork,
        TransferState::Signed,
        TransferState::SubmittingOutput,
    ] {
        assert!(states.contains(&state), "{state} was never reported");
    }

    assert_eq!(suite.network.submissions(), 1);
    assert_eq!(suite.ethereum.broadcasts(), 1);
    assert!(suite.bitcoin.outputs().is_empty());
}

#[tokio::test]
async fn concurrent_deposits_fail_independently() {
    setup_tracing_subscriber(tracing::Level::INFO);

    let suite = TestSuite::new();
    let engine = suite.engine();
    let mut gateway = engine.open(btc_to_ethereum(4)).await.unwrap();

    // The second deposit is dropped from the chain while confirming.
    let doomed = suite.bitcoin.transaction(2);
    suite.bitcoin.drop_transaction(&doomed);

    let healthy = suite.bitcoin.deposit(gateway.identifier(), 1, CENTI_BTC);
    suite.bitcoin.deposit(gateway.identifier(), 2, 2 * CENTI_BTC);

    let observed = run_until_terminal(&mut gateway, 2).await;

    let settled = &observed.transfers[&healthy.reference()];
    assert_eq!(settled.state, TransferState::Settled);
    assert_eq!(settled.output_amount, Some(995_500));

    let failed = &observed.transfers[&doomed.reference()];
    assert_eq!(failed.state, TransferState::Failed);

    let failure = failed.failure.as_ref().unwrap();
    assert_eq!(failure.code, ErrorCode::PermanentChainError);
    assert_eq!(failure.state, TransferState::Detected);

    assert_eq!(suite.network.submissions(), 1);
}

#[tokio::test]
async fn deposit_below_minimum_never_reaches_the_network() {
    let suite = TestSuite::new();
    let engine = suite.engine();
    let mut gateway = engine.open(btc_to_ethereum(4)).await.unwrap();

    let deposit = suite.bitcoin.deposit(gateway.identifier(), 1, 9_999);
    let observed = run_until_terminal(&mut gateway, 1).await;

    let failure = observed.transfers[&deposit.reference()].failure.clone().unwrap();
    assert_eq!(failure.code, ErrorCode::PermanentNetworkError);
    assert_eq!(failure.state, TransferState::Detected);
    assert!(failure.message.contains("minimum"));

    assert_eq!(suite.network.submissions(), 0);
}

#[tokio::test]
async fn reverted_transaction_fails_with_reason() {
    let suite = TestSuite::new();
    suite
        .network
        .set_behavior(Behavior::Revert("amount too small".to_string()));

    let engine = suite.engine();
    let mut gateway = engine.open(btc_to_ethereum(4)).await.unwrap();

    let deposit = suite.bitcoin.deposit(gateway.identifier(), 1, CENTI_BTC);
    let observed = run_until_terminal(&mut gateway, 1).await;

    let failure = observed.transfers[&deposit.reference()].failure.clone().unwrap();
    assert_eq!(failure.code, ErrorCode::PermanentNetworkError);
    assert_eq!(failure.state, TransferState::SubmittedToNetwork);
    assert!(failure.message.contains("amount too small"));

    assert_eq!(suite.ethereum.broadcasts(), 0);
}

#[tokio::test]
async fn reverted_status_fails_the_transfer() {
    let suite = TestSuite::new();
    suite.network.set_behavior(Behavior::RejectStatus);

    let engine = suite.engine();
    let mut gateway = engine.open(btc_to_ethereum(4)).await.unwrap();

    let deposit = suite.bitcoin.deposit(gateway.identifier(), 1, CENTI_BTC);
    let observed = run_until_terminal(&mut gateway, 1).await;

    let transfer = &observed.transfers[&deposit.reference()];
    assert_eq!(transfer.state, TransferState::Failed);
    assert_eq!(
        transfer.failure.as_ref().unwrap().code,
        ErrorCode::PermanentNetworkError
    );
}

#[tokio::test]
async fn transient_submission_errors_are_retried() {
    let suite = TestSuite::new();
    suite.network.fail_submissions(2);
    suite.ethereum.fail_broadcasts(2);

    let engine = suite.engine();
    let mut gateway = engine.open(btc_to_ethereum(4)).await.unwrap();

    let deposit = suite.bitcoin.deposit(gateway.identifier(), 1, CENTI_BTC);
    let observed = run_until_terminal(&mut gateway, 1).await;

    assert_eq!(
        observed.transfers[&deposit.reference()].state,
        TransferState::Settled
    );
    assert_eq!(suite.network.submissions(), 1);
    assert_eq!(suite.ethereum.broadcasts(), 1);
}

#[tokio::test]
async fn submission_gives_up_after_configured_attempts() {
    let mut suite = TestSuite::new();
    suite.config.submit_attempts = 3;
    suite.network.fail_submissions(3);

    let engine = suite.engine();
    let mut gateway = engine.open(btc_to_ethereum(4)).await.unwrap();

    let deposit = suite.bitcoin.deposit(gateway.identifier(), 1, CENTI_BTC);
    let observed = run_until_terminal(&mut gateway, 1).await;

    let failure = observed.transfers[&deposit.reference()].failure.clone().unwrap();
    assert_eq!(failure.code, ErrorCode::TransientNetworkError);
    assert_eq!(failure.state, TransferState::Confirmed);
    assert_eq!(suite.network.submissions(), 0);
}

#[tokio::test]
async fn closing_the_gateway_stops_without_failing() {
    let suite = TestSuite::new();
    suite.network.set_behavior(Behavior::Stall);

    let engine = suite.engine();
    let mut gateway = engine.open(btc_to_ethereum(4)).await.unwrap();

    let deposit = suite.bitcoin.deposit(gateway.identifier(), 1, CENTI_BTC);

    // Wait until the proof is with the network, then walk away.
    while let Some(event) = gateway.next_event().await {
        if event
            .as_transfer()
            .is_some_and(|transfer| transfer.state == TransferState::SubmittedToNetwork)
        {
            break;
        }
    }

    gateway.close();
    assert!(gateway.is_closed());

    // The stream ends once every task has stopped, with no failure reported.
    let mut rest = vec![];
    while let Some(event) = gateway.next_event().await {
        rest.push(event);
    }
    assert!(rest
        .iter()
        .filter_map(|event| event.as_transfer())
        .all(|transfer| transfer.state != TransferState::Failed));

    let records = suite.store.load(&gateway.ghash()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reference(), deposit.reference());
    assert_eq!(records[0].transfer.state, TransferState::SubmittedToNetwork);
    assert_eq!(records[0].transfer.input.chain, BITCOIN);
}
