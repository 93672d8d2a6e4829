use {
    renvm_testing::{BITCOIN, SOLANA, TestSuite, ethereum_to_btc, run_until_terminal},
    renvm_types::{DestinationParams, Direction, GatewayIdentifier, TransferState},
};

#[tokio::test]
async fn burn_settles_through_the_networks_release() {
    let suite = TestSuite::new();
    // The release takes a few lookups to show up on Bitcoin.
    suite.bitcoin.delay_releases(3);

    let engine = suite.engine();
    let mut gateway = engine.open(ethereum_to_btc(7)).await.unwrap();
    assert_eq!(gateway.direction(), Direction::BurnAndRelease);
    assert!(matches!(gateway.identifier(), GatewayIdentifier::Account(_)));

    let burn = suite.ethereum.deposit(gateway.identifier(), 9, 1_000_000);
    let observed = run_until_terminal(&mut gateway, 1).await;

    let transfer = &observed.transfers[&burn.reference()];
    assert_eq!(transfer.state, TransferState::Settled);
    assert_eq!(transfer.output_amount, Some(994_000));

    let release = transfer.output.as_ref().unwrap();
    assert_eq!(release.chain, BITCOIN);

    // Nothing was broadcast on either chain by the client.
    assert_eq!(suite.bitcoin.broadcasts(), 0);
    assert_eq!(suite.ethereum.broadcasts(), 0);
    assert_eq!(suite.network.submissions(), 1);
}

#[tokio::test]
async fn burn_and_mint_between_host_chains() {
    let suite = TestSuite::new();
    let engine = suite.engine();

    let mut params = ethereum_to_btc(7);
    params.to = SOLANA.to_string();
    params.destination = DestinationParams::Address {
        to: "0x00000000000000000000000000000000000000ee".to_string(),
    };

    let mut gateway = engine.open(params).await.unwrap();
    assert_eq!(gateway.direction(), Direction::BurnAndMint);

    let burn = suite.ethereum.deposit(gateway.identifier(), 3, 1_000_000);
    let observed = run_until_terminal(&mut gateway, 1).await;

    let transfer = &observed.transfers[&burn.reference()];
    assert_eq!(transfer.state, TransferState::Settled);
    assert_eq!(transfer.output_amount, Some(997_500));
    assert_eq!(transfer.output.as_ref().unwrap().chain, SOLANA);

    assert_eq!(suite.solana.broadcasts(), 1);

    // The network was asked for the burn-and-mint contract.
    let selectors = suite
        .network
        .transactions()
        .into_iter()
        .map(|tx| tx.selector)
        .collect::<Vec<_>>();
    assert_eq!(selectors, ["BTC/fromEthereumToSolana"]);
}
