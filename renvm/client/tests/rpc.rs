use {
    axum::{Json, Router, routing::post, serve},
    renvm_client::RpcClient,
    renvm_types::{
        AssetState, Binary, Codec, CustodyProof, Hash256, NetworkError, NetworkOutput,
        RenVmClient, RenVmTx, TxStatus, nonce_from_u64, u256_from_u128,
    },
    serde_json::{Value, json},
    tokio::net::TcpListener,
};

fn asset_state() -> AssetState {
    AssetState {
        asset: "BTC".to_string(),
        gpubkey: Binary::from(vec![2u8; 33]),
        minimum_amount: 10_000,
        mint_fee_bps: 15,
        burn_fee_bps: 15,
        lock_fee: 3_000,
        release_fee: 5_000,
    }
}

fn output() -> NetworkOutput {
    NetworkOutput {
        hash: Hash256::from_inner([1; 32]),
        amount: 995_500,
        sighash: Hash256::from_inner([2; 32]),
        sig: Binary::from(vec![3u8; 65]),
        txid: Binary::empty(),
        txindex: 0,
        revert: String::new(),
    }
}

fn known_hash() -> Hash256 {
    Hash256::from_inner([1; 32])
}

fn rpc_error(id: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

fn rpc_result(id: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

async fn handler(Json(request): Json<Value>) -> Json<Value> {
    let codec = Codec::default();
    let id = &request["id"];

    let response = match request["method"].as_str() {
        Some("ren_submitTx") => {
            let tx = &request["params"]["tx"];
            if tx["in"]["t"].is_null() || tx["in"]["v"].is_null() {
                rpc_error(id, -32602, "invalid params: missing input")
            } else {
                rpc_result(id, json!({ "hash": tx["hash"] }))
            }
        },
        Some("ren_queryTx") => {
            if request["params"]["txHash"] == known_hash().to_string() {
                let out = codec.marshal(&NetworkOutput::ty(), &output().to_typed()).unwrap();
                rpc_result(
                    id,
                    json!({
                        "tx": { "out": { "t": NetworkOutput::ty().descriptor(), "v": out } },
                        "txStatus": "done",
                    }),
                )
            } else {
                rpc_error(id, -32602, "tx not found")
            }
        },
        Some("ren_queryBlockState") => {
            if request["params"]["contract"] == "BTC" {
                let state = codec.marshal(&AssetState::ty(), &asset_state().to_typed()).unwrap();
                rpc_result(id, json!({ "state": { "v": state } }))
            } else {
                rpc_error(id, -32603, "internal error")
            }
        },
        _ => rpc_error(id, -32601, "method not found"),
    };

    Json(response)
}

async fn start_server() -> RpcClient {
    let app = Router::new().route("/", post(handler));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        serve(listener, app.into_make_service()).await.unwrap();
    });

    RpcClient::new(format!("http://{addr}/")).unwrap()
}

#[tokio::test]
async fn submit_returns_the_accepted_hash() {
    let client = start_server().await;

    let proof = CustodyProof {
        txid: Binary::from(vec![9u8; 32]),
        txindex: 0,
        amount: 1_000_000,
        payload: Binary::empty(),
        phash: Hash256::from_inner([3; 32]),
        to: "0x0000000000000000000000000000000000000001".to_string(),
        nonce: nonce_from_u64(4),
        nhash: Hash256::from_inner([4; 32]),
        gpubkey: Binary::from(vec![2u8; 33]),
        ghash: Hash256::from_inner([5; 32]),
    };
    let tx = RenVmTx::new("BTC/toEthereum", CustodyProof::ty(), proof.to_typed()).unwrap();

    assert_eq!(client.submit_tx(&tx).await.unwrap(), tx.hash);
}

#[tokio::test]
async fn query_done_transaction() {
    let client = start_server().await;

    let outcome = client.query_tx(known_hash()).await.unwrap();
    assert_eq!(outcome.status, TxStatus::Done);

    let value = Codec::default()
        .unmarshal(&NetworkOutput::ty(), &outcome.output.unwrap())
        .unwrap();
    let decoded = NetworkOutput::from_typed(&value).unwrap();
    assert_eq!(decoded, output());
    assert_eq!(u256_from_u128(decoded.amount).to_string(), "995500");
}

#[tokio::test]
async fn query_unknown_transaction() {
    let client = start_server().await;
    let hash = Hash256::from_inner([7; 32]);

    let err = client.query_tx(hash).await.unwrap_err();
    assert!(matches!(err, NetworkError::TxNotFound(h) if h == hash));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn query_asset_state() {
    let client = start_server().await;

    assert_eq!(client.query_asset_state("BTC").await.unwrap(), asset_state());

    let err = client.query_asset_state("DOGE").await.unwrap_err();
    assert!(err.is_transient(), "{err}");
}

#[tokio::test]
async fn unreachable_server_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RpcClient::new(format!("http://{addr}/")).unwrap();
    let err = client.query_tx(known_hash()).await.unwrap_err();
    assert!(matches!(err, NetworkError::Transport(_)), "{err}");
}
