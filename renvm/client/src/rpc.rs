use {
    async_trait::async_trait,
    renvm_types::{
        AssetState, Codec, Hash256, NetworkError, QueryTxOutcome, RenVmClient, RenVmTx, TxStatus,
    },
    reqwest::IntoUrl,
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    std::sync::atomic::{AtomicU64, Ordering},
    tracing::debug,
    url::Url,
};

pub const METHOD_SUBMIT_TX: &str = "ren_submitTx";
pub const METHOD_QUERY_TX: &str = "ren_queryTx";
pub const METHOD_QUERY_BLOCK_STATE: &str = "ren_queryBlockState";

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// [`RenVmClient`] speaking JSON-RPC 2.0 over HTTP.
#[derive(Debug)]
pub struct RpcClient {
    inner: reqwest::Client,
    endpoint: Url,
    codec: Codec,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new<U>(endpoint: U) -> Result<Self, NetworkError>
    where
        U: IntoUrl,
    {
        Ok(Self {
            inner: reqwest::Client::new(),
            endpoint: endpoint
                .into_url()
                .map_err(|err| NetworkError::Transport(err.to_string()))?,
            codec: Codec::default(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call<P>(&self, method: &str, params: P) -> Result<Value, NetworkError>
    where
        P: Serialize + Send,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        debug!(method, id, "Sending RPC request");

        let response = self
            .inner
            .post(self.endpoint.clone())
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(|err| NetworkError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(NetworkError::Transport(format!("server returned {status}")));
        }

        if !status.is_success() {
            return Err(NetworkError::UnexpectedResponse(format!(
                "server returned {status}"
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| NetworkError::UnexpectedResponse(err.to_string()))?;

        match (body.result, body.error) {
            (_, Some(err)) => Err(NetworkError::Rpc {
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(NetworkError::UnexpectedResponse(format!(
                "{method} returned neither a result nor an error"
            ))),
        }
    }
}

#[async_trait]
impl RenVmClient for RpcClient {
    async fn submit_tx(&self, tx: &RenVmTx) -> Result<Hash256, NetworkError> {
        let wire = tx.to_wire(&self.codec)?;
        let result = self.call(METHOD_SUBMIT_TX, json!({ "tx": wire })).await?;

        // Older nodes acknowledge with an empty object.
        match result.get("hash") {
            Some(Value::String(hash)) => hash
                .parse()
                .map_err(|err| NetworkError::UnexpectedResponse(format!("invalid tx hash: {err}"))),
            Some(other) => Err(NetworkError::UnexpectedResponse(format!(
                "invalid tx hash: {other}"
            ))),
            None => Ok(tx.hash),
        }
    }

    async fn query_tx(&self, hash: Hash256) -> Result<QueryTxOutcome, NetworkError> {
        let result = match self
            .call(METHOD_QUERY_TX, json!({ "txHash": hash.to_string() }))
            .await
        {
            Ok(result) => result,
            Err(NetworkError::Rpc { message, .. }) if is_not_found(&message) => {
                return Err(NetworkError::TxNotFound(hash));
            },
            Err(err) => return Err(err),
        };

        let status: TxStatus = result
            .get("txStatus")
            .cloned()
            .ok_or_else(|| NetworkError::UnexpectedResponse("missing txStatus".to_string()))
            .and_then(|status| {
                serde_json::from_value(status)
                    .map_err(|err| NetworkError::UnexpectedResponse(format!("invalid txStatus: {err}")))
            })?;

        let output = result
            .pointer("/tx/out/v")
            .filter(|out| !out.is_null())
            .cloned();

        Ok(QueryTxOutcome { status, output })
    }

    async fn query_asset_state(&self, asset: &str) -> Result<AssetState, NetworkError> {
        let result = self
            .call(METHOD_QUERY_BLOCK_STATE, json!({ "contract": asset }))
            .await?;

        let state = result
            .pointer("/state/v")
            .ok_or_else(|| NetworkError::UnexpectedResponse("missing state".to_string()))?;
        let value = self.codec.unmarshal(&AssetState::ty(), state)?;

        Ok(AssetState::from_typed(asset, &value)?)
    }
}

fn is_not_found(message: &str) -> bool {
    message.to_ascii_lowercase().contains("not found")
}

// ----------------------------------- tests -----------------------------------

#[cfg(test)]
mod tests {
    use {super::*, test_case::test_case};

    #[test_case("tx not found" => true)]
    #[test_case("Transaction Not Found: abc" => true)]
    #[test_case("invalid params" => false)]
    fn not_found_detection(message: &str) -> bool {
        is_not_found(message)
    }

    #[test]
    fn request_shape() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: METHOD_QUERY_TX,
            params: json!({ "txHash": "AA==" }),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "ren_queryTx",
                "params": { "txHash": "AA==" },
            })
        );
    }
}
