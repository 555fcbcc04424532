use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use num_bigint::BigUint;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::models::balance::{CallOutcome, ContractCall};
use crate::models::wallet::{classify, AddressKind};
use crate::traits::balance_provider::BalanceProvider;
use crate::utils::abi;

/// Public RPC endpoints often reject larger batches
const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: serde_json::Value,
}

impl RpcRequest {
    fn new(id: u64, method: &'static str, params: serde_json::Value) -> Self {
        Self { jsonrpc: "2.0", id, method, params }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: u64,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// JSON-RPC balance provider.
///
/// Batched reads go out as one JSON-RPC batch of `eth_call`s per chain, so a
/// wallet × token cross product costs a single HTTP round trip.
pub struct EvmRpcBalanceProvider {
    client: Client,
    endpoints: HashMap<u64, String>,
}

impl EvmRpcBalanceProvider {
    /// Create a provider with one RPC URL per chain id
    pub fn new(endpoints: HashMap<u64, String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build RPC HTTP client")?;
        Ok(Self { client, endpoints })
    }

    fn endpoint(&self, chain_id: u64) -> anyhow::Result<&str> {
        self.endpoints
            .get(&chain_id)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("no RPC endpoint configured for chain {}", chain_id))
    }

    async fn post_batch(&self, url: &str, requests: &[RpcRequest]) -> anyhow::Result<Vec<RpcResponse>> {
        let response = self
            .client
            .post(url)
            .json(requests)
            .send()
            .await
            .with_context(|| format!("RPC batch request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("RPC endpoint {} returned status {}", url, status);
        }

        response
            .json::<Vec<RpcResponse>>()
            .await
            .context("malformed RPC batch response")
    }

    fn outcome_for(call: &ContractCall, response: RpcResponse) -> CallOutcome {
        if let Some(err) = response.error {
            return CallOutcome::failure(format!("rpc error {}: {}", err.code, err.message));
        }
        match response.result {
            Some(data) => match abi::decode_result(&call.method, &data) {
                Ok(value) => CallOutcome::Success(value),
                Err(e) => CallOutcome::failure(e),
            },
            None => CallOutcome::failure("empty RPC result"),
        }
    }
}

#[async_trait]
impl BalanceProvider for EvmRpcBalanceProvider {
    async fn batch_read(&self, calls: &[ContractCall]) -> anyhow::Result<Vec<CallOutcome>> {
        let mut outcomes: Vec<Option<CallOutcome>> = vec![None; calls.len()];

        let mut chunks_sent = 0usize;
        let mut chunks_failed = 0usize;
        let mut last_error: Option<anyhow::Error> = None;

        let mut by_chain: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for (i, call) in calls.iter().enumerate() {
            by_chain.entry(call.chain_id).or_default().push(i);
        }

        for (chain_id, indexes) in by_chain {
            let url = match self.endpoint(chain_id) {
                Ok(url) => url,
                Err(e) => {
                    warn!("{}", e);
                    for i in indexes {
                        outcomes[i] = Some(CallOutcome::failure(&e));
                    }
                    continue;
                }
            };

            // Request ids are call indexes so responses can come back in any order
            let mut requests = Vec::with_capacity(indexes.len());
            for i in indexes {
                let call = &calls[i];
                if classify(&call.contract) != AddressKind::Evm {
                    outcomes[i] = Some(CallOutcome::failure(format!("invalid contract address {}", call.contract)));
                    continue;
                }
                match abi::encode_call(&call.method) {
                    Ok(data) => requests.push(RpcRequest::new(
                        i as u64,
                        "eth_call",
                        json!([{ "to": call.contract, "data": data }, "latest"]),
                    )),
                    Err(e) => outcomes[i] = Some(CallOutcome::failure(e)),
                }
            }

            for chunk in requests.chunks(MAX_BATCH_SIZE) {
                debug!("Sending {} eth_call(s) to chain {}", chunk.len(), chain_id);
                chunks_sent += 1;
                match self.post_batch(url, chunk).await {
                    Ok(responses) => {
                        for response in responses {
                            let i = response.id as usize;
                            if let Some(call) = calls.get(i) {
                                outcomes[i] = Some(Self::outcome_for(call, response));
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Batch of {} call(s) on chain {} failed: {:#}", chunk.len(), chain_id, e);
                        let reason = format!("{:#}", e);
                        for request in chunk {
                            outcomes[request.id as usize] = Some(CallOutcome::failure(&reason));
                        }
                        chunks_failed += 1;
                        last_error = Some(e);
                    }
                }
            }
        }

        // Only a total outage is a transport error; anything less stays per call
        if let Some(e) = last_error {
            if chunks_failed == chunks_sent {
                return Err(e);
            }
        }

        Ok(outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| CallOutcome::failure("no response for call")))
            .collect())
    }

    async fn read_native(&self, chain_id: u64, address: &str) -> anyhow::Result<BigUint> {
        if classify(address) != AddressKind::Evm {
            bail!("not an EVM address: {}", address);
        }
        let url = self.endpoint(chain_id)?;
        let request = RpcRequest::new(1, "eth_getBalance", json!([address, "latest"]));

        let response: RpcResponse = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("eth_getBalance request to {} failed", url))?
            .error_for_status()?
            .json()
            .await
            .context("malformed eth_getBalance response")?;

        if let Some(err) = response.error {
            bail!("rpc error {}: {}", err.code, err.message);
        }
        let quantity = response
            .result
            .ok_or_else(|| anyhow!("eth_getBalance returned no result"))?;
        abi::parse_quantity(&quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::balance::CallValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_body(socket: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return Vec::new();
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let start = end + 4;
                if buf.len() >= start + len {
                    return buf[start..start + len].to_vec();
                }
            }
        }
    }

    /// Local JSON-RPC endpoint answering the first `ok_batches` batches with a
    /// balance of 1 per call and every later batch with a 503
    async fn flaky_rpc(ok_batches: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let served = Arc::new(AtomicUsize::new(0));

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let served = served.clone();
                tokio::spawn(async move {
                    let body = read_body(&mut socket).await;
                    let response = if served.fetch_add(1, Ordering::SeqCst) < ok_batches {
                        let batch: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
                        let results: Vec<serde_json::Value> = batch
                            .iter()
                            .map(|r| json!({ "jsonrpc": "2.0", "id": r["id"], "result": format!("0x{:064x}", 1) }))
                            .collect();
                        let payload = serde_json::to_string(&results).unwrap();
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            payload.len(),
                            payload
                        )
                    } else {
                        "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    };
                    socket.write_all(response.as_bytes()).await.unwrap();
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    fn provider_for(url: String) -> EvmRpcBalanceProvider {
        EvmRpcBalanceProvider::new(HashMap::from([(1, url)]), Duration::from_secs(5)).unwrap()
    }

    fn call() -> ContractCall {
        ContractCall::balance_of(
            1,
            "0xdAC17F958D2ee523a2206206994597C13D831ec7",
            "0x52908400098527886E0F7030069857D2E4169EE7",
        )
    }

    #[test]
    fn batch_request_serializes_as_jsonrpc() {
        let req = RpcRequest::new(7, "eth_call", json!([{ "to": "0x01", "data": "0x" }, "latest"]));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["params"][1], "latest");
    }

    #[test]
    fn responses_decode_into_outcomes() {
        let raw = r#"[
            {"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}},
            {"jsonrpc":"2.0","id":0,"result":"0x000000000000000000000000000000000000000000000000000000000016e360"}
        ]"#;
        let responses: Vec<RpcResponse> = serde_json::from_str(raw).unwrap();
        let mut outcomes: Vec<CallOutcome> = responses
            .into_iter()
            .map(|r| EvmRpcBalanceProvider::outcome_for(&call(), r))
            .collect();

        let ok = outcomes.pop().unwrap();
        assert_eq!(ok, CallOutcome::Success(CallValue::Uint(BigUint::from(1_500_000u32))));
        assert!(matches!(outcomes.pop().unwrap(), CallOutcome::Failure(msg) if msg.contains("reverted")));
    }

    #[tokio::test]
    async fn failed_chunk_keeps_earlier_results() {
        let provider = provider_for(flaky_rpc(1).await);
        let calls = vec![call(); 150];

        let outcomes = provider.batch_read(&calls).await.unwrap();

        assert_eq!(outcomes.len(), 150);
        let ok = outcomes
            .iter()
            .filter(|o| o.as_uint() == Some(&BigUint::from(1u32)))
            .count();
        assert_eq!(ok, MAX_BATCH_SIZE);
        assert!(outcomes[MAX_BATCH_SIZE..]
            .iter()
            .all(|o| matches!(o, CallOutcome::Failure(msg) if msg.contains("503"))));
    }

    #[tokio::test]
    async fn every_chunk_failing_is_a_transport_error() {
        let provider = provider_for(flaky_rpc(0).await);
        let err = provider.batch_read(&vec![call(); 150]).await.unwrap_err();
        assert!(format!("{:#}", err).contains("503"));
    }

    #[tokio::test]
    async fn unknown_chain_fails_only_its_calls() {
        let provider = EvmRpcBalanceProvider::new(HashMap::new(), Duration::from_secs(1)).unwrap();
        let outcomes = provider.batch_read(&[call()]).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], CallOutcome::Failure(msg) if msg.contains("chain 1")));
    }
}
