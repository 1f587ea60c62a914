//! RPC Client - JSON-RPC transport and local signing for value transfers
//!
//! Implements the two collaborator traits the load core depends on:
//!
//! - [`NonceSource`]: `eth_getTransactionCount(address, "pending")`, retried
//!   with exponential backoff.
//! - [`TransactionSubmitter`]: builds a legacy transfer, signs it with the
//!   sender's key, 2718-encodes it and broadcasts it with
//!   `eth_sendRawTransaction`. Never retried; a failure is reported to the
//!   caller as a [`SubmitError`].
//!
//! Gas price and gas limit are fixed by configuration. No estimation is done.

use crate::config::LoadTestConfig;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, U256, hex};
use anyhow::{Context, Result};
use async_trait::async_trait;
use core_logic::{
    NetworkError, NonceSource, RetryConfig, SubmitError, TransactionSubmitter, TransferRequest,
    with_retry,
};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TIMEOUT_PREFIX: &str = "request timed out";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// Value-transfer client for an EVM JSON-RPC endpoint
///
/// Cheap to share behind an `Arc`; the underlying reqwest client pools
/// connections.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: Client,
    rpc_url: Url,
    chain_id: u64,
    value: U256,
    gas_price: u128,
    gas_limit: u64,
    retry: RetryConfig,
}

impl RpcClient {
    pub fn new(config: &LoadTestConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            rpc_url: config.rpc_url.clone(),
            chain_id: config.chain_id,
            value: config.value_wei,
            gas_price: config.gas_price_wei,
            gas_limit: config.gas_limit,
            retry: RetryConfig::default().transient_only(),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Builds and signs the legacy transfer, returning its 2718 encoding
    pub async fn sign_transfer(&self, transfer: &TransferRequest) -> Result<Vec<u8>, SubmitError> {
        let signer = PrivateKeySigner::from_str(transfer.sender.private_key.trim()).map_err(|e| {
            SubmitError::Signing {
                reason: format!("invalid private key for {}: {}", transfer.sender.address, e),
            }
        })?;

        if signer.address() != transfer.sender.address {
            return Err(SubmitError::Signing {
                reason: format!(
                    "private key does not belong to {}",
                    transfer.sender.checksum_address()
                ),
            });
        }

        let wallet = EthereumWallet::from(signer);
        let tx = TransactionRequest::default()
            .with_from(transfer.sender.address)
            .with_to(transfer.receiver)
            .with_value(self.value)
            .with_nonce(transfer.nonce)
            .with_gas_limit(self.gas_limit)
            .with_gas_price(self.gas_price)
            .with_chain_id(self.chain_id);

        let envelope = tx.build(&wallet).await.map_err(|e| SubmitError::Signing {
            reason: e.to_string(),
        })?;

        Ok(envelope.encoded_2718())
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, SubmitError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response = self
            .http
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let body = response.text().await.map_err(|e| transport_error(&e))?;

        parse_rpc_response(&body)
    }

    fn network_error(&self, err: SubmitError) -> NetworkError {
        let endpoint = self.rpc_url.to_string();
        match err {
            SubmitError::Rpc { message } => NetworkError::Rpc { endpoint, message },
            SubmitError::Transport { reason } if reason.starts_with(TIMEOUT_PREFIX) => {
                NetworkError::Timeout {
                    timeout_ms: REQUEST_TIMEOUT.as_millis() as u64,
                    endpoint,
                }
            }
            SubmitError::Transport { reason } => NetworkError::Transport { endpoint, reason },
            SubmitError::MalformedResponse { reason } | SubmitError::Signing { reason } => {
                NetworkError::InvalidResponse { endpoint, reason }
            }
        }
    }
}

fn transport_error(err: &reqwest::Error) -> SubmitError {
    let reason = if err.is_timeout() {
        format!("{}: {}", TIMEOUT_PREFIX, err)
    } else {
        err.to_string()
    };
    SubmitError::Transport { reason }
}

#[async_trait]
impl NonceSource for RpcClient {
    async fn pending_transaction_count(&self, address: Address) -> Result<u64> {
        with_retry(self.retry, "eth_getTransactionCount", || async move {
            let result = self
                .call(
                    "eth_getTransactionCount",
                    json!([address.to_checksum(None), "pending"]),
                )
                .await
                .map_err(|e| self.network_error(e))?;
            let count = parse_quantity(&result).map_err(|e| NetworkError::InvalidResponse {
                endpoint: self.rpc_url.to_string(),
                reason: format!("{:#}", e),
            })?;
            Ok::<_, anyhow::Error>(count)
        })
        .await
    }
}

#[async_trait]
impl TransactionSubmitter for RpcClient {
    async fn submit(&self, transfer: &TransferRequest) -> Result<String, SubmitError> {
        let raw = self.sign_transfer(transfer).await?;
        let result = self
            .call("eth_sendRawTransaction", json!([hex::encode_prefixed(raw)]))
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SubmitError::MalformedResponse {
                reason: format!("expected transaction hash, got {}", result),
            })
    }
}

/// Extracts `result` from a JSON-RPC response body.
///
/// An `error` object maps to [`SubmitError::Rpc`]; a non-JSON body or a
/// missing result maps to [`SubmitError::MalformedResponse`].
pub fn parse_rpc_response(body: &str) -> Result<Value, SubmitError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| SubmitError::MalformedResponse {
            reason: e.to_string(),
        })?;

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(SubmitError::Rpc { message });
    }

    match value.get("result") {
        Some(result) if !result.is_null() => Ok(result.clone()),
        _ => Err(SubmitError::MalformedResponse {
            reason: "response has no result".to_string(),
        }),
    }
}

/// Parses a hex quantity such as `"0x1a"`
pub fn parse_quantity(value: &Value) -> Result<u64> {
    let raw = value
        .as_str()
        .with_context(|| format!("Expected hex quantity, got {}", value))?;
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    u64::from_str_radix(digits, 16).with_context(|| format!("Invalid hex quantity {}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::consensus::{Transaction, TxEnvelope};
    use alloy::eips::eip2718::Decodable2718;
    use core_logic::Wallet;

    // Well-known development key (anvil account 0)
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn test_client() -> RpcClient {
        let vars = [
            ("RPC_HOST", "http://127.0.0.1:9"),
            ("CHAIN_ID", "1337"),
            ("ETHER_VALUE", "0.5"),
            ("GAS_PRICE", "2"),
            ("GAS", "21000"),
        ];
        let config = LoadTestConfig::from_lookup(|k| {
            vars.iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.to_string())
        })
        .unwrap();
        RpcClient::new(&config).unwrap()
    }

    fn transfer(nonce: u64) -> TransferRequest {
        TransferRequest {
            sender: Wallet::new(Address::from_str(DEV_ADDRESS).unwrap(), DEV_KEY),
            receiver: Address::from([0x11; 20]),
            nonce,
        }
    }

    #[test]
    fn test_parse_result() {
        let value = parse_rpc_response(r#"{"jsonrpc":"2.0","id":1,"result":"0xabc"}"#).unwrap();
        assert_eq!(value, json!("0xabc"));
    }

    #[test]
    fn test_parse_rpc_error() {
        let err = parse_rpc_response(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SubmitError::Rpc {
                message: "nonce too low".to_string()
            }
        );
        assert!(err.is_nonce_conflict());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_rpc_response("<html>502 Bad Gateway</html>"),
            Err(SubmitError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_rpc_response(r#"{"jsonrpc":"2.0","id":1}"#),
            Err(SubmitError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0x7")).unwrap(), 7);
        assert_eq!(parse_quantity(&json!("0x1a")).unwrap(), 26);
        assert!(parse_quantity(&json!("0xzz")).is_err());
        assert!(parse_quantity(&json!(7)).is_err());
    }

    #[tokio::test]
    async fn test_sign_legacy_transfer() {
        let client = test_client();
        let raw = client.sign_transfer(&transfer(42)).await.unwrap();

        let envelope = TxEnvelope::decode_2718(&mut raw.as_slice()).unwrap();
        assert!(envelope.is_legacy());
        assert_eq!(envelope.nonce(), 42);
        assert_eq!(envelope.gas_limit(), 21000);
        assert_eq!(envelope.chain_id(), Some(1337));
        assert_eq!(envelope.value(), U256::from(500_000_000_000_000_000u64));
        assert_eq!(envelope.to(), Some(Address::from([0x11; 20])));
    }

    #[tokio::test]
    async fn test_sign_rejects_bad_key() {
        let client = test_client();
        let mut request = transfer(0);
        request.sender = Wallet::new(request.sender.address, "not-a-key");

        let err = client.sign_transfer(&request).await.unwrap_err();
        assert!(matches!(err, SubmitError::Signing { .. }));
    }

    #[tokio::test]
    async fn test_sign_rejects_mismatched_key() {
        let client = test_client();
        let mut request = transfer(0);
        request.sender = Wallet::new(Address::from([0x22; 20]), DEV_KEY);

        let err = client.sign_transfer(&request).await.unwrap_err();
        assert!(matches!(err, SubmitError::Signing { .. }));
    }

    #[test]
    fn test_nonce_errors_classified() {
        let client = test_client();

        assert!(matches!(
            client.network_error(SubmitError::Transport {
                reason: format!("{}: deadline", TIMEOUT_PREFIX)
            }),
            NetworkError::Timeout {
                timeout_ms: 30000,
                ..
            }
        ));
        assert!(matches!(
            client.network_error(SubmitError::Transport {
                reason: "error sending request".to_string()
            }),
            NetworkError::Transport { .. }
        ));
        assert_eq!(
            client.network_error(SubmitError::Rpc {
                message: "header not found".to_string()
            }),
            NetworkError::Rpc {
                endpoint: "http://127.0.0.1:9/".to_string(),
                message: "header not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_pending_count_unreachable_node() {
        let client = test_client().with_retry_config(RetryConfig::new(1, 1).without_jitter());
        let err = client
            .pending_transaction_count(Address::from([0x11; 20]))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("eth_getTransactionCount failed after"));
    }

    #[tokio::test]
    async fn test_submit_transport_failure() {
        // Port 9 (discard) is not serving JSON-RPC
        let client = test_client();
        let err = client.submit(&transfer(0)).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Transport { .. } | SubmitError::MalformedResponse { .. }
        ));
    }
}
