//! JSON-RPC 2.0 chain client over HTTP.
//!
//! Speaks the handful of `eth_*` methods the pipeline needs directly via
//! reqwest. Quantities travel as 0x-prefixed hex strings per the Ethereum
//! JSON-RPC convention.

use alloy_primitives::{hex, Address, B256};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{decode_detail_return, encode_detail_call, ChainClient};
use crate::types::{ChainRecord, OracleError, TxConfirmation};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// The subset of `eth_getTransactionReceipt` this client reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    gas_used: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP JSON-RPC client bound to one node endpoint and one registry
/// contract.
pub struct HttpChainClient {
    http: Client,
    endpoint: String,
    registry: Address,
    next_id: AtomicU64,
}

impl HttpChainClient {
    pub fn new(endpoint: &str, registry: Address) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client for chain RPC")?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            registry,
            next_id: AtomicU64::new(1),
        })
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, "RPC call");

        let response: RpcResponse = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("{method}: request failed"))?
            .error_for_status()
            .with_context(|| format!("{method}: HTTP error"))?
            .json()
            .await
            .with_context(|| format!("{method}: invalid JSON-RPC response"))?;

        if let Some(err) = response.error {
            return Err(anyhow!("{method}: RPC error {}: {}", err.code, err.message));
        }
        response
            .result
            .ok_or_else(|| anyhow!("{method}: response had neither result nor error"))
    }
}

// ---------------------------------------------------------------------------
// Hex quantity helpers
// ---------------------------------------------------------------------------

fn as_quantity_str(value: &Value) -> Result<&str> {
    value
        .as_str()
        .map(|s| s.trim_start_matches("0x"))
        .ok_or_else(|| anyhow!("expected a hex quantity string, got {value}"))
}

fn parse_u64(value: &Value) -> Result<u64> {
    let s = as_quantity_str(value)?;
    u64::from_str_radix(s, 16).with_context(|| format!("invalid u64 quantity `{s}`"))
}

fn parse_u128(value: &Value) -> Result<u128> {
    let s = as_quantity_str(value)?;
    u128::from_str_radix(s, 16).with_context(|| format!("invalid u128 quantity `{s}`"))
}

fn parse_hex_u64(raw: &str) -> Option<u64> {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
}

fn parse_data(value: &Value) -> Result<Vec<u8>> {
    let s = value
        .as_str()
        .ok_or_else(|| anyhow!("expected hex data string, got {value}"))?;
    hex::decode(s).with_context(|| "invalid hex data".to_string())
}

fn parse_hash(value: &Value) -> Result<B256> {
    let s = value
        .as_str()
        .ok_or_else(|| anyhow!("expected transaction hash string, got {value}"))?;
    s.parse::<B256>().with_context(|| format!("invalid hash `{s}`"))
}

impl From<RpcReceipt> for TxConfirmation {
    fn from(r: RpcReceipt) -> Self {
        TxConfirmation {
            transaction_hash: r.transaction_hash,
            block_number: r.block_number.as_deref().and_then(parse_hex_u64),
            gas_used: r.gas_used.as_deref().and_then(parse_hex_u64),
            // Pre-Byzantium nodes omit status; treat absence as success.
            status: r
                .status
                .as_deref()
                .and_then(parse_hex_u64)
                .map(|s| s == 1)
                .unwrap_or(true),
        }
    }
}

// ---------------------------------------------------------------------------
// ChainClient impl
// ---------------------------------------------------------------------------

fn read_err(err: anyhow::Error) -> OracleError {
    OracleError::ChainRead(format!("{err:#}"))
}

fn write_err(stage: &'static str, err: anyhow::Error) -> OracleError {
    OracleError::ChainWrite {
        stage,
        message: format!("{err:#}"),
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    fn registry_address(&self) -> Address {
        self.registry
    }

    async fn detail(&self, ticker: &str) -> Result<ChainRecord, OracleError> {
        let data = encode_detail_call(ticker);
        let params = json!([
            { "to": self.registry.to_string(), "data": format!("0x{}", hex::encode(&data)) },
            "latest",
        ]);
        let result = self.rpc("eth_call", params).await.map_err(read_err)?;
        let payload = parse_data(&result).map_err(read_err)?;
        let (quantity, price) = decode_detail_return(&payload)
            .map_err(|e| OracleError::ChainRead(format!("malformed detail() return: {e}")))?;
        Ok(ChainRecord {
            ticker: ticker.to_string(),
            quantity,
            price,
        })
    }

    async fn chain_id(&self) -> Result<u64, OracleError> {
        let result = self
            .rpc("eth_chainId", json!([]))
            .await
            .map_err(|e| write_err("chain_id", e))?;
        parse_u64(&result).map_err(|e| write_err("chain_id", e))
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, OracleError> {
        let result = self
            .rpc(
                "eth_getTransactionCount",
                json!([address.to_string(), "pending"]),
            )
            .await
            .map_err(|e| write_err("nonce", e))?;
        parse_u64(&result).map_err(|e| write_err("nonce", e))
    }

    async fn gas_price(&self) -> Result<u128, OracleError> {
        let result = self
            .rpc("eth_gasPrice", json!([]))
            .await
            .map_err(|e| write_err("gas_price", e))?;
        parse_u128(&result).map_err(|e| write_err("gas_price", e))
    }

    async fn estimate_gas(&self, from: Address, data: &[u8]) -> Result<u64, OracleError> {
        let params = json!([{
            "from": from.to_string(),
            "to": self.registry.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        }]);
        let result = self
            .rpc("eth_estimateGas", params)
            .await
            .map_err(|e| write_err("estimate_gas", e))?;
        parse_u64(&result).map_err(|e| write_err("estimate_gas", e))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, OracleError> {
        let result = self
            .rpc(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await
            .map_err(|e| write_err("submit", e))?;
        parse_hash(&result).map_err(|e| write_err("submit", e))
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TxConfirmation>, OracleError> {
        let result = self
            .rpc("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await
            .map_err(|e| write_err("receipt", e))?;
        if result.is_null() {
            return Ok(None);
        }
        let receipt: RpcReceipt = serde_json::from_value(result)
            .map_err(|e| OracleError::ChainWrite {
                stage: "receipt",
                message: format!("malformed receipt: {e}"),
            })?;
        Ok(Some(receipt.into()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
