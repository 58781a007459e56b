//! On-chain registry access.
//!
//! Defines the `ChainClient` trait over the node JSON-RPC surface the
//! pipeline needs, plus the ABI encoding for the registry's `detail`
//! (read) and `update` (write) functions. The HTTP implementation lives
//! in `rpc`; tests substitute deterministic mocks.

pub mod rpc;

pub use rpc::HttpChainClient;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;

use crate::types::{ChainRecord, OracleError, TxConfirmation};

sol! {
    /// Last recorded quantity and fixed-point price for a ticker.
    function detail(string asset) external view returns (uint256 qty, uint256 price);
    /// Record a new price for a ticker (requires the registry's price role).
    function update(string asset, uint256 ts, uint256 price) external;
}

/// Calldata for the read-only `detail(ticker)` accessor.
pub fn encode_detail_call(ticker: &str) -> Vec<u8> {
    detailCall {
        asset: ticker.to_string(),
    }
    .abi_encode()
}

/// Decode `(qty, price)` from a `detail` return payload.
pub fn decode_detail_return(data: &[u8]) -> Result<(U256, U256), alloy_sol_types::Error> {
    let ret = detailCall::abi_decode_returns(data)?;
    Ok((ret.qty, ret.price))
}

/// Calldata for `update(ticker, ts, price)`.
pub fn encode_update_call(ticker: &str, ts: u64, price: U256) -> Vec<u8> {
    updateCall {
        asset: ticker.to_string(),
        ts: U256::from(ts),
        price,
    }
    .abi_encode()
}

/// Node and registry operations used by the pipeline.
///
/// `detail` is side-effect-free and classified as a chain read; everything
/// else belongs to the transaction path and fails as a chain write. Receipt
/// lookup returns `None` until the transaction is mined.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn registry_address(&self) -> Address;

    /// Read the registry's last recorded state for a ticker.
    async fn detail(&self, ticker: &str) -> Result<ChainRecord, OracleError>;

    async fn chain_id(&self) -> Result<u64, OracleError>;

    /// Transaction count for the account at the pending block, i.e. the
    /// next nonce. Mutable external state; see the concurrency notes on
    /// `pipeline`.
    async fn transaction_count(&self, address: Address) -> Result<u64, OracleError>;

    async fn gas_price(&self) -> Result<u128, OracleError>;

    async fn estimate_gas(&self, from: Address, data: &[u8]) -> Result<u64, OracleError>;

    /// Broadcast a signed raw transaction, returning its hash.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, OracleError>;

    async fn transaction_receipt(&self, hash: B256)
        -> Result<Option<TxConfirmation>, OracleError>;
}
