//! Transaction pipeline: nonce → build → sign → submit → confirm.
//!
//! Each step reads or mutates external node state except signing, which is
//! purely local. The private key is parsed from its secret wrapper only
//! inside the signing step and dropped with the signer; it never reaches
//! logs or error messages.

use alloy_consensus::{SignableTransaction, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{TxKind, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::chain::{encode_update_call, ChainClient};
use crate::config::ChainConfig;
use crate::types::{Account, Observation, OracleError, TxConfirmation, UpdateTransaction};

pub struct TxSubmitter {
    chain: Arc<dyn ChainClient>,
    account: Account,
    confirm_timeout: Duration,
    poll_interval: Duration,
    gas_limit: Option<u64>,
}

impl TxSubmitter {
    pub fn new(chain: Arc<dyn ChainClient>, account: Account, cfg: &ChainConfig) -> Self {
        Self {
            chain,
            account,
            confirm_timeout: Duration::from_secs(cfg.confirm_timeout_secs),
            poll_interval: Duration::from_secs(cfg.confirm_poll_secs),
            gas_limit: cfg.gas_limit,
        }
    }

    /// Build, sign, and submit one `update` call, then block (bounded) until
    /// a receipt is observed.
    ///
    /// The nonce is read at call time against mutable external state;
    /// callers must ensure at most one in-flight transaction per account.
    pub async fn submit_update(
        &self,
        observation: &Observation,
        new_price: U256,
    ) -> Result<(UpdateTransaction, TxConfirmation), OracleError> {
        // 1. Nonce at call time.
        let nonce = self.chain.transaction_count(self.account.address).await?;

        // 2. Fee and gas fields.
        let chain_id = self.chain.chain_id().await?;
        let gas_price = self.chain.gas_price().await?;

        let ts = u64::try_from(observation.as_of_date).map_err(|_| OracleError::ChainWrite {
            stage: "build",
            message: format!("as-of date {} predates the epoch", observation.as_of_date),
        })?;
        let calldata = encode_update_call(&observation.ticker, ts, new_price);

        let gas_limit = match self.gas_limit {
            Some(limit) => limit,
            None => {
                self.chain
                    .estimate_gas(self.account.address, &calldata)
                    .await?
            }
        };

        // 3. Unsigned legacy (EIP-155) transaction.
        let tx = TxLegacy {
            chain_id: Some(chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(self.chain.registry_address()),
            value: U256::ZERO,
            input: calldata.into(),
        };
        debug!(nonce, chain_id, gas_limit, "Transaction built");

        // 4. Local signing.
        let (raw, hash) = self.sign(tx)?;
        let transaction = UpdateTransaction {
            ticker: observation.ticker.clone(),
            as_of_date: observation.as_of_date,
            price_scaled: new_price,
            nonce,
            raw: raw.clone().into(),
            hash,
        };

        // 5. Broadcast. Past this point a failure leaves the transaction's
        // fate unknown; the next run reconciles from registry state.
        let sent_hash = self.chain.send_raw_transaction(&raw).await?;
        if sent_hash != hash {
            warn!(local = %hash, node = %sent_hash, "Node-reported hash differs from local hash");
        }
        info!(
            ticker = %observation.ticker,
            tx_hash = %sent_hash,
            nonce,
            price = %new_price,
            "Update submitted"
        );

        // 6. Bounded confirmation wait.
        let confirmation = self.wait_for_receipt(sent_hash).await?;
        Ok((transaction, confirmation))
    }

    /// Sign the transaction with the account's private key. The key exists
    /// in parsed form only for the duration of this call.
    fn sign(&self, tx: TxLegacy) -> Result<(Vec<u8>, B256), OracleError> {
        let signer: PrivateKeySigner = self
            .account
            .private_key
            .expose_secret()
            .trim()
            .parse()
            .map_err(|_| OracleError::ChainWrite {
                stage: "sign",
                message: "private key is not valid secp256k1 hex".to_string(),
            })?;

        if signer.address() != self.account.address {
            return Err(OracleError::ChainWrite {
                stage: "sign",
                message: "private key does not match the configured account address".to_string(),
            });
        }

        let signature = signer
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| OracleError::ChainWrite {
                stage: "sign",
                message: e.to_string(),
            })?;
        let signed = tx.into_signed(signature);
        Ok((signed.encoded_2718(), *signed.hash()))
    }

    /// Poll for a receipt until the configured deadline passes.
    async fn wait_for_receipt(&self, hash: B256) -> Result<TxConfirmation, OracleError> {
        let started = Instant::now();
        let deadline = started + self.confirm_timeout;

        loop {
            if let Some(confirmation) = self.chain.transaction_receipt(hash).await? {
                if !confirmation.status {
                    warn!(tx_hash = %hash, "Transaction mined but reverted");
                }
                return Ok(confirmation);
            }
            if Instant::now() + self.poll_interval > deadline {
                return Err(OracleError::ConfirmationTimeout {
                    tx_hash: hash,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
