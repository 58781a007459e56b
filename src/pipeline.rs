//! One-shot pipeline: fetch → extract → validate → read → decide → submit.
//!
//! A run is strictly sequential with no internal parallelism and holds no
//! shared state except the account's nonce sequence on the chain, which the
//! caller serializes by running one URL at a time per account. Every stage
//! failure aborts the whole run; a retried run restarts from fetch.

use std::sync::Arc;
use tracing::{debug, info};

use crate::chain::ChainClient;
use crate::config::ChainConfig;
use crate::decide::{decide, Decision};
use crate::extract::FieldExtractor;
use crate::page::{self, PageSource};
use crate::submit::TxSubmitter;
use crate::types::{Account, OracleError, RunOutcome};
use crate::validate;

pub struct Pipeline {
    source: Arc<dyn PageSource>,
    chain: Arc<dyn ChainClient>,
    extractor: FieldExtractor,
    submitter: TxSubmitter,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn PageSource>,
        chain: Arc<dyn ChainClient>,
        account: Account,
        cfg: &ChainConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            extractor: FieldExtractor::new()?,
            submitter: TxSubmitter::new(chain.clone(), account, cfg),
            source,
            chain,
        })
    }

    /// Run the pipeline once for one instrument page.
    pub async fn run(&self, url: &str) -> Result<RunOutcome, OracleError> {
        let html = self.resolve_page(url).await?;

        let fields = self.extractor.extract(&html)?;
        let observation = validate::validate(fields)?;
        info!(%observation, "Observation validated");

        let record = self.chain.detail(&observation.ticker).await?;
        debug!(%record, "Registry state read");

        match decide(&observation, &record) {
            Decision::Skip => {
                info!(
                    ticker = %observation.ticker,
                    price = %record.price,
                    "Price unchanged since last update — skipping"
                );
                Ok(RunOutcome::Skipped {
                    ticker: observation.ticker,
                    price: record.price,
                })
            }
            Decision::Update { new_price } => {
                info!(
                    ticker = %observation.ticker,
                    old_price = %record.price,
                    new_price = %new_price,
                    "Price changed — submitting update"
                );
                let (transaction, confirmation) =
                    self.submitter.submit_update(&observation, new_price).await?;
                info!(
                    ticker = %observation.ticker,
                    tx_hash = %transaction.hash,
                    block = ?confirmation.block_number,
                    "Update confirmed"
                );
                Ok(RunOutcome::Confirmed {
                    ticker: observation.ticker,
                    transaction,
                    confirmation,
                })
            }
        }
    }

    /// Explicit two-step fetch: when the first response is a disclaimer
    /// interstitial, follow its link exactly once. Fields are only ever
    /// extracted from the final page.
    async fn resolve_page(&self, url: &str) -> Result<String, OracleError> {
        let first = self.source.fetch(url).await?;
        match self.extractor.disclaimer_target(&first) {
            None => Ok(first),
            Some(href) => {
                let target = page::resolve_redirect(url, &href)?;
                debug!(from = %url, to = %target, "Following disclaimer redirect");
                self.source.fetch(&target).await
            }
        }
    }
}
