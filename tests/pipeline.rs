//! End-to-end pipeline runs against deterministic in-memory mocks.
//!
//! All state is controllable from test code: page content per URL, registry
//! price, nonce, receipt availability, and forced chain errors.

use alloy_primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use navpoke::chain::ChainClient;
use navpoke::config::ChainConfig;
use navpoke::page::PageSource;
use navpoke::pipeline::Pipeline;
use navpoke::types::{Account, ChainRecord, OracleError, RunOutcome, TxConfirmation};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Well-known development key (anvil account 0); safe to hardcode in tests.
const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

const EPOCH_2021_01_05: i64 = 1_609_804_800;

const START_URL: &str =
    "https://funds.example.com/uk/products/307243/fund?siteEntryPassthrough=true";

const DETAIL_PAGE: &str = r#"
    <html><body>
      <p class="identifier"> IB01 </p>
      <span class="header-nav-label">As of date: 2021-01-05T14:30:00</span>
      <span class="header-nav-data">GBP 100.23</span>
      <div class="col-yieldToWorst"><span class="data">1.25%</span></div>
    </body></html>"#;

/// Disclaimer interstitial. Carries decoy fields so a test can prove
/// extraction never ran against it.
const DISCLAIMER_PAGE: &str = r#"
    <html><body>
      <p class="identifier">WRONG</p>
      <span class="header-nav-label">As of date: 1999-01-01</span>
      <span class="header-nav-data">GBP 999.99</span>
      <div class="col-yieldToWorst"><span class="data">9.99%</span></div>
      <div class="cta"><a href="/uk/products/307243/fund-detail">Continue</a></div>
    </body></html>"#;

/// 100.23 × 10^18.
fn expected_scaled_price() -> U256 {
    U256::from(100_230u64) * U256::from(10u128.pow(15))
}

fn test_account() -> Account {
    Account::new(
        TEST_ADDRESS.parse().unwrap(),
        SecretString::new(TEST_PRIVATE_KEY.to_string()),
    )
}

fn chain_cfg(confirm_timeout_secs: u64, confirm_poll_secs: u64) -> ChainConfig {
    ChainConfig {
        rpc_url_env: "TEST_RPC".to_string(),
        registry_address_env: "TEST_REGISTRY".to_string(),
        account_address_env: "TEST_ACCOUNT".to_string(),
        private_key_env: "TEST_KEY".to_string(),
        confirm_timeout_secs,
        confirm_poll_secs,
        gas_limit: None,
    }
}

// ---------------------------------------------------------------------------
// Mock page source
// ---------------------------------------------------------------------------

struct MockPageSource {
    pages: HashMap<String, String>,
    fetch_log: Mutex<Vec<String>>,
}

impl MockPageSource {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
            fetch_log: Mutex::new(Vec::new()),
        }
    }

    fn fetched(&self) -> Vec<String> {
        self.fetch_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for MockPageSource {
    async fn fetch(&self, url: &str) -> Result<String, OracleError> {
        self.fetch_log.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| OracleError::Fetch {
                url: url.to_string(),
                message: "404".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Mock chain client
// ---------------------------------------------------------------------------

struct MockChainClient {
    registry: Address,
    price: Mutex<U256>,
    quantity: U256,
    nonce: u64,
    /// When false, receipts never appear and the confirmation wait expires.
    mine: bool,
    detail_calls: Mutex<usize>,
    submissions: Mutex<Vec<Vec<u8>>>,
    last_hash: Mutex<Option<B256>>,
    fail_detail: Mutex<bool>,
}

impl MockChainClient {
    fn new(price: U256) -> Arc<Self> {
        Arc::new(Self {
            registry: Address::repeat_byte(0x42),
            price: Mutex::new(price),
            quantity: U256::from(1000u64),
            nonce: 7,
            mine: true,
            detail_calls: Mutex::new(0),
            submissions: Mutex::new(Vec::new()),
            last_hash: Mutex::new(None),
            fail_detail: Mutex::new(false),
        })
    }

    fn without_mining(price: U256) -> Arc<Self> {
        let mut mock = Self::new(price);
        Arc::get_mut(&mut mock).unwrap().mine = false;
        mock
    }

    /// Simulate the chain having applied an update.
    fn set_price(&self, price: U256) {
        *self.price.lock().unwrap() = price;
    }

    fn set_detail_failure(&self) {
        *self.fail_detail.lock().unwrap() = true;
    }

    fn detail_calls(&self) -> usize {
        *self.detail_calls.lock().unwrap()
    }

    fn submissions(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn registry_address(&self) -> Address {
        self.registry
    }

    async fn detail(&self, ticker: &str) -> Result<ChainRecord, OracleError> {
        *self.detail_calls.lock().unwrap() += 1;
        if *self.fail_detail.lock().unwrap() {
            return Err(OracleError::ChainRead("node unreachable".to_string()));
        }
        Ok(ChainRecord {
            ticker: ticker.to_string(),
            quantity: self.quantity,
            price: *self.price.lock().unwrap(),
        })
    }

    async fn chain_id(&self) -> Result<u64, OracleError> {
        Ok(5)
    }

    async fn transaction_count(&self, _address: Address) -> Result<u64, OracleError> {
        Ok(self.nonce + self.submissions() as u64)
    }

    async fn gas_price(&self) -> Result<u128, OracleError> {
        Ok(1_000_000_000)
    }

    async fn estimate_gas(&self, _from: Address, _data: &[u8]) -> Result<u64, OracleError> {
        Ok(90_000)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, OracleError> {
        let hash = keccak256(raw);
        self.submissions.lock().unwrap().push(raw.to_vec());
        *self.last_hash.lock().unwrap() = Some(hash);
        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TxConfirmation>, OracleError> {
        if self.mine && *self.last_hash.lock().unwrap() == Some(hash) {
            Ok(Some(TxConfirmation {
                transaction_hash: hash,
                block_number: Some(1),
                gas_used: Some(60_000),
                status: true,
            }))
        } else {
            Ok(None)
        }
    }
}

fn pipeline(source: Arc<MockPageSource>, chain: Arc<MockChainClient>, cfg: &ChainConfig) -> Pipeline {
    Pipeline::new(source, chain, test_account(), cfg).unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn end_to_end_update_submitted_and_confirmed() {
    let source = Arc::new(MockPageSource::new(&[(START_URL, DETAIL_PAGE)]));
    let chain = MockChainClient::new(U256::from(1u64)); // stale price
    let pipeline = pipeline(source, chain.clone(), &chain_cfg(5, 1));

    let outcome = pipeline.run(START_URL).await.unwrap();
    match outcome {
        RunOutcome::Confirmed {
            ticker,
            transaction,
            confirmation,
        } => {
            assert_eq!(ticker, "IB01");
            assert_eq!(transaction.ticker, "IB01");
            assert_eq!(transaction.as_of_date, EPOCH_2021_01_05);
            assert_eq!(transaction.price_scaled, expected_scaled_price());
            assert_eq!(transaction.nonce, 7);
            assert!(confirmation.status);
            assert_eq!(confirmation.block_number, Some(1));
        }
        other => panic!("expected confirmation, got {other}"),
    }
    assert_eq!(chain.submissions(), 1);
}

#[tokio::test]
async fn second_run_against_unchanged_page_is_a_noop() {
    let source = Arc::new(MockPageSource::new(&[(START_URL, DETAIL_PAGE)]));
    let chain = MockChainClient::new(U256::from(1u64));
    let pipeline = pipeline(source, chain.clone(), &chain_cfg(5, 1));

    let first = pipeline.run(START_URL).await.unwrap();
    assert!(matches!(first, RunOutcome::Confirmed { .. }));

    // The chain applied the update; byte-identical page content now scales
    // to the recorded price.
    chain.set_price(expected_scaled_price());

    let second = pipeline.run(START_URL).await.unwrap();
    match second {
        RunOutcome::Skipped { ticker, price } => {
            assert_eq!(ticker, "IB01");
            assert_eq!(price, expected_scaled_price());
        }
        other => panic!("expected no-op, got {other}"),
    }
    assert_eq!(chain.submissions(), 1, "exactly one transaction over two runs");
}

#[tokio::test]
async fn disclaimer_redirect_is_followed_exactly_once() {
    let target = "https://funds.example.com/uk/products/307243/fund-detail";
    let source = Arc::new(MockPageSource::new(&[
        (START_URL, DISCLAIMER_PAGE),
        (target, DETAIL_PAGE),
    ]));
    let chain = MockChainClient::new(U256::from(1u64));
    let pipeline = pipeline(source.clone(), chain.clone(), &chain_cfg(5, 1));

    let outcome = pipeline.run(START_URL).await.unwrap();

    assert_eq!(source.fetched(), vec![START_URL.to_string(), target.to_string()]);
    match outcome {
        RunOutcome::Confirmed { transaction, .. } => {
            // Values come from the target page, never the interstitial's
            // decoy fields.
            assert_eq!(transaction.ticker, "IB01");
            assert_eq!(transaction.price_scaled, expected_scaled_price());
        }
        other => panic!("expected confirmation, got {other}"),
    }
}

#[tokio::test]
async fn unresolvable_redirect_target_is_a_fetch_error() {
    // The disclaimer points somewhere the source cannot serve.
    let source = Arc::new(MockPageSource::new(&[(START_URL, DISCLAIMER_PAGE)]));
    let chain = MockChainClient::new(U256::from(1u64));
    let pipeline = pipeline(source, chain.clone(), &chain_cfg(5, 1));

    let err = pipeline.run(START_URL).await.unwrap_err();
    assert!(matches!(err, OracleError::Fetch { .. }));
    assert_eq!(chain.detail_calls(), 0);
}

#[tokio::test]
async fn validation_rejection_aborts_before_any_chain_interaction() {
    let page = DETAIL_PAGE.replace("GBP 100.23", "GBP 0.00");
    let source = Arc::new(MockPageSource::new(&[(START_URL, page.as_str())]));
    let chain = MockChainClient::new(U256::from(1u64));
    let pipeline = pipeline(source, chain.clone(), &chain_cfg(5, 1));

    let err = pipeline.run(START_URL).await.unwrap_err();
    match err {
        OracleError::Validation { bound, .. } => assert_eq!(bound, "nav_positive"),
        other => panic!("expected validation error, got {other}"),
    }
    assert_eq!(chain.detail_calls(), 0);
    assert_eq!(chain.submissions(), 0);
}

#[tokio::test]
async fn negative_nav_is_rejected_with_its_sign_intact() {
    // The currency prefix strip must not eat the minus sign; a page showing
    // a negative NAV has to fail the positivity bound, not submit as +1.23.
    let page = DETAIL_PAGE.replace("GBP 100.23", "GBP -1.23");
    let source = Arc::new(MockPageSource::new(&[(START_URL, page.as_str())]));
    let chain = MockChainClient::new(U256::from(1u64));
    let pipeline = pipeline(source, chain.clone(), &chain_cfg(5, 1));

    let err = pipeline.run(START_URL).await.unwrap_err();
    match err {
        OracleError::Validation { bound, .. } => assert_eq!(bound, "nav_positive"),
        other => panic!("expected validation error, got {other}"),
    }
    assert_eq!(chain.detail_calls(), 0);
    assert_eq!(chain.submissions(), 0);
}

#[tokio::test]
async fn missing_field_is_an_extraction_error() {
    let page = DETAIL_PAGE.replace(r#"<div class="col-yieldToWorst"><span class="data">1.25%</span></div>"#, "");
    let source = Arc::new(MockPageSource::new(&[(START_URL, page.as_str())]));
    let chain = MockChainClient::new(U256::from(1u64));
    let pipeline = pipeline(source, chain.clone(), &chain_cfg(5, 1));

    let err = pipeline.run(START_URL).await.unwrap_err();
    assert!(matches!(err, OracleError::Extraction { field: "ytm", .. }));
    assert_eq!(chain.detail_calls(), 0);
}

#[tokio::test]
async fn registry_read_failure_aborts_before_submission() {
    let source = Arc::new(MockPageSource::new(&[(START_URL, DETAIL_PAGE)]));
    let chain = MockChainClient::new(U256::from(1u64));
    chain.set_detail_failure();
    let pipeline = pipeline(source, chain.clone(), &chain_cfg(5, 1));

    let err = pipeline.run(START_URL).await.unwrap_err();
    assert!(matches!(err, OracleError::ChainRead(_)));
    assert_eq!(chain.submissions(), 0);
}

#[tokio::test]
async fn confirmation_wait_expires_with_timeout_error() {
    let source = Arc::new(MockPageSource::new(&[(START_URL, DETAIL_PAGE)]));
    let chain = MockChainClient::without_mining(U256::from(1u64));
    // Zero-second deadline: the first empty poll already exhausts the wait.
    let pipeline = pipeline(source, chain.clone(), &chain_cfg(0, 1));

    let err = pipeline.run(START_URL).await.unwrap_err();
    assert!(matches!(err, OracleError::ConfirmationTimeout { .. }));
    // The transaction was broadcast; only the wait failed.
    assert_eq!(chain.submissions(), 1);
}
