//! Chain client: signs and submits faucet transfers through the node's LCD
//! endpoint.
//!
//! One client is created at startup and shared by every request. The
//! underlying HTTP client pools connections, so a lost connection is
//! re-established transparently on the next submission and unrelated
//! transfers are free to overlap on the wire.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use bip39::Mnemonic;
use cosmrs::{
    bank::MsgSend,
    bip32::DerivationPath,
    crypto::secp256k1::SigningKey,
    tendermint::chain::Id as ChainId,
    tx::{self, Fee, Msg, SignDoc, SignerInfo},
    AccountId, Coin, Denom,
};
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::address;
use crate::amount;
use crate::config::{ChainConfig, FaucetConfig};
use crate::errors::SubmissionError;

/// BIP44 derivation path for Terra-family chains (coin type 330)
pub const DERIVATION_PATH: &str = "m/44'/330'/0'/0/0";

/// Per-request HTTP timeout
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for a broadcast transaction to land in a block before
/// treating the submission as node-unreachable
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);
const CONFIRM_INITIAL_DELAY: Duration = Duration::from_millis(500);
const CONFIRM_MAX_DELAY: Duration = Duration::from_secs(3);

/// Seam between the dispatcher and the chain, mockable in tests.
#[async_trait]
pub trait TransferSubmitter: Send + Sync {
    /// Submit the configured transfer to `recipient` and await inclusion,
    /// returning the transaction hash.
    async fn submit(&self, recipient: &str) -> Result<String, SubmissionError>;
}

/// Chain and node identity reported by the LCD, logged once at startup.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub network: String,
    pub app_name: String,
    pub version: String,
}

pub struct ChainClient {
    signing_key: SigningKey,
    address: AccountId,
    lcd_url: String,
    chain_id: ChainId,
    http: Client,
    denom: Denom,
    /// Dispensed amount in base units, precomputed at startup
    amount: u128,
    gas_limit: u64,
    fee_amount: u128,
    keep_alive_reserve: u128,
    address_prefix: String,
}

impl ChainClient {
    /// Derive the signing key from the configured mnemonic and precompute the
    /// base-unit amount. All key and amount problems surface here, at
    /// startup, never per-request.
    pub fn new(chain: &ChainConfig, faucet: &FaucetConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .wrap_err("Failed to create HTTP client")?;

        let mnemonic =
            Mnemonic::parse(&chain.mnemonic).map_err(|e| eyre!("Invalid mnemonic: {}", e))?;
        let seed = mnemonic.to_seed("");

        let path: DerivationPath = DERIVATION_PATH
            .parse()
            .map_err(|e| eyre!("Invalid derivation path: {:?}", e))?;

        let signing_key = SigningKey::derive_from_path(seed, &path)
            .map_err(|e| eyre!("Failed to derive signing key: {}", e))?;

        let address = signing_key
            .public_key()
            .account_id(&chain.address_prefix)
            .map_err(|e| eyre!("Failed to derive faucet address: {}", e))?;

        let chain_id: ChainId = chain
            .chain_id
            .parse()
            .map_err(|_| eyre!("Invalid chain id '{}'", chain.chain_id))?;

        let denom: Denom = chain
            .denom
            .parse()
            .map_err(|e| eyre!("Invalid denom '{}': {:?}", chain.denom, e))?;

        let amount = amount::to_base_units_u128(&faucet.amount, faucet.decimals)
            .wrap_err("Invalid faucet amount configuration")?;

        info!(
            address = %address,
            chain_id = %chain.chain_id,
            amount = amount,
            denom = %chain.denom,
            "Chain client initialized"
        );

        Ok(Self {
            signing_key,
            address,
            lcd_url: chain.lcd_url.trim_end_matches('/').to_string(),
            chain_id,
            http,
            denom,
            amount,
            gas_limit: chain.gas_limit,
            fee_amount: chain.fee_amount,
            keep_alive_reserve: chain.keep_alive_reserve,
            address_prefix: chain.address_prefix.clone(),
        })
    }

    /// The faucet's own account address
    pub fn address_str(&self) -> String {
        self.address.to_string()
    }

    /// Query chain and node identity for the startup banner
    pub async fn node_info(&self) -> Result<NodeInfo, SubmissionError> {
        let url = format!("{}/cosmos/base/tendermint/v1beta1/node_info", self.lcd_url);

        let response = self.http.get(&url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(SubmissionError::NodeUnreachable(format!(
                "node info query failed with HTTP {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(transport)?;
        let field = |pointer: &str| {
            body.pointer(pointer)
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string()
        };

        Ok(NodeInfo {
            network: field("/default_node_info/network"),
            app_name: field("/application_version/app_name"),
            version: field("/application_version/version"),
        })
    }

    /// Get the faucet account's number and sequence from the LCD
    async fn account_info(&self) -> Result<(u64, u64), SubmissionError> {
        let url = format!(
            "{}/cosmos/auth/v1beta1/accounts/{}",
            self.lcd_url, self.address
        );

        let response = self.http.get(&url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::NodeUnreachable(format!(
                "account query failed with HTTP {}: {}",
                status, body
            )));
        }

        let data: serde_json::Value = response.json().await.map_err(transport)?;
        let account = data
            .get("account")
            .ok_or_else(|| {
                SubmissionError::NodeUnreachable("missing 'account' field in response".to_string())
            })?;

        // Vesting and module accounts nest the fields under base_account.
        let lookup = |key: &str| {
            account
                .get(key)
                .or_else(|| account.get("base_account").and_then(|b| b.get(key)))
                .and_then(|v| v.as_str())
                .unwrap_or("0")
                .parse::<u64>()
                .unwrap_or(0)
        };

        Ok((lookup("account_number"), lookup("sequence")))
    }

    /// Get the faucet's balance of the dispensed denom, in base units
    async fn native_balance(&self) -> Result<u128, SubmissionError> {
        let url = format!(
            "{}/cosmos/bank/v1beta1/balances/{}/by_denom?denom={}",
            self.lcd_url, self.address, self.denom
        );

        let response = self.http.get(&url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(SubmissionError::NodeUnreachable(format!(
                "balance query failed with HTTP {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(transport)?;
        body.pointer("/balance/amount")
            .and_then(|v| v.as_str())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                SubmissionError::NodeUnreachable("unexpected balance response shape".to_string())
            })
    }

    /// Build and sign the transfer, returning the raw tx bytes
    fn sign_transfer(
        &self,
        to_address: &AccountId,
        account_number: u64,
        sequence: u64,
    ) -> Result<Vec<u8>, SubmissionError> {
        let send = MsgSend {
            from_address: self.address.clone(),
            to_address: to_address.clone(),
            amount: vec![Coin { denom: self.denom.clone(), amount: self.amount }],
        };

        let any = send
            .to_any()
            .map_err(|e| SubmissionError::SigningFailed(format!("failed to encode transfer: {e}")))?;

        let body = tx::Body::new(vec![any], "", 0u32);

        let signer_info =
            SignerInfo::single_direct(Some(self.signing_key.public_key()), sequence);
        let fee = Fee::from_amount_and_gas(
            Coin { denom: self.denom.clone(), amount: self.fee_amount },
            self.gas_limit,
        );
        let auth_info = signer_info.auth_info(fee);

        let sign_doc = SignDoc::new(&body, &auth_info, &self.chain_id, account_number)
            .map_err(|e| SubmissionError::SigningFailed(format!("failed to create sign doc: {e}")))?;

        let tx_raw = sign_doc
            .sign(&self.signing_key)
            .map_err(|e| SubmissionError::SigningFailed(format!("failed to sign transfer: {e}")))?;

        tx_raw
            .to_bytes()
            .map_err(|e| SubmissionError::SigningFailed(format!("failed to serialize transfer: {e}")))
    }

    /// Broadcast signed tx bytes in sync mode, returning the tx hash
    async fn broadcast(&self, tx_bytes: &[u8]) -> Result<String, SubmissionError> {
        let tx_b64 = base64::engine::general_purpose::STANDARD.encode(tx_bytes);
        let request = serde_json::json!({
            "tx_bytes": tx_b64,
            "mode": "BROADCAST_MODE_SYNC"
        });

        let url = format!("{}/cosmos/tx/v1beta1/txs", self.lcd_url);
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(transport)?;

        if !status.is_success() {
            return Err(SubmissionError::NodeUnreachable(format!(
                "broadcast failed with HTTP {}: {}",
                status, body
            )));
        }

        let tx_response = body.get("tx_response").ok_or_else(|| {
            SubmissionError::NodeUnreachable(format!(
                "missing tx_response in broadcast result: {}",
                body
            ))
        })?;

        let code = tx_response.get("code").and_then(|v| v.as_u64()).unwrap_or(0);
        if code != 0 {
            let raw_log = tx_response
                .get("raw_log")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            return Err(SubmissionError::Rejected(format!("code {}: {}", code, raw_log)));
        }

        let tx_hash = tx_response
            .get("txhash")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        if tx_hash.is_empty() {
            return Err(SubmissionError::NodeUnreachable(
                "broadcast response missing txhash".to_string(),
            ));
        }

        Ok(tx_hash)
    }

    /// Poll the LCD until the transaction is included in a block
    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<(), SubmissionError> {
        let url = format!("{}/cosmos/tx/v1beta1/txs/{}", self.lcd_url, tx_hash);

        let start = Instant::now();
        let mut delay = CONFIRM_INITIAL_DELAY;

        while start.elapsed() < CONFIRM_TIMEOUT {
            tokio::time::sleep(delay).await;

            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let body: serde_json::Value = response.json().await.unwrap_or_default();
                    if let Some(tx_response) = body.get("tx_response") {
                        let code =
                            tx_response.get("code").and_then(|v| v.as_u64()).unwrap_or(0);
                        if code == 0 {
                            debug!(tx_hash = %tx_hash, "transaction confirmed");
                            return Ok(());
                        }
                        let raw_log = tx_response
                            .get("raw_log")
                            .and_then(|v| v.as_str())
                            .unwrap_or("unknown error");
                        return Err(SubmissionError::Rejected(format!(
                            "code {}: {}",
                            code, raw_log
                        )));
                    }
                }
                Ok(response) if response.status().as_u16() == 404 => {
                    debug!(tx_hash = %tx_hash, "transaction not yet in a block");
                }
                Ok(response) => {
                    warn!(
                        tx_hash = %tx_hash,
                        status = %response.status(),
                        "unexpected status while polling for confirmation"
                    );
                }
                Err(err) => {
                    warn!(tx_hash = %tx_hash, error = %err, "error polling for confirmation");
                }
            }

            delay = std::cmp::min(delay * 2, CONFIRM_MAX_DELAY);
        }

        Err(SubmissionError::NodeUnreachable(format!(
            "timed out waiting for transaction {} to be included",
            tx_hash
        )))
    }
}

#[async_trait]
impl TransferSubmitter for ChainClient {
    async fn submit(&self, recipient: &str) -> Result<String, SubmissionError> {
        // Cheap re-check; the dispatcher has already validated.
        if !address::validate(recipient, &self.address_prefix) {
            return Err(SubmissionError::InvalidAddress);
        }
        let to_address: AccountId =
            recipient.parse().map_err(|_| SubmissionError::InvalidAddress)?;

        // Keep-alive guard: never drain the faucet below its reserve.
        let balance = self.native_balance().await?;
        let required = self
            .amount
            .saturating_add(self.fee_amount)
            .saturating_add(self.keep_alive_reserve);
        if balance < required {
            warn!(balance, required, "faucet balance below keep-alive reserve");
            return Err(SubmissionError::Rejected(format!(
                "faucet balance {} {} is below the required reserve of {}",
                balance, self.denom, required
            )));
        }

        let (account_number, sequence) = self.account_info().await?;
        debug!(account_number, sequence, "got faucet account info");

        let tx_bytes = self.sign_transfer(&to_address, account_number, sequence)?;
        let tx_hash = self.broadcast(&tx_bytes).await?;
        info!(tx_hash = %tx_hash, recipient = %recipient, "transfer broadcast, awaiting inclusion");

        self.wait_for_confirmation(&tx_hash).await?;
        Ok(tx_hash)
    }
}

fn transport(err: reqwest::Error) -> SubmissionError {
    SubmissionError::NodeUnreachable(err.to_string())
}
