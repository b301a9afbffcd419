//! On-chain payment verification.
//!
//! Given a transaction reference, an expected minimum amount, and optionally
//! the wallet the authenticated caller proved control of, the verifier
//! confirms that a finalized ERC-20 transfer to the marketplace wallet
//! actually happened and was not replayed. It only ever reads the ledger;
//! writing the consumed reference is the action handler's job, inside the
//! same atomic unit as the business mutation.

use crate::config::MarketConfig;
use crate::errors::PaymentError;
use crate::ledger::ReplayGuard;
use crate::types::TransferProof;
use async_trait::async_trait;
use ethers::core::utils::keccak256;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Log, TransactionReceipt, H256, U256, U64};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Topic hash of the ERC-20 `Transfer(address,address,uint256)` event.
pub fn transfer_topic() -> H256 {
    H256::from(keccak256(b"Transfer(address,address,uint256)"))
}

/// Decodes an ERC-20 Transfer log into a [`TransferProof`].
///
/// Returns `None` for logs that are not well-formed Transfer events; a
/// transaction may interleave arbitrary logs from the token contract and
/// undecodable ones are skipped rather than treated as fatal.
pub fn decode_transfer(log: &Log) -> Option<TransferProof> {
    if log.topics.len() != 3 || log.topics[0] != transfer_topic() {
        return None;
    }
    if log.data.len() < 32 {
        return None;
    }

    // Indexed address topics are left-padded to 32 bytes.
    let from = Address::from_slice(&log.topics[1].as_bytes()[12..]);
    let to = Address::from_slice(&log.topics[2].as_bytes()[12..]);
    let value = U256::from_big_endian(&log.data[..32]);

    Some(TransferProof { from, to, value })
}

/// Source of finalized transaction receipts.
///
/// Abstracted so the verifier can be exercised against canned receipts; the
/// production implementation is [`RpcReceiptSource`].
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    /// Fetches the receipt for `reference`, waiting for the transaction to
    /// be mined and finalized. Must fail with [`PaymentError::Timeout`] if
    /// the receipt does not become available within the implementation's
    /// bound.
    async fn finalized_receipt(&self, reference: H256) -> Result<TransactionReceipt, PaymentError>;
}

/// Receipt source backed by a JSON-RPC node, polling until the transaction
/// is mined and bounding the wait with a configurable timeout.
pub struct RpcReceiptSource {
    provider: Provider<Http>,
    timeout: Duration,
    poll_interval: Duration,
}

impl RpcReceiptSource {
    /// Creates a source from an RPC URL and the configured bounds.
    pub fn new(rpc_url: &str, config: &MarketConfig) -> Result<Self, PaymentError> {
        let provider =
            Provider::<Http>::try_from(rpc_url).map_err(|e| PaymentError::Rpc(e.to_string()))?;
        Ok(Self {
            provider,
            timeout: config.receipt_timeout,
            poll_interval: config.receipt_poll_interval,
        })
    }
}

#[async_trait]
impl ReceiptSource for RpcReceiptSource {
    async fn finalized_receipt(&self, reference: H256) -> Result<TransactionReceipt, PaymentError> {
        let poll = async {
            loop {
                if let Some(receipt) = self.provider.get_transaction_receipt(reference).await? {
                    return Ok::<_, PaymentError>(receipt);
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(PaymentError::Timeout),
        }
    }
}

/// Verifies that a claimed payment actually occurred on-chain.
pub struct PaymentVerifier {
    recipient: Address,
    token: Address,
    receipts: Arc<dyn ReceiptSource>,
    replay: Arc<dyn ReplayGuard>,
}

impl PaymentVerifier {
    /// Creates a verifier for the configured recipient and token contract.
    pub fn new(
        config: &MarketConfig,
        receipts: Arc<dyn ReceiptSource>,
        replay: Arc<dyn ReplayGuard>,
    ) -> Self {
        Self {
            recipient: config.recipient,
            token: config.token,
            receipts,
            replay,
        }
    }

    /// Verifies the transfer behind `reference`.
    ///
    /// Checks, in order: the reference has not been consumed (before any
    /// chain call), the transaction executed successfully, and at least one
    /// Transfer log from the configured token contract pays the marketplace
    /// wallet at least `minimum` atomic units — from `expected_payer`, when
    /// the identity layer proved a wallet. All matching logs are considered:
    /// a transaction batching several transfers is valid if any one of them
    /// qualifies.
    pub async fn verify(
        &self,
        reference: H256,
        minimum: U256,
        expected_payer: Option<Address>,
    ) -> Result<TransferProof, PaymentError> {
        let reference_hex = format!("{:#x}", reference);

        if self.replay.is_consumed(&reference_hex).await {
            warn!(reference = %reference_hex, "replayed transaction reference");
            return Err(PaymentError::AlreadyUsed(reference_hex));
        }

        let receipt = self.receipts.finalized_receipt(reference).await?;

        if receipt.status != Some(U64::from(1)) {
            return Err(PaymentError::TransactionFailed);
        }

        let token_logs: Vec<&Log> = receipt
            .logs
            .iter()
            .filter(|log| log.address == self.token)
            .collect();
        if token_logs.is_empty() {
            return Err(PaymentError::NoTransferFound);
        }

        // Scan every matching log before failing: a near-miss early log must
        // not mask a valid later one. Remember whether anything failed only
        // the sender check so hijacking stays distinguishable.
        let mut wrong_sender: Option<Address> = None;
        for log in token_logs {
            let Some(transfer) = decode_transfer(log) else {
                continue;
            };
            if transfer.to != self.recipient || transfer.value < minimum {
                continue;
            }
            if let Some(expected) = expected_payer {
                if transfer.from != expected {
                    wrong_sender = Some(transfer.from);
                    continue;
                }
            }

            debug!(
                reference = %reference_hex,
                from = %format!("{:#x}", transfer.from),
                value = %transfer.value,
                "payment verified"
            );
            return Ok(transfer);
        }

        match (wrong_sender, expected_payer) {
            (Some(actual), Some(expected)) => {
                warn!(
                    reference = %reference_hex,
                    actual = %format!("{:#x}", actual),
                    "payment hijacking attempt: valid transfer from the wrong wallet"
                );
                Err(PaymentError::SenderMismatch {
                    actual: format!("{:#x}", actual),
                    expected: format!("{:#x}", expected),
                })
            }
            _ => Err(PaymentError::NoValidPayment),
        }
    }
}
