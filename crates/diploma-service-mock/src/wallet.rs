//! In-memory wallet collaborator with scripted failure injection:
//! submissions can be made to fail from a given ordinal, confirmations can
//! be delayed by a poll count or withheld entirely.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use diploma_types::{
    Collaborator, KeyHash, MintRequest, MintingScript, PolicyId, ServiceError, SignedTx, TxHash,
    UnsignedTx, WalletClient,
};

#[derive(Debug)]
struct Inner {
    connected: bool,
    balance_lovelace: u64,
    utxo_count: usize,
    key_hash: KeyHash,
    forges: u32,
    submissions: u32,
    submitted: Vec<TxHash>,
    /// Fail the nth submission (1-based) and every one after it.
    fail_submissions_from: Option<u32>,
    /// How many `is_confirmed` polls a transaction sees before confirming.
    confirm_after_polls: u32,
    never_confirm: bool,
    polls: HashMap<TxHash, u32>,
}

#[derive(Clone)]
pub struct MockWallet {
    inner: Arc<Mutex<Inner>>,
}

impl MockWallet {
    pub fn new(balance_lovelace: u64, utxo_count: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                connected: false,
                balance_lovelace,
                utxo_count,
                key_hash: KeyHash::new([0x5c; 28]),
                forges: 0,
                submissions: 0,
                submitted: Vec::new(),
                fail_submissions_from: None,
                confirm_after_polls: 1,
                never_confirm: false,
                polls: HashMap::new(),
            })),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R, ServiceError> {
        let mut lock = self
            .inner
            .lock()
            .map_err(|_| ServiceError::unavailable(Collaborator::Wallet, "mutex poisoned"))?;
        Ok(f(&mut lock))
    }

    fn require_connected(inner: &Inner) -> Result<(), ServiceError> {
        if inner.connected {
            Ok(())
        } else {
            Err(ServiceError::rejected(
                Collaborator::Wallet,
                "wallet not connected",
            ))
        }
    }

    pub fn set_balance(&self, lovelace: u64) {
        self.with_inner(|inner| inner.balance_lovelace = lovelace)
            .expect("mock wallet lock");
    }

    pub fn set_utxo_count(&self, count: usize) {
        self.with_inner(|inner| inner.utxo_count = count)
            .expect("mock wallet lock");
    }

    /// Fail the nth submission (1-based) and all later ones.
    pub fn fail_submissions_from(&self, nth: u32) {
        self.with_inner(|inner| inner.fail_submissions_from = Some(nth))
            .expect("mock wallet lock");
    }

    pub fn set_confirm_after_polls(&self, polls: u32) {
        self.with_inner(|inner| inner.confirm_after_polls = polls)
            .expect("mock wallet lock");
    }

    pub fn never_confirm(&self) {
        self.with_inner(|inner| inner.never_confirm = true)
            .expect("mock wallet lock");
    }

    pub fn submitted(&self) -> Vec<TxHash> {
        self.with_inner(|inner| inner.submitted.clone())
            .expect("mock wallet lock")
    }

    pub fn forge_count(&self) -> u32 {
        self.with_inner(|inner| inner.forges).expect("mock wallet lock")
    }
}

#[async_trait(?Send)]
impl WalletClient for MockWallet {
    async fn connect(&self) -> Result<(), ServiceError> {
        self.with_inner(|inner| inner.connected = true)
    }

    fn is_connected(&self) -> bool {
        self.with_inner(|inner| inner.connected).unwrap_or(false)
    }

    async fn balance(&self) -> Result<u64, ServiceError> {
        self.with_inner(|inner| {
            Self::require_connected(inner)?;
            Ok(inner.balance_lovelace)
        })?
    }

    async fn utxo_count(&self) -> Result<usize, ServiceError> {
        self.with_inner(|inner| {
            Self::require_connected(inner)?;
            Ok(inner.utxo_count)
        })?
    }

    async fn forge_policy(&self) -> Result<MintingScript, ServiceError> {
        self.with_inner(|inner| {
            Self::require_connected(inner)?;
            inner.forges += 1;
            // Derive a stable policy id from the key hash so repeated forges
            // agree, the way a sig-script policy would.
            let policy_id = PolicyId::new(*inner.key_hash.as_bytes());
            Ok(MintingScript {
                policy_id,
                script: serde_json::json!({
                    "type": "sig",
                    "keyHash": inner.key_hash.to_hex(),
                }),
            })
        })?
    }

    async fn build_mint(&self, request: &MintRequest) -> Result<UnsignedTx, ServiceError> {
        self.with_inner(|inner| {
            Self::require_connected(inner)?;
            if inner.utxo_count == 0 {
                return Err(ServiceError::rejected(
                    Collaborator::Wallet,
                    "no spendable outputs",
                ));
            }
            Ok(UnsignedTx(format!(
                "unsigned:{}:{}",
                request.policy_id, request.asset_name
            )))
        })?
    }

    async fn sign_transaction(&self, unsigned: UnsignedTx) -> Result<SignedTx, ServiceError> {
        self.with_inner(|inner| {
            Self::require_connected(inner)?;
            Ok(SignedTx(format!("signed:{}", unsigned.0)))
        })?
    }

    async fn submit_transaction(&self, _signed: SignedTx) -> Result<TxHash, ServiceError> {
        self.with_inner(|inner| {
            Self::require_connected(inner)?;
            inner.submissions += 1;
            if let Some(from) = inner.fail_submissions_from {
                if inner.submissions >= from {
                    return Err(ServiceError::rejected(
                        Collaborator::Wallet,
                        "submission failed (injected)",
                    ));
                }
            }
            let mut bytes = [0u8; 32];
            bytes[0] = 0x70;
            bytes[31] = (inner.submissions & 0xff) as u8;
            let tx_hash = TxHash::new(bytes);
            inner.submitted.push(tx_hash);
            Ok(tx_hash)
        })?
    }

    async fn is_confirmed(&self, tx_hash: &TxHash) -> Result<bool, ServiceError> {
        self.with_inner(|inner| {
            Self::require_connected(inner)?;
            if inner.never_confirm {
                return Ok(false);
            }
            let polls = inner.polls.entry(*tx_hash).or_insert(0);
            *polls += 1;
            Ok(*polls >= inner.confirm_after_polls)
        })?
    }
}

#[cfg(test)]
mod tests {
    use diploma_types::{MintRequest, PolicyId, WalletClient};

    use super::MockWallet;

    #[tokio::test]
    async fn calls_require_connection() {
        let wallet = MockWallet::new(10_000_000, 3);
        assert!(wallet.balance().await.is_err());
        wallet.connect().await.unwrap();
        assert_eq!(wallet.balance().await.unwrap(), 10_000_000);
    }

    #[tokio::test]
    async fn scripted_submission_failure_hits_the_right_ordinal() {
        let wallet = MockWallet::new(10_000_000, 3);
        wallet.connect().await.unwrap();
        wallet.fail_submissions_from(3);

        let request = MintRequest {
            policy_id: PolicyId::new([0x5c; 28]),
            asset_name: "Diploma_stu-1_0".to_string(),
            metadata: serde_json::json!({}),
        };
        for expected_ok in [true, true, false] {
            let unsigned = wallet.build_mint(&request).await.unwrap();
            let signed = wallet.sign_transaction(unsigned).await.unwrap();
            assert_eq!(wallet.submit_transaction(signed).await.is_ok(), expected_ok);
        }
        assert_eq!(wallet.submitted().len(), 2);
    }

    #[tokio::test]
    async fn confirmation_respects_poll_threshold() {
        let wallet = MockWallet::new(10_000_000, 3);
        wallet.connect().await.unwrap();
        wallet.set_confirm_after_polls(2);

        let request = MintRequest {
            policy_id: PolicyId::new([0x5c; 28]),
            asset_name: "Diploma_stu-1_0".to_string(),
            metadata: serde_json::json!({}),
        };
        let unsigned = wallet.build_mint(&request).await.unwrap();
        let signed = wallet.sign_transaction(unsigned).await.unwrap();
        let tx_hash = wallet.submit_transaction(signed).await.unwrap();

        assert!(!wallet.is_confirmed(&tx_hash).await.unwrap());
        assert!(wallet.is_confirmed(&tx_hash).await.unwrap());
    }
}
