//! Collaborator interfaces. Every external service the application touches
//! is reached through one of these traits; implementations may wrap a real
//! SDK or the in-memory mocks. Traits stay `?Send` so browser-facing
//! implementations remain possible.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::watch;

use crate::error::ServiceError;
use crate::ids::{ContentAddress, SchoolId, StudentId, TxHash, UserId};
use crate::records::{
    BillingTransaction, DiplomaRecord, MintRequest, MintingPolicy, MintingScript, NewDiploma,
    NewTransaction, PriceConfig, ProfileUpdate, SchoolProfile, Session, SignedTx, StudentProfile,
    TemplateSummary, UnsignedTx,
};

/// Authentication collaborator: accounts, sessions, and school profiles.
#[async_trait(?Send)]
pub trait AuthClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        school_name: &str,
    ) -> Result<(Session, SchoolProfile), ServiceError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ServiceError>;

    async fn sign_out(&self) -> Result<(), ServiceError>;

    /// Cached session, if any. Never prompts; resolving may still hit the
    /// network and is bounded by the caller.
    async fn current_session(&self) -> Result<Option<Session>, ServiceError>;

    async fn school_profile(&self, user: &UserId)
        -> Result<Option<SchoolProfile>, ServiceError>;

    async fn update_school_profile(
        &self,
        user: &UserId,
        update: ProfileUpdate,
    ) -> Result<SchoolProfile, ServiceError>;

    async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError>;

    async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError>;

    /// Session-change notifications for the lifetime of the application.
    /// The receiver yields the latest session (or `None` after sign-out).
    fn session_changes(&self) -> watch::Receiver<Option<Session>>;
}

/// Relational storage collaborator. Reads are eventually consistent with
/// preceding writes; diplomas are append-only by contract.
#[async_trait(?Send)]
pub trait DirectoryStore {
    async fn students(&self) -> Result<Vec<StudentProfile>, ServiceError>;

    async fn student(&self, id: &StudentId) -> Result<Option<StudentProfile>, ServiceError>;

    async fn templates(&self, school: &SchoolId) -> Result<Vec<TemplateSummary>, ServiceError>;

    async fn diplomas(&self, school: &SchoolId) -> Result<Vec<DiplomaRecord>, ServiceError>;

    /// How many diplomas the school has issued so far; feeds the free-tier
    /// indexing in the fee calculator.
    async fn issued_count(&self, school: &SchoolId) -> Result<u64, ServiceError>;

    async fn insert_diploma(&self, diploma: NewDiploma) -> Result<DiplomaRecord, ServiceError>;

    /// Authoritative stored balance for the school.
    async fn balance(&self, school: &SchoolId) -> Result<Decimal, ServiceError>;

    async fn transactions(
        &self,
        school: &SchoolId,
    ) -> Result<Vec<BillingTransaction>, ServiceError>;

    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<BillingTransaction, ServiceError>;

    /// Latest admin-owned pricing snapshot, if one has been configured.
    async fn price_config(&self) -> Result<Option<PriceConfig>, ServiceError>;

    async fn minting_policy(
        &self,
        school: &SchoolId,
    ) -> Result<Option<MintingPolicy>, ServiceError>;

    async fn insert_minting_policy(
        &self,
        policy: MintingPolicy,
    ) -> Result<MintingPolicy, ServiceError>;
}

/// Wallet collaborator. All calls except `connect` require a connected
/// wallet instance; transaction construction and signing are opaque.
#[async_trait(?Send)]
pub trait WalletClient {
    async fn connect(&self) -> Result<(), ServiceError>;

    fn is_connected(&self) -> bool;

    /// Spendable balance in lovelace.
    async fn balance(&self) -> Result<u64, ServiceError>;

    /// Number of spendable outputs. Zero means no inputs to build from.
    async fn utxo_count(&self) -> Result<usize, ServiceError>;

    /// Forge a native-script minting policy bound to this wallet's key.
    /// Script derivation is owned by the SDK; we only persist the result.
    async fn forge_policy(&self) -> Result<MintingScript, ServiceError>;

    async fn build_mint(&self, request: &MintRequest) -> Result<UnsignedTx, ServiceError>;

    async fn sign_transaction(&self, unsigned: UnsignedTx) -> Result<SignedTx, ServiceError>;

    async fn submit_transaction(&self, signed: SignedTx) -> Result<TxHash, ServiceError>;

    /// Whether the transaction has reached on-chain confirmation.
    async fn is_confirmed(&self, tx_hash: &TxHash) -> Result<bool, ServiceError>;
}

/// Content-addressed storage (asset pinning) collaborator.
#[async_trait(?Send)]
pub trait ContentStore {
    async fn upload_bytes(&self, bytes: &[u8]) -> Result<ContentAddress, ServiceError>;

    async fn upload_json(&self, value: &serde_json::Value)
        -> Result<ContentAddress, ServiceError>;
}
