//! Typed records for every collection held by the relational collaborator,
//! plus the opaque wallet-side payloads. Collaborator responses are untyped
//! JSON rows; `decode_row`/`decode_rows` are the boundary where they become
//! typed or get rejected.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ValidationError;
use crate::ids::{
    ContentAddress, DiplomaId, PolicyId, SchoolId, StudentId, TemplateId, TxHash, UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolProfile {
    pub id: SchoolId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub address: Option<String>,
    pub public_wallet: String,
    pub kyc_status: KycStatus,
    /// Authoritative stored balance; transaction history is audit trail only.
    pub balance: Decimal,
    pub created_at_unix_millis: u64,
    pub updated_at_unix_millis: u64,
}

/// Partial update applied to a school profile; `None` fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: StudentId,
    pub full_name: String,
    /// School-assigned registration number shown alongside the name.
    pub matricule: String,
    pub email: String,
    pub faculty: Option<String>,
    pub level: Option<String>,
    pub wallet: Option<String>,
    pub created_at_unix_millis: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: TemplateId,
    pub school_id: SchoolId,
    pub name: String,
    pub background_image: Option<String>,
}

/// One issued diploma. Rows are append-only: the directory exposes no
/// update or delete path for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiplomaRecord {
    pub id: DiplomaId,
    pub school_id: SchoolId,
    pub student_id: StudentId,
    pub student_name: Option<String>,
    pub template_id: Option<TemplateId>,
    pub ipfs_hash: ContentAddress,
    pub transaction_hash: TxHash,
    pub metadata: Value,
    pub issued_at_unix_millis: u64,
}

/// Insert payload for a diploma; the directory assigns the row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDiploma {
    pub school_id: SchoolId,
    pub student_id: StudentId,
    pub student_name: Option<String>,
    pub template_id: Option<TemplateId>,
    pub ipfs_hash: ContentAddress,
    pub transaction_hash: TxHash,
    pub metadata: Value,
    pub issued_at_unix_millis: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    NetworkFee,
    StorageFee,
    Deposit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Paid,
    Pending,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingTransaction {
    pub id: String,
    pub school_id: SchoolId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: String,
    pub status: TransactionStatus,
    pub created_at_unix_millis: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub school_id: SchoolId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: String,
    pub status: TransactionStatus,
}

/// Admin-owned pricing snapshot fetched per fee calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceConfig {
    pub network_fee_percent: Decimal,
    pub storage_free_limit: u64,
    pub storage_price_per_1000: Decimal,
    pub base_price: Decimal,
    pub updated_at_unix_millis: u64,
}

/// Persistent per-school minting policy; the script body is opaque to us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintingPolicy {
    pub school_id: SchoolId,
    pub policy_id: PolicyId,
    pub script: Value,
    pub created_at_unix_millis: u64,
}

/// Freshly forged policy returned by the wallet collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct MintingScript {
    pub policy_id: PolicyId,
    pub script: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
}

/// One token mint to build. The wallet collaborator owns selection of
/// inputs, change, and the minting script witness.
#[derive(Debug, Clone, PartialEq)]
pub struct MintRequest {
    pub policy_id: PolicyId,
    pub asset_name: String,
    pub metadata: Value,
}

/// Opaque CBOR-hex transaction bodies passed between wallet calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTx(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx(pub String);

/// Decode one untyped row, rejecting malformed payloads outright.
pub fn decode_row<T: DeserializeOwned>(
    entity: &'static str,
    row: Value,
) -> Result<T, ValidationError> {
    serde_json::from_value(row).map_err(|err| ValidationError::MalformedRow {
        entity,
        message: err.to_string(),
    })
}

/// Decode a list response, skipping malformed rows with a warning. A bad
/// row must not take the whole listing down, but it is never silent.
pub fn decode_rows<T: DeserializeOwned>(entity: &'static str, rows: Vec<Value>) -> Vec<T> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value(row) {
            Ok(record) => out.push(record),
            Err(err) => warn!(entity, error = %err, "skipping malformed row"),
        }
    }
    out
}
