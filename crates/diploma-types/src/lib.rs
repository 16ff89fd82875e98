//! Shared vocabulary for the diploma issuance workspace.
//!
//! This crate exposes:
//! - identifiers (`ids`): fixed-byte hashes and validated entity ids,
//! - typed storage records (`records`) with the untyped-row decode boundary,
//! - collaborator traits (`traits`) for auth, storage, wallet, and pinning,
//! - shared error types (`error`).

pub mod error;
pub mod ids;
pub mod records;
pub mod traits;

pub use error::{Collaborator, ServiceError, ValidationError};
pub use ids::{
    ContentAddress, DiplomaId, KeyHash, PolicyId, SchoolId, StudentId, TemplateId, TxHash, UserId,
};
pub use records::{
    decode_row, decode_rows, BillingTransaction, DiplomaRecord, KycStatus, MintRequest,
    MintingPolicy, MintingScript, NewDiploma, NewTransaction, PriceConfig, ProfileUpdate,
    SchoolProfile, Session, SignedTx, StudentProfile, TemplateSummary, TransactionKind,
    TransactionStatus, UnsignedTx,
};
pub use traits::{AuthClient, ContentStore, DirectoryStore, WalletClient};
