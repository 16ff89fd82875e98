//! Diploma issuance client.
//!
//! This crate exposes:
//! - the session gate (`SessionGate`) that bootstraps auth state and hands
//!   protected surfaces a read-only `SessionContext`,
//! - the issuance workflow (`IssuanceWorkflow`): recipient and asset
//!   selection guarded by a typed state machine, then the upload / submit /
//!   confirm mint pipeline with per-recipient persistence,
//! - minting-policy reuse (`get_or_create_policy`) and the CIP-25 metadata
//!   builders (`metadata`).

pub mod metadata;
pub mod policy;
pub mod session;
pub mod workflow;

pub use policy::get_or_create_policy;
pub use session::{AuthVerdict, SessionContext, SessionGate};
pub use workflow::{
    AssetSource, BatchOutcome, FailureReport, IssuanceConfig, IssuanceError, IssuanceWorkflow,
    MintStage, MintedDiploma, WorkflowState,
};
