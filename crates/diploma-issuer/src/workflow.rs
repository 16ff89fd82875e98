//! Issuance workflow: a typed state machine that walks one batch of
//! recipients from selection through minting to a terminal outcome.
//!
//! The mint phase runs three strictly-ordered sub-steps: pin the asset,
//! submit one mint transaction per recipient, and poll for confirmation.
//! Diploma records are persisted per recipient, so a mid-batch failure
//! leaves a consistent, resumable ledger instead of rolling anything back.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use diploma_billing::{quote_or_fallback, FeeError, FeeQuote};
use diploma_types::{
    ContentAddress, ContentStore, DirectoryStore, MintRequest, NewDiploma, NewTransaction,
    PriceConfig, ServiceError, StudentId, TemplateId, TransactionKind, TransactionStatus, TxHash,
    WalletClient,
};

use crate::metadata;
use crate::policy::get_or_create_policy;
use crate::session::SessionContext;

/// Ordered sub-steps of the mint phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintStage {
    IpfsUpload,
    ChainSubmit,
    Confirming,
}

impl fmt::Display for MintStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MintStage::IpfsUpload => "ipfs-upload",
            MintStage::ChainSubmit => "chain-submit",
            MintStage::Confirming => "confirming",
        };
        f.write_str(name)
    }
}

/// The asset backing every diploma in the batch: a stored template or a
/// custom image. The enum makes the two mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Template(TemplateId),
    UploadedImage { file_name: String, bytes: Vec<u8> },
}

impl AssetSource {
    fn template_id(&self) -> Option<&TemplateId> {
        match self {
            AssetSource::Template(id) => Some(id),
            AssetSource::UploadedImage { .. } => None,
        }
    }
}

/// One successfully persisted mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedDiploma {
    pub student_id: StudentId,
    pub transaction_hash: TxHash,
    pub asset: ContentAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub minted: Vec<MintedDiploma>,
    /// Some confirmation poll ran out of attempts. The mints were already
    /// submitted and may confirm out-of-band; not an error.
    pub confirmation_timed_out: bool,
    /// Post-completion fee bookkeeping failed; logged, batch still stands.
    pub fee_recording_failed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    pub stage: MintStage,
    /// Zero-based batch index and id of the recipient the batch stopped at,
    /// when the failure was per-recipient.
    pub failed_recipient: Option<(usize, StudentId)>,
    pub error: ServiceError,
    /// Diplomas persisted before the failure. Never rolled back.
    pub minted: Vec<MintedDiploma>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    SelectingRecipients,
    SelectingAsset,
    ReadyToMint,
    Minting(MintStage),
    Completed(BatchOutcome),
    Failed(FailureReport),
    Cancelled,
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::SelectingRecipients => "selecting-recipients",
            WorkflowState::SelectingAsset => "selecting-asset",
            WorkflowState::ReadyToMint => "ready-to-mint",
            WorkflowState::Minting(_) => "minting",
            WorkflowState::Completed(_) => "completed",
            WorkflowState::Failed(_) => "failed",
            WorkflowState::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IssuanceError {
    #[error("no recipients selected")]
    NoRecipients,
    #[error("no asset source chosen")]
    NoAssetChosen,
    #[error("uploaded image payload is empty")]
    EmptyImage,
    #[error("{action} is not allowed in state {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error("wallet not connected")]
    WalletNotConnected,
    #[error("no spendable outputs in wallet")]
    NoSpendableOutputs,
    #[error("insufficient balance: {have} lovelace on hand, {need} required")]
    InsufficientBalance { have: u64, need: u64 },
    #[error("a mint is already in flight for this batch")]
    MintInFlight,
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Fee(#[from] FeeError),
}

impl IssuanceError {
    /// Input problems a user can fix without any external call having been
    /// made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NoRecipients
                | Self::NoAssetChosen
                | Self::EmptyImage
                | Self::InvalidTransition { .. }
                | Self::Fee(_)
        )
    }

    /// Environment problems checked before minting starts.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::WalletNotConnected | Self::NoSpendableOutputs | Self::InsufficientBalance { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct IssuanceConfig {
    /// Minimum spendable balance required before minting starts.
    pub min_balance_lovelace: u64,
    pub confirm_max_attempts: u32,
    pub confirm_interval: Duration,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            min_balance_lovelace: 5_000_000,
            confirm_max_attempts: 20,
            confirm_interval: Duration::from_secs(3),
        }
    }
}

/// One batch, owned by one session. Created on entry to the issuance
/// surface, dropped on navigation away.
pub struct IssuanceWorkflow<D, W, C>
where
    D: DirectoryStore,
    W: WalletClient,
    C: ContentStore,
{
    session: SessionContext,
    directory: D,
    wallet: W,
    content: C,
    config: IssuanceConfig,
    pub state: WorkflowState,
    recipients: Vec<StudentId>,
    recipient_set: HashSet<StudentId>,
    asset: Option<AssetSource>,
}

impl<D, W, C> IssuanceWorkflow<D, W, C>
where
    D: DirectoryStore,
    W: WalletClient,
    C: ContentStore,
{
    /// Entry requires an authenticated session with an attached school
    /// profile; the gate is the only source of a `SessionContext`.
    pub fn new(
        session: SessionContext,
        directory: D,
        wallet: W,
        content: C,
        config: IssuanceConfig,
    ) -> Self {
        info!(school = %session.school.id, "entering issuance workflow");
        Self {
            session,
            directory,
            wallet,
            content,
            config,
            state: WorkflowState::SelectingRecipients,
            recipients: Vec::new(),
            recipient_set: HashSet::new(),
            asset: None,
        }
    }

    pub fn recipients(&self) -> &[StudentId] {
        &self.recipients
    }

    pub fn asset(&self) -> Option<&AssetSource> {
        self.asset.as_ref()
    }

    pub fn is_mint_in_flight(&self) -> bool {
        matches!(self.state, WorkflowState::Minting(_))
    }

    fn require_state(
        &self,
        action: &'static str,
        expected: &WorkflowState,
    ) -> Result<(), IssuanceError> {
        if &self.state == expected {
            Ok(())
        } else {
            Err(IssuanceError::InvalidTransition {
                action,
                state: self.state.name(),
            })
        }
    }

    /// Add or remove one recipient. Returns the new batch size.
    pub fn toggle_recipient(&mut self, id: StudentId) -> Result<usize, IssuanceError> {
        self.require_state("toggle recipient", &WorkflowState::SelectingRecipients)?;
        if self.recipient_set.remove(&id) {
            self.recipients.retain(|existing| existing != &id);
        } else {
            self.recipient_set.insert(id.clone());
            self.recipients.push(id);
        }
        Ok(self.recipients.len())
    }

    /// Replace the selection wholesale (the select-all checkbox). Duplicate
    /// ids collapse; order of first occurrence is kept.
    pub fn select_recipients(
        &mut self,
        ids: impl IntoIterator<Item = StudentId>,
    ) -> Result<usize, IssuanceError> {
        self.require_state("select recipients", &WorkflowState::SelectingRecipients)?;
        self.recipients.clear();
        self.recipient_set.clear();
        for id in ids {
            if self.recipient_set.insert(id.clone()) {
                self.recipients.push(id);
            }
        }
        Ok(self.recipients.len())
    }

    pub fn proceed_to_asset(&mut self) -> Result<(), IssuanceError> {
        self.require_state("proceed to asset selection", &WorkflowState::SelectingRecipients)?;
        if self.recipients.is_empty() {
            return Err(IssuanceError::NoRecipients);
        }
        self.state = WorkflowState::SelectingAsset;
        Ok(())
    }

    pub fn choose_template(&mut self, template: TemplateId) -> Result<(), IssuanceError> {
        self.require_state("choose template", &WorkflowState::SelectingAsset)?;
        self.asset = Some(AssetSource::Template(template));
        Ok(())
    }

    /// Choose a custom image. The payload must already be read; an empty
    /// read is rejected here rather than at upload time.
    pub fn choose_uploaded_image(
        &mut self,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<(), IssuanceError> {
        self.require_state("choose uploaded image", &WorkflowState::SelectingAsset)?;
        if bytes.is_empty() {
            return Err(IssuanceError::EmptyImage);
        }
        self.asset = Some(AssetSource::UploadedImage {
            file_name: file_name.into(),
            bytes,
        });
        Ok(())
    }

    pub fn confirm_asset(&mut self) -> Result<(), IssuanceError> {
        self.require_state("confirm asset", &WorkflowState::SelectingAsset)?;
        if self.asset.is_none() {
            return Err(IssuanceError::NoAssetChosen);
        }
        self.state = WorkflowState::ReadyToMint;
        Ok(())
    }

    /// Step back one screen without losing the selection.
    pub fn back(&mut self) -> Result<(), IssuanceError> {
        match self.state {
            WorkflowState::SelectingAsset => {
                self.state = WorkflowState::SelectingRecipients;
                Ok(())
            }
            WorkflowState::ReadyToMint => {
                self.state = WorkflowState::SelectingAsset;
                Ok(())
            }
            _ => Err(IssuanceError::InvalidTransition {
                action: "back",
                state: self.state.name(),
            }),
        }
    }

    /// Abandon the batch. Only possible before minting starts; an in-flight
    /// submission cannot be withdrawn from the ledger.
    pub fn cancel(&mut self) -> Result<(), IssuanceError> {
        match self.state {
            WorkflowState::SelectingRecipients
            | WorkflowState::SelectingAsset
            | WorkflowState::ReadyToMint => {
                info!(school = %self.session.school.id, "issuance batch cancelled");
                self.state = WorkflowState::Cancelled;
                Ok(())
            }
            _ => Err(IssuanceError::InvalidTransition {
                action: "cancel",
                state: self.state.name(),
            }),
        }
    }

    /// Clear the batch and return to recipient selection.
    pub fn reset(&mut self) -> Result<(), IssuanceError> {
        if self.is_mint_in_flight() {
            return Err(IssuanceError::InvalidTransition {
                action: "reset",
                state: self.state.name(),
            });
        }
        self.recipients.clear();
        self.recipient_set.clear();
        self.asset = None;
        self.state = WorkflowState::SelectingRecipients;
        Ok(())
    }

    /// Quote fees for the current selection. Recomputed on every change;
    /// falls back to the documented default when no price config exists.
    pub async fn quote(&self) -> Result<FeeQuote, IssuanceError> {
        let prior_issued = self.directory.issued_count(&self.session.school.id).await?;
        let config = self.directory.price_config().await?;
        let quote = quote_or_fallback(prior_issued, self.recipients.len() as u32, config.as_ref())?;
        Ok(quote)
    }

    /// Run the mint phase to a terminal state. At most one mint may be in
    /// flight per workflow; the UI disables resubmission while
    /// `is_mint_in_flight` holds.
    pub async fn mint(&mut self) -> Result<BatchOutcome, IssuanceError> {
        if self.is_mint_in_flight() {
            return Err(IssuanceError::MintInFlight);
        }
        self.require_state("mint", &WorkflowState::ReadyToMint)?;
        let asset = self.asset.clone().ok_or(IssuanceError::NoAssetChosen)?;
        if self.recipients.is_empty() {
            return Err(IssuanceError::NoRecipients);
        }

        // Preconditions, checked before anything leaves this process. A
        // failure here leaves the state at ReadyToMint.
        if !self.wallet.is_connected() {
            return Err(IssuanceError::WalletNotConnected);
        }
        if self.wallet.utxo_count().await? == 0 {
            return Err(IssuanceError::NoSpendableOutputs);
        }
        let have = self.wallet.balance().await?;
        if have < self.config.min_balance_lovelace {
            return Err(IssuanceError::InsufficientBalance {
                have,
                need: self.config.min_balance_lovelace,
            });
        }

        let school = self.session.school.clone();
        let recipients = self.recipients.clone();
        let issued_at = unix_millis_now();
        let prior_issued = self.directory.issued_count(&school.id).await?;
        let price_config = self.directory.price_config().await?;

        // Sub-step 1: pin the asset and the batch metadata.
        self.state = WorkflowState::Minting(MintStage::IpfsUpload);
        info!(
            school = %school.id,
            recipients = recipients.len(),
            "mint started: uploading asset"
        );
        let image_upload = match &asset {
            AssetSource::UploadedImage { file_name, bytes } => {
                info!(file = %file_name, size = bytes.len(), "pinning custom image");
                self.content.upload_bytes(bytes).await
            }
            AssetSource::Template(template) => {
                let descriptor = metadata::template_asset_descriptor(template);
                self.content.upload_json(&descriptor).await
            }
        };
        let image_address = match image_upload {
            Ok(address) => address,
            Err(err) => return Err(self.fail(MintStage::IpfsUpload, None, Vec::new(), err)),
        };
        let batch_meta =
            metadata::batch_metadata(&school, asset.template_id(), recipients.len(), issued_at);
        let batch_upload = self.content.upload_json(&batch_meta).await;
        let batch_address = match batch_upload {
            Ok(address) => address,
            Err(err) => return Err(self.fail(MintStage::IpfsUpload, None, Vec::new(), err)),
        };

        // Sub-step 2: one mint per recipient under the school policy,
        // sequential on purpose -- parallel submission would fight over
        // spendable outputs and muddy partial-failure bookkeeping.
        self.state = WorkflowState::Minting(MintStage::ChainSubmit);
        let policy_result =
            get_or_create_policy(&self.directory, &self.wallet, &school.id, issued_at).await;
        let policy = match policy_result {
            Ok(policy) => policy,
            Err(err) => return Err(self.fail(MintStage::ChainSubmit, None, Vec::new(), err)),
        };

        let mut minted: Vec<MintedDiploma> = Vec::new();
        let mut confirmation_timed_out = false;
        for (index, student_id) in recipients.iter().enumerate() {
            self.state = WorkflowState::Minting(MintStage::ChainSubmit);
            let student_lookup = self.directory.student(student_id).await;
            let student = match student_lookup {
                Ok(student) => student,
                Err(err) => {
                    let at = Some((index, student_id.clone()));
                    return Err(self.fail(MintStage::ChainSubmit, at, minted, err));
                }
            };
            let request = MintRequest {
                policy_id: policy.policy_id,
                asset_name: metadata::asset_name(student_id, issued_at),
                metadata: metadata::diploma_metadata(
                    &school,
                    student.as_ref(),
                    student_id,
                    &image_address,
                    &batch_address,
                    issued_at,
                ),
            };

            let submit_result = self.submit_one(&request).await;
            let tx_hash = match submit_result {
                Ok(tx_hash) => tx_hash,
                Err(err) => {
                    let at = Some((index, student_id.clone()));
                    return Err(self.fail(MintStage::ChainSubmit, at, minted, err));
                }
            };
            info!(recipient = %student_id, index, tx = %tx_hash, "mint submitted");

            // Sub-step 3: bounded confirmation poll, then persist. A
            // timeout is downgraded to a warning -- the transaction is on
            // the wire and may confirm later.
            self.state = WorkflowState::Minting(MintStage::Confirming);
            if !self.poll_confirmation(&tx_hash).await {
                warn!(recipient = %student_id, index, tx = %tx_hash,
                    "confirmation timed out; batch continues");
                confirmation_timed_out = true;
            }

            let record = NewDiploma {
                school_id: school.id.clone(),
                student_id: student_id.clone(),
                student_name: student.map(|s| s.full_name),
                template_id: asset.template_id().cloned(),
                ipfs_hash: image_address.clone(),
                transaction_hash: tx_hash,
                metadata: request.metadata.clone(),
                issued_at_unix_millis: issued_at,
            };
            let persist_result = self.directory.insert_diploma(record).await;
            if let Err(err) = persist_result {
                let at = Some((index, student_id.clone()));
                return Err(self.fail(MintStage::Confirming, at, minted, err));
            }
            minted.push(MintedDiploma {
                student_id: student_id.clone(),
                transaction_hash: tx_hash,
                asset: image_address.clone(),
            });
        }

        let fee_recording_failed = self
            .record_fees(prior_issued, price_config.as_ref(), minted.len() as u32)
            .await;

        let outcome = BatchOutcome {
            minted,
            confirmation_timed_out,
            fee_recording_failed,
        };
        info!(
            school = %school.id,
            minted = outcome.minted.len(),
            confirmation_timed_out,
            "mint completed"
        );
        self.state = WorkflowState::Completed(outcome.clone());
        Ok(outcome)
    }

    async fn submit_one(&self, request: &MintRequest) -> Result<TxHash, ServiceError> {
        let unsigned = self.wallet.build_mint(request).await?;
        let signed = self.wallet.sign_transaction(unsigned).await?;
        self.wallet.submit_transaction(signed).await
    }

    /// Record the batch's fees in the transaction history. A failure here
    /// must not fail an already-minted batch; it is logged and flagged.
    async fn record_fees(
        &self,
        prior_issued: u64,
        price_config: Option<&PriceConfig>,
        batch_size: u32,
    ) -> bool {
        let quote = match quote_or_fallback(prior_issued, batch_size, price_config) {
            Ok(quote) => quote,
            Err(err) => {
                warn!(error = %err, "fee quote for bookkeeping failed");
                return true;
            }
        };
        // Exact amounts; the ledger view rounds for display.
        let entries = [
            (TransactionKind::NetworkFee, quote.network_fee),
            (TransactionKind::StorageFee, quote.storage_fee),
        ];
        for (kind, amount) in entries {
            if amount.is_zero() {
                continue;
            }
            let result = self
                .directory
                .insert_transaction(NewTransaction {
                    school_id: self.session.school.id.clone(),
                    kind,
                    amount,
                    description: format!("batch of {batch_size} diplomas"),
                    status: TransactionStatus::Paid,
                })
                .await;
            if let Err(err) = result {
                warn!(?kind, error = %err, "fee transaction insert failed");
                return true;
            }
        }
        false
    }

    async fn poll_confirmation(&self, tx_hash: &TxHash) -> bool {
        for attempt in 1..=self.config.confirm_max_attempts {
            match self.wallet.is_confirmed(tx_hash).await {
                Ok(true) => {
                    info!(tx = %tx_hash, attempt, "transaction confirmed");
                    return true;
                }
                Ok(false) => {}
                // Poll errors count as a missed attempt; the poll itself is
                // already the retry loop.
                Err(err) => warn!(tx = %tx_hash, attempt, error = %err, "confirmation poll failed"),
            }
            if attempt < self.config.confirm_max_attempts {
                tokio::time::sleep(self.config.confirm_interval).await;
            }
        }
        false
    }

    fn fail(
        &mut self,
        stage: MintStage,
        failed_recipient: Option<(usize, StudentId)>,
        minted: Vec<MintedDiploma>,
        err: ServiceError,
    ) -> IssuanceError {
        match &failed_recipient {
            Some((index, student)) => error!(
                stage = %stage, index, recipient = %student, error = %err,
                persisted = minted.len(),
                "mint failed mid-batch"
            ),
            None => error!(stage = %stage, error = %err, "mint failed"),
        }
        self.state = WorkflowState::Failed(FailureReport {
            stage,
            failed_recipient,
            error: err.clone(),
            minted,
        });
        IssuanceError::Service(err)
    }
}

fn unix_millis_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use diploma_service_mock::{DemoScenario, MockContentStore, MockDirectory, MockWallet};
    use diploma_types::{
        AuthClient, DirectoryStore, StudentId, TransactionKind, WalletClient,
    };

    use super::{
        AssetSource, IssuanceConfig, IssuanceError, IssuanceWorkflow, MintStage, WorkflowState,
    };
    use crate::session::SessionContext;

    fn test_config() -> IssuanceConfig {
        IssuanceConfig {
            min_balance_lovelace: 5_000_000,
            confirm_max_attempts: 2,
            confirm_interval: Duration::from_millis(1),
        }
    }

    async fn new_workflow(
        scenario: &DemoScenario,
    ) -> IssuanceWorkflow<MockDirectory, MockWallet, MockContentStore> {
        let school = scenario
            .auth
            .school_profile(&scenario.user_id)
            .await
            .unwrap()
            .expect("seeded profile");
        let session = SessionContext {
            user: scenario.user_id.clone(),
            school,
        };
        IssuanceWorkflow::new(
            session,
            scenario.directory.clone(),
            scenario.wallet.clone(),
            scenario.content.clone(),
            test_config(),
        )
    }

    async fn ready_workflow(
        scenario: &DemoScenario,
    ) -> IssuanceWorkflow<MockDirectory, MockWallet, MockContentStore> {
        let mut workflow = new_workflow(scenario).await;
        workflow.select_recipients(scenario.students.clone()).unwrap();
        workflow.proceed_to_asset().unwrap();
        workflow
            .choose_uploaded_image("diplomas.png", vec![0x89, 0x50, 0x4e, 0x47])
            .unwrap();
        workflow.confirm_asset().unwrap();
        workflow
    }

    #[tokio::test]
    async fn advancing_with_zero_recipients_is_rejected() {
        let scenario = DemoScenario::new();
        let mut workflow = new_workflow(&scenario).await;

        let err = workflow.proceed_to_asset().unwrap_err();
        assert_eq!(err, IssuanceError::NoRecipients);
        assert!(err.is_validation());
        assert_eq!(workflow.state, WorkflowState::SelectingRecipients);
    }

    #[tokio::test]
    async fn recipient_toggling_keeps_the_set_unique() {
        let scenario = DemoScenario::new();
        let mut workflow = new_workflow(&scenario).await;

        let ama = scenario.students[0].clone();
        assert_eq!(workflow.toggle_recipient(ama.clone()).unwrap(), 1);
        assert_eq!(workflow.toggle_recipient(ama.clone()).unwrap(), 0);
        workflow
            .select_recipients([ama.clone(), ama.clone(), scenario.students[1].clone()])
            .unwrap();
        assert_eq!(workflow.recipients().len(), 2);
    }

    #[tokio::test]
    async fn asset_guards_hold() {
        let scenario = DemoScenario::new();
        let mut workflow = new_workflow(&scenario).await;
        workflow.select_recipients(scenario.students.clone()).unwrap();
        workflow.proceed_to_asset().unwrap();

        assert_eq!(
            workflow.confirm_asset().unwrap_err(),
            IssuanceError::NoAssetChosen
        );
        assert_eq!(
            workflow.choose_uploaded_image("x.png", Vec::new()).unwrap_err(),
            IssuanceError::EmptyImage
        );
        workflow.choose_template(scenario.template.clone()).unwrap();
        workflow.confirm_asset().unwrap();
        assert_eq!(workflow.state, WorkflowState::ReadyToMint);
    }

    #[tokio::test]
    async fn choosing_an_image_replaces_the_template() {
        let scenario = DemoScenario::new();
        let mut workflow = new_workflow(&scenario).await;
        workflow.select_recipients(scenario.students.clone()).unwrap();
        workflow.proceed_to_asset().unwrap();

        workflow.choose_template(scenario.template.clone()).unwrap();
        workflow.choose_uploaded_image("seal.png", vec![1]).unwrap();
        assert!(matches!(
            workflow.asset(),
            Some(AssetSource::UploadedImage { .. })
        ));
    }

    #[tokio::test]
    async fn cancel_is_only_possible_before_minting() {
        let scenario = DemoScenario::new();
        let mut workflow = ready_workflow(&scenario).await;
        workflow.cancel().unwrap();
        assert_eq!(workflow.state, WorkflowState::Cancelled);

        let mut workflow = ready_workflow(&scenario).await;
        workflow.state = WorkflowState::Minting(MintStage::ChainSubmit);
        assert!(matches!(
            workflow.cancel().unwrap_err(),
            IssuanceError::InvalidTransition { .. }
        ));
    }

    #[tokio::test]
    async fn mint_requires_a_connected_wallet() {
        let scenario = DemoScenario::new();
        let mut workflow = ready_workflow(&scenario).await;

        let err = workflow.mint().await.unwrap_err();
        assert_eq!(err, IssuanceError::WalletNotConnected);
        assert!(err.is_precondition());
        // Fail-fast: nothing was uploaded, state is still ReadyToMint.
        assert_eq!(scenario.content.upload_count(), 0);
        assert_eq!(workflow.state, WorkflowState::ReadyToMint);
    }

    #[tokio::test]
    async fn mint_requires_minimum_balance_and_outputs() {
        let scenario = DemoScenario::new();
        scenario.wallet.connect().await.unwrap();
        scenario.wallet.set_balance(4_999_999);
        let mut workflow = ready_workflow(&scenario).await;
        assert_eq!(
            workflow.mint().await.unwrap_err(),
            IssuanceError::InsufficientBalance {
                have: 4_999_999,
                need: 5_000_000
            }
        );

        scenario.wallet.set_balance(12_000_000);
        scenario.wallet.set_utxo_count(0);
        assert_eq!(
            workflow.mint().await.unwrap_err(),
            IssuanceError::NoSpendableOutputs
        );
        assert_eq!(workflow.state, WorkflowState::ReadyToMint);
    }

    #[tokio::test]
    async fn upload_failure_persists_no_records() {
        let scenario = DemoScenario::new();
        scenario.wallet.connect().await.unwrap();
        scenario.content.fail_uploads();
        let mut workflow = ready_workflow(&scenario).await;

        let err = workflow.mint().await.unwrap_err();
        assert!(matches!(err, IssuanceError::Service(_)));
        match &workflow.state {
            WorkflowState::Failed(report) => {
                assert_eq!(report.stage, MintStage::IpfsUpload);
                assert!(report.minted.is_empty());
                assert_eq!(report.failed_recipient, None);
            }
            other => panic!("expected failed state, got {other:?}"),
        }
        let issued = scenario
            .directory
            .issued_count(&scenario.school_id)
            .await
            .unwrap();
        assert_eq!(issued, 0);
    }

    #[tokio::test]
    async fn partial_submission_failure_keeps_prior_records() {
        let scenario = DemoScenario::new();
        scenario.wallet.connect().await.unwrap();
        scenario.wallet.fail_submissions_from(3);
        let mut workflow = ready_workflow(&scenario).await;

        workflow.mint().await.unwrap_err();
        match &workflow.state {
            WorkflowState::Failed(report) => {
                assert_eq!(report.stage, MintStage::ChainSubmit);
                assert_eq!(report.minted.len(), 2);
                assert_eq!(
                    report.failed_recipient,
                    Some((2, scenario.students[2].clone()))
                );
            }
            other => panic!("expected failed state, got {other:?}"),
        }
        let diplomas = scenario.directory.diplomas(&scenario.school_id).await.unwrap();
        assert_eq!(diplomas.len(), 2);
        assert_eq!(diplomas[0].student_id, scenario.students[0]);
        assert_eq!(diplomas[1].student_id, scenario.students[1]);
    }

    #[tokio::test]
    async fn happy_path_completes_and_records_fees() {
        let scenario = DemoScenario::new();
        scenario.wallet.connect().await.unwrap();
        let mut workflow = ready_workflow(&scenario).await;

        let outcome = workflow.mint().await.unwrap();
        assert_eq!(outcome.minted.len(), 3);
        assert!(!outcome.confirmation_timed_out);
        assert!(!outcome.fee_recording_failed);
        // Every recipient shares the one pinned asset.
        let asset = &outcome.minted[0].asset;
        assert!(outcome.minted.iter().all(|m| &m.asset == asset));
        // One mint transaction per recipient.
        assert_eq!(scenario.wallet.submitted().len(), 3);

        let diplomas = scenario.directory.diplomas(&scenario.school_id).await.unwrap();
        assert_eq!(diplomas.len(), 3);

        // 2% of the $25 base price, three units, still inside the free tier.
        let transactions = scenario
            .directory
            .transactions(&scenario.school_id)
            .await
            .unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, TransactionKind::NetworkFee);
        assert_eq!(transactions[0].amount, dec!(1.50));
    }

    #[tokio::test]
    async fn confirmation_timeout_is_a_warning_not_a_failure() {
        let scenario = DemoScenario::new();
        scenario.wallet.connect().await.unwrap();
        scenario.wallet.never_confirm();
        let mut workflow = ready_workflow(&scenario).await;

        let outcome = workflow.mint().await.unwrap();
        assert!(outcome.confirmation_timed_out);
        assert_eq!(outcome.minted.len(), 3);
        let issued = scenario
            .directory
            .issued_count(&scenario.school_id)
            .await
            .unwrap();
        assert_eq!(issued, 3);
    }

    #[tokio::test]
    async fn resubmission_while_minting_is_a_concurrency_error() {
        let scenario = DemoScenario::new();
        scenario.wallet.connect().await.unwrap();
        let mut workflow = ready_workflow(&scenario).await;

        workflow.state = WorkflowState::Minting(MintStage::Confirming);
        assert!(workflow.is_mint_in_flight());
        assert_eq!(workflow.mint().await.unwrap_err(), IssuanceError::MintInFlight);
    }

    #[tokio::test]
    async fn reset_clears_the_batch() {
        let scenario = DemoScenario::new();
        scenario.wallet.connect().await.unwrap();
        let mut workflow = ready_workflow(&scenario).await;
        workflow.mint().await.unwrap();

        workflow.reset().unwrap();
        assert_eq!(workflow.state, WorkflowState::SelectingRecipients);
        assert!(workflow.recipients().is_empty());
        assert!(workflow.asset().is_none());
    }

    #[tokio::test]
    async fn quote_reflects_prior_issuance() {
        let scenario = DemoScenario::new();
        scenario.wallet.connect().await.unwrap();
        let mut workflow = ready_workflow(&scenario).await;
        workflow.mint().await.unwrap();

        // Second batch of one: three diplomas already issued, still free.
        let mut second = new_workflow(&scenario).await;
        second
            .select_recipients([StudentId::new("stu-ama").unwrap()])
            .unwrap();
        let quote = second.quote().await.unwrap();
        assert_eq!(quote.network_fee, dec!(0.50));
        assert_eq!(quote.storage_fee, dec!(0));
    }

    #[tokio::test]
    async fn quote_with_no_selection_is_a_validation_error() {
        let scenario = DemoScenario::new();
        let workflow = new_workflow(&scenario).await;
        let err = workflow.quote().await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn quote_without_price_config_uses_the_fallback() {
        let scenario = DemoScenario::new();
        scenario.directory.clear_price_config();
        let mut workflow = new_workflow(&scenario).await;
        workflow.select_recipients(scenario.students.clone()).unwrap();

        let quote = workflow.quote().await.unwrap();
        assert_eq!(quote.storage_fee, dec!(0));
        assert_eq!(quote.total, dec!(1.50));
    }
}
