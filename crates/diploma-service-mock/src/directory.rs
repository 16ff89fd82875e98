//! In-memory relational collaborator. Rows are held as untyped JSON values
//! and every read goes back through the typed-record decode boundary, the
//! same shape the real storage service hands back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use diploma_types::{
    decode_rows, BillingTransaction, Collaborator, DirectoryStore, DiplomaId, DiplomaRecord,
    MintingPolicy, NewDiploma, NewTransaction, PriceConfig, SchoolId, SchoolProfile,
    ServiceError, StudentId, StudentProfile, TemplateSummary,
};

const EPOCH_MS: u64 = 1_754_000_000_000;

pub const SCHOOL_PROFILES: &str = "school_profiles";
pub const STUDENT_PROFILES: &str = "student_profiles";
pub const TEMPLATES: &str = "templates";
pub const DIPLOMAS: &str = "diplomas";
pub const TRANSACTIONS: &str = "transactions";
pub const PRICE_CONFIG: &str = "price_config";
pub const MINTING_POLICIES: &str = "minting_policies";

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<&'static str, Vec<Value>>,
    next_diploma: u32,
    next_transaction: u32,
    diploma_inserts: u32,
    fail_balance_reads: bool,
    fail_transaction_reads: bool,
    /// Fail the nth diploma insert (1-based) and every one after it.
    fail_diploma_inserts_from: Option<u32>,
}

#[derive(Clone, Default)]
pub struct MockDirectory {
    inner: Arc<Mutex<Inner>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R, ServiceError> {
        let mut lock = self
            .inner
            .lock()
            .map_err(|_| ServiceError::unavailable(Collaborator::Directory, "mutex poisoned"))?;
        Ok(f(&mut lock))
    }

    fn rows(&self, table: &'static str) -> Result<Vec<Value>, ServiceError> {
        self.with_inner(|inner| inner.tables.get(table).cloned().unwrap_or_default())
    }

    fn push_row(&self, table: &'static str, row: Value) -> Result<(), ServiceError> {
        self.with_inner(|inner| inner.tables.entry(table).or_default().push(row))
    }

    pub fn seed_school(&self, profile: &SchoolProfile) {
        self.push_row(SCHOOL_PROFILES, serde_json::to_value(profile).expect("serializable"))
            .expect("mock directory lock");
    }

    pub fn seed_student(&self, student: &StudentProfile) {
        self.push_row(STUDENT_PROFILES, serde_json::to_value(student).expect("serializable"))
            .expect("mock directory lock");
    }

    pub fn seed_template(&self, template: &TemplateSummary) {
        self.push_row(TEMPLATES, serde_json::to_value(template).expect("serializable"))
            .expect("mock directory lock");
    }

    pub fn set_price_config(&self, config: &PriceConfig) {
        self.with_inner(|inner| {
            let rows = inner.tables.entry(PRICE_CONFIG).or_default();
            rows.clear();
            rows.push(serde_json::to_value(config).expect("serializable"));
        })
        .expect("mock directory lock");
    }

    pub fn clear_price_config(&self) {
        self.with_inner(|inner| {
            inner.tables.remove(PRICE_CONFIG);
        })
        .expect("mock directory lock");
    }

    /// Insert a raw row, bypassing typing. Lets tests plant malformed rows
    /// the decode boundary must survive.
    pub fn insert_raw_row(&self, table: &'static str, row: Value) {
        self.push_row(table, row).expect("mock directory lock");
    }

    pub fn fail_balance_reads(&self) {
        self.with_inner(|inner| inner.fail_balance_reads = true)
            .expect("mock directory lock");
    }

    pub fn fail_transaction_reads(&self) {
        self.with_inner(|inner| inner.fail_transaction_reads = true)
            .expect("mock directory lock");
    }

    /// Fail the nth diploma insert (1-based) and all later ones.
    pub fn fail_diploma_inserts_from(&self, nth: u32) {
        self.with_inner(|inner| inner.fail_diploma_inserts_from = Some(nth))
            .expect("mock directory lock");
    }

    fn school_row(&self, school: &SchoolId) -> Result<Option<SchoolProfile>, ServiceError> {
        let rows = self.rows(SCHOOL_PROFILES)?;
        let profiles: Vec<SchoolProfile> = decode_rows(SCHOOL_PROFILES, rows);
        Ok(profiles.into_iter().find(|p| &p.id == school))
    }
}

#[async_trait(?Send)]
impl DirectoryStore for MockDirectory {
    async fn students(&self) -> Result<Vec<StudentProfile>, ServiceError> {
        Ok(decode_rows(STUDENT_PROFILES, self.rows(STUDENT_PROFILES)?))
    }

    async fn student(&self, id: &StudentId) -> Result<Option<StudentProfile>, ServiceError> {
        let students = self.students().await?;
        Ok(students.into_iter().find(|s| &s.id == id))
    }

    async fn templates(&self, school: &SchoolId) -> Result<Vec<TemplateSummary>, ServiceError> {
        let templates: Vec<TemplateSummary> = decode_rows(TEMPLATES, self.rows(TEMPLATES)?);
        Ok(templates
            .into_iter()
            .filter(|t| &t.school_id == school)
            .collect())
    }

    async fn diplomas(&self, school: &SchoolId) -> Result<Vec<DiplomaRecord>, ServiceError> {
        let diplomas: Vec<DiplomaRecord> = decode_rows(DIPLOMAS, self.rows(DIPLOMAS)?);
        Ok(diplomas
            .into_iter()
            .filter(|d| &d.school_id == school)
            .collect())
    }

    async fn issued_count(&self, school: &SchoolId) -> Result<u64, ServiceError> {
        Ok(self.diplomas(school).await?.len() as u64)
    }

    async fn insert_diploma(&self, diploma: NewDiploma) -> Result<DiplomaRecord, ServiceError> {
        let record = self.with_inner(|inner| {
            inner.diploma_inserts += 1;
            if let Some(from) = inner.fail_diploma_inserts_from {
                if inner.diploma_inserts >= from {
                    return Err(ServiceError::unavailable(
                        Collaborator::Directory,
                        "diploma insert failed (injected)",
                    ));
                }
            }
            inner.next_diploma += 1;
            let record = DiplomaRecord {
                id: DiplomaId::new(format!("dip-{}", inner.next_diploma)).expect("non-empty id"),
                school_id: diploma.school_id,
                student_id: diploma.student_id,
                student_name: diploma.student_name,
                template_id: diploma.template_id,
                ipfs_hash: diploma.ipfs_hash,
                transaction_hash: diploma.transaction_hash,
                metadata: diploma.metadata,
                issued_at_unix_millis: diploma.issued_at_unix_millis,
            };
            inner
                .tables
                .entry(DIPLOMAS)
                .or_default()
                .push(serde_json::to_value(&record).expect("serializable"));
            Ok(record)
        })??;
        Ok(record)
    }

    async fn balance(&self, school: &SchoolId) -> Result<Decimal, ServiceError> {
        let failing = self.with_inner(|inner| inner.fail_balance_reads)?;
        if failing {
            return Err(ServiceError::unavailable(
                Collaborator::Directory,
                "balance read failed (injected)",
            ));
        }
        let profile = self.school_row(school)?.ok_or_else(|| {
            ServiceError::rejected(Collaborator::Directory, format!("no profile for {school}"))
        })?;
        Ok(profile.balance)
    }

    async fn transactions(
        &self,
        school: &SchoolId,
    ) -> Result<Vec<BillingTransaction>, ServiceError> {
        let failing = self.with_inner(|inner| inner.fail_transaction_reads)?;
        if failing {
            return Err(ServiceError::unavailable(
                Collaborator::Directory,
                "transaction read failed (injected)",
            ));
        }
        let transactions: Vec<BillingTransaction> =
            decode_rows(TRANSACTIONS, self.rows(TRANSACTIONS)?);
        Ok(transactions
            .into_iter()
            .filter(|t| &t.school_id == school)
            .collect())
    }

    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<BillingTransaction, ServiceError> {
        self.with_inner(|inner| {
            inner.next_transaction += 1;
            let record = BillingTransaction {
                id: format!("txn-{}", inner.next_transaction),
                school_id: transaction.school_id,
                kind: transaction.kind,
                amount: transaction.amount,
                description: transaction.description,
                status: transaction.status,
                created_at_unix_millis: EPOCH_MS + u64::from(inner.next_transaction),
            };
            inner
                .tables
                .entry(TRANSACTIONS)
                .or_default()
                .push(serde_json::to_value(&record).expect("serializable"));
            record
        })
    }

    async fn price_config(&self) -> Result<Option<PriceConfig>, ServiceError> {
        let rows = self.rows(PRICE_CONFIG)?;
        let mut configs: Vec<PriceConfig> = decode_rows(PRICE_CONFIG, rows);
        configs.sort_by_key(|c| c.updated_at_unix_millis);
        Ok(configs.pop())
    }

    async fn minting_policy(
        &self,
        school: &SchoolId,
    ) -> Result<Option<MintingPolicy>, ServiceError> {
        let policies: Vec<MintingPolicy> =
            decode_rows(MINTING_POLICIES, self.rows(MINTING_POLICIES)?);
        Ok(policies.into_iter().find(|p| &p.school_id == school))
    }

    async fn insert_minting_policy(
        &self,
        policy: MintingPolicy,
    ) -> Result<MintingPolicy, ServiceError> {
        self.push_row(
            MINTING_POLICIES,
            serde_json::to_value(&policy).expect("serializable"),
        )?;
        Ok(policy)
    }
}
