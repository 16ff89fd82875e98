//! Billing ledger read-model: the authoritative stored balance next to the
//! transaction audit trail. Strictly read-only; refresh re-issues both
//! fetches.

use rust_decimal::Decimal;
use tracing::warn;

use diploma_types::{BillingTransaction, DirectoryStore, SchoolId, ServiceError};

/// Result of one refresh. The two fetches fail independently: a balance
/// error must not take down an already-loaded history and vice versa.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    pub balance: Result<Decimal, ServiceError>,
    pub transactions: Result<Vec<BillingTransaction>, ServiceError>,
}

impl LedgerSnapshot {
    /// True when at least one side loaded; callers render partial data with
    /// the other side's error alongside.
    pub fn has_any_data(&self) -> bool {
        self.balance.is_ok() || self.transactions.is_ok()
    }

    pub fn first_error(&self) -> Option<&ServiceError> {
        self.balance
            .as_ref()
            .err()
            .or_else(|| self.transactions.as_ref().err())
    }
}

pub struct BillingLedger<'a, D: DirectoryStore> {
    directory: &'a D,
    school: SchoolId,
}

impl<'a, D: DirectoryStore> BillingLedger<'a, D> {
    pub fn new(directory: &'a D, school: SchoolId) -> Self {
        Self { directory, school }
    }

    pub async fn refresh(&self) -> LedgerSnapshot {
        let (balance, transactions) = futures::join!(
            self.directory.balance(&self.school),
            self.directory.transactions(&self.school),
        );
        if let Err(err) = &balance {
            warn!(school = %self.school, error = %err, "balance fetch failed");
        }
        if let Err(err) = &transactions {
            warn!(school = %self.school, error = %err, "transaction history fetch failed");
        }

        LedgerSnapshot {
            balance,
            transactions,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use diploma_service_mock::DemoScenario;
    use diploma_types::Collaborator;

    use super::BillingLedger;

    #[tokio::test]
    async fn refresh_loads_balance_and_history() {
        let scenario = DemoScenario::new();
        let ledger = BillingLedger::new(&scenario.directory, scenario.school_id.clone());

        let snapshot = ledger.refresh().await;
        assert_eq!(snapshot.balance.unwrap(), dec!(120.00));
        assert!(snapshot.transactions.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_survives_a_balance_failure() {
        let scenario = DemoScenario::new();
        scenario.directory.fail_balance_reads();
        let ledger = BillingLedger::new(&scenario.directory, scenario.school_id.clone());

        let snapshot = ledger.refresh().await;
        assert!(snapshot.balance.is_err());
        assert!(snapshot.transactions.is_ok());
        assert!(snapshot.has_any_data());
        assert_eq!(
            snapshot.first_error().unwrap().collaborator(),
            Some(Collaborator::Directory)
        );
    }
}
