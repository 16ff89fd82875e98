//! Runs one full issuance batch against the in-memory collaborators:
//! bootstrap the gate, sign in, select recipients and an asset, quote the
//! fees, mint, then print the refreshed billing ledger.

use std::time::Duration;

use diploma_billing::BillingLedger;
use diploma_issuer::{IssuanceConfig, IssuanceWorkflow, SessionGate};
use diploma_service_mock::{DemoScenario, SCHOOL_EMAIL, SCHOOL_PASSWORD};
use diploma_types::{DirectoryStore, WalletClient};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let scenario = DemoScenario::new();

    let mut gate = SessionGate::bootstrap(scenario.auth.clone(), Duration::from_secs(2)).await;
    info!(authenticated = gate.verdict().is_authenticated(), "gate bootstrapped");
    let session = gate.sign_in(SCHOOL_EMAIL, SCHOOL_PASSWORD).await?.clone();
    info!(school = %session.school.name, "signed in");

    scenario.wallet.connect().await?;

    let mut workflow = IssuanceWorkflow::new(
        session.clone(),
        scenario.directory.clone(),
        scenario.wallet.clone(),
        scenario.content.clone(),
        IssuanceConfig {
            confirm_interval: Duration::from_millis(50),
            ..IssuanceConfig::default()
        },
    );
    workflow.select_recipients(scenario.students.clone())?;
    workflow.proceed_to_asset()?;
    let templates = scenario.directory.templates(&session.school.id).await?;
    let template = templates.first().ok_or("no template seeded")?;
    info!(template = %template.name, "using stored template");
    workflow.choose_template(template.id.clone())?;
    workflow.confirm_asset()?;

    let quote = workflow.quote().await?.rounded();
    info!(
        network_fee = %quote.network_fee,
        storage_fee = %quote.storage_fee,
        total = %quote.total,
        "fee quote"
    );

    let outcome = workflow.mint().await?;
    for minted in &outcome.minted {
        info!(
            student = %minted.student_id,
            tx = %minted.transaction_hash,
            asset = %minted.asset,
            "diploma issued"
        );
    }

    let ledger = BillingLedger::new(&scenario.directory, session.school.id.clone());
    let snapshot = ledger.refresh().await;
    if let Ok(balance) = &snapshot.balance {
        info!(balance = %balance, "current balance");
    }
    if let Ok(transactions) = &snapshot.transactions {
        for tx in transactions {
            info!(kind = ?tx.kind, amount = %tx.amount, status = ?tx.status, "ledger entry");
        }
    }

    Ok(())
}
