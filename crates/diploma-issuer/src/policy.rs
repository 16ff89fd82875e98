//! Per-school minting policy: forged once by the wallet SDK, persisted,
//! and reused for every later batch so all of a school's diplomas share
//! one policy id.

use tracing::info;

use diploma_types::{DirectoryStore, MintingPolicy, SchoolId, ServiceError, WalletClient};

pub async fn get_or_create_policy<D, W>(
    directory: &D,
    wallet: &W,
    school: &SchoolId,
    now_unix_millis: u64,
) -> Result<MintingPolicy, ServiceError>
where
    D: DirectoryStore,
    W: WalletClient,
{
    if let Some(existing) = directory.minting_policy(school).await? {
        return Ok(existing);
    }

    let forged = wallet.forge_policy().await?;
    info!(school = %school, policy = %forged.policy_id, "forged new minting policy");
    directory
        .insert_minting_policy(MintingPolicy {
            school_id: school.clone(),
            policy_id: forged.policy_id,
            script: forged.script,
            created_at_unix_millis: now_unix_millis,
        })
        .await
}

#[cfg(test)]
mod tests {
    use diploma_service_mock::DemoScenario;
    use diploma_types::WalletClient;

    use super::get_or_create_policy;

    #[tokio::test]
    async fn policy_is_forged_once_and_then_reused() {
        let scenario = DemoScenario::new();
        scenario.wallet.connect().await.unwrap();

        let first = get_or_create_policy(
            &scenario.directory,
            &scenario.wallet,
            &scenario.school_id,
            1,
        )
        .await
        .unwrap();
        let second = get_or_create_policy(
            &scenario.directory,
            &scenario.wallet,
            &scenario.school_id,
            2,
        )
        .await
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(scenario.wallet.forge_count(), 1);
    }

    #[tokio::test]
    async fn forging_requires_a_connected_wallet() {
        let scenario = DemoScenario::new();
        let err = get_or_create_policy(
            &scenario.directory,
            &scenario.wallet,
            &scenario.school_id,
            1,
        )
        .await
        .unwrap_err();
        assert!(!err.is_retryable());
    }
}
