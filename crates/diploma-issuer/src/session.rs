//! Session gate: bootstraps the cached session, attaches the school
//! profile, and stays the single writer of session state for the process.
//! Protected components only ever see a read-only `SessionContext`.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};

use diploma_types::{AuthClient, Collaborator, SchoolProfile, ServiceError, Session, UserId};

/// Read-only handle to the authenticated identity. Handed to protected
/// components; only the gate creates or replaces one.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub user: UserId,
    pub school: SchoolProfile,
}

/// Concrete gate verdict. There is no indeterminate variant: protected
/// surfaces wait for bootstrap to finish and then get one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthVerdict {
    Authenticated(SessionContext),
    Unauthenticated,
}

impl AuthVerdict {
    pub fn context(&self) -> Option<&SessionContext> {
        match self {
            AuthVerdict::Authenticated(ctx) => Some(ctx),
            AuthVerdict::Unauthenticated => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.context().is_some()
    }
}

pub struct SessionGate<A: AuthClient> {
    auth: A,
    verdict: AuthVerdict,
    changes: watch::Receiver<Option<Session>>,
}

impl<A: AuthClient> SessionGate<A> {
    /// Resolve the cached session within `resolve_timeout`. A slow or
    /// failing resolution reports Unauthenticated instead of hanging the
    /// application on its loading screen.
    pub async fn bootstrap(auth: A, resolve_timeout: Duration) -> Self {
        let changes = auth.session_changes();
        let verdict = match timeout(resolve_timeout, auth.current_session()).await {
            Err(_) => {
                warn!(
                    timeout_ms = resolve_timeout.as_millis() as u64,
                    "session resolution timed out; treating as unauthenticated"
                );
                AuthVerdict::Unauthenticated
            }
            Ok(Err(err)) => {
                warn!(error = %err, "session resolution failed; treating as unauthenticated");
                AuthVerdict::Unauthenticated
            }
            Ok(Ok(None)) => AuthVerdict::Unauthenticated,
            Ok(Ok(Some(session))) => attach_profile(&auth, session).await,
        };
        Self {
            auth,
            verdict,
            changes,
        }
    }

    pub fn verdict(&self) -> &AuthVerdict {
        &self.verdict
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.verdict.context()
    }

    pub async fn sign_in(
        &mut self,
        email: &str,
        password: &str,
    ) -> Result<&SessionContext, ServiceError> {
        let session = self.auth.sign_in(email, password).await?;
        self.verdict = attach_profile(&self.auth, session).await;
        self.context().ok_or_else(|| {
            ServiceError::rejected(Collaborator::Auth, "account has no school profile")
        })
    }

    /// Sign out and detach the profile. Callers redirect to the public
    /// entry point afterwards.
    pub async fn sign_out(&mut self) -> Result<(), ServiceError> {
        self.auth.sign_out().await?;
        self.verdict = AuthVerdict::Unauthenticated;
        info!("signed out; school profile detached");
        Ok(())
    }

    /// Await the next session-change notification and re-resolve the
    /// verdict. The application event loop drives this for its lifetime.
    pub async fn apply_next_change(&mut self) -> &AuthVerdict {
        if self.changes.changed().await.is_err() {
            // Auth collaborator dropped its notifier; nothing further will
            // arrive, so fall back to signed-out.
            self.verdict = AuthVerdict::Unauthenticated;
            return &self.verdict;
        }
        let session = self.changes.borrow_and_update().clone();
        self.verdict = match session {
            None => AuthVerdict::Unauthenticated,
            Some(session) => attach_profile(&self.auth, session).await,
        };
        &self.verdict
    }
}

async fn attach_profile<A: AuthClient>(auth: &A, session: Session) -> AuthVerdict {
    match auth.school_profile(&session.user_id).await {
        Ok(Some(school)) => {
            info!(user = %session.user_id, school = %school.id, "school profile attached");
            AuthVerdict::Authenticated(SessionContext {
                user: session.user_id,
                school,
            })
        }
        Ok(None) => {
            warn!(user = %session.user_id, "session has no school profile; treating as unauthenticated");
            AuthVerdict::Unauthenticated
        }
        Err(err) => {
            warn!(user = %session.user_id, error = %err, "profile fetch failed; treating as unauthenticated");
            AuthVerdict::Unauthenticated
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use diploma_service_mock::{DemoScenario, SCHOOL_EMAIL, SCHOOL_PASSWORD};
    use diploma_types::{AuthClient, ServiceError, Session};

    use super::{AuthVerdict, SessionGate};

    const FAST: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn bootstrap_without_cached_session_is_unauthenticated() {
        let scenario = DemoScenario::new();
        let gate = SessionGate::bootstrap(scenario.auth.clone(), FAST).await;
        assert_eq!(*gate.verdict(), AuthVerdict::Unauthenticated);
    }

    #[tokio::test]
    async fn bootstrap_attaches_profile_for_cached_session() {
        let scenario = DemoScenario::new();
        scenario.auth.set_cached_session(Session {
            user_id: scenario.user_id.clone(),
            email: SCHOOL_EMAIL.to_string(),
        });

        let gate = SessionGate::bootstrap(scenario.auth.clone(), FAST).await;
        let ctx = gate.context().expect("authenticated");
        assert_eq!(ctx.school.id, scenario.school_id);
        assert_eq!(ctx.school.name, "Horizon Polytechnic");
    }

    #[tokio::test]
    async fn slow_resolution_times_out_to_unauthenticated() {
        let scenario = DemoScenario::new();
        scenario.auth.set_cached_session(Session {
            user_id: scenario.user_id.clone(),
            email: SCHOOL_EMAIL.to_string(),
        });
        scenario.auth.set_resolve_delay(Duration::from_millis(250));

        let gate = SessionGate::bootstrap(scenario.auth.clone(), Duration::from_millis(20)).await;
        assert_eq!(*gate.verdict(), AuthVerdict::Unauthenticated);
    }

    #[tokio::test]
    async fn sign_in_and_out_move_the_verdict() {
        let scenario = DemoScenario::new();
        let mut gate = SessionGate::bootstrap(scenario.auth.clone(), FAST).await;

        let err = gate.sign_in(SCHOOL_EMAIL, "wrong").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
        assert!(!gate.verdict().is_authenticated());

        gate.sign_in(SCHOOL_EMAIL, SCHOOL_PASSWORD).await.unwrap();
        assert!(gate.verdict().is_authenticated());

        gate.sign_out().await.unwrap();
        assert_eq!(*gate.verdict(), AuthVerdict::Unauthenticated);
    }

    #[tokio::test]
    async fn out_of_band_sign_out_is_observed_via_subscription() {
        let scenario = DemoScenario::new();
        let mut gate = SessionGate::bootstrap(scenario.auth.clone(), FAST).await;
        gate.sign_in(SCHOOL_EMAIL, SCHOOL_PASSWORD).await.unwrap();

        // Another tab signs out through the same auth collaborator.
        scenario.auth.sign_out().await.unwrap();
        let verdict = gate.apply_next_change().await;
        assert_eq!(*verdict, AuthVerdict::Unauthenticated);
    }
}
