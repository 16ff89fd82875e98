//! In-memory auth collaborator: accounts, one cached session, school
//! profiles, and a watch channel for session-change notifications.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::watch;

use diploma_types::{
    AuthClient, Collaborator, KycStatus, ProfileUpdate, SchoolId, SchoolProfile, ServiceError,
    Session, UserId,
};

const EPOCH_MS: u64 = 1_754_000_000_000;

#[derive(Debug)]
struct Account {
    password: String,
    user_id: UserId,
}

#[derive(Debug)]
struct Inner {
    accounts: HashMap<String, Account>,
    profiles: HashMap<UserId, SchoolProfile>,
    session: Option<Session>,
    reset_tokens: HashMap<String, String>,
    /// Artificial latency applied to `current_session`, for exercising the
    /// gate's resolution timeout.
    resolve_delay: Option<Duration>,
    next_user: u32,
}

#[derive(Clone)]
pub struct MockAuth {
    inner: Arc<Mutex<Inner>>,
    changes: Arc<watch::Sender<Option<Session>>>,
}

impl Default for MockAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuth {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                accounts: HashMap::new(),
                profiles: HashMap::new(),
                session: None,
                reset_tokens: HashMap::new(),
                resolve_delay: None,
                next_user: 1,
            })),
            changes: Arc::new(changes),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R, ServiceError> {
        let mut lock = self
            .inner
            .lock()
            .map_err(|_| ServiceError::unavailable(Collaborator::Auth, "mutex poisoned"))?;
        Ok(f(&mut lock))
    }

    /// Seed an account with an existing profile and no active session.
    pub fn seed_account(&self, email: &str, password: &str, profile: SchoolProfile) {
        self.with_inner(|inner| {
            inner.accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    user_id: profile.user_id.clone(),
                },
            );
            inner.profiles.insert(profile.user_id.clone(), profile);
        })
        .expect("mock auth lock");
    }

    pub fn set_resolve_delay(&self, delay: Duration) {
        self.with_inner(|inner| inner.resolve_delay = Some(delay))
            .expect("mock auth lock");
    }

    /// Install a cached session directly, as if a previous visit left one.
    pub fn set_cached_session(&self, session: Session) {
        self.with_inner(|inner| inner.session = Some(session.clone()))
            .expect("mock auth lock");
        let _ = self.changes.send(Some(session));
    }
}

#[async_trait(?Send)]
impl AuthClient for MockAuth {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        school_name: &str,
    ) -> Result<(Session, SchoolProfile), ServiceError> {
        let (session, profile) = self.with_inner(|inner| {
            if inner.accounts.contains_key(email) {
                return Err(ServiceError::DuplicateEmail(email.to_string()));
            }
            let seq = inner.next_user;
            inner.next_user += 1;
            let user_id = UserId::new(format!("usr-{seq}")).expect("non-empty id");
            let profile = SchoolProfile {
                id: SchoolId::new(format!("sch-{seq}")).expect("non-empty id"),
                user_id: user_id.clone(),
                name: school_name.to_string(),
                email: email.to_string(),
                website: None,
                logo_url: None,
                address: None,
                public_wallet: format!("addr_test1mock{seq:04}"),
                kyc_status: KycStatus::Pending,
                balance: Decimal::ZERO,
                created_at_unix_millis: EPOCH_MS,
                updated_at_unix_millis: EPOCH_MS,
            };
            inner.accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    user_id: user_id.clone(),
                },
            );
            inner.profiles.insert(user_id.clone(), profile.clone());
            let session = Session {
                user_id,
                email: email.to_string(),
            };
            inner.session = Some(session.clone());
            Ok((session, profile))
        })??;
        let _ = self.changes.send(Some(session.clone()));
        Ok((session, profile))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        let session = self.with_inner(|inner| {
            let account = inner
                .accounts
                .get(email)
                .ok_or(ServiceError::InvalidCredentials)?;
            if account.password != password {
                return Err(ServiceError::InvalidCredentials);
            }
            let session = Session {
                user_id: account.user_id.clone(),
                email: email.to_string(),
            };
            inner.session = Some(session.clone());
            Ok(session)
        })??;
        let _ = self.changes.send(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ServiceError> {
        self.with_inner(|inner| inner.session = None)?;
        let _ = self.changes.send(None);
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>, ServiceError> {
        let delay = self.with_inner(|inner| inner.resolve_delay)?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.with_inner(|inner| inner.session.clone())
    }

    async fn school_profile(
        &self,
        user: &UserId,
    ) -> Result<Option<SchoolProfile>, ServiceError> {
        self.with_inner(|inner| inner.profiles.get(user).cloned())
    }

    async fn update_school_profile(
        &self,
        user: &UserId,
        update: ProfileUpdate,
    ) -> Result<SchoolProfile, ServiceError> {
        self.with_inner(|inner| {
            let profile = inner.profiles.get_mut(user).ok_or_else(|| {
                ServiceError::rejected(Collaborator::Auth, format!("no profile for {user}"))
            })?;
            if let Some(name) = update.name {
                profile.name = name;
            }
            if update.website.is_some() {
                profile.website = update.website;
            }
            if update.logo_url.is_some() {
                profile.logo_url = update.logo_url;
            }
            if update.address.is_some() {
                profile.address = update.address;
            }
            profile.updated_at_unix_millis += 1;
            Ok(profile.clone())
        })?
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        self.with_inner(|inner| {
            if !inner.accounts.contains_key(email) {
                return Err(ServiceError::rejected(
                    Collaborator::Auth,
                    format!("no account for {email}"),
                ));
            }
            inner
                .reset_tokens
                .insert(format!("reset-{email}"), email.to_string());
            Ok(())
        })?
    }

    async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        self.with_inner(|inner| {
            let email = inner
                .reset_tokens
                .remove(token)
                .ok_or_else(|| ServiceError::rejected(Collaborator::Auth, "unknown reset token"))?;
            let account = inner
                .accounts
                .get_mut(&email)
                .ok_or_else(|| ServiceError::rejected(Collaborator::Auth, "account vanished"))?;
            account.password = new_password.to_string();
            Ok(())
        })?
    }

    fn session_changes(&self) -> watch::Receiver<Option<Session>> {
        self.changes.subscribe()
    }
}
