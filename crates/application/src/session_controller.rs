//! Session state machine.
//!
//! Turns a provider sign-in into an application session. A valid provider
//! credential is necessary but not sufficient: the directory record must also
//! be active, otherwise the credential is revoked and the attempt rejected.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use gatekeep_core::{AppError, AppResult, UserIdentity};
use gatekeep_domain::{AccountRecord, AccountRole};

use crate::account_service::AccountService;
use crate::identity_ports::IdentityProvider;
use crate::user_messages::{UserOperation, user_message};

#[cfg(test)]
mod tests;

/// Reason a sign-in attempt was refused after the provider accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The directory record is marked inactive.
    AccountDisabled,
}

/// Established session for an active account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    identity: UserIdentity,
    role: AccountRole,
    established_at: DateTime<Utc>,
}

impl AuthenticatedSession {
    fn establish(identity: UserIdentity, record: &AccountRecord) -> Self {
        Self {
            identity,
            role: record.role(),
            established_at: Utc::now(),
        }
    }

    /// Returns the provider profile of the signed-in identity.
    #[must_use]
    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// Returns the role read from the directory at sign-in.
    #[must_use]
    pub fn role(&self) -> AccountRole {
        self.role
    }

    /// Returns when the session was established.
    #[must_use]
    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }
}

/// Current state of the application session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No identity is signed in.
    SignedOut,
    /// An interactive sign-in is in flight.
    Authenticating,
    /// Signed in with an active account.
    Authenticated(AuthenticatedSession),
    /// The provider accepted the identity but the directory refused it.
    Rejected(RejectionReason),
}

impl SessionState {
    /// Returns the session role, if a session is established.
    #[must_use]
    pub fn role(&self) -> Option<AccountRole> {
        match self {
            Self::Authenticated(session) => Some(session.role()),
            _ => None,
        }
    }

    /// Returns whether an administrator session is established.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role().is_some_and(|role| role.is_admin())
    }
}

/// State change delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTransition {
    /// State before the change.
    pub previous: SessionState,
    /// State after the change.
    pub current: SessionState,
}

impl SessionTransition {
    /// Returns whether this transition made the session an administrator.
    #[must_use]
    pub fn entered_admin(&self) -> bool {
        self.current.is_admin() && !self.previous.is_admin()
    }
}

/// Receives every session state transition.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    /// Called after the controller has committed `transition`.
    async fn on_transition(&self, transition: &SessionTransition);
}

struct SessionInner {
    state: SessionState,
    /// Bumped by every sign-in and sign-out; a stale attempt never commits.
    generation: u64,
    last_error: Option<&'static str>,
}

/// Orchestrates sign-in and sign-out and owns the session state.
pub struct SessionController {
    identity_provider: Arc<dyn IdentityProvider>,
    account_service: AccountService,
    inner: Mutex<SessionInner>,
    observers: Mutex<Vec<Weak<dyn SessionObserver>>>,
}

impl SessionController {
    /// Creates a signed-out controller.
    #[must_use]
    pub fn new(identity_provider: Arc<dyn IdentityProvider>, account_service: AccountService) -> Self {
        Self {
            identity_provider,
            account_service,
            inner: Mutex::new(SessionInner {
                state: SessionState::SignedOut,
                generation: 0,
                last_error: None,
            }),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Registers an observer. Dropped observers are pruned on the next
    /// notification.
    pub async fn subscribe(&self, observer: Weak<dyn SessionObserver>) {
        self.observers.lock().await.push(observer);
    }

    /// Returns a snapshot of the current state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state.clone()
    }

    /// Returns the established session, if any.
    pub async fn current_session(&self) -> Option<AuthenticatedSession> {
        match &self.inner.lock().await.state {
            SessionState::Authenticated(session) => Some(session.clone()),
            _ => None,
        }
    }

    /// Returns the role of the established session, if any.
    pub async fn current_role(&self) -> Option<AccountRole> {
        self.inner.lock().await.state.role()
    }

    /// Returns whether a sign-in attempt is in flight.
    pub async fn is_busy(&self) -> bool {
        matches!(self.inner.lock().await.state, SessionState::Authenticating)
    }

    /// Returns the message currently shown to the user, if any.
    pub async fn last_error(&self) -> Option<&'static str> {
        self.inner.lock().await.last_error
    }

    /// Replaces the user-visible error with the message for `error`.
    pub async fn report_error(&self, operation: UserOperation, error: &AppError) {
        self.inner.lock().await.last_error = Some(user_message(operation, error));
    }

    /// Runs the interactive sign-in and applies the activation gate.
    ///
    /// Every failure is also written to the error slot.
    pub async fn sign_in(&self) -> AppResult<AuthenticatedSession> {
        let (generation, previous) = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                SessionState::Authenticating => {
                    return Err(AppError::Conflict(
                        "a sign-in attempt is already in progress".to_owned(),
                    ));
                }
                SessionState::Authenticated(_) => {
                    return Err(AppError::Conflict("a session is already established".to_owned()));
                }
                SessionState::SignedOut | SessionState::Rejected(_) => {}
            }

            inner.generation = inner.generation.wrapping_add(1);
            let previous = std::mem::replace(&mut inner.state, SessionState::Authenticating);
            (inner.generation, previous)
        };
        self.notify(previous, SessionState::Authenticating).await;

        let identity = match self.identity_provider.interactive_sign_in().await {
            Ok(identity) => identity,
            Err(error) => {
                warn!(%error, "identity provider sign-in failed");
                return Err(self.fail_attempt(generation, error, SessionState::SignedOut).await);
            }
        };

        let record = match self.account_service.provision_or_fetch(&identity).await {
            Ok(record) => record,
            Err(error) => {
                warn!(subject = identity.subject(), %error, "account lookup failed during sign-in");
                self.revoke_credential(identity.subject()).await;
                return Err(self.fail_attempt(generation, error, SessionState::SignedOut).await);
            }
        };

        if !record.is_active() {
            info!(subject = identity.subject(), "sign-in rejected for disabled account");
            self.revoke_credential(identity.subject()).await;
            let error = AppError::AccountDisabled(identity.subject().to_owned());
            let rejected = SessionState::Rejected(RejectionReason::AccountDisabled);
            return Err(self.fail_attempt(generation, error, rejected).await);
        }

        let session = AuthenticatedSession::establish(identity, &record);
        let committed = {
            let mut inner = self.inner.lock().await;
            if inner.generation == generation
                && matches!(inner.state, SessionState::Authenticating)
            {
                inner.state = SessionState::Authenticated(session.clone());
                inner.last_error = None;
                true
            } else {
                false
            }
        };

        if !committed {
            debug!(
                subject = session.identity().subject(),
                "discarding sign-in superseded by sign-out"
            );
            self.revoke_credential(session.identity().subject()).await;
            return Err(AppError::Conflict(
                "sign-in was cancelled by a sign-out".to_owned(),
            ));
        }

        info!(
            subject = session.identity().subject(),
            role = %session.role(),
            "session established"
        );
        self.notify(
            SessionState::Authenticating,
            SessionState::Authenticated(session.clone()),
        )
        .await;

        Ok(session)
    }

    /// Ends the session. Always leaves the controller signed out, even when
    /// the provider fails to terminate its credential.
    pub async fn sign_out(&self) {
        if let Err(error) = self.identity_provider.terminate().await {
            warn!(%error, "identity provider sign-out failed, clearing local session");
        }

        let previous = {
            let mut inner = self.inner.lock().await;
            inner.generation = inner.generation.wrapping_add(1);
            inner.last_error = None;
            std::mem::replace(&mut inner.state, SessionState::SignedOut)
        };

        if let SessionState::Authenticated(session) = &previous {
            info!(subject = session.identity().subject(), "session ended");
        }
        self.notify(previous, SessionState::SignedOut).await;
    }

    /// Moves a live attempt to `next` and records the user message. A
    /// superseded attempt leaves the state untouched.
    async fn fail_attempt(&self, generation: u64, error: AppError, next: SessionState) -> AppError {
        let applied = {
            let mut inner = self.inner.lock().await;
            if inner.generation == generation
                && matches!(inner.state, SessionState::Authenticating)
            {
                inner.state = next.clone();
                inner.last_error = Some(user_message(UserOperation::SignIn, &error));
                true
            } else {
                false
            }
        };

        if applied {
            self.notify(SessionState::Authenticating, next).await;
        }
        error
    }

    async fn revoke_credential(&self, subject: &str) {
        if let Err(error) = self.identity_provider.terminate().await {
            warn!(subject, %error, "failed to revoke provider credential");
        }
    }

    async fn notify(&self, previous: SessionState, current: SessionState) {
        if previous == current {
            return;
        }

        let observers: Vec<Arc<dyn SessionObserver>> = {
            let mut observers = self.observers.lock().await;
            observers.retain(|observer| observer.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        let transition = SessionTransition { previous, current };
        debug!(
            observers = observers.len(),
            admin = transition.current.is_admin(),
            "session transition"
        );
        for observer in observers {
            observer.on_transition(&transition).await;
        }
    }
}
