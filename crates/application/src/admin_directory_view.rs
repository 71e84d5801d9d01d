//! Administrator view over the account directory.
//!
//! The role check here only hides the capability from non-admin sessions.
//! It is not a security boundary: the directory store must enforce its own
//! write rules.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use gatekeep_core::{AppError, AppResult};
use gatekeep_domain::{AccountRecord, SubjectId};

use crate::account_service::AccountService;
use crate::directory_ports::Versioned;
use crate::session_controller::{SessionController, SessionObserver, SessionTransition};
use crate::user_messages::UserOperation;


/// Behaviour switches for the admin view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminViewOptions {
    /// Pass the listed document version as a write precondition so a toggle
    /// fails instead of overwriting a concurrent change.
    pub optimistic_toggle: bool,
}

/// Directory listing and activation toggles for administrator sessions.
pub struct AdminDirectoryView {
    session: Arc<SessionController>,
    account_service: AccountService,
    options: AdminViewOptions,
    listing: RwLock<Vec<Versioned<AccountRecord>>>,
    pending_toggles: StdMutex<HashSet<SubjectId>>,
}

/// Marks an account as having a toggle in flight until dropped.
struct PendingToggle<'a> {
    pending: &'a StdMutex<HashSet<SubjectId>>,
    account_id: SubjectId,
}

impl<'a> PendingToggle<'a> {
    fn acquire(pending: &'a StdMutex<HashSet<SubjectId>>, account_id: &SubjectId) -> Option<Self> {
        let inserted = pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account_id.clone());

        inserted.then(|| Self {
            pending,
            account_id: account_id.clone(),
        })
    }
}

impl Drop for PendingToggle<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.account_id);
    }
}

impl AdminDirectoryView {
    /// Creates a view that is not yet subscribed to session transitions.
    #[must_use]
    pub fn new(
        session: Arc<SessionController>,
        account_service: AccountService,
        options: AdminViewOptions,
    ) -> Self {
        Self {
            session,
            account_service,
            options,
            listing: RwLock::new(Vec::new()),
            pending_toggles: StdMutex::new(HashSet::new()),
        }
    }

    /// Creates a view and subscribes it so it refreshes whenever the session
    /// becomes an administrator and clears whenever it stops being one.
    pub async fn attach(
        session: Arc<SessionController>,
        account_service: AccountService,
        options: AdminViewOptions,
    ) -> Arc<Self> {
        let view = Arc::new(Self::new(Arc::clone(&session), account_service, options));
        let observer: Weak<dyn SessionObserver> = Arc::downgrade(&view) as Weak<dyn SessionObserver>;
        session.subscribe(observer).await;
        view
    }

    /// Returns whether the current session may use the view.
    pub async fn is_available(&self) -> bool {
        self.session
            .current_role()
            .await
            .is_some_and(|role| role.is_admin())
    }

    /// Returns the last fetched listing.
    pub async fn listing(&self) -> Vec<AccountRecord> {
        self.listing
            .read()
            .await
            .iter()
            .map(|entry| entry.value.clone())
            .collect()
    }

    /// Drops the cached listing.
    pub async fn clear(&self) {
        self.listing.write().await.clear();
    }

    /// Replaces the listing with a fresh directory snapshot.
    pub async fn refresh(&self) -> AppResult<()> {
        let result = self.reload().await;
        self.report(UserOperation::Refresh, &result).await;
        result
    }

    /// Flips the activation flag of a listed account and reloads the listing.
    ///
    /// Returns the new flag. The read of the current flag comes from the
    /// listing, so without `optimistic_toggle` a concurrent change made by
    /// another session between the listing and the write is overwritten.
    pub async fn toggle(&self, account_id: &SubjectId) -> AppResult<bool> {
        let result = self.toggle_listed(account_id).await;
        self.report(UserOperation::Toggle, &result).await;
        result
    }

    async fn toggle_listed(&self, account_id: &SubjectId) -> AppResult<bool> {
        self.require_admin().await?;

        let (current, version) = self
            .listing
            .read()
            .await
            .iter()
            .find(|entry| entry.value.id() == account_id)
            .map(|entry| (entry.value.is_active(), entry.version))
            .ok_or_else(|| {
                AppError::NotFound(format!("account '{account_id}' is not in the listing"))
            })?;

        let Some(pending) = PendingToggle::acquire(&self.pending_toggles, account_id) else {
            return Err(AppError::Conflict(format!(
                "a toggle for account '{account_id}' is already in progress"
            )));
        };

        let precondition = self.options.optimistic_toggle.then_some(version);
        let written = self
            .account_service
            .set_active(account_id, !current, precondition)
            .await;
        drop(pending);

        if let Err(error) = written {
            if matches!(error, AppError::Conflict(_)) {
                info!(account_id = %account_id, "toggle lost against a concurrent change, reloading");
                if let Err(reload_error) = self.reload().await {
                    warn!(%reload_error, "reload after conflicting toggle failed");
                }
            }
            return Err(error);
        }

        self.reload().await?;
        Ok(!current)
    }

    async fn reload(&self) -> AppResult<()> {
        self.require_admin().await?;

        let accounts = self.account_service.list_all_versioned().await?;

        // The session may have ended while the listing was in flight.
        if !self.is_available().await {
            debug!("dropping directory listing fetched for an ended admin session");
            return Ok(());
        }

        *self.listing.write().await = accounts;
        Ok(())
    }

    async fn require_admin(&self) -> AppResult<()> {
        if self.is_available().await {
            return Ok(());
        }

        Err(AppError::Forbidden(
            "the account directory requires an administrator session".to_owned(),
        ))
    }

    async fn report<T>(&self, operation: UserOperation, result: &AppResult<T>) {
        match result {
            Ok(_) | Err(AppError::Forbidden(_)) => {}
            Err(error) => self.session.report_error(operation, error).await,
        }
    }
}

#[async_trait]
impl SessionObserver for AdminDirectoryView {
    async fn on_transition(&self, transition: &SessionTransition) {
        if transition.entered_admin() {
            if let Err(error) = self.refresh().await {
                warn!(%error, "initial directory refresh failed");
            }
        } else if !transition.current.is_admin() {
            self.clear().await;
        }
    }
}
