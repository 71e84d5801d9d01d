//! Development identity provider. Signs in a fixed profile and logs
//! credential termination to tracing output.

use async_trait::async_trait;
use gatekeep_application::IdentityProvider;
use gatekeep_core::{AppError, AppResult, UserIdentity};
use tokio::sync::RwLock;
use tracing::info;

/// Identity provider that always returns the configured profile.
pub struct StaticIdentityProvider {
    profile: RwLock<Option<UserIdentity>>,
}

impl StaticIdentityProvider {
    /// Creates a provider that signs in as `profile`.
    #[must_use]
    pub fn new(profile: UserIdentity) -> Self {
        Self {
            profile: RwLock::new(Some(profile)),
        }
    }

    /// Replaces the profile returned by the next sign-in. `None` makes the
    /// next sign-in fail as if the user dismissed the provider prompt.
    pub async fn switch_profile(&self, profile: Option<UserIdentity>) {
        *self.profile.write().await = profile;
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn interactive_sign_in(&self) -> AppResult<UserIdentity> {
        let profile = self.profile.read().await.clone().ok_or_else(|| {
            AppError::Provider("no development profile is configured".to_owned())
        })?;

        info!(
            subject = profile.subject(),
            display_name = profile.display_name(),
            "--- SIGN-IN (static provider) ---"
        );
        Ok(profile)
    }

    async fn terminate(&self) -> AppResult<()> {
        info!("--- SIGN-OUT (static provider) ---");
        Ok(())
    }
}
