use async_trait::async_trait;

use gatekeep_core::{AppResult, UserIdentity};

/// Port for the third-party identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Runs the interactive sign-in and returns the verified profile.
    ///
    /// Failures are reported as `AppError::Provider`.
    async fn interactive_sign_in(&self) -> AppResult<UserIdentity>;

    /// Terminates the credential established by the last sign-in.
    async fn terminate(&self) -> AppResult<()>;
}
