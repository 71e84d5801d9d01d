//! User-facing messages for the single error slot.

use gatekeep_core::AppError;

/// Shown when the provider or directory fails during sign-in.
pub const SIGN_IN_FAILED_MESSAGE: &str = "Sign-in failed. Please try again.";

/// Shown when the account exists but has been deactivated.
pub const ACCOUNT_DISABLED_MESSAGE: &str =
    "Your account is disabled. Contact the administrator.";

/// Shown when a directory operation fails for any other reason.
pub const OPERATION_FAILED_MESSAGE: &str = "The operation could not be completed. Please try again.";

/// Shown when a guarded write lost against a concurrent change.
pub const CONCURRENT_CHANGE_MESSAGE: &str =
    "The account was changed by someone else. The list has been reloaded.";

/// Operation that originated an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOperation {
    /// Interactive sign-in.
    SignIn,
    /// Directory listing reload.
    Refresh,
    /// Activation toggle.
    Toggle,
}

/// Maps an error raised by `operation` to the message shown to the user.
#[must_use]
pub fn user_message(operation: UserOperation, error: &AppError) -> &'static str {
    match (operation, error) {
        (_, AppError::AccountDisabled(_)) => ACCOUNT_DISABLED_MESSAGE,
        (UserOperation::SignIn, _) => SIGN_IN_FAILED_MESSAGE,
        (_, AppError::Conflict(_)) => CONCURRENT_CHANGE_MESSAGE,
        _ => OPERATION_FAILED_MESSAGE,
    }
}
