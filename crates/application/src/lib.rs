//! Application services and ports.

#![forbid(unsafe_code)]

mod account_service;
mod admin_directory_view;
mod directory_ports;
mod identity_ports;
mod session_controller;
mod user_messages;

#[cfg(test)]
mod test_support;

pub use account_service::AccountService;
pub use admin_directory_view::{AdminDirectoryView, AdminViewOptions};
pub use directory_ports::{
    ACCOUNTS_COLLECTION, DirectoryStore, DocumentVersion, StoredDocument, Versioned,
};
pub use identity_ports::IdentityProvider;
pub use session_controller::{
    AuthenticatedSession, RejectionReason, SessionController, SessionObserver, SessionState,
    SessionTransition,
};
pub use user_messages::{
    ACCOUNT_DISABLED_MESSAGE, CONCURRENT_CHANGE_MESSAGE, OPERATION_FAILED_MESSAGE,
    SIGN_IN_FAILED_MESSAGE, UserOperation, user_message,
};
