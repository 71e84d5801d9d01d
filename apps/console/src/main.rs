//! Gatekeep console composition root.

#![forbid(unsafe_code)]

mod commands;
mod console_config;
mod dev_seed;
mod session_console;

use std::sync::Arc;

use gatekeep_application::{
    AccountService, AdminDirectoryView, DirectoryStore, SessionController,
};
use gatekeep_core::AppError;
use gatekeep_infrastructure::{HttpDirectoryStore, InMemoryDirectoryStore, StaticIdentityProvider};
use tracing::{info, warn};

use crate::console_config::{ConsoleConfig, DirectoryBackendConfig, init_tracing};
use crate::session_console::SessionConsole;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ConsoleConfig::load()?;

    let directory: Arc<dyn DirectoryStore> = match &config.directory_backend {
        DirectoryBackendConfig::Memory => {
            info!("using in-memory account directory");
            Arc::new(InMemoryDirectoryStore::new())
        }
        DirectoryBackendConfig::Http(http_config) => {
            info!(base_url = %http_config.base_url, "using HTTP account directory");
            Arc::new(HttpDirectoryStore::new(http_config.clone())?)
        }
    };

    match (&config.directory_backend, &config.seed_admin) {
        (DirectoryBackendConfig::Memory, Some(seed_admin)) => {
            dev_seed::run(directory.as_ref(), seed_admin).await?;
        }
        (DirectoryBackendConfig::Http(_), Some(_)) => {
            warn!("DEV_SEED_ADMIN_SUBJECT is ignored for the HTTP directory backend");
        }
        (_, None) => {}
    }

    let identity_provider = Arc::new(StaticIdentityProvider::new(config.dev_profile.clone()));
    let account_service = AccountService::new(directory);
    let session = Arc::new(SessionController::new(
        identity_provider.clone(),
        account_service.clone(),
    ));
    let admin_view =
        AdminDirectoryView::attach(Arc::clone(&session), account_service, config.admin_view).await;

    SessionConsole::new(session, admin_view, identity_provider)
        .run()
        .await
}
