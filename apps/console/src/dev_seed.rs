use gatekeep_application::{ACCOUNTS_COLLECTION, DirectoryStore};
use gatekeep_core::AppResult;
use gatekeep_domain::{AccountRecord, AccountRole, SubjectId};
use tracing::info;

use crate::console_config::SeedAdminConfig;

/// Writes an active admin record. Admin records are never created by the
/// application itself, so a fresh in-memory directory needs one seeded.
pub async fn run(directory: &dyn DirectoryStore, seed_admin: &SeedAdminConfig) -> AppResult<()> {
    let subject = SubjectId::new(seed_admin.subject.as_str())?;

    if directory
        .get(ACCOUNTS_COLLECTION, subject.as_str())
        .await?
        .is_some()
    {
        info!(subject = %subject, "seed admin already present");
        return Ok(());
    }

    let record = AccountRecord::from_parts(
        subject,
        seed_admin.email.clone(),
        AccountRole::Admin,
        true,
    );
    directory
        .put(
            ACCOUNTS_COLLECTION,
            record.id().as_str(),
            record.to_document(),
        )
        .await?;

    info!(subject = %record.id(), "seeded admin account");
    Ok(())
}
