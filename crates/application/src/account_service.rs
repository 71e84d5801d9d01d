//! Account record manager.
//!
//! Owns the account lifecycle in the directory: first sign-in provisioning,
//! lookups, the activation toggle, and full listings for administrators.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use gatekeep_core::{AppResult, UserIdentity};
use gatekeep_domain::{AccountRecord, SubjectId};

use crate::directory_ports::{ACCOUNTS_COLLECTION, DirectoryStore, DocumentVersion, Versioned};


/// Application service for account records.
#[derive(Clone)]
pub struct AccountService {
    directory: Arc<dyn DirectoryStore>,
}

impl AccountService {
    /// Creates a new account service.
    #[must_use]
    pub fn new(directory: Arc<dyn DirectoryStore>) -> Self {
        Self { directory }
    }

    /// Returns the record for the signed-in identity, creating the default
    /// record on first sign-in.
    ///
    /// Existing records are returned unchanged. Concurrent first sign-ins of
    /// the same subject rely on the store's key uniqueness.
    pub async fn provision_or_fetch(&self, identity: &UserIdentity) -> AppResult<AccountRecord> {
        let subject = SubjectId::new(identity.subject())?;

        if let Some(document) = self
            .directory
            .get(ACCOUNTS_COLLECTION, subject.as_str())
            .await?
        {
            return AccountRecord::from_document(subject.as_str(), &document.data);
        }

        let record = AccountRecord::provision(subject, identity.email().map(str::to_owned));
        self.directory
            .put(
                ACCOUNTS_COLLECTION,
                record.id().as_str(),
                record.to_document(),
            )
            .await?;

        info!(subject = %record.id(), "provisioned account on first sign-in");
        Ok(record)
    }

    /// Returns a record by subject, if it exists.
    pub async fn find(&self, account_id: &SubjectId) -> AppResult<Option<AccountRecord>> {
        self.directory
            .get(ACCOUNTS_COLLECTION, account_id.as_str())
            .await?
            .map(|document| AccountRecord::from_document(account_id.as_str(), &document.data))
            .transpose()
    }

    /// Overwrites the activation flag of an account.
    ///
    /// Performs no authorization check; callers gate who may invoke it. With
    /// `precondition` unset the write is last-write-wins.
    pub async fn set_active(
        &self,
        account_id: &SubjectId,
        active: bool,
        precondition: Option<DocumentVersion>,
    ) -> AppResult<()> {
        let mut fields = Map::new();
        fields.insert("active".to_owned(), Value::Bool(active));

        self.directory
            .update(ACCOUNTS_COLLECTION, account_id.as_str(), fields, precondition)
            .await?;

        info!(
            account_id = %account_id,
            active,
            guarded = precondition.is_some(),
            "account activation updated"
        );
        Ok(())
    }

    /// Lists every account in directory order.
    pub async fn list_all(&self) -> AppResult<Vec<AccountRecord>> {
        Ok(self
            .list_all_versioned()
            .await?
            .into_iter()
            .map(|entry| entry.value)
            .collect())
    }

    /// Lists every account with the revision it was read at.
    ///
    /// Documents that fail to decode are skipped and logged.
    pub async fn list_all_versioned(&self) -> AppResult<Vec<Versioned<AccountRecord>>> {
        let documents = self.directory.list_collection(ACCOUNTS_COLLECTION).await?;

        Ok(documents
            .into_iter()
            .filter_map(|document| {
                match AccountRecord::from_document(&document.key, &document.data) {
                    Ok(record) => Some(Versioned {
                        value: record,
                        version: document.version,
                    }),
                    Err(error) => {
                        warn!(key = %document.key, %error, "skipping malformed account document");
                        None
                    }
                }
            })
            .collect())
    }
}
