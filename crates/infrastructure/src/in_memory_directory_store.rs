use std::collections::BTreeMap;

use async_trait::async_trait;
use gatekeep_application::{DirectoryStore, DocumentVersion, StoredDocument};
use gatekeep_core::{AppError, AppResult};
use serde_json::{Map, Value};
use tokio::sync::RwLock;


/// In-memory directory store implementation.
///
/// Collections are listed in key order. Every write bumps the document
/// version, starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryStore {
    documents: RwLock<BTreeMap<(String, String), StoredDocument>>,
}

impl InMemoryDirectoryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    async fn get(&self, collection: &str, key: &str) -> AppResult<Option<StoredDocument>> {
        Ok(self
            .documents
            .read()
            .await
            .get(&(collection.to_owned(), key.to_owned()))
            .cloned())
    }

    async fn put(&self, collection: &str, key: &str, data: Map<String, Value>) -> AppResult<()> {
        let storage_key = (collection.to_owned(), key.to_owned());
        let mut documents = self.documents.write().await;

        let version = documents
            .get(&storage_key)
            .map_or(DocumentVersion::new(1), |existing| existing.version.next());
        documents.insert(
            storage_key,
            StoredDocument {
                key: key.to_owned(),
                data,
                version,
            },
        );

        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
        precondition: Option<DocumentVersion>,
    ) -> AppResult<()> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&(collection.to_owned(), key.to_owned()))
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "document '{key}' does not exist in collection '{collection}'"
                ))
            })?;

        if let Some(expected) = precondition
            && expected != document.version
        {
            return Err(AppError::Conflict(format!(
                "document '{key}' changed: expected version {expected}, found {}",
                document.version
            )));
        }

        document.data.extend(fields);
        document.version = document.version.next();
        Ok(())
    }

    async fn list_collection(&self, collection: &str) -> AppResult<Vec<StoredDocument>> {
        let documents = self.documents.read().await;

        Ok(documents
            .iter()
            .filter_map(|((stored_collection, _), document)| {
                (stored_collection == collection).then(|| document.clone())
            })
            .collect())
    }
}
