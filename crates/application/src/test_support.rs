use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::{Mutex, Notify};

use gatekeep_core::{AppError, AppResult, UserIdentity};

use crate::directory_ports::{DirectoryStore, DocumentVersion, StoredDocument};
use crate::identity_ports::IdentityProvider;

#[derive(Default)]
pub struct FakeDirectoryStore {
    documents: Mutex<BTreeMap<(String, String), StoredDocument>>,
    update_gate: Mutex<Option<Arc<Notify>>>,
    list_gate: Mutex<Option<Arc<Notify>>>,
    pub puts: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl FakeDirectoryStore {
    pub async fn seed(&self, collection: &str, key: &str, data: Value) {
        let Value::Object(data) = data else {
            unreachable!()
        };
        self.documents.lock().await.insert(
            (collection.to_owned(), key.to_owned()),
            StoredDocument {
                key: key.to_owned(),
                data,
                version: DocumentVersion::new(1),
            },
        );
    }

    pub async fn seed_account(&self, key: &str, role: &str, active: bool) {
        self.seed(
            crate::ACCOUNTS_COLLECTION,
            key,
            json!({ "email": format!("{key}@example.com"), "role": role, "active": active }),
        )
        .await;
    }

    pub async fn document(&self, collection: &str, key: &str) -> Option<StoredDocument> {
        self.documents
            .lock()
            .await
            .get(&(collection.to_owned(), key.to_owned()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    /// Makes the next update wait until the returned handle is notified.
    pub async fn hold_update(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.update_gate.lock().await = Some(Arc::clone(&gate));
        gate
    }

    /// Makes the next listing wait until the returned handle is notified.
    pub async fn hold_list(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().await = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl DirectoryStore for FakeDirectoryStore {
    async fn get(&self, collection: &str, key: &str) -> AppResult<Option<StoredDocument>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Store("read failed".to_owned()));
        }
        Ok(self.document(collection, key).await)
    }

    async fn put(&self, collection: &str, key: &str, data: Map<String, Value>) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Store("write failed".to_owned()));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);

        let mut documents = self.documents.lock().await;
        let storage_key = (collection.to_owned(), key.to_owned());
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
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Store("write failed".to_owned()));
        }
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.update_gate.lock().await.take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut documents = self.documents.lock().await;
        let document = documents
            .get_mut(&(collection.to_owned(), key.to_owned()))
            .ok_or_else(|| AppError::NotFound(format!("document '{key}' not found")))?;

        if let Some(expected) = precondition
            && expected != document.version
        {
            return Err(AppError::Conflict(format!(
                "document '{key}' is at version {}",
                document.version
            )));
        }

        document.data.extend(fields);
        document.version = document.version.next();
        Ok(())
    }

    async fn list_collection(&self, collection: &str) -> AppResult<Vec<StoredDocument>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Store("read failed".to_owned()));
        }
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.list_gate.lock().await.take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        Ok(self
            .documents
            .lock()
            .await
            .iter()
            .filter(|((stored_collection, _), _)| stored_collection == collection)
            .map(|(_, document)| document.clone())
            .collect())
    }
}

/// Identity provider that returns whichever profile the test selected.
#[derive(Default)]
pub struct FakeIdentityProvider {
    profile: Mutex<Option<UserIdentity>>,
    gate: Mutex<Option<Arc<Notify>>>,
    pub sign_in_calls: AtomicUsize,
    pub terminate_calls: AtomicUsize,
    pub fail_terminate: AtomicBool,
}

impl FakeIdentityProvider {
    pub async fn sign_in_as(&self, subject: &str) {
        *self.profile.lock().await = Some(UserIdentity::new(
            subject,
            format!("Display {subject}"),
            Some(format!("{subject}@example.com")),
            Some(format!("https://avatars.example.com/{subject}.png")),
        ));
    }

    pub async fn fail_sign_in(&self) {
        *self.profile.lock().await = None;
    }

    /// Makes the next sign-in wait until the returned handle is notified.
    pub async fn hold_sign_in(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().await = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn interactive_sign_in(&self) -> AppResult<UserIdentity> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().await.take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.profile
            .lock()
            .await
            .clone()
            .ok_or_else(|| AppError::Provider("popup closed by user".to_owned()))
    }

    async fn terminate(&self) -> AppResult<()> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_terminate.load(Ordering::SeqCst) {
            return Err(AppError::Provider("network unreachable".to_owned()));
        }
        Ok(())
    }
}
