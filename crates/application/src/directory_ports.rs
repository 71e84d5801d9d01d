//! Directory store port.
//!
//! The directory is a document store keyed by subject identifier. Documents
//! are JSON objects; every write bumps a per-key version that callers may
//! pass back as an optional precondition.

use async_trait::async_trait;
use serde_json::{Map, Value};

use gatekeep_core::AppResult;

/// Collection that holds one document per account.
pub const ACCOUNTS_COLLECTION: &str = "users";

/// Store-assigned revision of a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentVersion(u64);

impl DocumentVersion {
    /// Creates a version from its raw counter value.
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns the version that follows this one.
    #[must_use]
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for DocumentVersion {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Document returned by directory reads.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Document key inside its collection.
    pub key: String,
    /// Document body.
    pub data: Map<String, Value>,
    /// Revision of the body.
    pub version: DocumentVersion,
}

/// A decoded value paired with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// Decoded value.
    pub value: T,
    /// Revision of the underlying document.
    pub version: DocumentVersion,
}

/// Repository port for the shared account directory.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Reads one document, returning `None` when the key is absent.
    async fn get(&self, collection: &str, key: &str) -> AppResult<Option<StoredDocument>>;

    /// Writes a full document, replacing any existing body.
    async fn put(&self, collection: &str, key: &str, data: Map<String, Value>) -> AppResult<()>;

    /// Merges `fields` into an existing document.
    ///
    /// Fails with `NotFound` when the key is absent and with `Conflict` when
    /// `precondition` is set and no longer matches the stored version.
    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
        precondition: Option<DocumentVersion>,
    ) -> AppResult<()>;

    /// Lists every document in a collection, in store order.
    async fn list_collection(&self, collection: &str) -> AppResult<Vec<StoredDocument>>;
}
