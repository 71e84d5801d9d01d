//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_directory_store;
mod in_memory_directory_store;
mod static_identity_provider;

pub use http_directory_store::{HttpDirectoryStore, HttpDirectoryStoreConfig};
pub use in_memory_directory_store::InMemoryDirectoryStore;
pub use static_identity_provider::StaticIdentityProvider;
