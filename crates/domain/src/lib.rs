//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod account;

pub use account::{AccountRecord, AccountRole, SubjectId};
