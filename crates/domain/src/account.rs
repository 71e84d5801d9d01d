//! Account directory types.
//!
//! An account record maps a provider-issued subject identifier to a role and
//! an activation flag. Records are persisted as loosely typed documents, so
//! this module also owns the document encoding.

use std::str::FromStr;

use gatekeep_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable subject identifier issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(NonEmptyString);

impl SubjectId {
    /// Creates a validated subject identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value)
            .map(Self)
            .map_err(|_| AppError::Validation("subject identifier must not be empty".to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Two-tier account role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// Regular account. Assigned to every provisioned identity.
    #[default]
    User,
    /// Privileged account allowed to manage other accounts.
    Admin,
}

impl AccountRole {
    /// Returns the storage string for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Returns whether the role grants access to the account directory.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl FromStr for AccountRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(AppError::Validation(format!(
                "unknown account role '{value}'"
            ))),
        }
    }
}

impl std::fmt::Display for AccountRole {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Persisted directory entry for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    id: SubjectId,
    email: Option<String>,
    role: AccountRole,
    active: bool,
}

/// Document body stored under the subject key.
///
/// Older writers used `activo` for the activation flag. Partial updates only
/// ever write `active`, so a document may carry both; `active` wins. A
/// document without either field decodes as inactive.
#[derive(Debug, Deserialize)]
struct AccountDocument {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: AccountRole,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    activo: Option<bool>,
}

impl AccountRecord {
    /// Creates the default record for a first sign-in.
    #[must_use]
    pub fn provision(id: SubjectId, email: Option<String>) -> Self {
        Self {
            id,
            email,
            role: AccountRole::User,
            active: true,
        }
    }

    /// Rebuilds a record from stored fields.
    #[must_use]
    pub fn from_parts(id: SubjectId, email: Option<String>, role: AccountRole, active: bool) -> Self {
        Self {
            id,
            email,
            role,
            active,
        }
    }

    /// Decodes a record from the document stored under `key`.
    pub fn from_document(key: &str, data: &Map<String, Value>) -> AppResult<Self> {
        let id = SubjectId::new(key)?;
        let document: AccountDocument = serde_json::from_value(Value::Object(data.clone()))
            .map_err(|error| {
                AppError::Validation(format!("account document '{key}' is malformed: {error}"))
            })?;

        Ok(Self {
            id,
            email: document.email,
            role: document.role,
            active: document.active.or(document.activo).unwrap_or(false),
        })
    }

    /// Encodes the record body as a directory document.
    #[must_use]
    pub fn to_document(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert(
            "email".to_owned(),
            self.email.clone().map_or(Value::Null, Value::String),
        );
        data.insert(
            "role".to_owned(),
            Value::String(self.role.as_str().to_owned()),
        );
        data.insert("active".to_owned(), Value::Bool(self.active));
        data
    }

    /// Returns the subject identifier.
    #[must_use]
    pub fn id(&self) -> &SubjectId {
        &self.id
    }

    /// Returns the email captured at provisioning.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the account role.
    #[must_use]
    pub fn role(&self) -> AccountRole {
        self.role
    }

    /// Returns whether the account may establish a session.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }
}
