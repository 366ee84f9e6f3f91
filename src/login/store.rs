//! User store and session collaborators.
//!
//! The core never owns account records; it reads them and requests mutations
//! through [`UserStore`]. The session that may already be attached to the
//! request is reached through [`SessionContext`].

use secrecy::SecretString;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Metadata key holding the Telegram user id of a linked account.
pub const EXTERNAL_ID_META_KEY: &str = "tglogin_user_id";

/// Metadata key holding the Telegram username of a linked account.
pub const EXTERNAL_USERNAME_META_KEY: &str = "tglogin_username";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(Uuid);

impl AccountId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AccountId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local account as seen by the login core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub login_name: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
    /// Tenants (sites) the account belongs to in multi-tenant deployments.
    pub tenants: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl Account {
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn external_id(&self) -> Option<i64> {
        self.meta(EXTERNAL_ID_META_KEY)
            .and_then(|value| value.parse().ok())
    }

    #[must_use]
    pub fn external_username(&self) -> Option<&str> {
        self.meta(EXTERNAL_USERNAME_META_KEY)
            .filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|email| !email.is_empty())
    }
}

/// Fields for a new account. The external id travels with the insert so a
/// store can enforce one account per Telegram id atomically.
#[derive(Debug)]
pub struct NewAccount {
    pub login_name: String,
    pub password: SecretString,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub external_id: i64,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl AccountUpdate {
    #[must_use]
    pub fn names(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            email: None,
        }
    }

    #[must_use]
    pub fn email(email: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("account not found")]
    NotFound,
    #[error("login name already exists")]
    DuplicateLogin,
    #[error("email already exists")]
    DuplicateEmail,
    #[error("external id is already linked to another account")]
    DuplicateExternalId,
    #[error("store unavailable")]
    Unavailable,
    #[error("{0}")]
    Backend(String),
}

pub trait UserStore: Send + Sync {
    /// Load an account by id.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend fails.
    fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Find the account whose external-id metadata equals `external_id`.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend fails.
    fn find_by_external_id(&self, external_id: i64) -> Result<Option<Account>, StoreError>;

    /// Insert a new account.
    ///
    /// # Errors
    /// Returns `StoreError::DuplicateExternalId` when another account already
    /// carries the external id, or any other rejection from the backend.
    fn create_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Apply a partial update.
    ///
    /// # Errors
    /// Returns `StoreError` if the account is missing or the update is rejected.
    fn update_account(&self, id: AccountId, update: AccountUpdate) -> Result<Account, StoreError>;

    /// Insert or overwrite a single metadata entry.
    ///
    /// # Errors
    /// Returns `StoreError::DuplicateExternalId` when writing an external id
    /// that another account already carries.
    fn set_metadata(&self, id: AccountId, key: &str, value: &str) -> Result<(), StoreError>;

    /// # Errors
    /// Returns `StoreError` if the backend fails.
    fn username_exists(&self, login_name: &str) -> Result<bool, StoreError>;

    /// # Errors
    /// Returns `StoreError` if the backend fails.
    fn email_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// Number of accounts, used to bound name allocation.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend fails.
    fn account_count(&self) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SessionError(pub String);

/// Request-scoped view of the caller's session.
pub trait SessionContext {
    /// The account already authenticated on this request, if any.
    fn current_account(&self) -> Option<&Account>;

    /// Authenticate the request as `account`.
    ///
    /// # Errors
    /// Returns `SessionError` if the session could not be issued.
    fn establish(&mut self, account: &Account) -> Result<(), SessionError>;
}

/// Session holder for callers that manage cookies themselves.
#[derive(Debug, Default)]
pub struct RequestSession {
    current: Option<Account>,
    established: Option<AccountId>,
}

impl RequestSession {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn authenticated(account: Account) -> Self {
        Self {
            current: Some(account),
            established: None,
        }
    }

    /// Account id the login attached to this session, if a new one was issued.
    #[must_use]
    pub fn established(&self) -> Option<AccountId> {
        self.established
    }
}

impl SessionContext for RequestSession {
    fn current_account(&self) -> Option<&Account> {
        self.current.as_ref()
    }

    fn establish(&mut self, account: &Account) -> Result<(), SessionError> {
        self.established = Some(account.id);
        self.current = Some(account.clone());
        Ok(())
    }
}
