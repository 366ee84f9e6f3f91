//! In-process [`UserStore`] backed by a mutex-guarded map.
//!
//! Enforces the same uniqueness rules a relational store would: login names,
//! emails (case-insensitive) and the external-id metadata value.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::store::{
    Account, AccountId, AccountUpdate, NewAccount, StoreError, UserStore, EXTERNAL_ID_META_KEY,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: Mutex<BTreeMap<AccountId, Account>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed account, e.g. a pre-existing local user.
    ///
    /// # Errors
    /// Returns `StoreError` if the login name, email or external id is taken.
    pub fn insert(&self, account: Account) -> Result<Account, StoreError> {
        let mut accounts = self.lock()?;
        check_unique_login(&accounts, &account.login_name)?;
        if let Some(email) = account.email.as_deref().filter(|e| !e.is_empty()) {
            check_unique_email(&accounts, account.id, email)?;
        }
        if let Some(external_id) = account.meta(EXTERNAL_ID_META_KEY) {
            check_unique_external_id(&accounts, account.id, external_id)?;
        }
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    /// Snapshot of every account, ordered by id.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the lock is poisoned.
    pub fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<AccountId, Account>>, StoreError> {
        self.accounts.lock().map_err(|_| StoreError::Unavailable)
    }
}

fn check_unique_login(
    accounts: &BTreeMap<AccountId, Account>,
    login_name: &str,
) -> Result<(), StoreError> {
    if accounts.values().any(|a| a.login_name == login_name) {
        return Err(StoreError::DuplicateLogin);
    }
    Ok(())
}

fn check_unique_email(
    accounts: &BTreeMap<AccountId, Account>,
    owner: AccountId,
    email: &str,
) -> Result<(), StoreError> {
    let taken = accounts.values().any(|a| {
        a.id != owner
            && a.email
                .as_deref()
                .is_some_and(|existing| existing.eq_ignore_ascii_case(email))
    });
    if taken {
        return Err(StoreError::DuplicateEmail);
    }
    Ok(())
}

fn check_unique_external_id(
    accounts: &BTreeMap<AccountId, Account>,
    owner: AccountId,
    external_id: &str,
) -> Result<(), StoreError> {
    let taken = accounts
        .values()
        .any(|a| a.id != owner && a.meta(EXTERNAL_ID_META_KEY) == Some(external_id));
    if taken {
        return Err(StoreError::DuplicateExternalId);
    }
    Ok(())
}

impl UserStore for MemoryStore {
    fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    fn find_by_external_id(&self, external_id: i64) -> Result<Option<Account>, StoreError> {
        let needle = external_id.to_string();
        Ok(self
            .lock()?
            .values()
            .find(|a| a.meta(EXTERNAL_ID_META_KEY) == Some(needle.as_str()))
            .cloned())
    }

    fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self.lock()?;
        let id = AccountId::new();
        let external_id = account.external_id.to_string();

        check_unique_external_id(&accounts, id, &external_id)?;
        check_unique_login(&accounts, &account.login_name)?;

        let created = Account {
            id,
            login_name: account.login_name,
            email: None,
            first_name: account.first_name,
            last_name: account.last_name,
            roles: vec![account.role],
            tenants: Vec::new(),
            metadata: BTreeMap::from([(EXTERNAL_ID_META_KEY.to_string(), external_id)]),
        };
        accounts.insert(id, created.clone());

        debug!("created account {} ({})", created.id, created.login_name);

        Ok(created)
    }

    fn update_account(&self, id: AccountId, update: AccountUpdate) -> Result<Account, StoreError> {
        let mut accounts = self.lock()?;

        if let Some(email) = update.email.as_deref().filter(|e| !e.is_empty()) {
            check_unique_email(&accounts, id, email)?;
        }

        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(first_name) = update.first_name {
            account.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            account.last_name = last_name;
        }
        if let Some(email) = update.email {
            account.email = Some(email);
        }

        Ok(account.clone())
    }

    fn set_metadata(&self, id: AccountId, key: &str, value: &str) -> Result<(), StoreError> {
        let mut accounts = self.lock()?;

        if key == EXTERNAL_ID_META_KEY {
            check_unique_external_id(&accounts, id, value)?;
        }

        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn username_exists(&self, login_name: &str) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .values()
            .any(|a| a.login_name == login_name))
    }

    fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.values().any(|a| {
            a.email
                .as_deref()
                .is_some_and(|existing| existing.eq_ignore_ascii_case(email))
        }))
    }

    fn account_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }
}
