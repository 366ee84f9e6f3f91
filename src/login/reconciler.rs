//! Apply a [`ReconciliationDecision`] to the user store.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use tracing::{debug, info, instrument, warn};

use super::allocator::{allocation_limit, unique_username};
use super::config::LoginConfig;
use super::error::LoginError;
use super::payload::VerifiedIdentity;
use super::resolver::ReconciliationDecision;
use super::sanitize::{sanitize_login_name, sanitize_url};
use super::store::{
    Account, AccountId, AccountUpdate, NewAccount, StoreError, UserStore, EXTERNAL_ID_META_KEY,
    EXTERNAL_USERNAME_META_KEY,
};

const CREDENTIAL_BYTES: usize = 24;

/// Account after reconciliation, re-read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub account: Account,
    pub created: bool,
}

/// Execute `decision` for `identity`.
///
/// # Errors
/// - `SignupDisabled` for [`ReconciliationDecision::RejectSignupDisabled`], without touching the store.
/// - `AccountCreationFailed` / `AccountUpdateFailed` when the store refuses the write.
/// - `ExternalIdConflict` when the external id got linked elsewhere meanwhile.
#[instrument(skip_all, fields(external_id = identity.id(), decision = decision.label()))]
pub fn reconcile(
    store: &dyn UserStore,
    config: &LoginConfig,
    identity: &VerifiedIdentity,
    decision: ReconciliationDecision,
) -> Result<Reconciled, LoginError> {
    let (id, created) = match decision {
        ReconciliationDecision::RejectSignupDisabled => return Err(LoginError::SignupDisabled),
        ReconciliationDecision::CreateNewAccount => create(store, config, identity)?,
        ReconciliationDecision::UseExistingSession(account)
        | ReconciliationDecision::AttachToExistingExternalUser(account) => {
            (attach(store, account.id, identity)?, false)
        }
    };

    write_metadata(store, config, id, identity)?;

    let account = store.find_account(id)?.ok_or(StoreError::NotFound)?;
    Ok(Reconciled { account, created })
}

/// Login name derived from the payload, before uniqueness is resolved.
#[must_use]
pub fn base_login_name(identity: &VerifiedIdentity) -> String {
    match identity.username() {
        Some(username) => username.to_string(),
        None => sanitize_login_name(&format!("{}{}", identity.first_name(), identity.id())),
    }
}

fn create(
    store: &dyn UserStore,
    config: &LoginConfig,
    identity: &VerifiedIdentity,
) -> Result<(AccountId, bool), LoginError> {
    let base = base_login_name(identity);
    let limit = allocation_limit(store)?;
    let login_name = unique_username(&base, limit, |candidate| store.username_exists(candidate))?;

    let new_account = NewAccount {
        login_name,
        password: random_credential()?,
        first_name: identity.first_name().to_string(),
        last_name: identity.last_name().unwrap_or_default().to_string(),
        role: config.user_role().to_string(),
        external_id: identity.id(),
    };

    let err = match store.create_account(new_account) {
        Ok(account) => {
            info!("created account {} ({})", account.id, account.login_name);
            return Ok((account.id, true));
        }
        Err(err) => err,
    };

    // A concurrent signup for the same id may have won, whatever the store
    // reported first.
    match store.find_by_external_id(identity.id())? {
        Some(winner) => {
            warn!(
                "external id {} was linked concurrently ({err}), attaching to {}",
                identity.id(),
                winner.id
            );
            Ok((attach(store, winner.id, identity)?, false))
        }
        None => Err(LoginError::AccountCreationFailed(err.to_string())),
    }
}

fn attach(
    store: &dyn UserStore,
    id: AccountId,
    identity: &VerifiedIdentity,
) -> Result<AccountId, LoginError> {
    let update = AccountUpdate::names(
        identity.first_name(),
        identity.last_name().unwrap_or_default(),
    );
    let account = store
        .update_account(id, update)
        .map_err(|err| LoginError::AccountUpdateFailed(err.to_string()))?;

    debug!("refreshed names of account {}", account.id);
    Ok(account.id)
}

fn write_metadata(
    store: &dyn UserStore,
    config: &LoginConfig,
    id: AccountId,
    identity: &VerifiedIdentity,
) -> Result<(), LoginError> {
    store
        .set_metadata(id, EXTERNAL_ID_META_KEY, &identity.id().to_string())
        .map_err(|err| match err {
            StoreError::DuplicateExternalId => LoginError::ExternalIdConflict,
            other => LoginError::Store(other),
        })?;

    store.set_metadata(
        id,
        EXTERNAL_USERNAME_META_KEY,
        identity.username().unwrap_or_default(),
    )?;

    if let (Some(photo_url), Some(key)) = (identity.photo_url(), config.avatar_meta_key()) {
        match sanitize_url(photo_url) {
            Some(url) => store.set_metadata(id, key, &url)?,
            None => debug!("dropping unsafe photo_url"),
        }
    }

    Ok(())
}

fn random_credential() -> Result<SecretString, LoginError> {
    let mut bytes = [0u8; CREDENTIAL_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(|err| {
        LoginError::AccountCreationFailed(format!("failed to generate credential: {err}"))
    })?;
    Ok(SecretString::from(Base64UrlUnpadded::encode_string(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::login::memory::MemoryStore;
    use anyhow::Result;
    use secrecy::ExposeSecret;
    use std::collections::BTreeMap;
    use url::Url;

    fn identity(pairs: &[(&str, &str)]) -> Result<VerifiedIdentity> {
        let fields: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Ok(VerifiedIdentity::from_verified(&fields)?)
    }

    fn alice() -> Result<VerifiedIdentity> {
        identity(&[
            ("id", "42"),
            ("first_name", "Alice"),
            ("last_name", "Liddell"),
            ("username", "alice"),
            ("photo_url", "https://t.me/i/userpic/320/alice.jpg"),
            ("auth_date", "1700000000"),
        ])
    }

    fn config() -> Result<LoginConfig> {
        Ok(LoginConfig::new(Url::parse("https://example.com")?)
            .with_avatar_meta_key(Some("avatar_url".to_string())))
    }

    fn local_account(login_name: &str) -> Account {
        Account {
            id: AccountId::new(),
            login_name: login_name.to_string(),
            email: None,
            first_name: "Old".to_string(),
            last_name: "Name".to_string(),
            roles: vec!["editor".to_string()],
            tenants: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn create_links_external_identity() -> Result<()> {
        let store = MemoryStore::new();
        let reconciled = reconcile(
            &store,
            &config()?,
            &alice()?,
            ReconciliationDecision::CreateNewAccount,
        )?;

        assert!(reconciled.created);
        let account = reconciled.account;
        assert_eq!(account.login_name, "alice");
        assert_eq!(account.first_name, "Alice");
        assert_eq!(account.last_name, "Liddell");
        assert_eq!(account.roles, vec!["subscriber".to_string()]);
        assert_eq!(account.external_id(), Some(42));
        assert_eq!(account.external_username(), Some("alice"));
        assert_eq!(
            account.meta("avatar_url"),
            Some("https://t.me/i/userpic/320/alice.jpg")
        );
        Ok(())
    }

    #[test]
    fn create_without_username_uses_sanitized_name_and_counter() -> Result<()> {
        let store = MemoryStore::new();
        store.insert(local_account("Zoe7"))?;

        let identity = identity(&[("id", "7"), ("first_name", "Zoé"), ("auth_date", "1")])?;
        let reconciled = reconcile(
            &store,
            &config()?,
            &identity,
            ReconciliationDecision::CreateNewAccount,
        )?;

        assert_eq!(reconciled.account.login_name, "Zoe71");
        assert_eq!(reconciled.account.external_username(), None);
        assert_eq!(
            reconciled.account.meta(EXTERNAL_USERNAME_META_KEY),
            Some("")
        );
        Ok(())
    }

    #[test]
    fn attach_refreshes_names_and_metadata() -> Result<()> {
        let store = MemoryStore::new();
        let existing = store.insert(local_account("bob"))?;

        let reconciled = reconcile(
            &store,
            &config()?,
            &alice()?,
            ReconciliationDecision::AttachToExistingExternalUser(existing.clone()),
        )?;

        assert!(!reconciled.created);
        assert_eq!(reconciled.account.id, existing.id);
        assert_eq!(reconciled.account.login_name, "bob");
        assert_eq!(reconciled.account.first_name, "Alice");
        assert_eq!(reconciled.account.roles, vec!["editor".to_string()]);
        assert_eq!(reconciled.account.external_id(), Some(42));
        Ok(())
    }

    #[test]
    fn attach_twice_is_idempotent() -> Result<()> {
        let store = MemoryStore::new();
        let existing = store.insert(local_account("bob"))?;
        let config = config()?;
        let identity = alice()?;

        let first = reconcile(
            &store,
            &config,
            &identity,
            ReconciliationDecision::AttachToExistingExternalUser(existing.clone()),
        )?;
        let second = reconcile(
            &store,
            &config,
            &identity,
            ReconciliationDecision::AttachToExistingExternalUser(first.account.clone()),
        )?;

        assert_eq!(first.account.metadata, second.account.metadata);
        assert_eq!(second.account.metadata.len(), 3);
        assert_eq!(store.account_count()?, 1);
        Ok(())
    }

    #[test]
    fn avatar_requires_meta_key() -> Result<()> {
        let store = MemoryStore::new();
        let config = LoginConfig::new(Url::parse("https://example.com")?);
        let reconciled = reconcile(
            &store,
            &config,
            &alice()?,
            ReconciliationDecision::CreateNewAccount,
        )?;
        assert_eq!(reconciled.account.metadata.len(), 2);
        Ok(())
    }

    #[test]
    fn unsafe_photo_url_is_dropped() -> Result<()> {
        let store = MemoryStore::new();
        let identity = identity(&[
            ("id", "9"),
            ("first_name", "Eve"),
            ("photo_url", "javascript:alert(1)"),
            ("auth_date", "1"),
        ])?;
        let reconciled = reconcile(
            &store,
            &config()?,
            &identity,
            ReconciliationDecision::CreateNewAccount,
        )?;
        assert_eq!(reconciled.account.meta("avatar_url"), None);
        Ok(())
    }

    #[test]
    fn signup_disabled_does_not_touch_store() -> Result<()> {
        let store = MemoryStore::new();
        let result = reconcile(
            &store,
            &config()?,
            &alice()?,
            ReconciliationDecision::RejectSignupDisabled,
        );
        assert!(matches!(result, Err(LoginError::SignupDisabled)));
        assert_eq!(store.account_count()?, 0);
        Ok(())
    }

    #[test]
    fn update_failure_is_reported() -> Result<()> {
        let store = MemoryStore::new();
        let ghost = local_account("ghost");
        let result = reconcile(
            &store,
            &config()?,
            &alice()?,
            ReconciliationDecision::AttachToExistingExternalUser(ghost),
        );
        assert!(matches!(result, Err(LoginError::AccountUpdateFailed(_))));
        Ok(())
    }

    #[test]
    fn attach_conflicts_when_id_is_linked_elsewhere() -> Result<()> {
        let store = MemoryStore::new();
        let mut linked = local_account("carol");
        linked
            .metadata
            .insert(EXTERNAL_ID_META_KEY.to_string(), "42".to_string());
        store.insert(linked)?;
        let session = store.insert(local_account("dave"))?;

        let result = reconcile(
            &store,
            &config()?,
            &alice()?,
            ReconciliationDecision::AttachToExistingExternalUser(session),
        );
        assert!(matches!(result, Err(LoginError::ExternalIdConflict)));
        Ok(())
    }

    /// Links the external id to a "winner" right before the first insert.
    struct RacingStore {
        inner: MemoryStore,
        winner: Account,
    }

    impl UserStore for RacingStore {
        fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
            self.inner.find_account(id)
        }
        fn find_by_external_id(&self, external_id: i64) -> Result<Option<Account>, StoreError> {
            self.inner.find_by_external_id(external_id)
        }
        fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
            if self.inner.find_account(self.winner.id)?.is_none() {
                self.inner.insert(self.winner.clone())?;
            }
            self.inner.create_account(account)
        }
        fn update_account(
            &self,
            id: AccountId,
            update: AccountUpdate,
        ) -> Result<Account, StoreError> {
            self.inner.update_account(id, update)
        }
        fn set_metadata(&self, id: AccountId, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set_metadata(id, key, value)
        }
        fn username_exists(&self, login_name: &str) -> Result<bool, StoreError> {
            self.inner.username_exists(login_name)
        }
        fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
            self.inner.email_exists(email)
        }
        fn account_count(&self) -> Result<usize, StoreError> {
            self.inner.account_count()
        }
    }

    #[test]
    fn concurrent_signup_attaches_to_winner() -> Result<()> {
        let mut winner = local_account("alice_winner");
        winner
            .metadata
            .insert(EXTERNAL_ID_META_KEY.to_string(), "42".to_string());
        let store = RacingStore {
            inner: MemoryStore::new(),
            winner: winner.clone(),
        };

        let reconciled = reconcile(
            &store,
            &config()?,
            &alice()?,
            ReconciliationDecision::CreateNewAccount,
        )?;

        assert!(!reconciled.created);
        assert_eq!(reconciled.account.id, winner.id);
        assert_eq!(reconciled.account.first_name, "Alice");
        assert_eq!(store.account_count()?, 1);
        Ok(())
    }

    #[test]
    fn concurrent_signup_with_same_login_name_attaches_to_winner() -> Result<()> {
        // Both attempts derive "alice" from the same payload.
        let mut winner = local_account("alice");
        winner
            .metadata
            .insert(EXTERNAL_ID_META_KEY.to_string(), "42".to_string());
        let store = RacingStore {
            inner: MemoryStore::new(),
            winner: winner.clone(),
        };

        let reconciled = reconcile(
            &store,
            &config()?,
            &alice()?,
            ReconciliationDecision::CreateNewAccount,
        )?;

        assert!(!reconciled.created);
        assert_eq!(reconciled.account.id, winner.id);
        assert_eq!(reconciled.account.login_name, "alice");
        assert_eq!(reconciled.account.external_id(), Some(42));
        assert_eq!(store.account_count()?, 1);
        Ok(())
    }

    #[test]
    fn creation_failure_without_winner_is_reported() -> Result<()> {
        // Taken login name, but nobody owns the external id.
        let store = RacingStore {
            inner: MemoryStore::new(),
            winner: local_account("alice"),
        };

        let result = reconcile(
            &store,
            &config()?,
            &alice()?,
            ReconciliationDecision::CreateNewAccount,
        );
        assert!(matches!(result, Err(LoginError::AccountCreationFailed(_))));
        assert_eq!(store.account_count()?, 1);
        Ok(())
    }

    #[test]
    fn credentials_are_random_and_url_safe() -> Result<()> {
        let first = random_credential()?;
        let second = random_credential()?;
        assert_ne!(first.expose_secret(), second.expose_secret());
        assert_eq!(first.expose_secret().len(), 32);
        assert!(first
            .expose_secret()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        Ok(())
    }
}
