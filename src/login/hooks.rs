//! Extension points around a login attempt.
//!
//! Hooks run in registration order. Observers receive a borrowed view of the
//! attempt at a named phase and return nothing:
//!
//! | phase             | input                         | fires                              |
//! |-------------------|-------------------------------|------------------------------------|
//! | `before_verify`   | filtered payload              | before the signature check         |
//! | `pre_save`        | verified identity             | before any store mutation          |
//! | `after_save`      | saved account, identity       | after names and metadata are saved |
//! | `before_login`    | account                       | before a new session is issued     |
//! | `after_login`     | account                       | after a new session is issued      |
//! | `before_redirect` | account, redirect target      | once the target is computed        |
//!
//! Filters receive the current value and return the value to use; each hook
//! sees the previous hook's output. The defaults return the input unchanged.
//!
//! | filter                    | value in / out                 | context            | applied                                 |
//! |---------------------------|--------------------------------|--------------------|-----------------------------------------|
//! | `disable_signup`          | `bool`, configured policy      | verified identity  | before the reconciliation decision      |
//! | `random_email_host`       | `String`, configured host      | account            | before a random e-mail is allocated     |
//! | `random_email_local_part` | `String`, configured local part | account           | before a random e-mail is allocated     |
//! | `random_email`            | `String`, allocated address    | account            | before the address is stored            |
//! | `redirect_to`             | `Option<String>`, requested    | account            | before admin-root and same-host checks  |

use std::sync::Arc;
use tracing::info;

use super::payload::{ExternalIdentity, VerifiedIdentity};
use super::store::Account;

pub trait LoginHook: Send + Sync {
    fn before_verify(&self, _payload: &ExternalIdentity) {}
    fn pre_save(&self, _identity: &VerifiedIdentity) {}
    fn after_save(&self, _account: &Account, _identity: &VerifiedIdentity) {}
    fn before_login(&self, _account: &Account) {}
    fn after_login(&self, _account: &Account) {}
    fn before_redirect(&self, _account: &Account, _target: &str) {}

    fn disable_signup(&self, disabled: bool, _identity: &VerifiedIdentity) -> bool {
        disabled
    }
    fn random_email_host(&self, host: String, _account: &Account) -> String {
        host
    }
    fn random_email_local_part(&self, local_part: String, _account: &Account) -> String {
        local_part
    }
    fn random_email(&self, email: String, _account: &Account) -> String {
        email
    }
    /// The returned target still goes through the same-host check.
    fn redirect_to(&self, requested: Option<String>, _account: &Account) -> Option<String> {
        requested
    }
}

#[derive(Clone, Default)]
pub struct LoginHooks {
    hooks: Vec<Arc<dyn LoginHook>>,
}

impl std::fmt::Debug for LoginHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginHooks")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl LoginHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, hook: Arc<dyn LoginHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub(crate) fn before_verify(&self, payload: &ExternalIdentity) {
        self.hooks.iter().for_each(|h| h.before_verify(payload));
    }

    pub(crate) fn pre_save(&self, identity: &VerifiedIdentity) {
        self.hooks.iter().for_each(|h| h.pre_save(identity));
    }

    pub(crate) fn after_save(&self, account: &Account, identity: &VerifiedIdentity) {
        self.hooks
            .iter()
            .for_each(|h| h.after_save(account, identity));
    }

    pub(crate) fn before_login(&self, account: &Account) {
        self.hooks.iter().for_each(|h| h.before_login(account));
    }

    pub(crate) fn after_login(&self, account: &Account) {
        self.hooks.iter().for_each(|h| h.after_login(account));
    }

    pub(crate) fn before_redirect(&self, account: &Account, target: &str) {
        self.hooks
            .iter()
            .for_each(|h| h.before_redirect(account, target));
    }

    pub(crate) fn disable_signup(&self, disabled: bool, identity: &VerifiedIdentity) -> bool {
        self.hooks
            .iter()
            .fold(disabled, |value, h| h.disable_signup(value, identity))
    }

    pub(crate) fn random_email_host(&self, host: String, account: &Account) -> String {
        self.hooks
            .iter()
            .fold(host, |value, h| h.random_email_host(value, account))
    }

    pub(crate) fn random_email_local_part(&self, local_part: String, account: &Account) -> String {
        self.hooks
            .iter()
            .fold(local_part, |value, h| h.random_email_local_part(value, account))
    }

    pub(crate) fn random_email(&self, email: String, account: &Account) -> String {
        self.hooks
            .iter()
            .fold(email, |value, h| h.random_email(value, account))
    }

    pub(crate) fn redirect_to(&self, requested: Option<String>, account: &Account) -> Option<String> {
        self.hooks
            .iter()
            .fold(requested, |value, h| h.redirect_to(value, account))
    }
}

/// Logs every phase as a structured event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingHook;

impl LoginHook for TracingHook {
    fn pre_save(&self, identity: &VerifiedIdentity) {
        info!(external_id = identity.id(), "telegram identity verified");
    }

    fn after_save(&self, account: &Account, identity: &VerifiedIdentity) {
        info!(
            account_id = %account.id,
            external_id = identity.id(),
            "telegram identity saved"
        );
    }

    fn after_login(&self, account: &Account) {
        info!(account_id = %account.id, login = %account.login_name, "user logged in via telegram");
    }

    fn before_redirect(&self, account: &Account, target: &str) {
        info!(account_id = %account.id, target, "redirecting after telegram login");
    }
}


#[cfg(test)]
mod tests {
    use super::recording::RecordingHook;
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn hooks_run_in_registration_order() {
        let first = Arc::new(RecordingHook::default());
        let second = Arc::new(RecordingHook::default());
        let hooks = LoginHooks::new()
            .with(first.clone())
            .with(Arc::new(TracingHook))
            .with(second.clone());
        assert_eq!(hooks.len(), 3);

        let payload = ExternalIdentity::from_query(&HashMap::new());
        hooks.before_verify(&payload);

        assert_eq!(first.phases(), vec!["before_verify".to_string()]);
        assert_eq!(second.phases(), vec!["before_verify".to_string()]);
    }

    #[test]
    fn empty_hooks_are_a_noop() {
        let hooks = LoginHooks::new();
        assert!(hooks.is_empty());
        hooks.before_verify(&ExternalIdentity::from_query(&HashMap::new()));
    }

    struct Suffix(&'static str);

    impl LoginHook for Suffix {
        fn random_email_host(&self, host: String, _account: &Account) -> String {
            format!("{host}{}", self.0)
        }
    }

    #[test]
    fn filters_chain_in_registration_order() {
        let account = Account {
            id: crate::login::store::AccountId::new(),
            login_name: "alice".to_string(),
            email: None,
            first_name: "Alice".to_string(),
            last_name: String::new(),
            roles: Vec::new(),
            tenants: Vec::new(),
            metadata: std::collections::BTreeMap::new(),
        };
        let hooks = LoginHooks::new()
            .with(Arc::new(Suffix(".a")))
            .with(Arc::new(TracingHook))
            .with(Arc::new(Suffix(".b")));

        assert_eq!(
            hooks.random_email_host("example.com".to_string(), &account),
            "example.com.a.b"
        );
        // Hooks without an override pass values through.
        assert_eq!(
            hooks.redirect_to(Some("/x".to_string()), &account),
            Some("/x".to_string())
        );
        assert_eq!(
            hooks.random_email_local_part("auto-generated".to_string(), &account),
            "auto-generated"
        );
    }
}
