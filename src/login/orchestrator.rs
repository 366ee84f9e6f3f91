//! One login attempt, end to end.
//!
//! `shape check -> signature -> freshness -> resolve -> reconcile -> session
//! -> random email -> redirect`. Any error aborts the attempt; nothing after
//! the failing step runs.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::allocator::{allocation_limit, unique_email};
use super::config::LoginConfig;
use super::error::LoginError;
use super::freshness::{check_freshness, Clock, SystemClock};
use super::hooks::LoginHooks;
use super::payload::{is_login_request, parse_auth_date, ExternalIdentity, VerifiedIdentity};
use super::reconciler::{reconcile, Reconciled};
use super::redirect::redirect_target;
use super::resolver::resolve;
use super::signature;
use super::store::{Account, AccountUpdate, SessionContext, UserStore};

/// Query argument carrying the requested post-login target.
pub const REDIRECT_PARAM: &str = "redirect_to";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub account: Account,
    /// Absolute URL to redirect to.
    pub redirect_to: String,
    pub created: bool,
    /// False when the request already carried an authenticated session.
    pub session_established: bool,
    pub decision: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Not a login attempt, or the flow is disabled.
    Ignored,
    Completed(LoginSuccess),
}

#[derive(Clone)]
pub struct LoginOrchestrator {
    config: LoginConfig,
    store: Arc<dyn UserStore>,
    hooks: LoginHooks,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LoginOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginOrchestrator")
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl LoginOrchestrator {
    #[must_use]
    pub fn new(config: LoginConfig, store: Arc<dyn UserStore>) -> Self {
        Self {
            config,
            store,
            hooks: LoginHooks::new(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: LoginHooks) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &LoginConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Run a login attempt for the callback `query`.
    ///
    /// # Errors
    /// Any [`LoginError`]; the attempt is over and no redirect must be issued.
    #[instrument(skip_all)]
    pub fn handle(
        &self,
        query: &HashMap<String, String>,
        session: &mut dyn SessionContext,
    ) -> Result<LoginOutcome, LoginError> {
        let Some(bot_token) = self.config.bot_token() else {
            debug!("bot token not configured, telegram login disabled");
            return Ok(LoginOutcome::Ignored);
        };

        if !is_login_request(query, self.config.action_marker()) {
            return Ok(LoginOutcome::Ignored);
        }

        let payload = ExternalIdentity::from_query(query);
        self.hooks.before_verify(&payload);

        let fields = signature::verify(payload, bot_token)?;
        check_freshness(parse_auth_date(&fields)?, self.clock.now())?;
        let identity = VerifiedIdentity::from_verified(&fields)?;

        self.hooks.pre_save(&identity);

        let current = session.current_account().cloned();
        let signup_disabled = self
            .hooks
            .disable_signup(!self.config.signup_enabled(), &identity);
        let decision = resolve(
            self.store.as_ref(),
            &identity,
            current.as_ref(),
            !signup_disabled,
        )?;
        let label = decision.label();

        let Reconciled {
            mut account,
            created,
        } = reconcile(self.store.as_ref(), &self.config, &identity, decision)?;

        self.hooks.after_save(&account, &identity);

        let session_established = current.is_none();
        if session_established {
            self.hooks.before_login(&account);
            session
                .establish(&account)
                .map_err(|err| LoginError::SessionFailed(err.to_string()))?;
            self.hooks.after_login(&account);
        }

        if self.config.random_email() && !account.has_email() {
            account = self.assign_random_email(&account)?;
        }

        let requested = self
            .hooks
            .redirect_to(query.get(REDIRECT_PARAM).cloned(), &account);
        let redirect_to = redirect_target(requested.as_deref(), &account, &self.config);
        self.hooks.before_redirect(&account, &redirect_to);

        info!(
            account_id = %account.id,
            external_id = identity.id(),
            decision = label,
            created,
            "telegram login completed"
        );

        Ok(LoginOutcome::Completed(LoginSuccess {
            account,
            redirect_to,
            created,
            session_established,
            decision: label,
        }))
    }

    fn assign_random_email(&self, account: &Account) -> Result<Account, LoginError> {
        let store = self.store.as_ref();
        let local_part = self
            .hooks
            .random_email_local_part(self.config.email_local_part().to_string(), account);
        let host = self
            .hooks
            .random_email_host(self.config.email_host().to_string(), account);

        let limit = allocation_limit(store)?;
        let email = unique_email(&local_part, &host, limit, |candidate| {
            store.email_exists(candidate)
        })?;
        let email = self.hooks.random_email(email, account);

        debug!("assigning generated email {email} to {}", account.id);

        store
            .update_account(account.id, AccountUpdate::email(&email))
            .map_err(|err| LoginError::AccountUpdateFailed(err.to_string()))
    }
}
