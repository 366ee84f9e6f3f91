//! Map a verified identity to a reconciliation decision.
//!
//! Order matters: a logged-in session wins over a store match, and a store
//! match wins over creating a new account.

use tracing::{debug, instrument, warn};

use super::error::LoginError;
use super::payload::VerifiedIdentity;
use super::store::{Account, UserStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationDecision {
    /// The session account already carries this identity; refresh it.
    UseExistingSession(Account),
    /// Refresh the account and (re)link the identity to it. Used for a
    /// returning user and for a session account not linked to this identity.
    AttachToExistingExternalUser(Account),
    CreateNewAccount,
    RejectSignupDisabled,
}

impl ReconciliationDecision {
    /// The existing account the decision targets, if any.
    #[must_use]
    pub fn target(&self) -> Option<&Account> {
        match self {
            Self::UseExistingSession(account) | Self::AttachToExistingExternalUser(account) => {
                Some(account)
            }
            Self::CreateNewAccount | Self::RejectSignupDisabled => None,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::UseExistingSession(_) => "use_existing_session",
            Self::AttachToExistingExternalUser(_) => "attach_existing",
            Self::CreateNewAccount => "create",
            Self::RejectSignupDisabled => "signup_disabled",
        }
    }
}

/// Pure decision from the session account and the store match.
///
/// # Errors
/// Returns `LoginError::ExternalIdConflict` when the identity is already
/// linked to an account other than the session's.
pub fn decide(
    current: Option<&Account>,
    returning: Option<Account>,
    signup_enabled: bool,
) -> Result<ReconciliationDecision, LoginError> {
    if let Some(current) = current {
        return match returning {
            Some(returning) if returning.id != current.id => Err(LoginError::ExternalIdConflict),
            // Already linked to the session account.
            Some(_) => Ok(ReconciliationDecision::UseExistingSession(current.clone())),
            None => Ok(ReconciliationDecision::AttachToExistingExternalUser(
                current.clone(),
            )),
        };
    }

    if let Some(returning) = returning {
        return Ok(ReconciliationDecision::AttachToExistingExternalUser(
            returning,
        ));
    }

    if signup_enabled {
        Ok(ReconciliationDecision::CreateNewAccount)
    } else {
        Ok(ReconciliationDecision::RejectSignupDisabled)
    }
}

/// Look up the returning account, then decide.
///
/// # Errors
/// Returns `LoginError::ExternalIdConflict` (see [`decide`]) or a store error.
#[instrument(skip_all, fields(external_id = identity.id()))]
pub fn resolve(
    store: &dyn UserStore,
    identity: &VerifiedIdentity,
    current: Option<&Account>,
    signup_enabled: bool,
) -> Result<ReconciliationDecision, LoginError> {
    let returning = store.find_by_external_id(identity.id())?;

    if let Some(current) = current {
        if let Some(linked) = current.external_id().filter(|id| *id != identity.id()) {
            warn!(
                "session account {} is linked to external id {}, relinking",
                current.id, linked
            );
        }
    }

    let decision = decide(current, returning, signup_enabled)?;
    debug!("decision: {}", decision.label());
    Ok(decision)
}
