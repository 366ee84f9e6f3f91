//! Telegram Login Widget verification and account reconciliation.
//!
//! Entry point is [`LoginOrchestrator::handle`]. The building blocks are public
//! so integrators can drive individual steps (for instance signing payloads
//! in their own tests with [`compute_hash`]).

pub mod allocator;
pub mod config;
pub mod error;
pub mod freshness;
pub mod hooks;
pub mod memory;
pub mod orchestrator;
pub mod payload;
pub mod reconciler;
pub mod redirect;
pub mod resolver;
pub mod sanitize;
pub mod signature;
pub mod store;

pub use config::{LoginConfig, RolePolicy, SiteUrls};
pub use error::{ErrorKind, LoginError};
pub use freshness::{Clock, SystemClock, MAX_AUTH_AGE_SECONDS};
pub use hooks::{LoginHook, LoginHooks, TracingHook};
pub use memory::MemoryStore;
pub use orchestrator::{LoginOrchestrator, LoginOutcome, LoginSuccess, REDIRECT_PARAM};
pub use payload::{ExternalIdentity, VerifiedIdentity, DEFAULT_ACTION_MARKER};
pub use resolver::ReconciliationDecision;
pub use signature::{compute_hash, data_check_string};
pub use store::{
    Account, AccountId, AccountUpdate, NewAccount, RequestSession, SessionContext, SessionError,
    StoreError, UserStore, EXTERNAL_ID_META_KEY, EXTERNAL_USERNAME_META_KEY,
};
