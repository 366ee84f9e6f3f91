//! # tglogin (Telegram Login Widget authority)
//!
//! `tglogin` verifies identity assertions delivered by the Telegram Login Widget
//! redirect callback and reconciles them with a local account store, exactly
//! once per login attempt.
//!
//! ## Verification
//!
//! The widget signs every payload with `HMAC-SHA256(SHA-256(bot_token), data)`
//! where `data` is the sorted, newline-joined list of `key=value` pairs. Only the
//! seven widget fields take part; anything else in the query string is dropped
//! before the signature is computed. Payloads older than 24 hours are rejected.
//!
//! ## Reconciliation
//!
//! A verified identity is mapped to a local account in a fixed order:
//!
//! - **Logged-in session:** the session account is (re)linked, unless the
//!   external id already belongs to someone else.
//! - **Returning user:** the account carrying the external id is refreshed.
//! - **New user:** an account is created with a collision-free login name,
//!   unless signup is disabled.
//!
//! The store is an abstract collaborator ([`login::UserStore`]); an in-process
//! [`login::MemoryStore`] backs the bundled HTTP server and the tests.

pub mod cli;
pub mod login;
pub mod server;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
