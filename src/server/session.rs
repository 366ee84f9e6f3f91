//! Cookie sessions for the HTTP adapter.
//!
//! The browser gets a random token; only its SHA-256 hash is kept in the
//! registry.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::login::{Account, AccountId, SessionContext, SessionError};

pub const SESSION_COOKIE_NAME: &str = "tglogin_session";

/// Generate a random session token for cookies.
///
/// # Errors
/// Returns `SessionError` if the OS random source fails.
pub fn generate_session_token() -> Result<String, SessionError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| SessionError(format!("failed to generate session token: {err}")))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session token so the raw token never leaves the response.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// `Set-Cookie` value for a new session.
///
/// # Errors
/// Returns `InvalidHeaderValue` if the token contains non-header characters.
pub fn session_cookie(
    token: &str,
    ttl_seconds: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(COOKIE)?.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

#[derive(Debug)]
struct SessionRecord {
    account_id: AccountId,
    expires_at: Instant,
}

/// In-process session table keyed by token hash.
#[derive(Debug)]
pub struct SessionRegistry {
    ttl: Duration,
    sessions: Mutex<HashMap<Vec<u8>, SessionRecord>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a session for `account_id` and return the raw token.
    ///
    /// # Errors
    /// Returns `SessionError` if the token cannot be generated or the table is poisoned.
    pub fn issue(&self, account_id: AccountId) -> Result<String, SessionError> {
        let token = generate_session_token()?;
        let now = Instant::now();
        let record = SessionRecord {
            account_id,
            expires_at: now + self.ttl,
        };

        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| SessionError("session registry unavailable".to_string()))?;
        // Expired sessions are dropped on every issue.
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(hash_session_token(&token), record);

        debug!("issued session for {account_id}");
        Ok(token)
    }

    /// Account bound to `token`, if the session exists and has not expired.
    #[must_use]
    pub fn lookup(&self, token: &str) -> Option<AccountId> {
        let mut sessions = self.sessions.lock().ok()?;
        let key = hash_session_token(token);
        match sessions.get(&key) {
            Some(record) if record.expires_at > Instant::now() => Some(record.account_id),
            Some(_) => {
                sessions.remove(&key);
                None
            }
            None => None,
        }
    }
}

/// [`SessionContext`] bound to one HTTP request.
#[derive(Debug)]
pub struct CookieSession {
    registry: Arc<SessionRegistry>,
    current: Option<Account>,
    issued: Option<String>,
}

impl CookieSession {
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, current: Option<Account>) -> Self {
        Self {
            registry,
            current,
            issued: None,
        }
    }

    /// Raw token of the session issued during this request.
    #[must_use]
    pub fn issued_token(&self) -> Option<&str> {
        self.issued.as_deref()
    }
}

impl SessionContext for CookieSession {
    fn current_account(&self) -> Option<&Account> {
        self.current.as_ref()
    }

    fn establish(&mut self, account: &Account) -> Result<(), SessionError> {
        let token = self.registry.issue(account.id)?;
        self.issued = Some(token);
        self.current = Some(account.clone());
        Ok(())
    }
}
