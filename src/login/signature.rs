//! Widget payload signature check.
//!
//! `secret = SHA-256(bot_token)` (raw bytes) and
//! `hash = hex(HMAC-SHA256(secret, data_check_string))`, where the data check
//! string is every `key=value` pair except `hash`, sorted as whole strings and
//! joined with `\n`.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use super::error::LoginError;
use super::payload::ExternalIdentity;

type HmacSha256 = Hmac<Sha256>;

/// Build the string the widget signs. `hash` is never part of it.
#[must_use]
pub fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    let mut pairs: Vec<String> = fields
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    pairs.sort();
    pairs.join("\n")
}

fn secret_key(bot_token: &SecretString) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(bot_token.expose_secret().as_bytes());
    hasher.finalize().to_vec()
}

fn mac(bot_token: &SecretString, data_check: &str) -> Result<HmacSha256, LoginError> {
    let mut mac = HmacSha256::new_from_slice(&secret_key(bot_token))
        .map_err(|_| LoginError::Unauthorized)?;
    mac.update(data_check.as_bytes());
    Ok(mac)
}

/// Lowercase hex signature for `data_check`, as the widget computes it.
///
/// # Errors
/// Only fails if the HMAC key is rejected, which SHA-256 output never is.
pub fn compute_hash(bot_token: &SecretString, data_check: &str) -> Result<String, LoginError> {
    Ok(hex::encode(mac(bot_token, data_check)?.finalize().into_bytes()))
}

/// Verify the payload signature and return the fields without `hash`.
///
/// # Errors
/// Returns `LoginError::Unauthorized` when `hash` is missing, is not lowercase
/// hex, or does not match.
#[instrument(skip_all)]
pub fn verify(
    identity: ExternalIdentity,
    bot_token: &SecretString,
) -> Result<BTreeMap<String, String>, LoginError> {
    let mut fields = identity.into_fields();
    let supplied = fields.remove("hash").ok_or(LoginError::Unauthorized)?;

    if supplied.bytes().any(|b| b.is_ascii_uppercase()) {
        debug!("rejecting non-lowercase hash");
        return Err(LoginError::Unauthorized);
    }
    let supplied = hex::decode(&supplied).map_err(|_| LoginError::Unauthorized)?;

    mac(bot_token, &data_check_string(&fields))?
        .verify_slice(&supplied)
        .map_err(|_| {
            debug!("signature mismatch");
            LoginError::Unauthorized
        })?;

    Ok(fields)
}
