//! Collision-free login names and emails.
//!
//! The base value is tried first, then `base1`, `base2`, ... (for emails the
//! counter goes between the local part and `@`). The counter lives on the
//! stack of each call, and the loop is bounded by `limit`.

use tracing::debug;

use super::error::LoginError;
use super::store::{StoreError, UserStore};

fn allocate<F>(
    base: &str,
    limit: usize,
    candidate: impl Fn(usize) -> String,
    exists: F,
) -> Result<String, LoginError>
where
    F: Fn(&str) -> Result<bool, StoreError>,
{
    let first = candidate(0);
    if !exists(&first)? {
        return Ok(first);
    }

    for counter in 1..=limit {
        let next = candidate(counter);
        if !exists(&next)? {
            debug!("allocated {next} after {counter} attempts");
            return Ok(next);
        }
    }

    Err(LoginError::AllocationExhausted {
        base: base.to_string(),
    })
}

/// First free login name among `base`, `base1` .. `base{limit}`.
///
/// # Errors
/// Returns `LoginError::AllocationExhausted` when every candidate is taken,
/// or a store error from `exists`.
pub fn unique_username<F>(base: &str, limit: usize, exists: F) -> Result<String, LoginError>
where
    F: Fn(&str) -> Result<bool, StoreError>,
{
    allocate(
        base,
        limit,
        |counter| {
            if counter == 0 {
                base.to_string()
            } else {
                format!("{base}{counter}")
            }
        },
        exists,
    )
}

/// First free address among `local@host`, `local1@host` .. `local{limit}@host`.
///
/// # Errors
/// Returns `LoginError::AllocationExhausted` when every candidate is taken,
/// or a store error from `exists`.
pub fn unique_email<F>(
    local_part: &str,
    host: &str,
    limit: usize,
    exists: F,
) -> Result<String, LoginError>
where
    F: Fn(&str) -> Result<bool, StoreError>,
{
    allocate(
        &format!("{local_part}@{host}"),
        limit,
        |counter| {
            if counter == 0 {
                format!("{local_part}@{host}")
            } else {
                format!("{local_part}{counter}@{host}")
            }
        },
        exists,
    )
}

/// Upper bound for the counter: with `n` accounts at most `n` candidates can
/// collide, so `n + 1` always leaves a free one.
///
/// # Errors
/// Returns a store error if the account count is unavailable.
pub fn allocation_limit(store: &dyn UserStore) -> Result<usize, LoginError> {
    Ok(store.account_count()?.saturating_add(1))
}
