//! Error taxonomy for a single login attempt.
//!
//! Every variant is terminal for the attempt. [`LoginError::kind`] separates
//! business rejections the caller may explain to the user from payload
//! problems and store-level failures.

use axum::http::StatusCode;
use thiserror::Error;

use super::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Signature or freshness checks failed, or the signed payload is malformed.
    Invalid,
    /// A business rule refused the login (conflict, signup disabled).
    Rejected,
    /// The store or session layer failed.
    Failure,
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Unauthorized: the login data is not signed by Telegram")]
    Unauthorized,
    #[error("The login data is outdated, please sign in again")]
    Expired,
    #[error("Invalid login data: {0}")]
    InvalidPayload(String),
    #[error("This Telegram account is already linked to another user, please contact the administrator")]
    ExternalIdConflict,
    #[error("Sign up via Telegram is disabled, create an account and connect it to Telegram first")]
    SignupDisabled,
    #[error("Telegram sign in could not be completed: {0}")]
    AccountCreationFailed(String),
    #[error("Telegram sign in could not be completed: {0}")]
    AccountUpdateFailed(String),
    #[error("Unable to find a free value for {base:?}")]
    AllocationExhausted { base: String },
    #[error("Session could not be established: {0}")]
    SessionFailed(String),
    #[error("User store error: {0}")]
    Store(#[from] StoreError),
}

impl LoginError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized | Self::Expired | Self::InvalidPayload(_) => ErrorKind::Invalid,
            Self::ExternalIdConflict | Self::SignupDisabled => ErrorKind::Rejected,
            Self::AccountCreationFailed(_)
            | Self::AccountUpdateFailed(_)
            | Self::AllocationExhausted { .. }
            | Self::SessionFailed(_)
            | Self::Store(_) => ErrorKind::Failure,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::Expired => StatusCode::UNAUTHORIZED,
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::ExternalIdConflict => StatusCode::CONFLICT,
            Self::SignupDisabled => StatusCode::FORBIDDEN,
            Self::AccountCreationFailed(_)
            | Self::AccountUpdateFailed(_)
            | Self::AllocationExhausted { .. }
            | Self::SessionFailed(_)
            | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the end user. Store details stay in the logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Store(_) | Self::SessionFailed(_) | Self::AllocationExhausted { .. } => {
                "Telegram sign in could not be completed, please try again later".to_string()
            }
            other => other.to_string(),
        }
    }
}
