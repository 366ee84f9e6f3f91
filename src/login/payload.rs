//! Inbound widget payload and its verified form.

use std::collections::{BTreeMap, HashMap};

use super::error::LoginError;
use super::sanitize::escape_html;

/// Fields the widget signs. Anything else in the query string is dropped
/// before verification.
pub const ALLOWED_FIELDS: [&str; 7] = [
    "id",
    "first_name",
    "last_name",
    "username",
    "photo_url",
    "auth_date",
    "hash",
];

pub const DEFAULT_ACTION_MARKER: &str = "telegram_login";

/// True when the query carries `action`, `hash` and `auth_date`, with
/// `action` equal to the configured marker. Anything else is not a login
/// attempt and must be ignored rather than rejected.
#[must_use]
pub fn is_login_request(query: &HashMap<String, String>, action_marker: &str) -> bool {
    query.contains_key("hash")
        && query.contains_key("auth_date")
        && query.get("action").is_some_and(|action| action == action_marker)
}

/// Raw payload restricted to the allowed fields. Not trusted until verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    fields: BTreeMap<String, String>,
}

impl ExternalIdentity {
    #[must_use]
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let fields = query
            .iter()
            .filter(|(key, _)| ALLOWED_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { fields }
    }

    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.fields.get("hash").map(String::as_str)
    }

    pub(crate) fn into_fields(self) -> BTreeMap<String, String> {
        self.fields
    }
}

/// Identity that passed the signature and freshness checks.
///
/// Values are HTML-escaped; empty optional values are normalized to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    id: i64,
    first_name: String,
    last_name: Option<String>,
    username: Option<String>,
    photo_url: Option<String>,
    auth_date: i64,
}

impl VerifiedIdentity {
    /// Build from a map that has already been verified and checked for
    /// freshness. Only the login pipeline calls this.
    pub(crate) fn from_verified(fields: &BTreeMap<String, String>) -> Result<Self, LoginError> {
        let escaped = |key: &str| -> Option<String> {
            fields
                .get(key)
                .map(|value| escape_html(value.trim()))
                .filter(|value| !value.is_empty())
        };

        let id = fields
            .get("id")
            .and_then(|value| value.trim().parse::<i64>().ok())
            .ok_or_else(|| LoginError::InvalidPayload("missing or non-numeric id".to_string()))?;

        let first_name = escaped("first_name")
            .ok_or_else(|| LoginError::InvalidPayload("missing first_name".to_string()))?;

        Ok(Self {
            id,
            first_name,
            last_name: escaped("last_name"),
            username: escaped("username"),
            photo_url: escaped("photo_url"),
            auth_date: parse_auth_date(fields)?,
        })
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[must_use]
    pub fn photo_url(&self) -> Option<&str> {
        self.photo_url.as_deref()
    }

    #[must_use]
    pub fn auth_date(&self) -> i64 {
        self.auth_date
    }
}

pub(crate) fn parse_auth_date(fields: &BTreeMap<String, String>) -> Result<i64, LoginError> {
    fields
        .get("auth_date")
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| LoginError::InvalidPayload("missing or non-numeric auth_date".to_string()))
}
