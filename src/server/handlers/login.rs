use axum::{
    extract::{Extension, Query},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::login::{Account, ErrorKind, LoginError, LoginOutcome, LoginSuccess};
use crate::server::{
    session::{extract_session_token, session_cookie, CookieSession},
    ServerState,
};

#[utoipa::path(
    get,
    path = "/login/telegram",
    params(
        ("action" = String, Query, description = "Login marker, `telegram_login`"),
        ("id" = i64, Query, description = "Telegram user id"),
        ("first_name" = String, Query, description = "First name"),
        ("last_name" = Option<String>, Query, description = "Last name"),
        ("username" = Option<String>, Query, description = "Telegram username"),
        ("photo_url" = Option<String>, Query, description = "Avatar URL"),
        ("auth_date" = i64, Query, description = "Unix time of the authorization"),
        ("hash" = String, Query, description = "Widget signature, lowercase hex"),
        ("redirect_to" = Option<String>, Query, description = "Target after login"),
    ),
    responses(
        (status = 204, description = "Not a login attempt"),
        (status = 302, description = "Login completed, redirecting"),
        (status = 400, description = "Malformed login data", body = String),
        (status = 401, description = "Bad signature or outdated login data", body = String),
        (status = 403, description = "Signup disabled", body = String),
        (status = 409, description = "Telegram account linked to another user", body = String),
        (status = 500, description = "Store or session failure", body = String)
    ),
    tag = "login"
)]
pub async fn telegram_login(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    state: Extension<Arc<ServerState>>,
) -> Response {
    let state = state.0;
    let token = extract_session_token(&headers);

    // The login core is synchronous; run it off the async workers.
    let worker_state = state.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let current = token.and_then(|token| current_account(&worker_state, &token));
        let mut session = CookieSession::new(worker_state.sessions().clone(), current);
        let outcome = worker_state.orchestrator().handle(&query, &mut session);
        (outcome, session)
    })
    .await;

    let (outcome, session) = match joined {
        Ok(result) => result,
        Err(err) => {
            error!("Login task failed: {}", err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                LoginError::SessionFailed(err.to_string()).user_message(),
            )
                .into_response();
        }
    };

    match outcome {
        Ok(LoginOutcome::Ignored) => StatusCode::NO_CONTENT.into_response(),
        Ok(LoginOutcome::Completed(success)) => redirect_response(&state, &success, &session),
        Err(err) => login_error_response(&err),
    }
}

fn current_account(state: &ServerState, token: &str) -> Option<Account> {
    let account_id = state.sessions().lookup(token)?;
    match state.orchestrator().store().find_account(account_id) {
        Ok(account) => account,
        Err(err) => {
            warn!("Failed to load session account {}: {}", account_id, err);
            None
        }
    }
}

fn redirect_response(state: &ServerState, success: &LoginSuccess, session: &CookieSession) -> Response {
    let Ok(location) = HeaderValue::from_str(&success.redirect_to) else {
        error!("Invalid redirect target: {}", success.redirect_to);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Invalid redirect target".to_string(),
        )
            .into_response();
    };

    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, location);

    if let Some(token) = session.issued_token() {
        match session_cookie(
            token,
            state.sessions().ttl().as_secs(),
            state.session_cookie_secure(),
        ) {
            Ok(cookie) => {
                headers.insert(SET_COOKIE, cookie);
            }
            Err(err) => {
                error!("Failed to build session cookie: {}", err);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    LoginError::SessionFailed(err.to_string()).user_message(),
                )
                    .into_response();
            }
        }
    }

    debug!(
        "login {} for {}, redirecting to {}",
        success.decision, success.account.id, success.redirect_to
    );

    (StatusCode::FOUND, headers).into_response()
}

fn login_error_response(err: &LoginError) -> Response {
    match err.kind() {
        ErrorKind::Invalid => debug!("Rejected login payload: {}", err),
        ErrorKind::Rejected => info!("Login refused: {}", err),
        ErrorKind::Failure => error!("Login failed: {}", err),
    }
    (err.status_code(), err.user_message()).into_response()
}
