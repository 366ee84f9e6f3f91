use crate::{
    login::{LoginConfig, LoginHooks, LoginOrchestrator, MemoryStore, TracingHook},
    server::{self, ServerState},
};
use anyhow::Result;
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub site_url: Url,
    pub bot_token: Option<SecretString>,
    pub action_marker: String,
    pub random_email: bool,
    pub disable_signup: bool,
    pub user_role: String,
    pub avatar_meta_key: Option<String>,
    pub email_host: Option<String>,
    pub multi_tenant: bool,
    pub session_ttl_seconds: u64,
}

impl Args {
    /// Login configuration derived from the command line.
    #[must_use]
    pub fn login_config(&self) -> LoginConfig {
        let mut config = LoginConfig::new(self.site_url.clone())
            .with_action_marker(self.action_marker.clone())
            .with_random_email(self.random_email)
            .with_disable_signup(self.disable_signup)
            .with_user_role(self.user_role.clone())
            .with_avatar_meta_key(self.avatar_meta_key.clone())
            .with_multi_tenant(self.multi_tenant);

        if let Some(token) = &self.bot_token {
            config = config.with_bot_token(token.clone());
        }
        if let Some(host) = &self.email_host {
            config = config.with_email_host(host.clone());
        }
        config
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    if args.bot_token.is_none() {
        warn!("No bot token configured, Telegram login callbacks will be ignored");
    }

    let store = Arc::new(MemoryStore::new());
    let orchestrator = LoginOrchestrator::new(args.login_config(), store)
        .with_hooks(LoginHooks::new().with(Arc::new(TracingHook)));
    let state = Arc::new(ServerState::new(
        orchestrator,
        Duration::from_secs(args.session_ttl_seconds),
    ));

    server::new(args.port, state).await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("site_url", args.site_url.to_string()),
        ("bot_token_set", args.bot_token.is_some().to_string()),
        ("action", args.action_marker.clone()),
        ("random_email", args.random_email.to_string()),
        ("disable_signup", args.disable_signup.to_string()),
        ("user_role", args.user_role.clone()),
        (
            "avatar_meta_key",
            args.avatar_meta_key
                .clone()
                .unwrap_or_else(|| "none".to_string()),
        ),
        (
            "email_host",
            args.email_host
                .clone()
                .unwrap_or_else(|| "site host".to_string()),
        ),
        ("multi_tenant", args.multi_tenant.to_string()),
        ("session_ttl_seconds", args.session_ttl_seconds.to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}
