use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use secrecy::SecretString;
use url::Url;

use crate::login::DEFAULT_ACTION_MARKER;

/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let site_url = matches
        .get_one::<String>("site-url")
        .context("missing required argument: --site-url")?;
    let site_url =
        Url::parse(site_url).with_context(|| format!("Invalid site URL: {site_url}"))?;
    if site_url.host_str().is_none() {
        anyhow::bail!("Invalid site URL, missing host: {site_url}");
    }

    let bot_token = matches
        .get_one::<String>("bot-token")
        .map(|token| token.trim())
        .filter(|token| !token.is_empty())
        .map(|token| SecretString::from(token.to_string()));

    Ok(Action::Server(Args {
        port,
        site_url,
        bot_token,
        action_marker: matches
            .get_one::<String>("action")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ACTION_MARKER.to_string()),
        random_email: matches.get_flag("random-email"),
        disable_signup: matches.get_flag("disable-signup"),
        user_role: matches
            .get_one::<String>("user-role")
            .cloned()
            .unwrap_or_else(|| "subscriber".to_string()),
        avatar_meta_key: matches.get_one::<String>("avatar-meta-key").cloned(),
        email_host: matches.get_one::<String>("email-host").cloned(),
        multi_tenant: matches.get_flag("multi-tenant"),
        session_ttl_seconds: matches
            .get_one::<u64>("session-ttl-seconds")
            .copied()
            .unwrap_or(86_400),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn test_handler_builds_server_action() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "tglogin",
            "--site-url",
            "https://example.com",
            "--bot-token",
            " 123456:TEST-TOKEN ",
            "--disable-signup",
        ]);

        let Action::Server(args) = handler(&matches)?;
        assert_eq!(args.site_url.as_str(), "https://example.com/");
        assert!(args.bot_token.is_some());
        assert!(args.disable_signup);
        Ok(())
    }

    #[test]
    fn test_handler_rejects_invalid_site_url() {
        temp_env::with_vars([("TGLOGIN_SITE_URL", None::<&str>)], || {
            let matches =
                commands::new().get_matches_from(vec!["tglogin", "--site-url", "not a url"]);
            assert!(handler(&matches).is_err());
        });
    }

    #[test]
    fn test_handler_ignores_blank_bot_token() -> Result<()> {
        let matches = commands::new().get_matches_from(vec!["tglogin", "--bot-token", "  "]);
        let Action::Server(args) = handler(&matches)?;
        assert!(args.bot_token.is_none());
        Ok(())
    }
}
