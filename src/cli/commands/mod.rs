use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

use crate::login::DEFAULT_ACTION_MARKER;

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("tglogin")
        .about("Telegram Login Widget verification and account reconciliation")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("TGLOGIN_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("site-url")
                .long("site-url")
                .help("Public base URL of the site, example: https://example.com")
                .default_value("http://localhost:8080")
                .env("TGLOGIN_SITE_URL"),
        )
        .arg(
            Arg::new("bot-token")
                .long("bot-token")
                .help("Telegram bot token; without it every callback is ignored")
                .env("TGLOGIN_BOT_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("action")
                .long("action")
                .help("Value of the `action` query argument that marks a login callback")
                .default_value(DEFAULT_ACTION_MARKER)
                .env("TGLOGIN_ACTION"),
        )
        .arg(
            Arg::new("random-email")
                .long("random-email")
                .help("Generate an email for accounts that have none")
                .env("TGLOGIN_RANDOM_EMAIL")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("disable-signup")
                .long("disable-signup")
                .help("Refuse to create accounts for unknown Telegram users")
                .env("TGLOGIN_DISABLE_SIGNUP")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("user-role")
                .long("user-role")
                .help("Role given to accounts created on first login")
                .default_value("subscriber")
                .env("TGLOGIN_USER_ROLE"),
        )
        .arg(
            Arg::new("avatar-meta-key")
                .long("avatar-meta-key")
                .help("Metadata key to store the Telegram photo URL under")
                .env("TGLOGIN_AVATAR_META_KEY"),
        )
        .arg(
            Arg::new("email-host")
                .long("email-host")
                .help("Host for generated emails (default: host of --site-url)")
                .env("TGLOGIN_EMAIL_HOST"),
        )
        .arg(
            Arg::new("multi-tenant")
                .long("multi-tenant")
                .help("Send users without a tenant to the cross-tenant user home")
                .env("TGLOGIN_MULTI_TENANT")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Lifetime of the session cookie")
                .default_value("86400")
                .env("TGLOGIN_SESSION_TTL_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("TGLOGIN_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "tglogin");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Telegram Login Widget verification and account reconciliation".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_check_defaults() {
        temp_env::with_vars(
            [
                ("TGLOGIN_PORT", None::<&str>),
                ("TGLOGIN_SITE_URL", None),
                ("TGLOGIN_BOT_TOKEN", None),
                ("TGLOGIN_USER_ROLE", None),
                ("TGLOGIN_RANDOM_EMAIL", None),
            ],
            || {
                let matches = new().get_matches_from(vec!["tglogin"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));
                assert_eq!(
                    matches.get_one::<String>("site-url").cloned(),
                    Some("http://localhost:8080".to_string())
                );
                assert_eq!(matches.get_one::<String>("bot-token"), None);
                assert_eq!(
                    matches.get_one::<String>("action").cloned(),
                    Some(DEFAULT_ACTION_MARKER.to_string())
                );
                assert_eq!(
                    matches.get_one::<String>("user-role").cloned(),
                    Some("subscriber".to_string())
                );
                assert!(!matches.get_flag("random-email"));
                assert!(!matches.get_flag("disable-signup"));
                assert_eq!(
                    matches.get_one::<u64>("session-ttl-seconds").copied(),
                    Some(86_400)
                );
            },
        );
    }

    #[test]
    fn test_check_args() {
        let matches = new().get_matches_from(vec![
            "tglogin",
            "--port",
            "9090",
            "--site-url",
            "https://example.com",
            "--bot-token",
            "123456:TEST-TOKEN",
            "--random-email",
            "--disable-signup",
            "--user-role",
            "author",
            "--avatar-meta-key",
            "avatar_url",
            "--email-host",
            "mail.example.com",
            "--multi-tenant",
        ]);

        assert_eq!(matches.get_one::<u16>("port").copied(), Some(9090));
        assert_eq!(
            matches.get_one::<String>("bot-token").cloned(),
            Some("123456:TEST-TOKEN".to_string())
        );
        assert!(matches.get_flag("random-email"));
        assert!(matches.get_flag("disable-signup"));
        assert!(matches.get_flag("multi-tenant"));
        assert_eq!(
            matches.get_one::<String>("avatar-meta-key").cloned(),
            Some("avatar_url".to_string())
        );
        assert_eq!(
            matches.get_one::<String>("email-host").cloned(),
            Some("mail.example.com".to_string())
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("TGLOGIN_PORT", Some("443")),
                ("TGLOGIN_SITE_URL", Some("https://example.com")),
                ("TGLOGIN_BOT_TOKEN", Some("123456:TEST-TOKEN")),
                ("TGLOGIN_RANDOM_EMAIL", Some("true")),
                ("TGLOGIN_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["tglogin"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>("site-url").cloned(),
                    Some("https://example.com".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>("bot-token").cloned(),
                    Some("123456:TEST-TOKEN".to_string())
                );
                assert!(matches.get_flag("random-email"));
                assert_eq!(matches.get_one::<u8>("verbosity").copied(), Some(2));
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("TGLOGIN_LOG_LEVEL", Some(level))], || {
                let matches = new().get_matches_from(vec!["tglogin"]);
                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5_usize {
            temp_env::with_vars([("TGLOGIN_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["tglogin".to_string()];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }
}
