//! Post-login redirect target.
//!
//! An explicit target wins unless it is the admin root, in which case the
//! landing page is chosen from the account's roles. Targets on a foreign host
//! are replaced by the admin root.

use url::{form_urlencoded, Url};

use super::config::LoginConfig;
use super::store::Account;

const REAUTH_PARAM: &str = "reauth";

/// Remove the `reauth` argument from a (possibly relative) URL.
#[must_use]
pub fn strip_reauth(target: &str) -> String {
    let (rest, fragment) = match target.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (target, None),
    };

    let Some((path, query)) = rest.split_once('?') else {
        return target.to_string();
    };

    let kept: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key != REAUTH_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut stripped = path.to_string();
    if !kept.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        stripped.push('?');
        stripped.push_str(&query);
    }
    if let Some(fragment) = fragment {
        stripped.push('#');
        stripped.push_str(fragment);
    }
    stripped
}

fn is_admin_root(target: &str, config: &LoginConfig) -> bool {
    let (Ok(resolved), Ok(admin)) = (config.site().join(target), Url::parse(config.urls().admin()))
    else {
        return false;
    };

    resolved.host_str() == admin.host_str()
        && resolved.port_or_known_default() == admin.port_or_known_default()
        && resolved.query().is_none()
        && resolved.path().trim_end_matches('/') == admin.path().trim_end_matches('/')
}

/// Landing page for an account when no explicit target was requested.
#[must_use]
pub fn landing_page<'a>(account: &Account, config: &'a LoginConfig) -> &'a str {
    let policy = config.roles();
    let urls = config.urls();
    let roles = &account.roles;

    if config.multi_tenant()
        && ((account.tenants.is_empty() && !policy.is_super_admin(roles))
            || !policy.can_read(roles))
    {
        return urls.user_home();
    }

    if !policy.can_edit(roles) {
        return if policy.can_read(roles) {
            urls.profile()
        } else {
            urls.home()
        };
    }

    urls.admin()
}

fn safe_redirect(target: &str, config: &LoginConfig) -> String {
    let site = config.site();
    match site.join(target) {
        Ok(url)
            if matches!(url.scheme(), "http" | "https") && url.host_str() == site.host_str() =>
        {
            url.to_string()
        }
        _ => config.urls().admin().to_string(),
    }
}

/// Absolute URL to send the user to after a successful login.
#[must_use]
pub fn redirect_target(requested: Option<&str>, account: &Account, config: &LoginConfig) -> String {
    let requested = requested
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(strip_reauth);

    match requested {
        Some(target) if !is_admin_root(&target, config) => safe_redirect(&target, config),
        _ => landing_page(account, config).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::login::store::AccountId;
    use anyhow::Result;
    use std::collections::BTreeMap;

    fn account(roles: &[&str], tenants: &[&str]) -> Account {
        Account {
            id: AccountId::new(),
            login_name: "alice".to_string(),
            email: None,
            first_name: "Alice".to_string(),
            last_name: String::new(),
            roles: roles.iter().map(|r| (*r).to_string()).collect(),
            tenants: tenants.iter().map(|t| (*t).to_string()).collect(),
            metadata: BTreeMap::new(),
        }
    }

    fn config() -> Result<LoginConfig> {
        Ok(LoginConfig::new(Url::parse("https://example.com")?))
    }

    #[test]
    fn strip_reauth_keeps_other_arguments() {
        assert_eq!(
            strip_reauth("/admin/post.php?post=7&reauth=1#top"),
            "/admin/post.php?post=7#top"
        );
        assert_eq!(strip_reauth("/admin/?reauth=1"), "/admin/");
        assert_eq!(strip_reauth("/plain"), "/plain");
    }

    #[test]
    fn missing_target_uses_landing_page() -> Result<()> {
        let config = config()?;
        let editor = account(&["editor"], &[]);
        assert_eq!(
            redirect_target(None, &editor, &config),
            "https://example.com/admin/"
        );
        assert_eq!(
            redirect_target(Some("  "), &editor, &config),
            "https://example.com/admin/"
        );
        Ok(())
    }

    #[test]
    fn admin_root_is_treated_as_no_target() -> Result<()> {
        let config = config()?;
        let subscriber = account(&["subscriber"], &[]);
        for target in [
            "https://example.com/admin/",
            "https://example.com/admin",
            "/admin/",
            "/admin/?reauth=1",
        ] {
            assert_eq!(
                redirect_target(Some(target), &subscriber, &config),
                "https://example.com/admin/profile",
                "{target}"
            );
        }
        Ok(())
    }

    #[test]
    fn explicit_target_is_kept() -> Result<()> {
        let config = config()?;
        let subscriber = account(&["subscriber"], &[]);
        assert_eq!(
            redirect_target(Some("/shop/cart?reauth=1"), &subscriber, &config),
            "https://example.com/shop/cart"
        );
        assert_eq!(
            redirect_target(Some("https://example.com/admin/edit.php"), &subscriber, &config),
            "https://example.com/admin/edit.php"
        );
        Ok(())
    }

    #[test]
    fn foreign_hosts_fall_back_to_admin_root() -> Result<()> {
        let config = config()?;
        let subscriber = account(&["subscriber"], &[]);
        for target in ["https://evil.example.net/", "//evil.example.net/x"] {
            assert_eq!(
                redirect_target(Some(target), &subscriber, &config),
                "https://example.com/admin/"
            );
        }
        Ok(())
    }

    #[test]
    fn site_in_subdirectory_resolves_relative_targets() -> Result<()> {
        let config = LoginConfig::new(Url::parse("https://example.com/blog")?);
        let editor = account(&["editor"], &[]);

        assert_eq!(
            redirect_target(Some("admin/"), &editor, &config),
            "https://example.com/blog/admin/"
        );
        assert_eq!(
            redirect_target(Some("https://example.com/blog/admin"), &editor, &config),
            "https://example.com/blog/admin/"
        );
        assert_eq!(
            redirect_target(Some("welcome"), &editor, &config),
            "https://example.com/blog/welcome"
        );
        Ok(())
    }

    #[test]
    fn landing_page_follows_capabilities() -> Result<()> {
        let config = config()?;
        assert_eq!(
            landing_page(&account(&["administrator"], &[]), &config),
            "https://example.com/admin/"
        );
        assert_eq!(
            landing_page(&account(&["subscriber"], &[]), &config),
            "https://example.com/admin/profile"
        );
        assert_eq!(
            landing_page(&account(&[], &[]), &config),
            "https://example.com/"
        );
        Ok(())
    }

    #[test]
    fn multi_tenant_users_without_tenant_go_to_user_home() -> Result<()> {
        let config = config()?.with_multi_tenant(true);
        assert_eq!(
            landing_page(&account(&["editor"], &[]), &config),
            "https://example.com/admin/user/"
        );
        assert_eq!(
            landing_page(&account(&["editor"], &["blog-1"]), &config),
            "https://example.com/admin/"
        );
        assert_eq!(
            landing_page(&account(&["super_admin"], &[]), &config),
            "https://example.com/admin/"
        );
        assert_eq!(
            landing_page(&account(&[], &["blog-1"]), &config),
            "https://example.com/admin/user/"
        );
        Ok(())
    }
}
