//! Login configuration: bot secret, signup policy, site URLs and role policy.

use secrecy::SecretString;
use url::Url;

use super::payload::DEFAULT_ACTION_MARKER;

const DEFAULT_USER_ROLE: &str = "subscriber";
const DEFAULT_EMAIL_LOCAL_PART: &str = "auto-generated";

/// Which capabilities a role grants for landing-page selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RolePolicy {
    editor_roles: Vec<String>,
    reader_roles: Vec<String>,
    super_admin_roles: Vec<String>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        let editors = ["administrator", "editor", "author", "contributor"];
        Self {
            editor_roles: editors.iter().map(|r| (*r).to_string()).collect(),
            reader_roles: editors
                .iter()
                .chain(["subscriber"].iter())
                .map(|r| (*r).to_string())
                .collect(),
            super_admin_roles: vec!["super_admin".to_string()],
        }
    }
}

impl RolePolicy {
    #[must_use]
    pub fn new(
        editor_roles: Vec<String>,
        reader_roles: Vec<String>,
        super_admin_roles: Vec<String>,
    ) -> Self {
        Self {
            editor_roles,
            reader_roles,
            super_admin_roles,
        }
    }

    #[must_use]
    pub fn can_edit(&self, roles: &[String]) -> bool {
        self.is_super_admin(roles) || roles.iter().any(|r| self.editor_roles.contains(r))
    }

    #[must_use]
    pub fn can_read(&self, roles: &[String]) -> bool {
        self.can_edit(roles) || roles.iter().any(|r| self.reader_roles.contains(r))
    }

    #[must_use]
    pub fn is_super_admin(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| self.super_admin_roles.contains(r))
    }
}

/// Landing pages the redirect rule can pick from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteUrls {
    home: String,
    admin: String,
    profile: String,
    user_home: String,
}

impl SiteUrls {
    #[must_use]
    pub fn from_site(site: &Url) -> Self {
        let base = site.as_str().trim_end_matches('/');
        Self {
            home: format!("{base}/"),
            admin: format!("{base}/admin/"),
            profile: format!("{base}/admin/profile"),
            user_home: format!("{base}/admin/user/"),
        }
    }

    #[must_use]
    pub fn home(&self) -> &str {
        &self.home
    }

    #[must_use]
    pub fn admin(&self) -> &str {
        &self.admin
    }

    #[must_use]
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Cross-tenant home for users not attached to any tenant.
    #[must_use]
    pub fn user_home(&self) -> &str {
        &self.user_home
    }
}

#[derive(Clone, Debug)]
pub struct LoginConfig {
    bot_token: Option<SecretString>,
    action_marker: String,
    random_email: bool,
    disable_signup: bool,
    user_role: String,
    avatar_meta_key: Option<String>,
    email_local_part: String,
    email_host: String,
    site: Url,
    urls: SiteUrls,
    multi_tenant: bool,
    roles: RolePolicy,
}

impl LoginConfig {
    /// `site` is treated as a directory: a path without a trailing slash gets one.
    #[must_use]
    pub fn new(mut site: Url) -> Self {
        if !site.path().ends_with('/') {
            let path = format!("{}/", site.path());
            site.set_path(&path);
        }
        let email_host = site.host_str().unwrap_or("localhost").to_string();
        let urls = SiteUrls::from_site(&site);

        Self {
            bot_token: None,
            action_marker: DEFAULT_ACTION_MARKER.to_string(),
            random_email: false,
            disable_signup: false,
            user_role: DEFAULT_USER_ROLE.to_string(),
            avatar_meta_key: None,
            email_local_part: DEFAULT_EMAIL_LOCAL_PART.to_string(),
            email_host,
            site,
            urls,
            multi_tenant: false,
            roles: RolePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_bot_token(mut self, token: SecretString) -> Self {
        self.bot_token = Some(token);
        self
    }

    #[must_use]
    pub fn with_action_marker(mut self, marker: String) -> Self {
        self.action_marker = marker;
        self
    }

    #[must_use]
    pub fn with_random_email(mut self, enabled: bool) -> Self {
        self.random_email = enabled;
        self
    }

    #[must_use]
    pub fn with_disable_signup(mut self, disabled: bool) -> Self {
        self.disable_signup = disabled;
        self
    }

    #[must_use]
    pub fn with_user_role(mut self, role: String) -> Self {
        self.user_role = role;
        self
    }

    #[must_use]
    pub fn with_avatar_meta_key(mut self, key: Option<String>) -> Self {
        self.avatar_meta_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_email_local_part(mut self, local_part: String) -> Self {
        self.email_local_part = local_part;
        self
    }

    #[must_use]
    pub fn with_email_host(mut self, host: String) -> Self {
        self.email_host = host;
        self
    }

    #[must_use]
    pub fn with_site_urls(mut self, urls: SiteUrls) -> Self {
        self.urls = urls;
        self
    }

    #[must_use]
    pub fn with_multi_tenant(mut self, enabled: bool) -> Self {
        self.multi_tenant = enabled;
        self
    }

    #[must_use]
    pub fn with_role_policy(mut self, roles: RolePolicy) -> Self {
        self.roles = roles;
        self
    }

    /// `None` disables the whole login flow.
    #[must_use]
    pub fn bot_token(&self) -> Option<&SecretString> {
        self.bot_token.as_ref()
    }

    #[must_use]
    pub fn action_marker(&self) -> &str {
        &self.action_marker
    }

    #[must_use]
    pub fn random_email(&self) -> bool {
        self.random_email
    }

    #[must_use]
    pub fn signup_enabled(&self) -> bool {
        !self.disable_signup
    }

    #[must_use]
    pub fn user_role(&self) -> &str {
        &self.user_role
    }

    #[must_use]
    pub fn avatar_meta_key(&self) -> Option<&str> {
        self.avatar_meta_key.as_deref()
    }

    #[must_use]
    pub fn email_local_part(&self) -> &str {
        &self.email_local_part
    }

    #[must_use]
    pub fn email_host(&self) -> &str {
        &self.email_host
    }

    #[must_use]
    pub fn site(&self) -> &Url {
        &self.site
    }

    #[must_use]
    pub fn urls(&self) -> &SiteUrls {
        &self.urls
    }

    #[must_use]
    pub fn multi_tenant(&self) -> bool {
        self.multi_tenant
    }

    #[must_use]
    pub fn roles(&self) -> &RolePolicy {
        &self.roles
    }

    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.site.scheme() == "https"
    }
}
