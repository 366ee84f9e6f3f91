//! Input sanitizers applied to verified payload values.

use regex::Regex;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};
use url::Url;

/// Escape the five HTML-significant characters.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn strip(pattern: &str, input: &str) -> String {
    Regex::new(pattern).map_or_else(
        |_| input.to_string(),
        |re| re.replace_all(input, "").into_owned(),
    )
}

/// Strict login-name sanitizer.
///
/// Removes tags, accents, percent-encoded octets and HTML entities, then keeps
/// only `[A-Za-z0-9 _.-@]` with whitespace trimmed and collapsed.
#[must_use]
pub fn sanitize_login_name(raw: &str) -> String {
    let without_tags = strip(r"<[^>]*>", raw);

    let without_accents: String = without_tags
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let without_octets = strip(r"%[a-fA-F0-9]{2}", &without_accents);
    let without_entities = strip(r"&[a-zA-Z0-9#]+;", &without_octets);

    let strict: String = without_entities
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-' | '@'))
        .collect();

    strict.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Accept only absolute `http`/`https` URLs with a host.
#[must_use]
pub fn sanitize_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(url.to_string())
}
