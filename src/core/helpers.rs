use std::sync::OnceLock;

use ammonia::Builder;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use html_escape::encode_text;
use rand::rngs::OsRng;
use regex::Regex;
use uuid::Uuid;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub fn validate_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Only same-site absolute paths are accepted as post-login targets.
///
/// Browsers drop control characters from URLs, so `/\t/host` would still
/// leave the site; those are refused along with backslashes.
pub fn is_local_path(target: &str) -> bool {
    let bytes = target.as_bytes();
    bytes.first() == Some(&b'/')
        && !matches!(bytes.get(1), Some(b'/') | Some(b'\\'))
        && !target.contains('\\')
        && !target.chars().any(char::is_control)
}

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"https?://[^\s<]+").expect("Regex should compile"))
}

/// Escapes user text for HTML, turns URLs into links and keeps line breaks.
pub fn render_text(text: &str) -> String {
    let escaped = encode_text(text).to_string();

    let linked = url_regex().replace_all(&escaped, |caps: &regex::Captures| {
        // Already entity-escaped, only quotes need care inside the attribute.
        let url = &caps[0];
        let href = url.replace('"', "&quot;");
        format!(
            r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
            href, url
        )
    });

    linked.replace('\n', "<br>\n")
}

/// Group descriptions may contain basic markup; everything dangerous is stripped.
pub fn sanitize_html(html: &str) -> String {
    Builder::default()
        .link_rel(Some("noopener noreferrer"))
        .clean(html)
        .to_string()
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%d %b %Y, %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn render_text_escapes_and_links() {
        let html = render_text("<b>hi</b> see https://example.com/a?b=1\nbye");
        assert!(html.starts_with("&lt;b&gt;hi&lt;/b&gt;"));
        assert!(html.contains(r#"<a href="https://example.com/a?b=1""#));
        assert!(html.contains("<br>"));
    }

    #[test]
    fn sanitize_strips_scripts() {
        let clean = sanitize_html("<p>About <script>alert(1)</script>rust</p>");
        assert_eq!(clean, "<p>About rust</p>");
    }

    #[test]
    fn local_paths_only() {
        assert!(is_local_path("/create/"));
        assert!(!is_local_path("//evil.example.com/"));
        assert!(!is_local_path("https://evil.example.com/"));
        assert!(!is_local_path(""));
    }

    #[test]
    fn control_characters_and_backslashes_are_refused() {
        assert!(!is_local_path("/\t/evil.example.com/"));
        assert!(!is_local_path("/\n/evil.example.com/"));
        assert!(!is_local_path("/\\evil.example.com/"));
        assert!(!is_local_path("/posts/1/\u{7f}"));
        assert!(is_local_path("/follow/?page=2"));
    }
}
