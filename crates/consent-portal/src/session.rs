//! Cookie-backed session store

use axum::http::{HeaderMap, HeaderValue, header};
use consent_core::SessionStore;
use cookie::{Cookie, SameSite};

use crate::config::SessionConfig;

/// The session cookie of one request.
///
/// Reads the token from the `Cookie` header and records whether it was
/// cleared so the response can expire it.
#[derive(Debug)]
pub struct CookieSession {
    name: String,
    token: Option<String>,
    cleared: bool,
}

impl CookieSession {
    pub fn from_headers(headers: &HeaderMap, config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            token: read_cookie(headers, &config.cookie_name),
            cleared: false,
        }
    }

    /// `Set-Cookie` value expiring the session, if it was cleared.
    pub fn removal_header(&self) -> Option<HeaderValue> {
        if !self.cleared {
            return None;
        }
        HeaderValue::from_str(&removal_cookie(&self.name).to_string()).ok()
    }
}

impl SessionStore for CookieSession {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }

    fn clear(&mut self) {
        self.token = None;
        self.cleared = true;
    }
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(cookie_str) = value.to_str() else {
            continue;
        };
        for cookie_part in cookie_str.split(';') {
            if let Ok(cookie) = Cookie::parse_encoded(cookie_part.trim()) {
                if cookie.name() == name && !cookie.value().is_empty() {
                    return Some(cookie.value().to_string());
                }
            }
        }
    }
    None
}

/// Build the session cookie for a freshly issued token
pub fn session_cookie(config: &SessionConfig, token: &str) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token.to_string()))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax) // Survive top-level redirects from clients
        .max_age(time::Duration::seconds(
            i64::try_from(config.session_lifetime_secs).unwrap_or(i64::MAX),
        ))
        .build()
}

pub fn removal_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_reads_named_cookie() {
        let config = SessionConfig::default();
        let session = CookieSession::from_headers(&headers("theme=dark; ows-jwt=abc.def"), &config);
        assert_eq!(session.token().as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_missing_or_empty_cookie_is_no_session() {
        let config = SessionConfig::default();
        assert!(!CookieSession::from_headers(&HeaderMap::new(), &config).has_session());
        assert!(!CookieSession::from_headers(&headers("ows-jwt="), &config).has_session());
    }

    #[test]
    fn test_clear_emits_removal() {
        let config = SessionConfig::default();
        let mut session = CookieSession::from_headers(&headers("ows-jwt=abc"), &config);
        assert!(session.removal_header().is_none());

        session.clear();
        assert!(!session.has_session());
        let removal = session.removal_header().unwrap();
        let removal = removal.to_str().unwrap();
        assert!(removal.starts_with("ows-jwt=;"));
        assert!(removal.contains("Max-Age=0"));
    }

    #[test]
    fn test_session_cookie_flags() {
        let config = SessionConfig::default();
        let cookie = session_cookie(&config, "tok").to_string();
        assert!(cookie.starts_with("ows-jwt=tok"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=1200"));
    }

    #[test]
    fn test_huge_lifetime_saturates() {
        let config = SessionConfig {
            session_lifetime_secs: u64::MAX,
            ..SessionConfig::default()
        };
        let cookie = session_cookie(&config, "tok");
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(i64::MAX)));
    }
}
