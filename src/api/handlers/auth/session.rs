//! Server-side sessions and the session cookie.

use super::state::AuthConfig;
use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

pub(super) const SESSION_COOKIE_NAME: &str = "sid";

/// Identity captured from a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub subject: String,
    pub issuer: String,
    pub email: Option<String>,
    pub name: Option<String>,
    expires_at: Instant,
}

impl Session {
    #[must_use]
    pub fn new(
        subject: String,
        issuer: String,
        email: Option<String>,
        name: Option<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            subject,
            issuer,
            email,
            name,
            expires_at: Instant::now() + ttl,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Storage for sessions keyed by the opaque cookie value.
///
/// Lookups never return an expired session.
pub trait SessionStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Session>;
    fn put(&self, id: String, session: Session);
    fn evict(&self, id: &str) -> Option<Session>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &str) -> Option<Session> {
        {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            match sessions.get(id) {
                Some(session) if !session.is_expired() => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.get(id).is_some_and(Session::is_expired) {
            sessions.remove(id);
        }
        None
    }

    fn put(&self, id: String, session: Session) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, existing| !existing.is_expired());
        sessions.insert(id, session);
    }

    fn evict(&self, id: &str) -> Option<Session> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }
}

/// Build a secure `HttpOnly` cookie for the session id.
pub(super) fn session_cookie(
    config: &AuthConfig,
    session_id: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl().as_secs();
    // Only mark cookies secure when the app is served over HTTPS.
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use url::Url;

    fn session(ttl: Duration) -> Session {
        Session::new(
            "alice".to_string(),
            "https://idp.example.org".to_string(),
            Some("alice@example.org".to_string()),
            None,
            ttl,
        )
    }

    #[test]
    fn store_returns_live_sessions() {
        let store = InMemorySessionStore::new();
        store.put("sid-1".to_string(), session(Duration::from_secs(60)));
        assert_eq!(store.get("sid-1").map(|s| s.subject), Some("alice".to_string()));
        assert!(store.get("sid-2").is_none());
    }

    #[test]
    fn expired_sessions_are_dropped_on_lookup() {
        let store = InMemorySessionStore::new();
        store.put("sid-1".to_string(), session(Duration::ZERO));
        assert!(store.get("sid-1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn insert_sweeps_expired_sessions() {
        let store = InMemorySessionStore::new();
        store.put("old".to_string(), session(Duration::ZERO));
        store.put("new".to_string(), session(Duration::from_secs(60)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn evict_removes_session() {
        let store = InMemorySessionStore::new();
        store.put("sid-1".to_string(), session(Duration::from_secs(60)));
        assert!(store.evict("sid-1").is_some());
        assert!(store.get("sid-1").is_none());
    }

    #[test]
    fn cookie_attributes() {
        let config = AuthConfig::new(
            "https://idp.example.org".to_string(),
            "admin-ui".to_string(),
            SecretString::from("changeme"),
            Url::parse("https://admin.example.org").expect("url"),
        )
        .with_session_ttl(Duration::from_secs(900));
        let cookie = session_cookie(&config, "abc").expect("cookie");
        assert_eq!(
            cookie.to_str().ok(),
            Some("sid=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=900; Secure")
        );

        let cleared = clear_session_cookie(false).expect("cookie");
        assert_eq!(
            cleared.to_str().ok(),
            Some("sid=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
        );
    }

    #[test]
    fn extracts_session_id_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; sid=abc123; lang=en"));
        assert_eq!(extract_session_id(&headers), Some("abc123".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sid="));
        assert_eq!(extract_session_id(&headers), None);

        assert_eq!(extract_session_id(&HeaderMap::new()), None);
    }
}
