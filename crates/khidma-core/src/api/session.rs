use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Cookie store handed to `reqwest` that can be emptied on logout.
#[derive(Debug, Default)]
pub(crate) struct SessionCookies {
    jar: RwLock<Jar>,
}

impl SessionCookies {
    fn clear(&self) {
        *self.jar.write().unwrap_or_else(PoisonError::into_inner) = Jar::default();
    }

    fn add(&self, pair: &str, url: &Url) {
        self.jar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .add_cookie_str(pair, url);
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.jar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cookies(url)
    }
}

/// A cookie captured from the jar together with the URL it is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub url: String,
    pub pair: String,
}

/// Serializable copy of the credentials held by a [`Session`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
}

impl SessionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.cookies.is_empty()
    }
}

/// Credentials attached to outgoing requests: the server-managed cookies and, when the
/// backend hands one out, a bearer access token.
#[derive(Debug)]
pub struct Session {
    access_token: RwLock<Option<String>>,
    cookies: Arc<SessionCookies>,
    scopes: Vec<Url>,
}

impl Session {
    /// `scopes` are the URLs whose cookies make up a snapshot.
    pub(crate) fn new(scopes: Vec<Url>) -> Self {
        Self {
            access_token: RwLock::new(None),
            cookies: Arc::new(SessionCookies::default()),
            scopes,
        }
    }

    pub(crate) fn cookie_store(&self) -> Arc<SessionCookies> {
        Arc::clone(&self.cookies)
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_access_token(&self, token: Option<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn has_credentials(&self) -> bool {
        self.access_token().is_some() || !self.snapshot().cookies.is_empty()
    }

    /// Drop every credential, cookies included.
    pub fn clear(&self) {
        self.set_access_token(None);
        self.cookies.clear();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut seen = HashSet::new();
        let mut cookies = Vec::new();
        for scope in &self.scopes {
            let Some(header) = self.cookies.cookies(scope) else {
                continue;
            };
            let Ok(header) = header.to_str() else {
                continue;
            };
            for pair in header.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
                if seen.insert(pair.to_string()) {
                    cookies.push(StoredCookie {
                        url: scope.to_string(),
                        pair: pair.to_string(),
                    });
                }
            }
        }

        SessionSnapshot {
            access_token: self.access_token(),
            cookies,
        }
    }

    /// Replace the current credentials with `snapshot`.
    pub fn restore(&self, snapshot: &SessionSnapshot) {
        self.clear();
        self.set_access_token(snapshot.access_token.clone());
        for cookie in &snapshot.cookies {
            match Url::parse(&cookie.url) {
                Ok(url) => self.cookies.add(&cookie.pair, &url),
                Err(err) => warn!(url = %cookie.url, error = %err, "skipping stored cookie"),
            }
        }
    }
}
