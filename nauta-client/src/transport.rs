//! Blocking HTTP transport with an exportable cookie jar

use crate::error::NautaError;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Url;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// User agent sent when the caller does not configure one
const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Upper bound on redirects followed while resolving a final URL
const MAX_REDIRECTS: usize = 10;

/// Cookie jar shared with reqwest that can be exported and restored
///
/// Cookies are stored by name only. Both portals live on a single host, so
/// domain and path scoping are not tracked; every stored cookie is sent with
/// every request made by the owning client.
#[derive(Debug, Default)]
pub struct SessionCookies {
    jar: RwLock<BTreeMap<String, String>>,
}

impl SessionCookies {
    /// Copy of the current cookies as name/value pairs
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.jar.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace every cookie with the given pairs
    pub fn restore(&self, cookies: BTreeMap<String, String>) {
        *self.jar.write().unwrap_or_else(|e| e.into_inner()) = cookies;
    }

    /// Drop every cookie
    pub fn clear(&self) {
        self.jar.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Outcome of parsing one `Set-Cookie` header
#[derive(Debug, PartialEq, Eq)]
enum CookieUpdate {
    Set(String, String),
    Remove(String),
}

/// Accepted `Expires` formats: RFC 1123, Netscape and ISO 8601
const COOKIE_DATE_FORMATS: [&str; 3] = ["%a, %d %b %Y %H:%M:%S GMT", "%a, %d-%b-%y %H:%M:%S GMT", "%Y-%m-%dT%H:%M:%SZ"];

fn parse_cookie_date(date: &str) -> Option<DateTime<Utc>> {
    COOKIE_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(date, format).ok())
        .map(|naive| naive.and_utc())
}

/// Parse one `Set-Cookie` header; expiry is judged against `now`
///
/// `Max-Age` wins over `Expires` when both are present. An unparsable
/// `Expires` date leaves the cookie alive.
fn parse_set_cookie(header: &str, now: DateTime<Utc>) -> Option<CookieUpdate> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut max_age: Option<i64> = None;
    let mut expires: Option<DateTime<Utc>> = None;
    for attribute in parts {
        let Some((key, val)) = attribute.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "max-age" => max_age = val.trim().parse().ok(),
            "expires" => expires = parse_cookie_date(val.trim()),
            _ => {}
        }
    }

    let expired = match (max_age, expires) {
        (Some(seconds), _) => seconds <= 0,
        (None, Some(expires)) => expires <= now,
        (None, None) => false,
    };

    Some(if expired {
        CookieUpdate::Remove(name.to_string())
    } else {
        CookieUpdate::Set(name.to_string(), value.trim().trim_matches('"').to_string())
    })
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, _url: &Url) {
        let mut jar = self.jar.write().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        for header in cookie_headers {
            let Ok(header) = header.to_str() else {
                continue;
            };
            match parse_set_cookie(header, now) {
                Some(CookieUpdate::Set(name, value)) => {
                    jar.insert(name, value);
                }
                Some(CookieUpdate::Remove(name)) => {
                    jar.remove(&name);
                }
                None => tracing::debug!("Ignoring malformed Set-Cookie header"),
            }
        }
    }

    fn cookies(&self, _url: &Url) -> Option<HeaderValue> {
        let jar = self.jar.read().unwrap_or_else(|e| e.into_inner());
        if jar.is_empty() {
            return None;
        }
        let joined = jar
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&joined).ok()
    }
}

/// A successful response: the URL reached after redirects and its body
#[derive(Debug, Clone)]
pub(crate) struct Page {
    pub url: Url,
    pub body: String,
}

/// Settings shared by both client builders
#[derive(Debug, Default)]
pub(crate) struct TransportConfig {
    pub base_url: Option<Url>,
    pub client_builder: Option<reqwest::blocking::ClientBuilder>,
    pub timeout: Option<Duration>,
}

impl TransportConfig {
    pub fn base_url(&mut self, url: impl reqwest::IntoUrl) -> Result<(), NautaError> {
        self.base_url = Some(url.into_url()?);
        Ok(())
    }

    /// Build the transport, falling back to `default_base_url`
    pub fn build(self, default_base_url: &str) -> Result<Transport, NautaError> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(default_base_url).map_err(|e| NautaError::ClientInit(e.to_string()))?,
        };

        let mut builder = self.client_builder.unwrap_or_else(|| {
            reqwest::blocking::Client::builder()
                .use_rustls_tls()
                .user_agent(DEFAULT_USER_AGENT)
        });
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let cookies = Arc::new(SessionCookies::default());

        // Success detection depends on the final URL, so redirects are always followed
        let client = builder
            .cookie_provider(Arc::clone(&cookies))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| NautaError::ClientInit(e.to_string()))?;

        Ok(Transport {
            client,
            base_url,
            cookies,
        })
    }
}

/// HTTP transport owned by one client instance
#[derive(Debug)]
pub(crate) struct Transport {
    client: reqwest::blocking::Client,
    base_url: Url,
    cookies: Arc<SessionCookies>,
}

impl Transport {
    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    /// Resolve path segments against the base URL
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, NautaError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| NautaError::ClientInit("Cannot modify base URL path".to_string()))?
            .clear()
            .extend(segments);
        Ok(url)
    }

    pub fn get(&self, segments: &[&str], context: &'static str) -> Result<Page, NautaError> {
        self.get_with_query(segments, &[], context)
    }

    pub fn get_with_query(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
        context: &'static str,
    ) -> Result<Page, NautaError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "GET for {}", context);
        let response = self.client.get(url).query(query).send()?;
        Self::finish(response, context)
    }

    pub fn post_form(
        &self,
        segments: &[&str],
        form: &[(&str, &str)],
        context: &'static str,
    ) -> Result<Page, NautaError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "POST for {}", context);
        let response = self.client.post(url).form(form).send()?;
        Self::finish(response, context)
    }

    pub fn get_bytes(&self, segments: &[&str], context: &'static str) -> Result<Vec<u8>, NautaError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "GET for {}", context);
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(NautaError::transport(context, status));
        }
        Ok(response.bytes()?.to_vec())
    }

    fn finish(response: reqwest::blocking::Response, context: &'static str) -> Result<Page, NautaError> {
        let status = response.status();
        let url = response.url().clone();
        tracing::debug!(%url, %status, "Response for {}", context);
        if !status.is_success() {
            return Err(NautaError::transport(context, status));
        }
        let body = response.text()?;
        Ok(Page { url, body })
    }
}
