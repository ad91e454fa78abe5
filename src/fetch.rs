use crate::config::DashboardConfig;
use crate::error::{ScrapeError, ScrapeResult};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONNECTION, COOKIE, HeaderMap, HeaderValue, ORIGIN, REFERER,
    SET_COOKIE, USER_AGENT,
};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedDocument {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// GET-only transport shared by every domain task of a run.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, referer: &str) -> ScrapeResult<FetchedDocument>;
}

/// Fetches `url` and fails on any non-success status.
pub fn fetch_ok(
    transport: &dyn Transport,
    url: &str,
    referer: &str,
) -> ScrapeResult<FetchedDocument> {
    let doc = transport.get(url, referer)?;
    if !doc.is_success() {
        return Err(ScrapeError::Status {
            url: url.to_string(),
            status: doc.status,
        });
    }
    Ok(doc)
}

/// Session cookie of one origin, captured from the first response of that
/// origin that sets one.
///
/// The slot is written at most once; the lock guards that single write
/// against concurrent tasks racing on their first responses.
#[derive(Debug)]
pub struct Session {
    origin: String,
    cookie: Mutex<Option<String>>,
}

impl Session {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            cookie: Mutex::new(None),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Whether `url` belongs to the session's origin.
    pub fn covers(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|u| u.origin().ascii_serialization() == self.origin)
    }

    pub fn cookie(&self) -> Option<String> {
        self.cookie
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stores the `name=value` pair of a `Set-Cookie` header unless a cookie
    /// is already held. Returns whether the value was stored.
    pub fn capture(&self, set_cookie: &str) -> bool {
        let Some(pair) = set_cookie
            .split(';')
            .next()
            .map(str::trim)
            .filter(|v| v.contains('='))
        else {
            return false;
        };

        let mut slot = self.cookie.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(pair.to_string());
        true
    }
}

/// Blocking client for every host of a run. Only requests to the dashboard
/// origin carry `Origin` and the session cookie.
pub struct HttpTransport {
    client: Client,
    session: Session,
}

impl HttpTransport {
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
        headers.insert(ACCEPT, HeaderValue::from_str(&config.accept)?);
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)?,
        );
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let base = Url::parse(&config.base_url)
            .with_context(|| format!("invalid dashboard url {}", config.base_url))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            session: Session::new(base.origin().ascii_serialization()),
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, referer: &str) -> ScrapeResult<FetchedDocument> {
        let dashboard = self.session.covers(url);

        let mut request = self.client.get(url);
        if !referer.is_empty() {
            request = request.header(REFERER, referer);
        }
        if dashboard {
            request = request.header(ORIGIN, self.session.origin());
            if let Some(cookie) = self.session.cookie() {
                request = request.header(COOKIE, cookie);
            }
        }

        let response = request.send().map_err(|source| ScrapeError::Transport {
            url: url.to_string(),
            source,
        })?;

        if dashboard
            && let Some(set_cookie) = response
                .headers()
                .get(SET_COOKIE)
                .and_then(|v| v.to_str().ok())
            && self.session.capture(set_cookie)
        {
            debug!(origin = %self.session.origin(), "session cookie captured");
        }

        let status = response.status().as_u16();
        if !response.status().is_success() {
            warn!(%url, status, "request returned non-success status");
        }
        let final_url = response.url().to_string();

        let body = response
            .bytes()
            .map_err(|source| ScrapeError::Transport {
                url: url.to_string(),
                source,
            })?
            .to_vec();

        debug!(%url, status, bytes = body.len(), "fetched");

        Ok(FetchedDocument {
            url: final_url,
            status,
            body,
        })
    }
}
