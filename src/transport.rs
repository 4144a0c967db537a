use std::collections::BTreeMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, LINK, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Largest page size every supported server accepts.
pub const MAX_PAGE_SIZE: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub link: Option<String>,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking GET. Implementations decode transfer encodings themselves.
pub trait Transport {
    fn get(&self, url: &Url) -> Result<Response>;
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

pub struct HttpTransport {
    http: HttpClient,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            return Err(Error::Config("http user agent required".into()));
        }
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .gzip(true)
            .build()?;
        Ok(Self {
            http,
            user_agent: config.user_agent,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url) -> Result<Response> {
        debug!(%url, "GET");
        let resp = self
            .http
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()?;
        let status = resp.status().as_u16();
        let link = resp
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = resp.text()?;
        Ok(Response { status, link, body })
    }
}

fn checked(url: &Url, resp: Response) -> Result<Response> {
    if resp.is_success() {
        Ok(resp)
    } else {
        Err(Error::Status {
            url: url.to_string(),
            status: resp.status,
        })
    }
}

fn decode<T: DeserializeOwned>(url: &Url, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|source| Error::Json {
        url: url.to_string(),
        source,
    })
}

pub fn get_json<T: DeserializeOwned>(transport: &dyn Transport, url: &Url) -> Result<T> {
    let resp = checked(url, transport.get(url)?)?;
    decode(url, &resp.body)
}

static LINK_ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*<([^>]*)>((?:\s*;\s*[^;,=\s]+\s*=\s*(?:"[^"]*"|[^;,\s"]*))*)\s*(,|$)"#)
        .expect("valid link entry regex")
});

static LINK_PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#";\s*([^;,=\s]+)\s*=\s*(?:"([^"]*)"|([^;,\s"]*))"#).expect("valid link param regex")
});

/// Parses an RFC 5988 `Link` header into relation name -> target.
pub fn parse_link_header(value: &str) -> Result<BTreeMap<String, String>> {
    let mut links = BTreeMap::new();
    let mut rest = value;
    while !rest.trim().is_empty() {
        let caps = LINK_ENTRY_RE
            .captures(rest)
            .ok_or_else(|| Error::LinkHeader(value.to_string()))?;
        let target = &caps[1];
        for param in LINK_PARAM_RE.captures_iter(&caps[2]) {
            if !param[1].eq_ignore_ascii_case("rel") {
                continue;
            }
            let rels = param
                .get(2)
                .or_else(|| param.get(3))
                .map(|m| m.as_str())
                .unwrap_or("");
            for rel in rels.split_whitespace() {
                links
                    .entry(rel.to_ascii_lowercase())
                    .or_insert_with(|| target.to_string());
            }
        }
        let consumed = caps.get(0).map(|m| m.end()).unwrap_or(rest.len());
        let at_end = caps[3].is_empty();
        rest = &rest[consumed..];
        if at_end {
            break;
        }
        if rest.trim().is_empty() {
            return Err(Error::LinkHeader(value.to_string()));
        }
    }
    Ok(links)
}

/// Follows `rel="next"` links from `first` until `limit` items are collected.
pub struct Paginator<'a> {
    transport: &'a dyn Transport,
    origin: url::Origin,
    next: Option<Url>,
    limit: usize,
}

impl<'a> Paginator<'a> {
    pub fn new(transport: &'a dyn Transport, mut first: Url, limit: usize) -> Self {
        let page_size = limit.clamp(1, MAX_PAGE_SIZE);
        first
            .query_pairs_mut()
            .append_pair("limit", &page_size.to_string());
        Self {
            transport,
            origin: first.origin(),
            next: Some(first),
            limit,
        }
    }

    pub fn collect<T: DeserializeOwned>(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while items.len() < self.limit {
            let Some(url) = self.next.take() else {
                break;
            };
            let resp = checked(&url, self.transport.get(&url)?)?;
            let page: Vec<T> = decode(&url, &resp.body)?;
            debug!(%url, count = page.len(), "page");
            if page.is_empty() {
                break;
            }
            let wanted = self.limit - items.len();
            items.extend(page.into_iter().take(wanted));
            self.next = self.next_link(resp.link.as_deref())?;
        }
        Ok(items)
    }

    fn next_link(&self, header: Option<&str>) -> Result<Option<Url>> {
        let Some(header) = header else {
            return Ok(None);
        };
        let links = parse_link_header(header)?;
        let Some(next) = links.get("next") else {
            return Ok(None);
        };
        let url = Url::parse(next)?;
        if url.origin() != self.origin {
            return Err(Error::SuspiciousLink {
                origin: self.origin.ascii_serialization(),
                url: next.clone(),
            });
        }
        Ok(Some(url))
    }
}
