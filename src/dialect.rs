use std::cmp::Reverse;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::address::Matcher;
use crate::error::Result;
use crate::instance::Instance;
use crate::template::{AddressTemplate, RouteFlags};
use crate::transport::{self, Transport};

/// Probe endpoint; every supported server family answers it with the same shape.
pub const PROBE_PATH: &str = "/api/v1/instance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    Mastodon,
    Pleroma,
    Akkoma,
}

impl DialectKind {
    pub const ALL: [DialectKind; 3] = [
        DialectKind::Mastodon,
        DialectKind::Pleroma,
        DialectKind::Akkoma,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            DialectKind::Mastodon => "Mastodon",
            DialectKind::Pleroma => "Pleroma",
            DialectKind::Akkoma => "Akkoma",
        }
    }

    /// Path of a post's canonical page, with `IDENT` standing for its id.
    pub fn post_path(&self) -> &'static str {
        match self {
            DialectKind::Mastodon => "/statuses/IDENT",
            DialectKind::Pleroma | DialectKind::Akkoma => "/notice/IDENT",
        }
    }

    pub fn ident_grammar(&self) -> &'static str {
        match self {
            DialectKind::Mastodon => "[0-9]+",
            DialectKind::Pleroma | DialectKind::Akkoma => "[0-9A-Za-z]+",
        }
    }

    pub fn discard_prefixes(&self) -> &'static [&'static str] {
        match self {
            DialectKind::Mastodon => &["deck"],
            DialectKind::Pleroma | DialectKind::Akkoma => &[],
        }
    }

    pub fn address_templates(&self) -> &'static [AddressTemplate] {
        match self {
            DialectKind::Mastodon => MASTODON_TEMPLATES,
            DialectKind::Pleroma => PLEROMA_TEMPLATES,
            DialectKind::Akkoma => AKKOMA_TEMPLATES,
        }
    }

    /// Scores a probe response: `0` is the neutral default, positive
    /// confirms this dialect, negative rules it out.
    pub fn identify(&self, probe: &Value) -> i32 {
        let version = probe.get("version").and_then(Value::as_str).unwrap_or("");
        match self {
            DialectKind::Mastodon => 0,
            DialectKind::Pleroma => {
                if version.contains("Pleroma") {
                    1
                } else {
                    -1
                }
            }
            DialectKind::Akkoma => {
                if version.contains("Akkoma") || has_feature(probe, "akkoma:api") {
                    1
                } else {
                    -1
                }
            }
        }
    }

    /// Dialect-specific cleanup of a post's display URL.
    pub fn fix_url(&self, url: &str) -> Option<String> {
        static ACTIVITY_RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^(https?://[^/]+)/users/([^/]+)/statuses/([^/]+)/activity$")
                .expect("valid activity url regex")
        });
        match self {
            DialectKind::Mastodon => {
                let caps = ACTIVITY_RE.captures(url)?;
                Some(format!("{}/@{}/{}", &caps[1], &caps[2], &caps[3]))
            }
            DialectKind::Pleroma | DialectKind::Akkoma => None,
        }
    }
}

fn has_feature(probe: &Value, feature: &str) -> bool {
    probe
        .pointer("/pleroma/metadata/features")
        .and_then(Value::as_array)
        .map(|features| features.iter().any(|f| f.as_str() == Some(feature)))
        .unwrap_or(false)
}

const MASTODON_TEMPLATES: &[AddressTemplate] = &[
    AddressTemplate::new("@USER@DOMAIN"),
    AddressTemplate::new("USER@DOMAIN"),
    AddressTemplate::new("https://DOMAIN/@USER"),
    AddressTemplate::with_flags("https://DOMAIN/@USER/with_replies", RouteFlags::WITH_REPLIES),
    AddressTemplate::with_flags("https://DOMAIN/@USER/media", RouteFlags::MEDIA),
    AddressTemplate::new("https://DOMAIN/users/USER"),
    AddressTemplate::new("https://DOMAIN/@USER/NNNNNN"),
    AddressTemplate::with_flags("https://DOMAIN/@USER/NNNNNN/embed", RouteFlags::EMBED),
    AddressTemplate::new("https://DOMAIN/users/USER/statuses/NNNNNN"),
    AddressTemplate::new("https://DOMAIN/statuses/NNNNNN"),
    AddressTemplate::new("https://DOMAIN/tags/TAG"),
];

const PLEROMA_TEMPLATES: &[AddressTemplate] = &[
    AddressTemplate::new("@USER@DOMAIN"),
    AddressTemplate::new("USER@DOMAIN"),
    AddressTemplate::new("https://DOMAIN/users/USER"),
    AddressTemplate::new("https://DOMAIN/@USER"),
    AddressTemplate::new("https://DOMAIN/notice/IDENT"),
    AddressTemplate::new("https://DOMAIN/tag/TAG"),
];

const AKKOMA_TEMPLATES: &[AddressTemplate] = &[
    AddressTemplate::new("@USER@DOMAIN"),
    AddressTemplate::new("USER@DOMAIN"),
    AddressTemplate::new("https://DOMAIN/users/USER"),
    AddressTemplate::new("https://DOMAIN/@USER"),
    AddressTemplate::new("https://DOMAIN/notice/IDENT"),
    AddressTemplate::new("https://DOMAIN/@USER/posts/IDENT"),
    AddressTemplate::new("https://DOMAIN/tag/TAG"),
];

#[derive(Debug, Clone)]
pub struct Dialect {
    pub kind: DialectKind,
    pub matcher: Matcher,
}

/// The ordered set of known dialects. Registration order breaks score ties.
#[derive(Debug, Clone)]
pub struct Registry {
    dialects: Vec<Dialect>,
}

impl Registry {
    pub fn new() -> Result<Self> {
        let dialects = DialectKind::ALL
            .iter()
            .map(|&kind| {
                let matcher = Matcher::new(
                    kind.address_templates(),
                    kind.ident_grammar(),
                    kind.discard_prefixes(),
                )?;
                Ok(Dialect { kind, matcher })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { dialects })
    }

    pub fn dialects(&self) -> impl Iterator<Item = &Dialect> {
        self.dialects.iter()
    }

    pub fn default_kind(&self) -> DialectKind {
        self.dialects
            .first()
            .map(|d| d.kind)
            .unwrap_or(DialectKind::Mastodon)
    }

    /// Picks the highest scoring dialect for a probe response.
    pub fn select(&self, probe: &Value) -> DialectKind {
        let mut scored: Vec<(DialectKind, i32)> = self
            .dialects
            .iter()
            .map(|d| (d.kind, d.kind.identify(probe)))
            .collect();
        debug!(?scored, "dialect scores");
        // sort_by_key is stable, so equal scores keep registration order.
        scored.sort_by_key(|&(_, score)| Reverse(score));
        scored
            .first()
            .map(|&(kind, _)| kind)
            .unwrap_or_else(|| self.default_kind())
    }

    /// Probes `origin` once and binds the selected dialect to it.
    pub fn connect(&self, transport: &dyn Transport, origin: &Url) -> Result<Instance> {
        let probe_url = origin.join(PROBE_PATH)?;
        let probe: Value = transport::get_json(transport, &probe_url)?;
        let kind = self.select(&probe);
        debug!(origin = %origin, dialect = kind.display_name(), "connected");
        Instance::new(kind, origin.clone())
    }
}
