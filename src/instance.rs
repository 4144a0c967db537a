use url::Url;

use crate::dialect::DialectKind;
use crate::error::{Error, Result};

/// A server origin bound to the dialect it was identified as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    dialect: DialectKind,
    origin: Url,
    api_base: Url,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFilter {
    pub exclude_replies: bool,
    pub only_media: bool,
    pub pinned: bool,
}

impl Instance {
    pub fn new(dialect: DialectKind, origin: Url) -> Result<Self> {
        if origin.cannot_be_a_base() || origin.host_str().is_none() {
            return Err(Error::Config(format!("not a server origin: {origin}")));
        }
        let api_base = origin.join("/api/v1")?;
        Ok(Self {
            dialect,
            origin,
            api_base,
        })
    }

    pub fn dialect(&self) -> DialectKind {
        self.dialect
    }

    /// Canonical user-facing URL of the post with the given id.
    pub fn post_url(&self, id: &str) -> String {
        let origin = self.origin.as_str().trim_end_matches('/');
        format!("{origin}{}", self.dialect.post_path().replace("IDENT", id))
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("not a server origin: {}", self.origin)))?
            .extend(segments);
        Ok(url)
    }

    pub fn account_lookup_url(&self, acct: &str) -> Result<Url> {
        let mut url = self.api_url(&["accounts", "lookup"])?;
        url.query_pairs_mut().append_pair("acct", acct);
        Ok(url)
    }

    pub fn account_statuses_url(&self, account_id: &str, filter: StatusFilter) -> Result<Url> {
        let mut url = self.api_url(&["accounts", account_id, "statuses"])?;
        let params = [
            ("exclude_replies", filter.exclude_replies),
            ("only_media", filter.only_media),
            ("pinned", filter.pinned),
        ];
        if params.iter().any(|&(_, on)| on) {
            url.query_pairs_mut().extend_pairs(
                params
                    .iter()
                    .filter(|&&(_, on)| on)
                    .map(|&(key, _)| (key, "true")),
            );
        }
        Ok(url)
    }

    pub fn tag_timeline_url(&self, tag: &str) -> Result<Url> {
        self.api_url(&["timelines", "tag", tag])
    }

    pub fn status_url(&self, id: &str) -> Result<Url> {
        self.api_url(&["statuses", id])
    }

    pub fn context_url(&self, id: &str) -> Result<Url> {
        self.api_url(&["statuses", id, "context"])
    }
}
