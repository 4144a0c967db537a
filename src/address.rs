use percent_encoding::percent_decode_str;
use regex::Captures;

use crate::dialect::{DialectKind, Registry};
use crate::error::Result;
use crate::template::{self, AddressTemplate, CompiledTemplate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub domain: String,
    pub user: Option<String>,
    pub tag: Option<String>,
    pub ident: Option<String>,
    pub embed: bool,
    pub with_replies: bool,
    pub media: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    User,
    Tag,
    Post,
}

impl ParsedAddress {
    pub fn kind(&self) -> AddressKind {
        if self.ident.is_some() {
            AddressKind::Post
        } else if self.tag.is_some() {
            AddressKind::Tag
        } else {
            AddressKind::User
        }
    }

    pub fn origin(&self) -> String {
        format!("https://{}", self.domain)
    }
}

/// All compiled address templates of one dialect, in registration order.
#[derive(Debug, Clone)]
pub struct Matcher {
    templates: Vec<CompiledTemplate>,
}

impl Matcher {
    pub fn new(
        templates: &[AddressTemplate],
        ident_grammar: &str,
        discard_prefixes: &[&str],
    ) -> Result<Self> {
        let templates = templates
            .iter()
            .map(|t| template::compile(t, ident_grammar, discard_prefixes))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { templates })
    }

    pub fn templates(&self) -> impl Iterator<Item = &AddressTemplate> {
        self.templates.iter().map(|compiled| &compiled.template)
    }

    /// Returns the first template that matches the whole address.
    pub fn matches(&self, address: &str) -> Option<ParsedAddress> {
        self.templates.iter().find_map(|compiled| {
            let caps = compiled.regex.captures(address)?;
            let domain = caps.name("domain")?.as_str();
            if domain.is_empty() {
                return None;
            }
            let flags = compiled.template.flags;
            Some(ParsedAddress {
                domain: domain.to_string(),
                user: decoded(&caps, "user"),
                tag: decoded(&caps, "tag"),
                ident: caps.name("ident").map(|m| m.as_str().to_string()),
                embed: flags.embed,
                with_replies: flags.with_replies,
                media: flags.media,
            })
        })
    }
}

fn decoded(caps: &Captures<'_>, group: &str) -> Option<String> {
    caps.name(group)
        .map(|m| percent_decode_str(m.as_str()).decode_utf8_lossy().into_owned())
}

/// Drops a `#fragment`; fragments never select a different resource.
pub fn strip_fragment(address: &str) -> &str {
    match address.find('#') {
        Some(idx) => &address[..idx],
        None => address,
    }
}

/// Tries each registered dialect's matcher in registry order.
pub fn match_any(registry: &Registry, address: &str) -> Option<(DialectKind, ParsedAddress)> {
    registry
        .dialects()
        .find_map(|dialect| dialect.matcher.matches(address).map(|p| (dialect.kind, p)))
}
