use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Characters a server name may contain in an address.
const DOMAIN_CLASS: &str = r"[^@/?#\x00-\x1f\x7f]+";
/// Characters a user name or hashtag may contain before percent-decoding.
const NAME_CLASS: &str = r"[^/?#\x00-\x1f\x7f]+";

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_]+").expect("valid word regex"));

/// Route-specific modifiers implied by the address shape itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteFlags {
    pub embed: bool,
    pub with_replies: bool,
    pub media: bool,
}

impl RouteFlags {
    pub const NONE: RouteFlags = RouteFlags {
        embed: false,
        with_replies: false,
        media: false,
    };
    pub const EMBED: RouteFlags = RouteFlags {
        embed: true,
        with_replies: false,
        media: false,
    };
    pub const WITH_REPLIES: RouteFlags = RouteFlags {
        embed: false,
        with_replies: true,
        media: false,
    };
    pub const MEDIA: RouteFlags = RouteFlags {
        embed: false,
        with_replies: false,
        media: true,
    };
}

/// A human-readable address shape such as `https://DOMAIN/@USER/NNNNNN`.
///
/// Uppercase words are placeholders: `DOMAIN`, `USER`, `TAG`, and
/// `NNNNNN` or `IDENT` for a post identifier. Everything else is literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressTemplate {
    pub pattern: &'static str,
    pub flags: RouteFlags,
}

impl AddressTemplate {
    pub const fn new(pattern: &'static str) -> Self {
        Self {
            pattern,
            flags: RouteFlags::NONE,
        }
    }

    pub const fn with_flags(pattern: &'static str, flags: RouteFlags) -> Self {
        Self { pattern, flags }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub template: AddressTemplate,
    pub regex: Regex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Domain,
    User,
    Tag,
    Ident,
}

impl Placeholder {
    fn group(self) -> &'static str {
        match self {
            Placeholder::Domain => "domain",
            Placeholder::User => "user",
            Placeholder::Tag => "tag",
            Placeholder::Ident => "ident",
        }
    }
}

fn is_placeholder_word(word: &str, offset: usize) -> bool {
    if offset == 0 && word.eq_ignore_ascii_case("https") {
        return false;
    }
    word.chars().all(|c| c.is_ascii_uppercase())
}

fn placeholder(template: &str, word: &str) -> Result<Placeholder> {
    match word {
        "DOMAIN" => Ok(Placeholder::Domain),
        "USER" => Ok(Placeholder::User),
        "TAG" => Ok(Placeholder::Tag),
        "NNNNNN" | "IDENT" => Ok(Placeholder::Ident),
        other => Err(Error::Template {
            template: template.to_string(),
            reason: format!("unknown placeholder {other}"),
        }),
    }
}

/// Compiles a template into an anchored regex with named groups.
///
/// `ident_grammar` is the regex fragment a post identifier must match.
/// `discard_prefixes` are path segments that may appear, zero or more
/// times, between the domain and the next `/` of the template; they are
/// matched and thrown away.
pub fn compile(
    template: &AddressTemplate,
    ident_grammar: &str,
    discard_prefixes: &[&str],
) -> Result<CompiledTemplate> {
    let source = template.pattern;
    let mut pattern = String::from("^");
    let mut seen: Vec<Placeholder> = Vec::new();
    let mut after_domain = false;
    let mut last = 0;

    for word in WORD_RE.find_iter(source) {
        if !is_placeholder_word(word.as_str(), word.start()) {
            continue;
        }
        let token = placeholder(source, word.as_str())?;
        if seen.contains(&token) {
            return Err(Error::Template {
                template: source.to_string(),
                reason: format!("placeholder {} used twice", word.as_str()),
            });
        }
        seen.push(token);

        push_literal(
            &mut pattern,
            &source[last..word.start()],
            after_domain,
            discard_prefixes,
        );
        let class = match token {
            Placeholder::Domain => DOMAIN_CLASS,
            Placeholder::User | Placeholder::Tag => NAME_CLASS,
            Placeholder::Ident => ident_grammar,
        };
        pattern.push_str(&format!("(?P<{}>{})", token.group(), class));
        after_domain = token == Placeholder::Domain;
        last = word.end();
    }
    push_literal(&mut pattern, &source[last..], after_domain, discard_prefixes);
    pattern.push('$');

    let regex = Regex::new(&pattern).map_err(|err| Error::Template {
        template: source.to_string(),
        reason: err.to_string(),
    })?;
    Ok(CompiledTemplate {
        template: *template,
        regex,
    })
}

fn push_literal(pattern: &mut String, literal: &str, after_domain: bool, discard: &[&str]) {
    if after_domain && literal.starts_with('/') && !discard.is_empty() {
        let alternatives = discard
            .iter()
            .map(|prefix| regex::escape(prefix))
            .collect::<Vec<_>>()
            .join("|");
        pattern.push_str(&format!("(?:/(?:{alternatives}))*"));
    }
    pattern.push_str(&regex::escape(literal));
}
