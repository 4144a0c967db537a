use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::debug;
use url::Url;

use crate::address::{self, AddressKind, ParsedAddress};
use crate::cli::Cli;
use crate::config;
use crate::data::{Reader, Rendering, ThreadOptions, UserPostOptions};
use crate::dialect::Registry;
use crate::error::Error;
use crate::format::Formatter;
use crate::transport::HttpTransport;
use crate::wrap::Wrapper;

pub fn run(cli: Cli) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: cli.config.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    let registry = Registry::new().context("build address templates")?;

    let raw = address::strip_fragment(cli.address.trim());
    let (matched_by, parsed) = address::match_any(&registry, raw)
        .ok_or_else(|| Error::UnsupportedAddress(raw.to_string()))?;
    debug!(?parsed, dialect = matched_by.display_name(), "address");

    let transport =
        HttpTransport::new(cfg.http.transport_config()).context("build HTTP client")?;
    let origin = Url::parse(&parsed.origin())
        .with_context(|| format!("server origin for {raw}"))?;
    let instance = registry
        .connect(&transport, &origin)
        .with_context(|| format!("identify server {origin}"))?;

    let width = cli.width.unwrap_or(cfg.render.width);
    let formatter = Formatter::new(Wrapper::new(width), cfg.render.render_config());
    let reader = Reader::new(&transport, instance, formatter);

    let rendering = dispatch(&reader, &parsed, &cli)?;
    write_rendering(&rendering)?;
    Ok(())
}

fn dispatch(reader: &Reader<'_>, parsed: &ParsedAddress, cli: &Cli) -> Result<Rendering> {
    match parsed.kind() {
        AddressKind::Tag => {
            let tag = parsed.tag.as_deref().unwrap_or_default();
            reader
                .tag_timeline(tag, cli.limit)
                .with_context(|| format!("fetch #{tag}"))
        }
        AddressKind::Post => {
            let id = parsed.ident.as_deref().unwrap_or_default();
            let opts = ThreadOptions {
                limit: cli.limit,
                ancestors: cli.ancestors || cli.thread,
                descendants: cli.descendants || cli.thread,
            };
            reader
                .single_post(id, opts)
                .with_context(|| format!("fetch post {id}"))
        }
        AddressKind::User => {
            let user = parsed.user.as_deref().unwrap_or_default();
            let opts = UserPostOptions {
                limit: cli.limit,
                with_replies: parsed.with_replies || cli.replies,
                media: parsed.media || cli.media,
                pinned: cli.pinned,
            };
            reader
                .user_posts(user, opts)
                .with_context(|| format!("fetch posts by {user}"))
        }
    }
}

fn write_rendering(rendering: &Rendering) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for block in &rendering.blocks {
        writeln!(out, "{block}")?;
        writeln!(out)?;
    }
    writeln!(out, "{} posts", rendering.count)?;
    out.flush()
}
