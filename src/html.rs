//! HTML post bodies to wrapped terminal text.
//!
//! Rendering is two passes. The first replays the parsed fragment as a
//! stream of start tag, end tag and text events into [`RenderState`],
//! which collects flat paragraphs and writes links as sentinel-delimited
//! markers. The second pass resolves the markers into their display form.
//! Anchors whose text is an `@mention` or `#hashtag` become footnotes,
//! listed once after the body.

use std::mem;

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use scraper::{Html, Node};

use crate::wrap::Wrapper;

const LINK_OPEN: char = '\u{1}';
const LINK_CLOSE: char = '\u{2}';
const NOTE_OPEN: char = '\u{3}';
const NOTE_CLOSE: char = '\u{4}';
const SENTINELS: [char; 4] = [LINK_OPEN, LINK_CLOSE, NOTE_OPEN, NOTE_CLOSE];
const REPLACEMENT: char = '\u{FFFD}';

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\r\n\x0c]+").expect("valid whitespace regex"));
static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@[^\s@]+(?:@[^\s@]+)?$").expect("valid mention regex"));
static HASHTAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[^\s#]+$").expect("valid hashtag regex"));
static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x01([^\x02]*)\x02|\x03([^\x04]*)\x04").expect("valid marker regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub mention_symbol: String,
    pub hashtag_symbol: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mention_symbol: "@".into(),
            hashtag_symbol: "#".into(),
        }
    }
}

impl RenderConfig {
    fn display_label(&self, label: &str) -> String {
        if let Some(rest) = label.strip_prefix('@') {
            format!("{}{rest}", self.mention_symbol)
        } else if let Some(rest) = label.strip_prefix('#') {
            format!("{}{rest}", self.hashtag_symbol)
        } else {
            label.to_string()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Footnote {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub paragraphs: Vec<String>,
    pub footnotes: Vec<Footnote>,
}

impl Rendered {
    /// Each paragraph wrapped on its own, separated by blank lines.
    pub fn body_lines(&self, wrapper: &Wrapper, indent: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for (idx, paragraph) in self.paragraphs.iter().enumerate() {
            if idx > 0 {
                lines.push(indent.trim_end().to_string());
            }
            lines.extend(wrapper.wrap(paragraph, indent));
        }
        lines
    }

    pub fn footnote_lines(&self, indent: &str) -> Vec<String> {
        self.footnotes
            .iter()
            .map(|note| format!("{indent}{}: {}", note.label, note.url))
            .collect()
    }
}

/// Renders an untrusted HTML fragment. Never fails; odd markup only
/// degrades the output.
pub fn render(html: &str, config: &RenderConfig) -> Rendered {
    let mut state = RenderState::default();
    replay(html, &mut state);
    state.finish(config)
}

// Walks the parsed tree in document order without recursion so that deeply
// nested input cannot exhaust the stack.
fn replay(html: &str, state: &mut RenderState) {
    let fragment = Html::parse_fragment(html);
    let root = *fragment.root_element();
    let root_id = root.id();

    let mut next = root.first_child();
    while let Some(node) = next {
        match node.value() {
            Node::Element(el) => {
                state.start_tag(el.name(), el.attr("href"));
                if let Some(child) = node.first_child() {
                    next = Some(child);
                    continue;
                }
                state.end_tag(el.name());
            }
            Node::Text(text) => state.data(text),
            _ => {}
        }

        let mut cursor = node;
        next = loop {
            if let Some(sibling) = cursor.next_sibling() {
                break Some(sibling);
            }
            match cursor.parent() {
                Some(parent) if parent.id() != root_id => {
                    if let Node::Element(el) = parent.value() {
                        state.end_tag(el.name());
                    }
                    cursor = parent;
                }
                _ => break None,
            }
        };
    }
}

fn sanitize(data: &str) -> String {
    data.chars()
        .map(|c| if SENTINELS.contains(&c) { REPLACEMENT } else { c })
        .collect()
}

fn display_url(href: &str) -> String {
    match percent_decode_str(href).decode_utf8() {
        Ok(decoded) if !decoded.chars().any(|c| c.is_whitespace() || c.is_control()) => {
            decoded.into_owned()
        }
        _ => href.to_string(),
    }
}

#[derive(Debug, Default)]
struct RenderState {
    paragraphs: Vec<String>,
    text: String,
    anchor_text: String,
    anchor_href: Option<String>,
    anchor_depth: usize,
    // Insertion order is display order; the first URL seen for a label wins.
    footnotes: Vec<(String, String)>,
}

impl RenderState {
    fn start_tag(&mut self, name: &str, href: Option<&str>) {
        match name {
            "p" | "ol" | "ul" | "blockquote" | "pre" => self.block_start(),
            "br" => self.line_break(),
            "a" => {
                self.anchor_depth += 1;
                if self.anchor_depth == 1 {
                    self.anchor_text.clear();
                    self.anchor_href = href.map(sanitize);
                }
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, name: &str) {
        match name {
            "a" if self.anchor_depth > 0 => {
                self.anchor_depth -= 1;
                if self.anchor_depth == 0 {
                    self.close_anchor();
                }
            }
            "li" => self.line_break(),
            _ => {}
        }
    }

    fn data(&mut self, data: &str) {
        let clean = sanitize(data);
        let collapsed = WHITESPACE_RE.replace_all(&clean, " ");
        if self.anchor_depth > 0 {
            self.anchor_text.push_str(&collapsed);
        } else {
            self.text.push_str(&collapsed);
        }
    }

    fn line_break(&mut self) {
        if self.anchor_depth > 0 {
            self.anchor_text.push(' ');
        } else {
            self.text.push('\n');
        }
    }

    fn block_start(&mut self) {
        if self.anchor_depth > 0 {
            self.anchor_depth = 0;
            self.close_anchor();
        }
        let text = mem::take(&mut self.text);
        if !text.trim().is_empty() {
            self.paragraphs.push(text);
        }
    }

    fn close_anchor(&mut self) {
        let raw = mem::take(&mut self.anchor_text);
        let label = raw.trim();
        let Some(href) = self.anchor_href.take() else {
            self.text.push_str(label);
            return;
        };

        let is_mention = MENTION_RE.is_match(label);
        let is_hashtag = HASHTAG_RE.is_match(label);
        if is_mention || is_hashtag {
            let seen = self
                .footnotes
                .iter()
                .find(|(seen_label, _)| seen_label == label)
                .map(|(_, seen_href)| seen_href == &href);
            match seen {
                None => {
                    self.footnotes.push((label.to_string(), href));
                    self.push_note(label);
                    return;
                }
                Some(true) => {
                    self.push_note(label);
                    return;
                }
                Some(false) => {}
            }
        }

        if is_hashtag {
            // Labelled like a footnote, without adding one.
            self.push_note(label);
            return;
        }

        let bare = href == label
            || href == format!("http://{label}")
            || href == format!("https://{label}");
        if !bare && !label.is_empty() {
            self.text.push('[');
            self.text.push_str(label);
            self.text.push_str("] ");
        }
        self.text.push(LINK_OPEN);
        self.text.push_str(&href);
        self.text.push(LINK_CLOSE);
    }

    fn push_note(&mut self, label: &str) {
        self.text.push(NOTE_OPEN);
        self.text.push_str(label);
        self.text.push(NOTE_CLOSE);
    }

    fn finish(mut self, config: &RenderConfig) -> Rendered {
        self.block_start();
        let paragraphs = self
            .paragraphs
            .iter()
            .map(|paragraph| resolve(paragraph, config))
            .filter(|paragraph| !paragraph.is_empty())
            .collect();
        let footnotes = self
            .footnotes
            .iter()
            .map(|(label, href)| Footnote {
                label: config.display_label(label),
                url: display_url(href),
            })
            .collect();
        Rendered {
            paragraphs,
            footnotes,
        }
    }
}

fn resolve(paragraph: &str, config: &RenderConfig) -> String {
    let resolved = MARKER_RE.replace_all(paragraph, |caps: &Captures<'_>| {
        if let Some(href) = caps.get(1) {
            format!("<{}>", display_url(href.as_str()))
        } else {
            let label = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            config.display_label(label)
        }
    });
    resolved
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(html: &str) -> Vec<String> {
        render(html, &RenderConfig::default()).paragraphs
    }

    fn footnotes(html: &str) -> Vec<(String, String)> {
        render(html, &RenderConfig::default())
            .footnotes
            .into_iter()
            .map(|note| (note.label, note.url))
            .collect()
    }

    #[test]
    fn empty_input_renders_nothing() {
        let rendered = render("", &RenderConfig::default());
        assert!(rendered.paragraphs.is_empty());
        assert!(rendered.footnotes.is_empty());
    }

    #[test]
    fn paragraphs_are_wrapped_independently() {
        let rendered = render("<p>A</p><p>B</p>", &RenderConfig::default());
        assert_eq!(rendered.paragraphs, vec!["A", "B"]);
        assert_eq!(rendered.body_lines(&Wrapper::new(40), ""), vec!["A", "", "B"]);
    }

    #[test]
    fn line_breaks_survive_inside_paragraphs() {
        assert_eq!(paragraphs("<p>one<br>two</p>"), vec!["one\ntwo"]);
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(paragraphs("<p>a \n\t  b</p>"), vec!["a b"]);
    }

    #[test]
    fn mentions_become_footnotes() {
        let html = r#"<p>Hello <span class="h-card"><a href="https://ex.example/@bob" class="u-url mention">@<span>bob</span></a></span></p>"#;
        assert_eq!(paragraphs(html), vec!["Hello @bob"]);
        assert_eq!(
            footnotes(html),
            vec![("@bob".to_string(), "https://ex.example/@bob".to_string())]
        );
    }

    #[test]
    fn identical_mentions_are_deduplicated() {
        let html = r#"<p><a href="https://x.example/@bob">@bob</a> and <a href="https://x.example/@bob">@bob</a></p>"#;
        assert_eq!(paragraphs(html), vec!["@bob and @bob"]);
        assert_eq!(footnotes(html).len(), 1);
    }

    #[test]
    fn same_label_with_different_href_is_not_merged() {
        let html = r#"<p><a href="https://x.example/@bob">@bob</a> and <a href="https://y.example/@bob">@bob</a></p>"#;
        assert_eq!(
            paragraphs(html),
            vec!["@bob and [@bob] <https://y.example/@bob>"]
        );
        assert_eq!(
            footnotes(html),
            vec![("@bob".to_string(), "https://x.example/@bob".to_string())]
        );
    }

    #[test]
    fn hashtag_with_different_href_stays_inline() {
        let html = r##"<p><a href="https://x.example/tags/rust">#rust</a> <a href="https://y.example/tags/rust">#<span>rust</span></a></p>"##;
        assert_eq!(paragraphs(html), vec!["#rust #rust"]);
        assert_eq!(footnotes(html).len(), 1);
    }

    #[test]
    fn link_matching_its_text_prints_only_the_url() {
        let html = r#"<p><a href="https://ex.example/page"><span class="invisible">https://</span><span>ex.example/page</span></a></p>"#;
        assert_eq!(paragraphs(html), vec!["<https://ex.example/page>"]);

        let html = r#"<p><a href="https://ex.example/page">ex.example/page</a></p>"#;
        assert_eq!(paragraphs(html), vec!["<https://ex.example/page>"]);
    }

    #[test]
    fn other_links_print_text_and_url() {
        let html = r#"<p>see <a href="https://ex.example/d">the docs</a>.</p>"#;
        assert_eq!(paragraphs(html), vec!["see [the docs] <https://ex.example/d>."]);
        assert!(footnotes(html).is_empty());
    }

    #[test]
    fn display_urls_are_percent_decoded() {
        let html = r#"<p><a href="https://ex.example/caf%C3%A9">x</a></p>"#;
        assert_eq!(paragraphs(html), vec!["[x] <https://ex.example/café>"]);

        let html = r#"<p><a href="https://ex.example/a%20b">x</a></p>"#;
        assert_eq!(paragraphs(html), vec!["[x] <https://ex.example/a%20b>"]);
    }

    #[test]
    fn sentinel_characters_in_text_are_neutralized() {
        let mut state = RenderState::default();
        state.data("a\u{1}b\u{3}c\u{4}");
        state.start_tag("a", Some("https://ex.example/\u{2}"));
        state.data("x");
        state.end_tag("a");
        let rendered = state.finish(&RenderConfig::default());
        assert_eq!(
            rendered.paragraphs,
            vec!["a\u{FFFD}b\u{FFFD}c\u{FFFD}[x] <https://ex.example/\u{FFFD}>"]
        );
    }

    #[test]
    fn lists_and_quotes_degrade_to_text() {
        let html = "<ul><li>one</li><li>two</li></ul><blockquote>quoted</blockquote>";
        assert_eq!(paragraphs(html), vec!["one\ntwo", "quoted"]);
    }

    #[test]
    fn malformed_markup_is_tolerated() {
        let html = "<p>unclosed <b>bold<p>next</i></div>";
        assert_eq!(paragraphs(html), vec!["unclosed bold", "next"]);

        let html = "<p>see <a href='https://ex.example/x'>link</p>";
        assert_eq!(paragraphs(html), vec!["see [link] <https://ex.example/x>"]);
    }

    #[test]
    fn deeply_nested_markup_does_not_overflow() {
        let html = format!("{}deep{}", "<span>".repeat(5000), "</span>".repeat(5000));
        assert_eq!(paragraphs(&html), vec!["deep"]);
    }

    #[test]
    fn display_symbols_are_configurable() {
        let config = RenderConfig {
            mention_symbol: "~".into(),
            hashtag_symbol: "%".into(),
        };
        let html = r##"<p><a href="https://x.example/@bob">@bob</a> <a href="https://x.example/tags/t">#t</a></p>"##;
        let rendered = render(html, &config);
        assert_eq!(rendered.paragraphs, vec!["~bob %t"]);
        assert_eq!(
            rendered.footnote_lines(""),
            vec!["~bob: https://x.example/@bob", "%t: https://x.example/tags/t"]
        );
    }

    #[test]
    fn inline_hashtag_uses_configured_symbol() {
        let config = RenderConfig {
            mention_symbol: "@".into(),
            hashtag_symbol: "%".into(),
        };
        let html = r##"<p><a href="https://x.example/tags/rust">#rust</a> <a href="https://y.example/tags/rust">#rust</a></p>"##;
        let rendered = render(html, &config);
        assert_eq!(rendered.paragraphs, vec!["%rust %rust"]);
        assert_eq!(rendered.footnotes.len(), 1);
    }

    #[test]
    fn nested_anchor_keeps_outer_target() {
        let mut state = RenderState::default();
        state.start_tag("a", Some("https://outer.example/"));
        state.data("x");
        state.start_tag("a", Some("https://inner.example/"));
        state.data("y");
        state.end_tag("a");
        state.end_tag("a");
        let rendered = state.finish(&RenderConfig::default());
        assert_eq!(rendered.paragraphs, vec!["[xy] <https://outer.example/>"]);
    }

    #[test]
    fn block_start_closes_open_anchor() {
        let mut state = RenderState::default();
        state.start_tag("a", Some("https://ex.example/"));
        state.data("label");
        state.start_tag("br", None);
        state.data("more");
        state.start_tag("p", None);
        state.data("after");
        let rendered = state.finish(&RenderConfig::default());
        assert_eq!(
            rendered.paragraphs,
            vec!["[label more] <https://ex.example/>", "after"]
        );
    }

    #[test]
    fn footnotes_follow_body_in_first_seen_order() {
        let html = r##"<p><a href="https://x.example/tags/b">#b</a> <a href="https://x.example/@a">@a</a> <a href="https://x.example/tags/b">#b</a></p>"##;
        let rendered = render(html, &RenderConfig::default());
        assert_eq!(rendered.body_lines(&Wrapper::new(80), ""), vec!["#b @a #b"]);
        assert_eq!(
            rendered.footnote_lines(""),
            vec!["#b: https://x.example/tags/b", "@a: https://x.example/@a"]
        );
    }
}
