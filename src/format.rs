use chrono::{DateTime, Utc};

use crate::html::{self, RenderConfig};
use crate::normalize::MAX_EMBED_DEPTH;
use crate::post::Post;
use crate::wrap::Wrapper;

const QUOTE_INDENT: &str = "    ";

/// Turns normalized posts into multi-line text blocks.
#[derive(Debug, Clone)]
pub struct Formatter {
    wrapper: Wrapper,
    render: RenderConfig,
}

impl Formatter {
    pub fn new(wrapper: Wrapper, render: RenderConfig) -> Self {
        Self { wrapper, render }
    }

    pub fn format(&self, post: &Post) -> String {
        self.post_lines(post, "", 0).join("\n")
    }

    fn post_lines(&self, post: &Post, indent: &str, depth: usize) -> Vec<String> {
        if depth > MAX_EMBED_DEPTH {
            return vec![format!("{indent}[nested post omitted]")];
        }

        let mut lines = Vec::new();
        if let Some(original) = post.reblog.as_deref() {
            lines.push(format!("{indent}Reblogged by: {}", post.account.display()));
            lines.push(format!("{indent}Date: {}", timestamp(&post.created_at)));
            lines.extend(self.post_lines(original, indent, depth + 1));
            return lines;
        }

        lines.push(format!("{indent}From: {}", post.account.display()));
        let headers = [
            ("URL", post.url.clone()),
            ("In reply to", post.in_reply_to_url.clone()),
            ("Date", Some(timestamp(&post.created_at))),
            ("Edited", post.edited_at.as_ref().map(timestamp)),
            ("Language", post.language.clone()),
            ("Pinned", post.pinned.then(|| "yes".to_string())),
        ];
        for (name, value) in headers {
            if let Some(value) = value {
                lines.push(format!("{indent}{name}: {value}"));
            }
        }

        let rendered = html::render(&post.content, &self.render);
        let mut body = Vec::new();
        let warning = post.spoiler_text.trim();
        if !warning.is_empty() {
            body.extend(
                self.wrapper
                    .wrap(&format!("Content warning: {warning}"), indent)
                    .collect::<Vec<_>>(),
            );
            body.push(String::new());
        }
        body.extend(rendered.body_lines(&self.wrapper, indent));

        if !post.media_attachments.is_empty() {
            if !body.is_empty() {
                body.push(String::new());
            }
            let detail_indent = format!("{indent}  ");
            for media in &post.media_attachments {
                let url = media.url.as_deref().unwrap_or("(no url)");
                body.push(format!("{indent}Media: {} {url}", media.kind));
                if let Some(description) = media.description.as_deref() {
                    body.extend(self.wrapper.wrap(description, &detail_indent));
                }
            }
        }

        if let Some(quoted) = post.quote.as_deref() {
            if !body.is_empty() {
                body.push(String::new());
            }
            let quote_indent = format!("{indent}{QUOTE_INDENT}");
            body.extend(self.post_lines(quoted, &quote_indent, depth + 1));
        }

        body.extend(rendered.footnote_lines(indent));

        if !body.is_empty() {
            lines.push(String::new());
            lines.extend(body);
        }
        lines
    }
}

fn timestamp(when: &DateTime<Utc>) -> String {
    when.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::tests::sample_post;
    use crate::post::MediaAttachment;

    fn formatter(width: usize) -> Formatter {
        Formatter::new(Wrapper::new(width), RenderConfig::default())
    }

    #[test]
    fn renders_header_body_and_footnotes() {
        let post = sample_post(
            "1",
            "<p>Hello <a href=\"https://ex.example/@bob\">@bob</a></p>",
        );
        let block = formatter(80).format(&post);
        let lines: Vec<&str> = block.lines().collect();

        assert!(lines[0].starts_with("From: Alice "), "{block}");
        let blank = lines.iter().position(|l| l.is_empty()).unwrap();
        assert_eq!(lines[blank + 1], "Hello @bob");
        assert_eq!(lines.last(), Some(&"@bob: https://ex.example/@bob"));
        assert!(lines.contains(&"Date: 2024-01-02 03:04:05 UTC"));
        assert!(lines.contains(&"Language: en"));
    }

    #[test]
    fn reblog_shows_booster_then_original() {
        let original = sample_post("1", "<p>original text</p>");
        let mut outer = sample_post("2", "");
        outer.account.display_name = "Carol".into();
        outer.account.acct = "carol".into();
        outer.reblog = Some(Box::new(original));

        let block = formatter(80).format(&outer);
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines[0], "Reblogged by: Carol <@carol>");
        assert!(lines[1].starts_with("Date: "));
        assert_eq!(lines[2], "From: Alice <@alice>");
        assert!(lines.contains(&"original text"));
    }

    #[test]
    fn quote_is_indented_below_body() {
        let quoted = sample_post("1", "<p>quoted words</p>");
        let mut post = sample_post("2", "<p>my take</p>");
        post.quote = Some(Box::new(quoted));

        let block = formatter(80).format(&post);
        assert!(block.contains("my take\n\n    From: Alice <@alice>"), "{block}");
        assert!(block.contains("\n    quoted words"), "{block}");
    }

    #[test]
    fn optional_headers_are_omitted() {
        let mut post = sample_post("1", "<p>x</p>");
        post.url = None;
        post.language = None;
        let block = formatter(80).format(&post);
        assert!(!block.contains("URL:"));
        assert!(!block.contains("Language:"));
        assert!(!block.contains("Edited:"));
        assert!(!block.contains("In reply to:"));
    }

    #[test]
    fn media_and_content_warning_are_listed() {
        let mut post = sample_post("1", "<p>body</p>");
        post.spoiler_text = "spoilers".into();
        post.media_attachments.push(MediaAttachment {
            kind: "image".into(),
            url: Some("https://ex.example/a.png".into()),
            description: Some("a cat on a mat".into()),
        });
        let block = formatter(80).format(&post);
        assert!(block.contains("Content warning: spoilers\n\nbody"), "{block}");
        assert!(block.contains("\n\nMedia: image https://ex.example/a.png\n  a cat on a mat"));
    }

    #[test]
    fn empty_content_has_no_body_section() {
        let post = sample_post("1", "");
        let block = formatter(80).format(&post);
        assert!(!block.ends_with('\n'));
        assert!(!block.lines().any(|l| l.is_empty()));
    }
}
