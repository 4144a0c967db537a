use tracing::warn;

use crate::instance::Instance;
use crate::post::Post;

/// Deepest reblog/quote nesting that gets normalized.
pub const MAX_EMBED_DEPTH: usize = 8;

/// Repairs server quirks in a fetched post before it is rendered.
pub fn fix(instance: &Instance, mut post: Post) -> Post {
    fix_at(instance, &mut post, 0);
    post
}

pub fn fix_all(instance: &Instance, posts: Vec<Post>) -> Vec<Post> {
    posts.into_iter().map(|post| fix(instance, post)).collect()
}

fn fix_at(instance: &Instance, post: &mut Post, depth: usize) {
    if depth > MAX_EMBED_DEPTH {
        warn!(id = %post.id, depth, "embedded post nested too deeply, not normalized");
        return;
    }

    post.in_reply_to_url = post
        .in_reply_to_id
        .as_deref()
        .map(|id| instance.post_url(id));

    if let Some(reblog) = post.reblog.as_deref_mut() {
        fix_at(instance, reblog, depth + 1);
        if reblog.uri.is_some() {
            // A reblog's own url often just points at the original.
            if post.url == reblog.uri {
                post.url = Some(instance.post_url(&post.id));
            }
            if post.uri == reblog.uri {
                post.uri = None;
            }
        }
    }

    if let Some(quote) = post.quote.as_deref_mut() {
        fix_at(instance, quote, depth + 1);
    }

    if let Some(fixed) = post
        .url
        .as_deref()
        .and_then(|url| instance.dialect().fix_url(url))
    {
        post.url = Some(fixed);
    }
}
