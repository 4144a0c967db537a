use tracing::debug;

use crate::error::Result;
use crate::format::Formatter;
use crate::instance::{Instance, StatusFilter};
use crate::normalize;
use crate::post::{Account, Context, Post};
use crate::transport::{self, Paginator, Transport};

/// Formatted post blocks in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendering {
    pub blocks: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserPostOptions {
    pub limit: usize,
    pub with_replies: bool,
    pub media: bool,
    pub pinned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadOptions {
    pub limit: usize,
    pub ancestors: bool,
    pub descendants: bool,
}

pub struct Reader<'a> {
    transport: &'a dyn Transport,
    instance: Instance,
    formatter: Formatter,
}

impl<'a> Reader<'a> {
    pub fn new(transport: &'a dyn Transport, instance: Instance, formatter: Formatter) -> Self {
        Self {
            transport,
            instance,
            formatter,
        }
    }

    pub fn tag_timeline(&self, tag: &str, limit: usize) -> Result<Rendering> {
        let url = self.instance.tag_timeline_url(tag)?;
        let posts: Vec<Post> = Paginator::new(self.transport, url, limit).collect()?;
        Ok(self.render(posts))
    }

    pub fn user_posts(&self, user: &str, opts: UserPostOptions) -> Result<Rendering> {
        let lookup = self.instance.account_lookup_url(user)?;
        let account: Account = transport::get_json(self.transport, &lookup)?;
        debug!(acct = %account.acct, id = %account.id, "account");

        let mut posts = Vec::new();
        if opts.pinned {
            let url = self.instance.account_statuses_url(
                &account.id,
                StatusFilter {
                    pinned: true,
                    ..StatusFilter::default()
                },
            )?;
            let pinned: Vec<Post> = Paginator::new(self.transport, url, opts.limit).collect()?;
            posts.extend(pinned.into_iter().map(|mut post| {
                post.pinned = true;
                post
            }));
        }

        // Pinned posts count against the same limit as the timeline.
        let remaining = opts.limit.saturating_sub(posts.len());
        if remaining > 0 {
            let url = self.instance.account_statuses_url(
                &account.id,
                StatusFilter {
                    exclude_replies: !opts.with_replies,
                    only_media: opts.media,
                    pinned: false,
                },
            )?;
            let timeline: Vec<Post> = Paginator::new(self.transport, url, remaining).collect()?;
            posts.extend(timeline);
        }
        Ok(self.render(posts))
    }

    pub fn single_post(&self, id: &str, opts: ThreadOptions) -> Result<Rendering> {
        let post: Post = transport::get_json(self.transport, &self.instance.status_url(id)?)?;
        if !opts.ancestors && !opts.descendants {
            return Ok(self.render(vec![post]));
        }

        let context: Context =
            transport::get_json(self.transport, &self.instance.context_url(id)?)?;
        let mut posts = Vec::new();
        if opts.ancestors {
            // Closest ancestors are last; keep those.
            let skip = context.ancestors.len().saturating_sub(opts.limit);
            posts.extend(context.ancestors.into_iter().skip(skip));
        }
        posts.push(post);
        if opts.descendants {
            posts.extend(context.descendants.into_iter().take(opts.limit));
        }
        Ok(self.render(posts))
    }

    fn render(&self, posts: Vec<Post>) -> Rendering {
        let posts = normalize::fix_all(&self.instance, posts);
        let blocks: Vec<String> = posts.iter().map(|p| self.formatter.format(p)).collect();
        Rendering {
            count: blocks.len(),
            blocks,
        }
    }
}
