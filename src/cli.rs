use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Parser)]
#[command(name = "fediread", version)]
#[command(about = "Read fediverse posts, users and hashtags as plain text", long_about = None)]
pub struct Cli {
    /// A user (@user@server), profile, post or hashtag URL
    pub address: String,

    /// Maximum number of posts to show
    #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Show a user's pinned posts first; they count toward --limit
    #[arg(long)]
    pub pinned: bool,

    /// Include a user's replies
    #[arg(long)]
    pub replies: bool,

    /// Only a user's posts with media attached
    #[arg(long)]
    pub media: bool,

    /// Show the posts a post replies to
    #[arg(long)]
    pub ancestors: bool,

    /// Show replies to a post
    #[arg(long)]
    pub descendants: bool,

    /// Shorthand for --ancestors --descendants
    #[arg(long)]
    pub thread: bool,

    /// Wrap text at this column (0 disables wrapping)
    #[arg(short, long)]
    pub width: Option<usize>,

    /// Configuration file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log requests and dialect detection to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from(["fediread", "-n", "5", "--thread", "@alice@example.social"]);
        assert_eq!(cli.limit, 5);
        assert!(cli.thread);
        assert_eq!(cli.address, "@alice@example.social");
        assert_eq!(cli.width, None);
    }
}
