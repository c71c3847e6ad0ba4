use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rum")]
#[command(about = "Sync and browse group content from a rum node")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the sync engine in the foreground until Ctrl-C
    Run {
        /// Group polled on every tick
        #[arg(long, value_name = "GROUP")]
        active: Option<String>,
    },
    /// List groups the node has joined
    Groups {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent posts of a group
    Posts {
        #[arg(long, value_name = "GROUP")]
        group: String,
        /// Only posts by this publisher key
        #[arg(long, value_name = "PUBKEY")]
        publisher: Option<String>,
        /// Number of posts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List comments of a post
    Comments {
        #[arg(long, value_name = "TRX")]
        post: String,
        /// Number of comments to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Publish a post
    Post {
        #[arg(long, value_name = "GROUP")]
        group: String,
        /// Optional title
        #[arg(long)]
        title: Option<String>,
        /// Post content (read from stdin when omitted)
        content: Vec<String>,
    },
    /// Comment on a post or reply to a comment
    Comment {
        #[arg(long, value_name = "GROUP")]
        group: String,
        #[arg(long, value_name = "TRX")]
        post: String,
        /// Comment being replied to
        #[arg(long, value_name = "TRX")]
        reply_to: Option<String>,
        /// Comment content (read from stdin when omitted)
        content: Vec<String>,
    },
    /// Like a post or comment
    Like(ReactArgs),
    /// Dislike a post or comment
    Dislike(ReactArgs),
    /// Withdraw a like
    UndoLike(ReactArgs),
    /// Withdraw a dislike
    UndoDislike(ReactArgs),
    /// Delete one of your posts
    Delete {
        #[arg(long, value_name = "GROUP")]
        group: String,
        #[arg(long, value_name = "TRX")]
        post: String,
    },
    /// Update your profile in a group
    Profile {
        #[arg(long, value_name = "GROUP")]
        group: String,
        #[arg(long)]
        name: String,
        /// Wallet address shown to tippers
        #[arg(long)]
        wallet: Option<String>,
    },
    /// Follow a publisher
    Follow(RelateArgs),
    /// Stop following a publisher
    Unfollow(RelateArgs),
    /// Block a publisher
    Block(RelateArgs),
    /// Unblock a publisher
    Unblock(RelateArgs),
    /// List who a publisher follows and blocks
    Relations {
        #[arg(long, value_name = "GROUP")]
        group: String,
        /// Publisher key (defaults to your own)
        #[arg(long, value_name = "PUBKEY")]
        publisher: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show notifications of a group
    Notifications {
        #[arg(long, value_name = "GROUP")]
        group: String,
        /// Mark them read after listing
        #[arg(long)]
        read: bool,
        /// Number of notifications to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show unread counters of a group
    Status {
        #[arg(long, value_name = "GROUP")]
        group: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all locally synced data
    Clear {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct ReactArgs {
    #[arg(long, value_name = "GROUP")]
    pub group: String,
    /// Post or comment trx id
    #[arg(long, value_name = "TRX")]
    pub object: String,
}

#[derive(Args)]
pub struct RelateArgs {
    #[arg(long, value_name = "GROUP")]
    pub group: String,
    /// Publisher key
    #[arg(long, value_name = "PUBKEY")]
    pub target: String,
}
