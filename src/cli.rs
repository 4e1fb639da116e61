use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "reviewer-directory")]
#[command(about = "Reviewer directory backend (search, filters, live refresh)", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the directory HTTP API, refetching when the store signals a change.
    Serve(ServeArgs),
    /// Fetch once, run a single search, print the result as JSON.
    Query(QueryArgs),
}

/// Where reviewer rows come from.
#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// Base URL of the PostgREST-compatible data store.
    #[arg(long, env = "REVIEWER_STORE_URL")]
    pub store_url: Option<String>,

    /// API key sent as `apikey` and bearer token.
    #[arg(long, env = "REVIEWER_STORE_KEY", hide_env_values = true)]
    pub store_key: Option<String>,

    #[arg(long, default_value = "reviewers")]
    pub table: String,

    /// Read rows from a local JSON array instead of the store (takes precedence).
    #[arg(long)]
    pub source_file: Option<String>,

    /// Keep rows whose availability is not "available".
    #[arg(long)]
    pub include_unavailable: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8787)]
    pub port: u16,

    /// Also refetch on a fixed interval (seconds); 0 disables.
    #[arg(long, default_value_t = 0)]
    pub refresh_secs: u64,

    /// Service status endpoint polled every minute (`{status, uptimePct}`).
    #[arg(long, env = "REVIEWER_STATUS_URL")]
    pub status_url: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Free-text search terms (all must match).
    #[arg(long, short)]
    pub q: Option<String>,

    /// Required specialty; repeat to require several.
    #[arg(long = "specialty")]
    pub specialties: Vec<String>,

    /// Required licensure state; repeat or comma-separate.
    #[arg(long = "state", value_delimiter = ',')]
    pub states: Vec<String>,

    /// name, specialties or states.
    #[arg(long, default_value = "name")]
    pub sort: String,

    #[arg(long)]
    pub desc: bool,

    /// Show names as "Last, First".
    #[arg(long)]
    pub reorder_names: bool,
}
