//! Local search command-line entry point
//!
//! Reads one JSON query (argument or stdin), runs it and prints the JSON
//! result on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kodegen_tools_local_search::{FileListQuery, LocalSearch, SearchConfig, SearchQuery};
use std::io::Read;

#[derive(Debug, Parser)]
#[command(name = "kodegen-local-search", version, about = "Paginated local code search")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Pretty-print the JSON result
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Content search; QUERY is a JSON object such as {"pattern":"fn main","path":"/repo"}
    Search { query: Option<String> },
    /// Batch of content searches; QUERY is a JSON array of search objects
    Batch { query: Option<String> },
    /// File listing; QUERY is a JSON object such as {"path":"/repo","namePattern":"*.rs"}
    List { query: Option<String> },
    /// Print the JSON schema of the search query
    Schema,
}

fn read_query(arg: Option<String>) -> Result<String> {
    match arg {
        Some(json) => Ok(json),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read query from stdin")?;
            Ok(buf)
        }
    }
}

fn print<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let search = LocalSearch::new(SearchConfig::from_env());

    match cli.command {
        Command::Search { query } => {
            let query: SearchQuery =
                serde_json::from_str(&read_query(query)?).context("invalid search query JSON")?;
            print(&search.search(query).await, cli.pretty)
        }
        Command::Batch { query } => {
            let queries: Vec<SearchQuery> =
                serde_json::from_str(&read_query(query)?).context("invalid batch JSON")?;
            print(&search.search_batch(queries).await, cli.pretty)
        }
        Command::List { query } => {
            let query: FileListQuery =
                serde_json::from_str(&read_query(query)?).context("invalid listing query JSON")?;
            print(&search.list_files(query).await, cli.pretty)
        }
        Command::Schema => print(&schemars::schema_for!(SearchQuery), true),
    }
}
