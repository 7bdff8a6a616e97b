mod validation;
pub use validation::*;

pub mod config;
pub use config::SearchConfig;

mod error;
pub use error::SearchError;

pub mod search;
pub use search::{
    Backend, BackendProbe, CommandAvailability, DirectoryStats, FileListQuery, FileListResult,
    LocalSearch, SearchQuery, SearchResult, SearchStatus, SystemProbe, call_site_pattern,
    escape_regex,
};
