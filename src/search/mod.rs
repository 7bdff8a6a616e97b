pub mod backend;
pub mod command;
pub mod engine;
pub mod estimator;
pub mod exec;
pub mod governor;
pub mod metadata;
pub mod normalize;
pub mod paginate;
pub mod parse;
pub mod pattern;
pub mod sorting;
pub mod stitch;
pub mod types;

pub use backend::{Backend, BackendProbe, CommandAvailability, SystemProbe};
pub use engine::LocalSearch;
pub use pattern::{call_site_pattern, escape_regex};
pub use types::*;
