//! Command construction for the search and listing backends
//!
//! Builders only produce a program name and argument vector; nothing here
//! spawns a process, so every translation rule is testable in isolation.

pub mod find;
pub mod globs;
pub mod grep;
pub mod ripgrep;
pub mod time_window;

use std::fmt;

use super::backend::Backend;
use super::types::SearchQuery;
use crate::SearchError;

/// Operating system family whose tool flavors the builder targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// GNU userland (grep, findutils)
    Linux,
    /// BSD userland
    MacOs,
    Other,
}

impl Platform {
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(any(
            target_os = "macos",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        )) {
            Self::MacOs
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub fn is_bsd(self) -> bool {
        matches!(self, Self::MacOs)
    }

    /// Whether grep here is expected to support `-P`
    #[must_use]
    pub fn has_gnu_grep(self) -> bool {
        matches!(self, Self::Linux)
    }
}

/// A fully built backend invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Flags that were substituted or dropped while building
    pub warnings: Vec<String>,
}

impl SearchCommand {
    pub(crate) fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn arg_pair(&mut self, flag: &str, value: impl fmt::Display) -> &mut Self {
        self.args.push(flag.to_string());
        self.args.push(value.to_string());
        self
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// True when `flag` appears as a standalone argument
    #[must_use]
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }
}

impl fmt::Display for SearchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || "'\"*?{}[]$!\\|&;<>()".contains(c)) {
                write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Build the search invocation for the chosen backend
///
/// # Errors
/// `InvalidQuery` when a glob is malformed; `FeatureRequiresPrimary` when the
/// fallback backend cannot express a requested capability.
pub fn build_search(
    query: &SearchQuery,
    backend: Backend,
    program: &str,
    platform: Platform,
) -> Result<SearchCommand, SearchError> {
    globs::validate(&query.include)?;
    globs::validate(&query.exclude)?;

    match backend {
        Backend::Primary => Ok(ripgrep::build(query, program)),
        Backend::Fallback => grep::build(query, program, platform),
    }
}
