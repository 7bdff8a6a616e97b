//! Backend availability probing and selection
//!
//! The backend is chosen once per query and threaded through command
//! building and parsing as a `Backend` value.

use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::exec::{self, ExecOptions};
use crate::SearchError;
use crate::config::SearchConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_OUTPUT_LIMIT: usize = 64 * 1024;

/// Which search executable serves a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// ripgrep: structured output, ignore files, multiline, PCRE2
    Primary,
    /// grep: baseline matching, approximate semantics
    Fallback,
}

impl Backend {
    #[must_use]
    pub fn program(self, config: &SearchConfig) -> &str {
        match self {
            Self::Primary => &config.primary_program,
            Self::Fallback => &config.fallback_program,
        }
    }
}

/// Warning attached to every result served by the fallback backend
#[must_use]
pub fn fallback_warning(config: &SearchConfig) -> String {
    format!(
        "`{}` is not available; results come from `{}`, which ignores .gitignore rules \
         and reports approximate match columns. Install ripgrep for exact results.",
        config.primary_program, config.fallback_program
    )
}

/// Probe result for one executable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CommandAvailability {
    pub available: bool,
}

/// Answers whether an executable can be run
#[async_trait]
pub trait BackendProbe: Send + Sync {
    async fn probe(&self, program: &str) -> CommandAvailability;
}

/// Probes by running `<program> --version`
#[derive(Debug, Clone)]
pub struct SystemProbe {
    timeout: Duration,
}

impl SystemProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: PROBE_TIMEOUT,
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendProbe for SystemProbe {
    async fn probe(&self, program: &str) -> CommandAvailability {
        let options = ExecOptions {
            timeout: self.timeout,
            max_stdout_bytes: PROBE_OUTPUT_LIMIT,
            max_stderr_bytes: PROBE_OUTPUT_LIMIT,
            cwd: None,
        };
        let available = match exec::run(program, ["--version"], &options).await {
            Ok(output) => output.success,
            Err(e) => {
                log::debug!("Probe for `{program}` failed: {e}");
                false
            }
        };
        CommandAvailability { available }
    }
}

/// Pick the backend for one query
///
/// # Errors
/// `BackendUnavailable` when neither executable can be run.
pub async fn select(probe: &dyn BackendProbe, config: &SearchConfig) -> Result<Backend, SearchError> {
    if probe.probe(&config.primary_program).await.available {
        log::debug!("Using primary backend `{}`", config.primary_program);
        return Ok(Backend::Primary);
    }
    if probe.probe(&config.fallback_program).await.available {
        log::warn!(
            "`{}` unavailable, falling back to `{}`",
            config.primary_program,
            config.fallback_program
        );
        return Ok(Backend::Fallback);
    }
    Err(SearchError::BackendUnavailable {
        primary: config.primary_program.clone(),
        fallback: config.fallback_program.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Installed(&'static [&'static str]);

    #[async_trait]
    impl BackendProbe for Installed {
        async fn probe(&self, program: &str) -> CommandAvailability {
            CommandAvailability {
                available: self.0.iter().any(|p| *p == program),
            }
        }
    }

    #[tokio::test]
    async fn test_prefers_primary() {
        let config = SearchConfig::default();
        let backend = select(&Installed(&["rg", "grep"]), &config).await.expect("available");
        assert_eq!(backend, Backend::Primary);
        assert_eq!(backend.program(&config), "rg");
    }

    #[tokio::test]
    async fn test_falls_back_to_grep() {
        let config = SearchConfig::default();
        let backend = select(&Installed(&["grep"]), &config).await.expect("available");
        assert_eq!(backend, Backend::Fallback);
        assert!(fallback_warning(&config).contains("grep"));
    }

    #[tokio::test]
    async fn test_nothing_installed() {
        let err = select(&Installed(&[]), &SearchConfig::default())
            .await
            .expect_err("no backend");
        assert_eq!(err.code(), "BACKEND_UNAVAILABLE");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_probe() {
        let probe = SystemProbe::new();
        assert!(!probe.probe("definitely-not-a-real-binary-xyz").await.available);
    }
}
