//! Relative time windows such as `2h`, `3d`, `1w`, `2m`

use crate::SearchError;

const DAYS_PER_WEEK: u64 = 7;
const DAYS_PER_MONTH: u64 = 30;

/// A window expressed in the units `find` understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindAge {
    /// `-mmin`
    Minutes(u64),
    /// `-mtime`
    Days(u64),
}

impl FindAge {
    /// Parse `<n><unit>` where unit is h, d, w or m (30-day months)
    ///
    /// # Errors
    /// `InvalidQuery` for an empty amount, zero, or an unknown unit.
    pub fn parse(window: &str) -> Result<Self, SearchError> {
        let invalid = |why: &str| SearchError::InvalidQuery {
            reason: format!("invalid time window `{window}`: {why} (expected e.g. 2h, 3d, 1w, 2m)"),
        };

        let window_trimmed = window.trim();
        let unit = window_trimmed
            .chars()
            .last()
            .ok_or_else(|| invalid("empty"))?;
        let amount: u64 = window_trimmed[..window_trimmed.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| invalid("amount is not a number"))?;
        if amount == 0 {
            return Err(invalid("amount must be positive"));
        }

        match unit.to_ascii_lowercase() {
            'h' => Ok(Self::Minutes(amount.saturating_mul(60))),
            'd' => Ok(Self::Days(amount)),
            'w' => Ok(Self::Days(amount.saturating_mul(DAYS_PER_WEEK))),
            'm' => Ok(Self::Days(amount.saturating_mul(DAYS_PER_MONTH))),
            _ => Err(invalid("unknown unit")),
        }
    }

    /// `find` predicate; `newer` selects entries modified inside the window
    #[must_use]
    pub fn find_args(self, newer: bool) -> [String; 2] {
        let sign = if newer { '-' } else { '+' };
        match self {
            Self::Minutes(n) => ["-mmin".to_string(), format!("{sign}{n}")],
            Self::Days(n) => ["-mtime".to_string(), format!("{sign}{n}")],
        }
    }
}
