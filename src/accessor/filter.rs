//! Include/exclude name filters
//!
//! Patterns are globs: `*` matches any run of characters, `?` matches one.

use crate::config::FilterConfig;
use crate::error::{SyncError, SyncResult};
use regex::Regex;

#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl NameFilter {
    /// Filter that accepts every name
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn new(include: &[String], exclude: &[String]) -> SyncResult<Self> {
        Ok(Self {
            include: include.iter().map(|p| Self::compile(p)).collect::<SyncResult<_>>()?,
            exclude: exclude.iter().map(|p| Self::compile(p)).collect::<SyncResult<_>>()?,
        })
    }

    pub fn from_config(config: &FilterConfig) -> SyncResult<Self> {
        Self::new(&config.include, &config.exclude)
    }

    /// An empty include list admits everything; exclude always wins
    pub fn matches(&self, name: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|re| re.is_match(name));
        included && !self.exclude.iter().any(|re| re.is_match(name))
    }

    fn compile(pattern: &str) -> SyncResult<Regex> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');

        Regex::new(&expr).map_err(|e| SyncError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
    }
}
