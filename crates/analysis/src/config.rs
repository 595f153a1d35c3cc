//! Scan configuration

use crate::level::ScanLevel;
use crate::pattern::SELECTOR_PATTERN;

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub scan_level: ScanLevel,
    /// Regexes for name references outside the index, see `TextPattern`
    pub extra_patterns: Vec<String>,
    /// Upper bound on files analyzed at once
    pub max_concurrency: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_level: ScanLevel::default(),
            extra_patterns: vec![SELECTOR_PATTERN.to_string()],
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl ScanConfig {
    /// Load overrides from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("INCPRUNE_SCAN_LEVEL") {
            match ScanLevel::from_str(&v) {
                Some(level) => config.scan_level = level,
                None => tracing::warn!("Ignoring unknown INCPRUNE_SCAN_LEVEL {:?}", v),
            }
        }

        if let Ok(v) = std::env::var("INCPRUNE_EXTRA_PATTERNS") {
            config.extra_patterns = v
                .split(';')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }

        if let Ok(v) = std::env::var("INCPRUNE_MAX_CONCURRENCY") {
            if let Ok(n) = v.parse::<usize>() {
                if n > 0 {
                    config.max_concurrency = n;
                }
            }
        }

        config
    }

    pub fn with_scan_level(mut self, level: ScanLevel) -> Self {
        self.scan_level = level;
        self
    }

    pub fn with_extra_patterns(mut self, patterns: Vec<String>) -> Self {
        self.extra_patterns = patterns;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }
}
