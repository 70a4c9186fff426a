//! Which entries are worth sending to the remote service.

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Lowercased suffixes, dot included
    suffixes: Vec<String>,
    skip_noise: bool,
    noise_patterns: Vec<String>,
}

impl FilterPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            suffixes: config.suffixes(),
            skip_noise: config.skip_noise,
            noise_patterns: config.noise_patterns.clone(),
        }
    }

    /// Noise filtering disabled: every path is hashed and considered.
    pub fn without_noise_filter(mut self) -> Self {
        self.skip_noise = false;
        self
    }

    /// Paths inside archive metadata or VCS directories.
    pub fn is_noise(&self, name: &str) -> bool {
        self.skip_noise && self.noise_patterns.iter().any(|p| name.contains(p.as_str()))
    }

    /// Case-insensitive extension check.
    pub fn is_image(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.suffixes.iter().any(|s| lower.ends_with(s.as_str()))
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
