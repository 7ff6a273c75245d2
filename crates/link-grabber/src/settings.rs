//! Persistent user settings: the blocked-domain list and extra noise rules.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::noise::{NoiseFilter, NoiseRules};
use crate::types::{GrabError, GrabResult};

/// Domains blocked on first run.
pub const DEFAULT_BLOCKED_DOMAINS: &[&str] =
    &["bad1.example.com", "bad2.example.com", "bad4.example.com"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    /// Regexes appended to the built-in noise patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_noise_patterns: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            blocked_domains: DEFAULT_BLOCKED_DOMAINS.iter().map(|d| d.to_string()).collect(),
            extra_noise_patterns: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> GrabResult<Self> {
        if !path.exists() {
            tracing::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map_err(|e| GrabError::Settings(format!("{}: {e}", path.display())))
    }

    /// Write settings as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> GrabResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!("saved settings to {}", path.display());
        Ok(())
    }

    /// Add a blocked domain. Returns `false` if it was already listed.
    pub fn add_blocked(&mut self, domain: &str) -> GrabResult<bool> {
        let domain = clean_domain(domain)?;
        if self.blocked_domains.iter().any(|d| d.eq_ignore_ascii_case(&domain)) {
            return Ok(false);
        }
        self.blocked_domains.push(domain);
        Ok(true)
    }

    /// Remove a blocked domain. Returns `false` if it was not listed.
    pub fn remove_blocked(&mut self, domain: &str) -> bool {
        let domain = domain.trim();
        let before = self.blocked_domains.len();
        self.blocked_domains.retain(|d| !d.eq_ignore_ascii_case(domain));
        self.blocked_domains.len() != before
    }

    /// Lowercased, deduplicated blocked domains.
    pub fn blocked_set(&self) -> BTreeSet<String> {
        self.blocked_domains
            .iter()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect()
    }

    /// Built-in noise rules plus the configured extra patterns.
    pub fn noise_filter(&self) -> GrabResult<NoiseFilter> {
        if self.extra_noise_patterns.is_empty() {
            return Ok(NoiseFilter::builtin());
        }
        self.extra_noise_patterns
            .iter()
            .fold(NoiseRules::builtin(), |rules, p| rules.with_pattern(p.clone()))
            .compile()
    }
}

fn clean_domain(domain: &str) -> GrabResult<String> {
    let domain = domain.trim().trim_end_matches('.').to_lowercase();
    let valid = !domain.is_empty()
        && !domain.contains(['/', ':', ' '])
        && domain.split('.').all(|label| !label.is_empty());
    if !valid {
        return Err(GrabError::Settings(format!("not a domain: {domain:?}")));
    }
    Ok(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.blocked_domains.len(), 3);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        assert!(settings.add_blocked("Ads.Tracker.io").unwrap());
        assert!(!settings.add_blocked("ads.tracker.io").unwrap());
        assert!(settings.remove_blocked("bad2.example.com"));
        assert!(!settings.remove_blocked("never.listed"));
        settings.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"blockedDomains\""));

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);
        assert!(loaded.blocked_set().contains("ads.tracker.io"));
        assert!(!loaded.blocked_set().contains("bad2.example.com"));
    }

    #[test]
    fn test_rejects_non_domains() {
        let mut settings = Settings::default();
        assert!(settings.add_blocked("https://x.com/").is_err());
        assert!(settings.add_blocked("  ").is_err());
        assert!(settings.add_blocked("a..b").is_err());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(GrabError::Settings(_))));
    }

    #[test]
    fn test_extra_noise_patterns() {
        let settings: Settings =
            serde_json::from_str(r#"{"blockedDomains":[],"extraNoisePatterns":["internal\\.corp"]}"#)
                .unwrap();
        let filter = settings.noise_filter().unwrap();
        assert!(filter.is_noise("https://cdn.internal.corp/x.js"));
        assert!(filter.rule_count() > NoiseFilter::builtin().rule_count());

        let broken = Settings {
            extra_noise_patterns: vec!["(".into()],
            ..Default::default()
        };
        assert!(matches!(
            broken.noise_filter(),
            Err(GrabError::InvalidPattern { .. })
        ));
    }
}
