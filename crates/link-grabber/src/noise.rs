//! Noise rules for library, CDN, documentation and tracking URLs.
//!
//! The rule set is plain data. [`NoiseRules`] holds a literal prefix table
//! and an ordered list of regex patterns; [`NoiseFilter`] is the compiled
//! form used by the normalizer. Prefixes are checked first because they
//! cover most of the noise seen on real pages without touching the regex
//! engine.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::types::{GrabError, GrabResult};

/// Literal prefixes rejected before any pattern is evaluated.
pub const NOISE_PREFIXES: &[&str] = &[
    "https://fonts.googleapis.com",
    "https://fonts.gstatic.com",
    "https://cdn.jsdelivr.net",
    "https://unpkg.com",
    "https://cdnjs.cloudflare.com",
    "https://developer.mozilla.org",
    "https://reactjs.org",
    "https://react.dev/errors",
    "https://nextjs.org/docs",
    "https://www.w3.org",
    "http://www.w3.org",
    "https://registry.npmjs.org",
    "https://localhost",
    "http://localhost",
];

/// Ordered pattern rules, evaluated when no prefix matched.
pub const NOISE_PATTERNS: &[&str] = &[
    // Unresolved template interpolation
    r"\$%7B.*%7D",
    r"\$\{",
    // Standards bodies
    r"^https?://(www\.)?w3\.org/",
    // Documentation sites
    r"^https?://developer\.mozilla\.org/",
    r"^https?://bugzilla\.mozilla\.org/",
    r"^https?://reactjs\.org/docs/error-decoder",
    r"^https?://react\.dev/errors",
    r"^https?://prosemirror\.net/docs/",
    r"^https?://webglfundamentals\.org/",
    // Package registries
    r"^https?://registry\.npmjs\.org/",
    r"\.tgz$",
    // Licenses
    r"^https?://(www\.)?opensource\.org/",
    r"^https?://feross\.org/",
    r"(?i)/licenses?/",
    // Library repositories and sites
    r"^https?://(www\.)?github\.com/facebook/react",
    r"^https?://jedwatson\.github\.io/classnames",
    // CDNs and fonts
    r"^https?://unpkg\.com/",
    r"^https?://cdn\.jsdelivr\.net/",
    r"^https?://cdnjs\.cloudflare\.com/",
    r"^https?://fonts\.googleapis\.com(/|$)",
    r"^https?://fonts\.gstatic\.com(/|$)",
    r"^https?://cdn\.growthbook\.io/",
    r"^https?://s\.w\.org/",
    // Package manager and framework docs
    r"^https?://yarnpkg\.com/",
    r"^https?://formatjs\.io/",
    r"^https?://mozilla\.github\.io/",
    r"^https?://nextjs\.org/docs/",
    r"^https?://(api\.)?jqueryui\.com/",
    r"^https?://jquery\.org/",
    // SDK bootstrap endpoints
    r"^https?://framer\.com/edit/",
    // Ads, tracking and vendor internals
    r"^https?://(www\.)?aboutads\.info/",
    r"^https?://.*\.conde\.(digital|io)/",
    r"^https?://widget\.beop\.io/",
    r"^https?://connect\.facebook\.net/",
    r"^https?://(us\.i\.|us\.)?posthog\.com/",
    r"^https?://(app\.)?posthog\.com/",
    r"^https?://.*\.ingest\.(us\.)?sentry\.io/",
    r"^https?://sentry\.io/organizations/",
    r"^https?://docs\.sentry\.io/",
    // Shorteners
    r"^https?://git\.io/",
    r"^https?://tanstack\.com/",
    // Crawler info pages
    r"^https?://(www\.)?yandex\.com/bots",
    // Local and placeholder hosts
    r"^https?://localhost(:\d+)?/",
    r"^https?://(www\.)?example\.com/",
    r"^https?://vercel\.live/_next-live/",
    r"^https?://reactjs\.org/link/",
    // Single-letter hosts, userinfo hosts, punycode test hosts
    r"(?i)^https?://[a-z](/|#|\?|$)",
    r"^https?://[^@/]+@[^/]+",
    r"(?i)^https?://xn--",
];

/// Editable noise rule data.
#[derive(Debug, Clone)]
pub struct NoiseRules {
    prefixes: Vec<String>,
    patterns: Vec<String>,
}

impl Default for NoiseRules {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NoiseRules {
    /// The built-in rule tables.
    pub fn builtin() -> Self {
        Self {
            prefixes: NOISE_PREFIXES.iter().map(|p| p.to_string()).collect(),
            patterns: NOISE_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// A rule set with no rules at all.
    pub fn empty() -> Self {
        Self {
            prefixes: Vec::new(),
            patterns: Vec::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Compile the rules into a filter.
    pub fn compile(&self) -> GrabResult<NoiseFilter> {
        let patterns = self
            .patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| GrabError::InvalidPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<GrabResult<Vec<_>>>()?;

        Ok(NoiseFilter {
            prefixes: self.prefixes.clone().into(),
            patterns: patterns.into(),
        })
    }
}

/// Compiled noise rules. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    prefixes: Arc<[String]>,
    patterns: Arc<[Regex]>,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NoiseFilter {
    /// Filter compiled from the built-in tables.
    pub fn builtin() -> Self {
        static BUILTIN: OnceLock<NoiseFilter> = OnceLock::new();
        BUILTIN
            .get_or_init(|| {
                NoiseRules::builtin()
                    .compile()
                    .expect("built-in noise patterns are valid")
            })
            .clone()
    }

    /// A filter that accepts everything.
    pub fn permissive() -> Self {
        Self {
            prefixes: Arc::from(Vec::new()),
            patterns: Arc::from(Vec::new()),
        }
    }

    /// Whether the URL matches any prefix or pattern rule.
    pub fn is_noise(&self, url: &str) -> bool {
        if self.prefixes.iter().any(|p| url.starts_with(p.as_str())) {
            return true;
        }
        self.patterns.iter().any(|re| re.is_match(url))
    }

    pub fn rule_count(&self) -> usize {
        self.prefixes.len() + self.patterns.len()
    }
}
