//! URL normalization, noise rejection and scheme-insensitive deduplication.

use std::collections::HashSet;

use url::Url;

use crate::noise::NoiseFilter;
use crate::types::{LinkRecord, SourceKind};

/// Why a raw URL did not become a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Could not be parsed, even against the base URL.
    Unparseable,
    /// Matched a noise rule.
    Noise,
    /// Already seen in this extraction scope.
    Duplicate,
}

/// Deduplication key: the href with a leading `http://` or `https://` removed.
pub fn dedup_key(href: &str) -> &str {
    href.strip_prefix("https://")
        .or_else(|| href.strip_prefix("http://"))
        .unwrap_or(href)
}

/// Keep the first link per dedup key, preserving first-sighting order.
pub fn dedup_links(links: impl IntoIterator<Item = LinkRecord>) -> Vec<LinkRecord> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(dedup_key(&link.href).to_string()))
        .collect()
}

/// Build a record from a parsed URL.
pub fn link_record(url: &Url, text: &str, source_kind: SourceKind, frame_url: &str) -> LinkRecord {
    let hostname = url.host_str().unwrap_or("").to_string();
    let host = match url.port() {
        Some(port) => format!("{hostname}:{port}"),
        None => hostname.clone(),
    };
    let search = match url.query() {
        Some(q) if !q.is_empty() => format!("?{q}"),
        _ => String::new(),
    };
    let hash = match url.fragment() {
        Some(f) if !f.is_empty() => format!("#{f}"),
        _ => String::new(),
    };

    LinkRecord {
        href: url.as_str().to_string(),
        hostname,
        host,
        origin: url.origin().ascii_serialization(),
        pathname: url.path().to_string(),
        search,
        hash,
        text: text.to_string(),
        source_kind,
        frame_url: frame_url.to_string(),
    }
}

/// Normalizer bound to one extraction scope (one frame).
///
/// Holds the base URL used for resolution and the set of dedup keys already
/// emitted, so the same logical link is reported once per scope.
pub struct Normalizer {
    base: Option<Url>,
    frame_url: String,
    noise: NoiseFilter,
    seen: HashSet<String>,
}

impl Normalizer {
    pub fn new(frame_url: &str, noise: NoiseFilter) -> Self {
        Self {
            base: Url::parse(frame_url).ok(),
            frame_url: frame_url.to_string(),
            noise,
            seen: HashSet::new(),
        }
    }

    /// Use a different base URL for resolution (e.g. from `<base href>`).
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// Resolve a raw URL against the base URL.
    pub fn resolve(&self, raw: &str) -> Option<Url> {
        let raw = raw.trim();
        match &self.base {
            Some(base) => base.join(raw).ok(),
            None => Url::parse(raw).ok(),
        }
    }

    /// Parse, canonicalize and noise-check a raw URL.
    ///
    /// Does not consult the seen set, so normalizing a canonical href always
    /// returns the same href.
    pub fn normalize(
        &self,
        raw: &str,
        text: &str,
        source_kind: SourceKind,
    ) -> Result<LinkRecord, Rejection> {
        if self.noise.is_noise(raw) {
            return Err(Rejection::Noise);
        }
        let url = self.resolve(raw).ok_or(Rejection::Unparseable)?;
        if self.noise.is_noise(url.as_str()) {
            return Err(Rejection::Noise);
        }
        Ok(link_record(&url, text, source_kind, &self.frame_url))
    }

    /// Normalize and admit a URL into this scope, rejecting repeats.
    pub fn admit(
        &mut self,
        raw: &str,
        text: &str,
        source_kind: SourceKind,
    ) -> Result<LinkRecord, Rejection> {
        let record = self.normalize(raw, text, source_kind)?;
        if !self.seen.insert(dedup_key(&record.href).to_string()) {
            return Err(Rejection::Duplicate);
        }
        Ok(record)
    }

    /// Number of distinct links admitted so far.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
