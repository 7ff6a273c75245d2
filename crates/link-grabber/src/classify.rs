//! Classification and ranking of collected links.
//!
//! [`classify`] is a pure function of its inputs: it computes the blocked,
//! duplicate, same-origin and current-domain flags plus a priority tier for
//! every link, and orders the result by domain group when requested.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{ClassifiedLink, LinkBadge, LinkRecord, SourceKind};

/// Compound public suffixes that need three labels for a base domain.
pub const TWO_PART_SUFFIXES: &[&str] = &["co.uk", "com.au", "co.nz", "co.jp", "com.br", "co.kr"];

/// Hostname fragments marking documentation and reference hosts.
pub const DOC_HOST_MARKERS: &[&str] = &["github.com", "gitbook", "docs.", "whitepaper"];

pub const TIER_CURRENT_DOMAIN: u8 = 1;
pub const TIER_SOCIAL: u8 = 2;
pub const TIER_ADDRESS: u8 = 3;
pub const TIER_DOCS: u8 = 4;
pub const TIER_OTHER: u8 = 5;

/// User-facing toggles. Changing any of them only reruns the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyOptions {
    pub hide_duplicates: bool,
    pub hide_blocked_domains: bool,
    pub hide_same_origin: bool,
    pub group_by_domain: bool,
    /// Case-insensitive substring filter on `href`.
    pub filter: String,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            hide_duplicates: true,
            hide_blocked_domains: true,
            hide_same_origin: false,
            group_by_domain: true,
            filter: String::new(),
        }
    }
}

/// Hierarchical blocked-domain matcher for one pipeline run.
///
/// A hostname is blocked when it, or any parent domain of it, is listed.
/// Hostnames that matched through a parent are remembered so later checks
/// for the same host are a single lookup.
#[derive(Debug, Clone, Default)]
pub struct BlockList {
    domains: HashSet<String>,
}

impl BlockList {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn is_blocked(&mut self, hostname: &str) -> bool {
        let hostname = hostname.to_lowercase();
        if self.domains.contains(&hostname) {
            return true;
        }
        let parent_blocked = hostname
            .match_indices('.')
            .any(|(dot, _)| self.domains.contains(&hostname[dot + 1..]));
        if parent_blocked {
            self.domains.insert(hostname);
        }
        parent_blocked
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// Base registrable domain: the last two labels, or three for a compound
/// public suffix such as `co.uk`.
pub fn base_domain(hostname: &str) -> String {
    let hostname = hostname.to_lowercase();
    let parts: Vec<&str> = hostname.split('.').collect();
    if parts.len() <= 2 {
        return hostname;
    }
    let last_two = parts[parts.len() - 2..].join(".");
    if TWO_PART_SUFFIXES.contains(&last_two.as_str()) {
        return parts[parts.len() - 3..].join(".");
    }
    last_two
}

/// Hostname labels reversed and dot-joined (`a.b.com` → `com.b.a`).
pub fn reversed_hostname(hostname: &str) -> String {
    hostname
        .to_lowercase()
        .split('.')
        .rev()
        .collect::<Vec<_>>()
        .join(".")
}

fn last_segment(href: &str) -> &str {
    href.rsplit('/').next().unwrap_or("")
}

fn solana_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("valid regex"))
}

fn solana_prefixed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(So|sol)[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("valid regex")
    })
}

fn eth_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(0x)?[0-9a-fA-F]{40}$").expect("valid regex"))
}

fn image_ext_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\.(jpe?g|png|gif|webp|svg|ico|bmp|tiff?|avif)(\?|#|$)").expect("valid regex")
    })
}

fn is_twitter_host(host: &str) -> bool {
    host == "x.com" || host == "twitter.com"
}

fn is_discord_host(host: &str) -> bool {
    host.contains("discord.com") || host == "discord.gg"
}

fn is_doc_host(host: &str) -> bool {
    DOC_HOST_MARKERS.iter().any(|m| host.contains(m))
}

/// Whether the last path segment looks like an on-chain address.
pub fn is_address_segment(href: &str) -> bool {
    let segment = last_segment(href);
    solana_re().is_match(segment) || eth_re().is_match(segment)
}

/// Priority tier ignoring current-domain promotion (2..=5).
pub fn priority_tier(link: &LinkRecord) -> u8 {
    let host = link.hostname.to_lowercase();
    if is_twitter_host(&host) || host == "t.me" || is_discord_host(&host) {
        return TIER_SOCIAL;
    }
    if is_address_segment(&link.href) {
        return TIER_ADDRESS;
    }
    if is_doc_host(&host) {
        return TIER_DOCS;
    }
    TIER_OTHER
}

/// Image by discovery kind or by file extension.
pub fn is_image_link(link: &LinkRecord) -> bool {
    link.source_kind == SourceKind::Image || image_ext_re().is_match(&link.href)
}

/// Display badges for a link.
pub fn badges(link: &LinkRecord) -> Vec<LinkBadge> {
    let host = link.hostname.to_lowercase();
    let segment = last_segment(&link.href);
    let mut out = Vec::new();

    if is_twitter_host(&host) {
        out.push(LinkBadge::Twitter);
    }
    if host == "t.me" {
        out.push(LinkBadge::Telegram);
    }
    if is_discord_host(&host) {
        out.push(LinkBadge::Discord);
    }
    if host.contains("instagram.com") {
        out.push(LinkBadge::Instagram);
    }
    if solana_re().is_match(segment) || solana_prefixed_re().is_match(segment) {
        out.push(LinkBadge::Solana);
    }
    if eth_re().is_match(segment) {
        out.push(LinkBadge::Eth);
    }
    if is_doc_host(&host) {
        out.push(LinkBadge::Docs);
    }
    out
}

/// Origin of the source page, only for http(s) sources.
fn source_origin(source_url: Option<&str>) -> Option<String> {
    let source = source_url?;
    if !source.starts_with("http://") && !source.starts_with("https://") {
        return None;
    }
    let url = Url::parse(source).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

fn source_base_domain(source_url: Option<&str>) -> Option<String> {
    let url = Url::parse(source_url?).ok()?;
    let host = url.host_str()?;
    Some(base_domain(host))
}

fn compare_grouped(a: &(ClassifiedLink, String), b: &(ClassifiedLink, String)) -> Ordering {
    b.0.is_current_domain
        .cmp(&a.0.is_current_domain)
        .then(a.0.priority_tier.cmp(&b.0.priority_tier))
        .then_with(|| a.1.cmp(&b.1))
        .then(a.0.index.cmp(&b.0.index))
}

/// Classify a link set against a source page and a blocked-domain list.
///
/// Same-origin links are dropped when `options.hide_same_origin` is set and
/// the source is http(s). Duplicate flags follow input order. When
/// `options.group_by_domain` is set, the output is ordered by current-domain
/// first, then tier, then reversed hostname, then input position.
///
/// Same-origin comparison is scheme-sensitive even though deduplication
/// treats `http` and `https` as the same link.
pub fn classify<S: AsRef<str>>(
    links: &[LinkRecord],
    source_url: Option<&str>,
    blocked_domains: &[S],
    options: &ClassifyOptions,
) -> Vec<ClassifiedLink> {
    let origin = source_origin(source_url);
    let current_base = source_base_domain(source_url).filter(|b| !b.is_empty());
    let mut blocklist = BlockList::new(blocked_domains.iter().map(|d| d.as_ref()));
    let mut seen_hrefs: HashSet<&str> = HashSet::new();

    let mut classified: Vec<(ClassifiedLink, String)> = links
        .iter()
        .filter(|link| {
            !(options.hide_same_origin && origin.as_deref().is_some_and(|o| o == link.origin))
        })
        .enumerate()
        .map(|(index, link)| {
            let is_current_domain = current_base
                .as_deref()
                .is_some_and(|base| base == base_domain(&link.hostname));
            let priority_tier = if is_current_domain {
                TIER_CURRENT_DOMAIN
            } else {
                priority_tier(link)
            };
            let entry = ClassifiedLink {
                link: link.clone(),
                index,
                is_blocked: blocklist.is_blocked(&link.hostname),
                is_duplicate: !seen_hrefs.insert(link.href.as_str()),
                is_same_origin: origin.as_deref().is_some_and(|o| o == link.origin),
                is_current_domain,
                priority_tier,
                is_image: is_image_link(link),
                badges: badges(link),
            };
            (entry, reversed_hostname(&link.hostname))
        })
        .collect();

    if options.group_by_domain {
        classified.sort_by(compare_grouped);
    }

    tracing::trace!(
        "classified {} of {} links (grouped: {})",
        classified.len(),
        links.len(),
        options.group_by_domain
    );

    classified.into_iter().map(|(link, _)| link).collect()
}
