//! Core data types for discovered links, collections, and classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the page/tab a collection belongs to.
pub type TabId = u64;

/// How a link was discovered inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Anchor,
    Image,
    Script,
}

/// One discovered reference, with its URL split into components.
///
/// Component fields follow the browser `URL` conventions: `search` and `hash`
/// carry their leading `?`/`#` (or are empty), `host` includes a non-default
/// port, and `origin` is `"null"` for opaque origins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub href: String,
    pub hostname: String,
    pub host: String,
    pub origin: String,
    pub pathname: String,
    pub search: String,
    pub hash: String,
    pub text: String,
    pub source_kind: SourceKind,
    pub frame_url: String,
}

/// Why a collection finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeReason {
    /// Every expected frame reported.
    Complete,
    /// The deadline fired before every frame reported.
    Deadline,
    /// Finalization was requested explicitly.
    Requested,
}

/// The published outcome of one collection, kept per tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResult {
    pub tab_id: TabId,
    pub source_url: String,
    pub links: Vec<LinkRecord>,
    pub frames_expected: usize,
    pub frames_received: usize,
    pub reason: FinalizeReason,
    pub collected_at: DateTime<Utc>,
}

/// Display markers derived from a link's host and path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkBadge {
    Twitter,
    Telegram,
    Discord,
    Instagram,
    Solana,
    Eth,
    Docs,
}

impl LinkBadge {
    pub fn label(&self) -> &'static str {
        match self {
            LinkBadge::Twitter => "twitter",
            LinkBadge::Telegram => "telegram",
            LinkBadge::Discord => "discord",
            LinkBadge::Instagram => "instagram",
            LinkBadge::Solana => "solana",
            LinkBadge::Eth => "eth",
            LinkBadge::Docs => "docs",
        }
    }
}

/// A link augmented with pipeline-computed flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedLink {
    #[serde(flatten)]
    pub link: LinkRecord,
    /// Position of the link in the pipeline input.
    pub index: usize,
    pub is_blocked: bool,
    pub is_duplicate: bool,
    pub is_same_origin: bool,
    pub is_current_domain: bool,
    /// 1 for current-domain links, otherwise 2..=5.
    pub priority_tier: u8,
    pub is_image: bool,
    pub badges: Vec<LinkBadge>,
}

/// Errors that can occur in the link grabber engine.
#[derive(thiserror::Error, Debug)]
pub enum GrabError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid noise pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Page unavailable: {0}")]
    PageUnavailable(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Collection for tab {0} was cancelled")]
    Cancelled(TabId),
}

/// Convenience result type.
pub type GrabResult<T> = Result<T, GrabError>;
