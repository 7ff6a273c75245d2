//! Subcommand implementations. Each returns the text to print.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Args;

use link_grabber::{
    present, ClassifyOptions, CollectionResult, Collector, ExtractOptions, FrameDocument,
    GrabError, HttpClient, OfflineFetcher, Settings, DEFAULT_DEADLINE,
};

use crate::render::{render, OutputFormat};

/// Presentation toggles shared by `grab` and `inspect`.
#[derive(Debug, Clone, Default, Args)]
pub struct ViewArgs {
    /// Show repeated links instead of hiding them.
    #[arg(long)]
    pub show_duplicates: bool,

    /// Show links on blocked domains.
    #[arg(long)]
    pub show_blocked: bool,

    /// Hide links with the same origin as the page.
    #[arg(long)]
    pub hide_same_origin: bool,

    /// Keep discovery order instead of grouping by domain.
    #[arg(long)]
    pub no_group: bool,

    /// Only show links whose URL contains this text (case-insensitive).
    #[arg(long, default_value = "")]
    pub filter: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,
}

impl ViewArgs {
    pub fn options(&self) -> ClassifyOptions {
        ClassifyOptions {
            hide_duplicates: !self.show_duplicates,
            hide_blocked_domains: !self.show_blocked,
            hide_same_origin: self.hide_same_origin,
            group_by_domain: !self.no_group,
            filter: self.filter.clone(),
        }
    }
}

/// Collection tunables for `grab`.
#[derive(Debug, Clone, Args)]
pub struct CollectArgs {
    /// Milliseconds to wait for every frame before finalizing.
    #[arg(long, default_value_t = DEFAULT_DEADLINE.as_millis() as u64)]
    pub deadline_ms: u64,

    /// Per-script fetch timeout in milliseconds.
    #[arg(long, default_value_t = 3000)]
    pub script_timeout_ms: u64,

    /// HTTP timeout for frame documents in milliseconds.
    #[arg(long, default_value_t = 10000)]
    pub timeout_ms: u64,

    /// Maximum number of frames per page, including the top document.
    #[arg(long, default_value_t = 32)]
    pub max_frames: usize,

    /// Maximum frame nesting depth.
    #[arg(long, default_value_t = 3)]
    pub max_frame_depth: usize,
}

impl Default for CollectArgs {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_DEADLINE.as_millis() as u64,
            script_timeout_ms: 3000,
            timeout_ms: 10000,
            max_frames: 32,
            max_frame_depth: 3,
        }
    }
}

fn present_result(
    result: &CollectionResult,
    settings: &Settings,
    view: &ViewArgs,
) -> anyhow::Result<String> {
    let blocked: Vec<String> = settings.blocked_set().into_iter().collect();
    let link_view = present(
        &result.links,
        Some(result.source_url.as_str()),
        &blocked,
        &view.options(),
    );
    render(result, &link_view, view.format)
}

/// Collect links from a live page. Ctrl-C aborts the collection.
pub async fn grab(
    url: &str,
    settings: &Settings,
    collect: &CollectArgs,
    view: &ViewArgs,
) -> anyhow::Result<String> {
    let noise = settings.noise_filter()?;
    let client = HttpClient::new(collect.timeout_ms);
    let extract = ExtractOptions {
        script_timeout: Duration::from_millis(collect.script_timeout_ms),
        ..Default::default()
    };
    let collector = Collector::new(Arc::new(client), noise)
        .with_deadline(Duration::from_millis(collect.deadline_ms))
        .with_frame_limits(collect.max_frames, collect.max_frame_depth)
        .with_extract_options(extract);

    let tab_id = collector.next_tab_id();
    let result = tokio::select! {
        res = collector.collect(tab_id, url) => res,
        _ = tokio::signal::ctrl_c() => {
            collector.aggregator().abort(tab_id).await;
            Err(GrabError::Cancelled(tab_id))
        }
    };
    let result = result.with_context(|| format!("collecting links from {url}"))?;

    present_result(&result, settings, view)
}

/// Collect links from a saved HTML file without touching the network.
pub async fn inspect(
    file: &Path,
    base_url: Option<&str>,
    settings: &Settings,
    view: &ViewArgs,
) -> anyhow::Result<String> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let source_url = match base_url {
        Some(url) => url.to_string(),
        None => {
            let absolute = std::fs::canonicalize(file)
                .with_context(|| format!("resolving {}", file.display()))?;
            format!("file://{}", absolute.display())
        }
    };

    let collector = Collector::new(Arc::new(OfflineFetcher), settings.noise_filter()?);
    let tab_id = collector.next_tab_id();
    let documents = vec![FrameDocument::new(source_url.clone(), html)];
    let result = collector
        .collect_documents(tab_id, &source_url, documents)
        .await?;

    present_result(&result, settings, view)
}

/// List blocked domains, one per line.
pub fn blocked_list(settings: &Settings) -> String {
    settings
        .blocked_set()
        .into_iter()
        .fold(String::new(), |mut out, domain| {
            out.push_str(&domain);
            out.push('\n');
            out
        })
}

pub fn blocked_add(path: &Path, domain: &str) -> anyhow::Result<String> {
    let mut settings = Settings::load(path)?;
    if !settings.add_blocked(domain)? {
        return Ok(format!("{domain} is already blocked\n"));
    }
    settings.save(path)?;
    tracing::info!("blocked {domain}");
    Ok(format!("Blocked {domain}\n"))
}

pub fn blocked_remove(path: &Path, domain: &str) -> anyhow::Result<String> {
    let mut settings = Settings::load(path)?;
    if !settings.remove_blocked(domain) {
        bail!("{domain} is not in the blocked list");
    }
    settings.save(path)?;
    tracing::info!("unblocked {domain}");
    Ok(format!("Unblocked {domain}\n"))
}

/// Restore the default blocked list, keeping other settings.
pub fn blocked_reset(path: &Path) -> anyhow::Result<String> {
    let mut settings = Settings::load(path)?;
    settings.blocked_domains = Settings::default().blocked_domains;
    settings.save(path)?;
    Ok(format!(
        "Restored {} default blocked domains\n",
        settings.blocked_domains.len()
    ))
}
