//! Per-frame link extraction.
//!
//! A frame is scanned synchronously (anchors, images, `srcset` candidates,
//! inline script text), then every same-origin external script is fetched
//! concurrently and scanned for URLs. Each fetch is bounded by its own
//! timeout and contributes a task-local list; the lists are merged in
//! document order once all fetches have settled, and only then is the frame's
//! link list produced.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::http_client::Fetcher;
use crate::noise::NoiseFilter;
use crate::normalizer::Normalizer;
use crate::types::{LinkRecord, SourceKind};

/// Default per-script fetch timeout.
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(3);

/// Scripts larger than this are not scanned (5 MB).
pub const MAX_SCRIPT_BYTES: usize = 5 * 1024 * 1024;

/// One frame's document.
#[derive(Debug, Clone)]
pub struct FrameDocument {
    pub url: String,
    pub html: String,
}

impl FrameDocument {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Tunables for script fetching.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub script_timeout: Duration,
    pub max_scripts: usize,
    pub script_concurrency: usize,
    pub max_script_bytes: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
            max_scripts: 16,
            script_concurrency: 6,
            max_script_bytes: MAX_SCRIPT_BYTES,
        }
    }
}

/// Raw references found by the synchronous DOM pass.
#[derive(Debug, Default)]
struct ScannedFrame {
    base: Option<Url>,
    anchors: Vec<(String, String)>,
    images: Vec<(String, String)>,
    srcset: Vec<String>,
    inline_urls: Vec<String>,
    script_srcs: Vec<String>,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

fn script_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s"'`<>\\]+"#).expect("valid regex"))
}

/// Find every absolute http(s) URL literal in a block of script text.
pub fn scan_script_urls(text: &str) -> Vec<String> {
    script_url_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Split a `srcset` attribute into its candidate URLs.
pub fn srcset_candidates(srcset: &str) -> Vec<String> {
    srcset
        .split(',')
        .filter_map(|part| part.split_whitespace().next())
        .map(|s| s.to_string())
        .collect()
}

fn is_script_protocol(href: &str) -> bool {
    href.trim_start()
        .get(..11)
        .is_some_and(|p| p.eq_ignore_ascii_case("javascript:"))
}

fn scan_document(doc: &FrameDocument) -> ScannedFrame {
    let document = Html::parse_document(&doc.html);
    let frame_url = Url::parse(&doc.url).ok();

    let base = document
        .select(&selector("base[href]"))
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| frame_url.as_ref()?.join(href.trim()).ok())
        .or(frame_url);

    let mut scanned = ScannedFrame {
        base,
        ..Default::default()
    };

    for el in document.select(&selector("a[href]")) {
        let href = el.value().attr("href").unwrap_or("");
        if is_script_protocol(href) {
            continue;
        }
        let text = el.text().collect::<String>();
        scanned
            .anchors
            .push((href.to_string(), text.trim().to_string()));
    }

    for el in document.select(&selector("img[src]")) {
        let src = el.value().attr("src").unwrap_or("");
        if src.trim().is_empty() {
            continue;
        }
        let alt = el.value().attr("alt").unwrap_or("");
        scanned.images.push((src.to_string(), alt.to_string()));
    }

    for el in document.select(&selector("[srcset]")) {
        if let Some(srcset) = el.value().attr("srcset") {
            scanned.srcset.extend(
                srcset_candidates(srcset)
                    .into_iter()
                    .filter(|url| url.starts_with("http")),
            );
        }
    }

    for el in document.select(&selector("script")) {
        match el.value().attr("src") {
            Some(src) => scanned.script_srcs.push(src.to_string()),
            None => {
                let body = el.text().collect::<String>();
                scanned.inline_urls.extend(scan_script_urls(&body));
            }
        }
    }

    scanned
}

/// Extracts links from frame documents.
pub struct Extractor {
    fetcher: Arc<dyn Fetcher>,
    noise: NoiseFilter,
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(fetcher: Arc<dyn Fetcher>, noise: NoiseFilter) -> Self {
        Self {
            fetcher,
            noise,
            options: ExtractOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract the deduplicated link list for one frame.
    ///
    /// Order: anchors, images, then script-derived URLs (inline scripts
    /// before external ones, each in document order).
    pub async fn extract_frame(&self, doc: &FrameDocument) -> Vec<LinkRecord> {
        let scanned = scan_document(doc);

        let frame_url = Url::parse(&doc.url).ok();
        let frame_host = frame_url
            .as_ref()
            .and_then(|u| u.host_str())
            .unwrap_or("")
            .to_string();

        let mut normalizer = Normalizer::new(&doc.url, self.noise.clone());
        if let Some(base) = scanned.base.clone() {
            normalizer = normalizer.with_base(base);
        }

        let script_urls = self.same_origin_scripts(&normalizer, frame_url.as_ref(), &scanned);
        let fetched: Vec<Vec<String>> = stream::iter(script_urls)
            .map(|url| self.fetch_script_urls(url))
            .buffered(self.options.script_concurrency.max(1))
            .collect()
            .await;

        let mut links = Vec::new();

        for (href, text) in &scanned.anchors {
            if let Ok(link) = normalizer.admit(href, text, SourceKind::Anchor) {
                links.push(link);
            }
        }

        for (src, alt) in &scanned.images {
            let is_http = normalizer
                .resolve(src)
                .is_some_and(|u| u.as_str().starts_with("http"));
            if !is_http {
                continue;
            }
            if let Ok(link) = normalizer.admit(src, alt, SourceKind::Image) {
                links.push(link);
            }
        }

        for src in &scanned.srcset {
            if let Ok(link) = normalizer.admit(src, "", SourceKind::Image) {
                links.push(link);
            }
        }

        let script_found = scanned.inline_urls.iter().chain(fetched.iter().flatten());
        for raw in script_found {
            let foreign = Url::parse(raw)
                .ok()
                .is_some_and(|u| u.host_str().unwrap_or("") != frame_host);
            if !foreign {
                continue;
            }
            if let Ok(link) = normalizer.admit(raw, "", SourceKind::Script) {
                links.push(link);
            }
        }

        tracing::debug!(
            "extracted {} links from {} ({} anchors, {} images, {} scripts fetched)",
            links.len(),
            doc.url,
            scanned.anchors.len(),
            scanned.images.len() + scanned.srcset.len(),
            fetched.len()
        );

        links
    }

    /// Resolve `<script src>` values, keeping unique same-origin scripts.
    fn same_origin_scripts(
        &self,
        normalizer: &Normalizer,
        frame_url: Option<&Url>,
        scanned: &ScannedFrame,
    ) -> Vec<String> {
        let Some(frame_url) = frame_url else {
            return Vec::new();
        };
        let origin = frame_url.origin();
        let mut seen = HashSet::new();

        scanned
            .script_srcs
            .iter()
            .filter_map(|src| normalizer.resolve(src))
            .filter(|url| url.origin() == origin)
            .map(|url| url.to_string())
            .filter(|url| seen.insert(url.clone()))
            .take(self.options.max_scripts)
            .collect()
    }

    /// Fetch one script and scan it. Failures and timeouts yield nothing.
    async fn fetch_script_urls(&self, url: String) -> Vec<String> {
        let fetch = self.fetcher.fetch_text(&url);
        match tokio::time::timeout(self.options.script_timeout, fetch).await {
            Ok(Ok(resp)) if resp.body.len() <= self.options.max_script_bytes => {
                scan_script_urls(&resp.body)
            }
            Ok(Ok(resp)) => {
                tracing::debug!("skipping {url}: {} bytes exceeds limit", resp.body.len());
                Vec::new()
            }
            Ok(Err(e)) => {
                tracing::debug!("script fetch failed for {url}: {e}");
                Vec::new()
            }
            Err(_) => {
                tracing::debug!(
                    "script fetch timed out for {url} after {:?}",
                    self.options.script_timeout
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::FetchedText;
    use crate::types::{GrabError, GrabResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubFetcher {
        bodies: HashMap<String, String>,
        slow: Vec<String>,
        requested: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.bodies.insert(url.to_string(), body.to_string());
            self
        }

        fn slow(mut self, url: &str) -> Self {
            self.slow.push(url.to_string());
            self
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch_text(&self, url: &str) -> GrabResult<FetchedText> {
            self.requested.lock().unwrap().push(url.to_string());
            if self.slow.iter().any(|s| s == url) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            match self.bodies.get(url) {
                Some(body) => Ok(FetchedText {
                    url: url.to_string(),
                    final_url: url.to_string(),
                    body: body.clone(),
                }),
                None => Err(GrabError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn extractor(fetcher: StubFetcher) -> (Extractor, Arc<StubFetcher>) {
        let fetcher = Arc::new(fetcher);
        let ex = Extractor::new(fetcher.clone(), NoiseFilter::builtin()).with_options(
            ExtractOptions {
                script_timeout: Duration::from_millis(200),
                ..Default::default()
            },
        );
        (ex, fetcher)
    }

    fn hrefs(links: &[LinkRecord]) -> Vec<&str> {
        links.iter().map(|l| l.href.as_str()).collect()
    }

    #[tokio::test]
    async fn test_duplicate_anchors_are_dropped() {
        let html = r#"<html><body>
            <a href="https://x.com/a">one</a>
            <a href="https://y.com/b">two</a>
            <a href="http://x.com/a">three</a>
            <a href="https://z.com/c">four</a>
            <a href="https://y.com/b">five</a>
        </body></html>"#;
        let (ex, _) = extractor(StubFetcher::default());
        let links = ex
            .extract_frame(&FrameDocument::new("https://site.io/", html))
            .await;
        assert_eq!(links.len(), 3);
        assert_eq!(
            hrefs(&links),
            vec!["https://x.com/a", "https://y.com/b", "https://z.com/c"]
        );
        assert_eq!(links[0].text, "one");
        assert!(links.iter().all(|l| l.source_kind == SourceKind::Anchor));
    }

    #[tokio::test]
    async fn test_anchor_resolution_and_script_protocol() {
        let html = r#"
            <a href="/docs/start">Start</a>
            <a href="javascript:void(0)">noop</a>
            <a href="  JavaScript:alert(1)">noop</a>
            <a href="https://unpkg.com/react">noise</a>
        "#;
        let (ex, _) = extractor(StubFetcher::default());
        let links = ex
            .extract_frame(&FrameDocument::new("https://site.io/blog/", html))
            .await;
        assert_eq!(hrefs(&links), vec!["https://site.io/docs/start"]);
        assert_eq!(links[0].frame_url, "https://site.io/blog/");
    }

    #[tokio::test]
    async fn test_images_and_srcset() {
        let html = r#"
            <img src="/img/logo.png" alt="Logo">
            <img src="data:image/gif;base64,R0lGOD">
            <picture>
              <source srcset="https://cdn.site.net/a.webp 1x, https://cdn.site.net/a@2x.webp 2x, /relative.webp 3x">
            </picture>
            <img srcset="https://cdn.site.net/b.jpg 400w" src="https://cdn.site.net/b.jpg">
        "#;
        let (ex, _) = extractor(StubFetcher::default());
        let links = ex
            .extract_frame(&FrameDocument::new("https://site.io/", html))
            .await;
        assert_eq!(
            hrefs(&links),
            vec![
                "https://site.io/img/logo.png",
                "https://cdn.site.net/b.jpg",
                "https://cdn.site.net/a.webp",
                "https://cdn.site.net/a@2x.webp",
            ]
        );
        assert_eq!(links[0].text, "Logo");
        assert!(links.iter().all(|l| l.source_kind == SourceKind::Image));
    }

    #[tokio::test]
    async fn test_inline_script_urls_skip_own_host() {
        let html = r#"
            <script>
              const api = "https://site.io/api/v1";
              const social = 'https://t.me/somechannel';
              fetch(`https://api.partner.com/data`);
              const fonts = "https://fonts.googleapis.com/css";
            </script>
            <script type="application/ld+json">{"sameAs": ["https://x.com/site"]}</script>
        "#;
        let (ex, _) = extractor(StubFetcher::default());
        let links = ex
            .extract_frame(&FrameDocument::new("https://site.io/", html))
            .await;
        assert_eq!(
            hrefs(&links),
            vec![
                "https://t.me/somechannel",
                "https://api.partner.com/data",
                "https://x.com/site",
            ]
        );
        assert!(links.iter().all(|l| l.source_kind == SourceKind::Script));
    }

    #[tokio::test]
    async fn test_external_scripts_same_origin_only() {
        let html = r#"
            <a href="https://docs.partner.com/">Docs</a>
            <script src="/static/app.js"></script>
            <script src="https://other.net/lib.js"></script>
            <script src="/static/missing.js"></script>
        "#;
        let fetcher = StubFetcher::default()
            .with(
                "https://site.io/static/app.js",
                r#"var a="https://discord.gg/abc",b="https://site.io/internal";"#,
            )
            .with("https://other.net/lib.js", r#"var c="https://never.io/x";"#);
        let (ex, fetcher) = extractor(fetcher);
        let links = ex
            .extract_frame(&FrameDocument::new("https://site.io/", html))
            .await;
        assert_eq!(
            hrefs(&links),
            vec!["https://docs.partner.com/", "https://discord.gg/abc"]
        );
        let mut requested = fetcher.requested.lock().unwrap().clone();
        requested.sort();
        assert_eq!(
            requested,
            vec![
                "https://site.io/static/app.js".to_string(),
                "https://site.io/static/missing.js".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_slow_script_times_out_without_failing_frame() {
        let html = r#"
            <a href="https://x.com/team">Team</a>
            <script src="/slow.js"></script>
            <script src="/fast.js"></script>
        "#;
        let fetcher = StubFetcher::default()
            .with("https://site.io/slow.js", r#""https://slow.example.net/x""#)
            .with("https://site.io/fast.js", r#""https://fast.example.net/y""#)
            .slow("https://site.io/slow.js");
        let (ex, _) = extractor(fetcher);

        let started = std::time::Instant::now();
        let links = ex
            .extract_frame(&FrameDocument::new("https://site.io/", html))
            .await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(
            hrefs(&links),
            vec!["https://x.com/team", "https://fast.example.net/y"]
        );
    }

    #[tokio::test]
    async fn test_base_href_changes_resolution() {
        let html = r#"<head><base href="https://mirror.site.io/root/"></head>
            <a href="page.html">Page</a>"#;
        let (ex, _) = extractor(StubFetcher::default());
        let links = ex
            .extract_frame(&FrameDocument::new("https://site.io/", html))
            .await;
        assert_eq!(hrefs(&links), vec!["https://mirror.site.io/root/page.html"]);
    }

    #[tokio::test]
    async fn test_anchor_wins_over_later_sources() {
        let html = r#"
            <script>var u = "https://x.com/a";</script>
            <img src="https://x.com/a">
            <a href="https://x.com/a">anchor</a>
        "#;
        let (ex, _) = extractor(StubFetcher::default());
        let links = ex
            .extract_frame(&FrameDocument::new("https://site.io/", html))
            .await;
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].source_kind, SourceKind::Anchor);
    }

    #[test]
    fn test_scan_script_urls() {
        let found = scan_script_urls(r#"a="https://a.io/x?y=1";b='http://b.io/'<c>https://c.io/z`"#);
        assert_eq!(
            found,
            vec!["https://a.io/x?y=1", "http://b.io/", "https://c.io/z"]
        );
    }

    #[test]
    fn test_srcset_candidates() {
        assert_eq!(
            srcset_candidates(" a.png 1x ,b.png 2x,, c.png"),
            vec!["a.png", "b.png", "c.png"]
        );
    }
}
