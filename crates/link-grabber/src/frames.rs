//! Frame discovery: the top-level document plus nested `<iframe>`/`<frame>`
//! documents, walked breadth-first.
//!
//! Every discovered frame counts toward the collection's expected frame
//! count, including frames whose document could not be fetched. Those frames
//! never report, just like frames a browser cannot script, and the
//! aggregator's deadline covers them.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use url::Url;

use crate::extractor::FrameDocument;
use crate::http_client::Fetcher;
use crate::types::{GrabError, GrabResult};

/// One frame of a page.
#[derive(Debug, Clone)]
pub struct FrameSlot {
    pub url: String,
    /// 0 for the top-level document.
    pub depth: usize,
    /// `None` when the frame document could not be loaded.
    pub document: Option<FrameDocument>,
}

/// All frames of a page, top-level first.
#[derive(Debug, Clone)]
pub struct FrameTree {
    pub top_url: String,
    pub frames: Vec<FrameSlot>,
}

impl FrameTree {
    pub fn expected_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn loaded(&self) -> impl Iterator<Item = &FrameDocument> {
        self.frames.iter().filter_map(|f| f.document.as_ref())
    }
}

/// Child frame URLs of a document, resolved and limited to http(s).
pub fn discover_child_frames(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let sel = match Selector::parse("iframe[src], frame[src]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    document
        .select(&sel)
        .filter_map(|el| el.value().attr("src"))
        .filter_map(|src| base.join(src.trim()).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
        .collect()
}

/// Loads a page and its nested frames.
pub struct FrameLoader {
    fetcher: Arc<dyn Fetcher>,
    max_frames: usize,
    max_depth: usize,
    concurrency: usize,
}

impl FrameLoader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            max_frames: 32,
            max_depth: 3,
            concurrency: 6,
        }
    }

    pub fn with_limits(mut self, max_frames: usize, max_depth: usize) -> Self {
        self.max_frames = max_frames.max(1);
        self.max_depth = max_depth;
        self
    }

    /// Fetch the top-level document, then nested frames level by level.
    ///
    /// Fails only when the top-level document is unavailable.
    pub async fn load(&self, url: &str) -> GrabResult<FrameTree> {
        let top = self
            .fetcher
            .fetch_text(url)
            .await
            .map_err(|e| GrabError::PageUnavailable(format!("{url}: {e}")))?;

        let top_url = top.final_url.clone();
        let mut frames = vec![FrameSlot {
            url: top_url.clone(),
            depth: 0,
            document: Some(FrameDocument::new(top_url.clone(), top.body)),
        }];

        let mut level_start = 0;
        for depth in 1..=self.max_depth {
            let budget = self.max_frames.saturating_sub(frames.len());
            if budget == 0 {
                break;
            }

            let children: Vec<String> = frames[level_start..]
                .iter()
                .filter_map(|slot| slot.document.as_ref())
                .flat_map(|doc| discover_child_frames(&doc.html, &doc.url))
                .take(budget)
                .collect();
            if children.is_empty() {
                break;
            }

            level_start = frames.len();
            let loaded: Vec<FrameSlot> = stream::iter(children)
                .map(|child| async move {
                    let document = match self.fetcher.fetch_text(&child).await {
                        Ok(resp) => Some(FrameDocument::new(resp.final_url, resp.body)),
                        Err(e) => {
                            tracing::debug!("frame {child} unavailable: {e}");
                            None
                        }
                    };
                    FrameSlot {
                        url: child,
                        depth,
                        document,
                    }
                })
                .buffered(self.concurrency)
                .collect()
                .await;
            frames.extend(loaded);
        }

        tracing::debug!(
            "loaded {} frame(s) for {top_url} ({} unavailable)",
            frames.len(),
            frames.iter().filter(|f| f.document.is_none()).count()
        );

        Ok(FrameTree { top_url, frames })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::FetchedText;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct MapFetcher(HashMap<String, String>);

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch_text(&self, url: &str) -> GrabResult<FetchedText> {
            self.0
                .get(url)
                .map(|body| FetchedText {
                    url: url.to_string(),
                    final_url: url.to_string(),
                    body: body.clone(),
                })
                .ok_or_else(|| GrabError::Fetch(format!("no fixture for {url}")))
        }
    }

    fn fetcher(pages: &[(&str, &str)]) -> Arc<dyn Fetcher> {
        Arc::new(MapFetcher(
            pages
                .iter()
                .map(|(u, b)| (u.to_string(), b.to_string()))
                .collect(),
        ))
    }

    #[test]
    fn test_discover_child_frames() {
        let html = r#"
            <iframe src="/embed/widget"></iframe>
            <iframe src="about:blank"></iframe>
            <iframe></iframe>
            <iframe src="javascript:void(0)"></iframe>
        "#;
        let frames = discover_child_frames(html, "https://site.io/page");
        assert_eq!(frames, vec!["https://site.io/embed/widget"]);

        let frameset = r#"<html><frameset><frame src="left.html"><frame src="https://other.org/nav"></frameset></html>"#;
        assert_eq!(
            discover_child_frames(frameset, "https://site.io/"),
            vec!["https://site.io/left.html", "https://other.org/nav"]
        );
    }

    #[tokio::test]
    async fn test_load_nested_frames() {
        let loader = FrameLoader::new(fetcher(&[
            ("https://site.io/", r#"<iframe src="/a"></iframe><iframe src="/b"></iframe>"#),
            ("https://site.io/a", r#"<iframe src="/a/inner"></iframe>"#),
            ("https://site.io/a/inner", "<p>deep</p>"),
        ]));
        let tree = loader.load("https://site.io/").await.unwrap();
        let urls: Vec<_> = tree.frames.iter().map(|f| f.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://site.io/",
                "https://site.io/a",
                "https://site.io/b",
                "https://site.io/a/inner",
            ]
        );
        assert_eq!(tree.expected_frames(), 4);
        assert_eq!(tree.loaded().count(), 3);
        assert_eq!(tree.frames[3].depth, 2);
    }

    #[tokio::test]
    async fn test_limits_are_respected() {
        let loader = FrameLoader::new(fetcher(&[
            ("https://site.io/", r#"<iframe src="/a"></iframe><iframe src="/b"></iframe>"#),
            ("https://site.io/a", r#"<iframe src="/a/inner"></iframe>"#),
            ("https://site.io/b", ""),
        ]))
        .with_limits(2, 3);
        let tree = loader.load("https://site.io/").await.unwrap();
        assert_eq!(tree.expected_frames(), 2);

        let shallow = FrameLoader::new(fetcher(&[(
            "https://site.io/",
            r#"<iframe src="/a"></iframe>"#,
        )]))
        .with_limits(10, 0);
        assert_eq!(shallow.load("https://site.io/").await.unwrap().expected_frames(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_top_document_fails() {
        let loader = FrameLoader::new(fetcher(&[]));
        let err = loader.load("https://site.io/").await.unwrap_err();
        assert!(matches!(err, GrabError::PageUnavailable(_)));
    }
}
