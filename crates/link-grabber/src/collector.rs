//! Collection host: wires frame loading, per-frame extraction and the
//! aggregator together for one trigger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::aggregator::Aggregator;
use crate::events::GrabEvent;
use crate::extractor::{ExtractOptions, Extractor, FrameDocument};
use crate::frames::FrameLoader;
use crate::http_client::Fetcher;
use crate::noise::NoiseFilter;
use crate::types::{CollectionResult, GrabError, GrabResult, TabId};

/// Runs collections. Each trigger gets a fresh tab id.
pub struct Collector {
    fetcher: Arc<dyn Fetcher>,
    noise: NoiseFilter,
    loader: FrameLoader,
    extractor: Arc<Extractor>,
    aggregator: Aggregator,
    next_tab: AtomicU64,
}

impl Collector {
    pub fn new(fetcher: Arc<dyn Fetcher>, noise: NoiseFilter) -> Self {
        Self {
            loader: FrameLoader::new(fetcher.clone()),
            extractor: Arc::new(Extractor::new(fetcher.clone(), noise.clone())),
            fetcher,
            noise,
            aggregator: Aggregator::default(),
            next_tab: AtomicU64::new(1),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        let events = self.aggregator.events().clone();
        self.aggregator = Aggregator::new(deadline).with_events(events);
        self
    }

    pub fn with_frame_limits(mut self, max_frames: usize, max_depth: usize) -> Self {
        self.loader = self.loader.with_limits(max_frames, max_depth);
        self
    }

    pub fn with_extract_options(mut self, options: ExtractOptions) -> Self {
        let extractor = Extractor::new(self.fetcher.clone(), self.noise.clone()).with_options(options);
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GrabEvent> {
        self.aggregator.events().subscribe()
    }

    /// Allocate a tab id for a new trigger.
    pub fn next_tab_id(&self) -> TabId {
        self.next_tab.fetch_add(1, Ordering::Relaxed)
    }

    /// Collect links from a URL under a freshly allocated tab id.
    pub async fn trigger(&self, url: &str) -> GrabResult<CollectionResult> {
        let tab_id = self.next_tab_id();
        self.collect(tab_id, url).await
    }

    /// Load the page's frames and collect their links for `tab_id`.
    ///
    /// Any pending collection for the same tab is superseded.
    pub async fn collect(&self, tab_id: TabId, url: &str) -> GrabResult<CollectionResult> {
        let tree = self.loader.load(url).await?;
        let expected = tree.expected_frames();
        let documents: Vec<FrameDocument> = tree.loaded().cloned().collect();
        self.run(tab_id, &tree.top_url, expected, documents).await
    }

    /// Collect from documents already in hand; every document counts as one
    /// expected frame.
    pub async fn collect_documents(
        &self,
        tab_id: TabId,
        source_url: &str,
        documents: Vec<FrameDocument>,
    ) -> GrabResult<CollectionResult> {
        let expected = documents.len();
        self.run(tab_id, source_url, expected, documents).await
    }

    async fn run(
        &self,
        tab_id: TabId,
        source_url: &str,
        expected: usize,
        documents: Vec<FrameDocument>,
    ) -> GrabResult<CollectionResult> {
        let handle = self.aggregator.start(tab_id, expected, source_url).await;
        let ticket = handle.ticket();

        for doc in documents {
            let extractor = self.extractor.clone();
            let aggregator = self.aggregator.clone();
            tokio::spawn(async move {
                let links = extractor.extract_frame(&doc).await;
                aggregator.report_frame(ticket, &doc.url, links).await;
            });
        }

        handle.wait().await.ok_or(GrabError::Cancelled(tab_id))
    }
}
