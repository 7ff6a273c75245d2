//! Link Grabber — link collection across frames, noise filtering, and classification.

pub mod aggregator;
pub mod classify;
pub mod collector;
pub mod events;
pub mod extractor;
pub mod frames;
pub mod http_client;
pub mod noise;
pub mod normalizer;
pub mod settings;
pub mod types;
pub mod view;

pub use aggregator::{Aggregator, CollectionHandle, CollectionTicket, DEFAULT_DEADLINE};
pub use classify::{base_domain, classify, BlockList, ClassifyOptions};
pub use collector::Collector;
pub use events::{EventBus, GrabEvent};
pub use extractor::{ExtractOptions, Extractor, FrameDocument};
pub use frames::{FrameLoader, FrameTree};
pub use http_client::{FetchedText, Fetcher, HttpClient, OfflineFetcher};
pub use noise::{NoiseFilter, NoiseRules};
pub use normalizer::{dedup_key, dedup_links, Normalizer, Rejection};
pub use settings::Settings;
pub use types::*;
pub use view::{present, Bucket, LinkView};
