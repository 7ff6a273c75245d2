//! Cross-frame aggregation of link reports.
//!
//! One [`PendingCollection`] exists per tab at a time. It is fed by frame
//! reports and finalized exactly once: when the last expected frame reports,
//! or when its deadline fires, whichever comes first. Every mutation happens
//! behind one async mutex, and both finalize paths check the collection's
//! generation under that lock, so the loser of the race is a no-op.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::events::{EventBus, GrabEvent};
use crate::normalizer::dedup_links;
use crate::types::{CollectionResult, FinalizeReason, LinkRecord, TabId};

/// Default time a collection waits for frames before finalizing.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(3);

/// Identifies one specific collection of a tab.
///
/// Frame reports carry the ticket of the collection that asked for them, so a
/// report produced for a superseded collection cannot leak into its
/// replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionTicket {
    pub tab_id: TabId,
    pub generation: u64,
}

/// Returned by [`Aggregator::start`]; resolves when the collection finalizes.
pub struct CollectionHandle {
    ticket: CollectionTicket,
    receiver: oneshot::Receiver<CollectionResult>,
}

impl CollectionHandle {
    pub fn ticket(&self) -> CollectionTicket {
        self.ticket
    }

    /// Wait for the result. `None` if the collection was superseded or aborted.
    pub async fn wait(self) -> Option<CollectionResult> {
        self.receiver.await.ok()
    }
}

struct PendingCollection {
    generation: u64,
    expected_frames: usize,
    received_frames: usize,
    links: Vec<LinkRecord>,
    source_url: String,
    timer: JoinHandle<()>,
    waiter: Option<oneshot::Sender<CollectionResult>>,
}

#[derive(Default)]
struct AggregatorState {
    pending: HashMap<TabId, PendingCollection>,
    results: HashMap<TabId, CollectionResult>,
    next_generation: u64,
}

/// Owns every in-flight collection and the published results.
#[derive(Clone)]
pub struct Aggregator {
    state: Arc<Mutex<AggregatorState>>,
    deadline: Duration,
    events: EventBus,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_DEADLINE)
    }
}

impl Aggregator {
    pub fn new(deadline: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(AggregatorState::default())),
            deadline,
            events: EventBus::default(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Arm a new collection for a tab, superseding any pending one.
    pub async fn start(
        &self,
        tab_id: TabId,
        expected_frames: usize,
        source_url: &str,
    ) -> CollectionHandle {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock().await;

        if let Some(previous) = state.pending.remove(&tab_id) {
            previous.timer.abort();
            tracing::debug!(
                "tab {tab_id}: superseding collection {} ({} links dropped)",
                previous.generation,
                previous.links.len()
            );
            self.events.emit(GrabEvent::CollectionSuperseded {
                tab_id,
                dropped_links: previous.links.len(),
            });
        }

        state.next_generation += 1;
        let ticket = CollectionTicket {
            tab_id,
            generation: state.next_generation,
        };

        state.pending.insert(
            tab_id,
            PendingCollection {
                generation: ticket.generation,
                expected_frames,
                received_frames: 0,
                links: Vec::new(),
                source_url: source_url.to_string(),
                timer: self.arm_deadline(ticket),
                waiter: Some(tx),
            },
        );

        tracing::info!("tab {tab_id}: collecting {expected_frames} frame(s) from {source_url}");
        self.events.emit(GrabEvent::CollectionStarted {
            tab_id,
            source_url: source_url.to_string(),
            expected_frames,
        });

        if expected_frames == 0 {
            self.finalize_locked(&mut state, tab_id, Some(ticket.generation), FinalizeReason::Complete);
        }

        CollectionHandle {
            ticket,
            receiver: rx,
        }
    }

    /// Accept one frame's links. Returns `false` when the report was discarded.
    pub async fn report_frame(
        &self,
        ticket: CollectionTicket,
        frame_url: &str,
        links: Vec<LinkRecord>,
    ) -> bool {
        let mut state = self.state.lock().await;
        let tab_id = ticket.tab_id;

        let Some(pending) = state
            .pending
            .get_mut(&tab_id)
            .filter(|p| p.generation == ticket.generation)
        else {
            tracing::debug!(
                "tab {tab_id}: discarding late report from {frame_url} ({} links)",
                links.len()
            );
            self.events.emit(GrabEvent::LateReportDiscarded {
                tab_id,
                frame_url: frame_url.to_string(),
                link_count: links.len(),
            });
            return false;
        };

        let link_count = links.len();
        pending.links.extend(links);
        pending.received_frames += 1;
        let (received, expected) = (pending.received_frames, pending.expected_frames);

        tracing::debug!(
            "tab {tab_id}: frame {received}/{expected} reported {link_count} links from {frame_url}"
        );
        self.events.emit(GrabEvent::FrameReported {
            tab_id,
            frame_url: frame_url.to_string(),
            link_count,
            received,
            expected,
        });

        if received >= expected {
            self.finalize_locked(&mut state, tab_id, Some(ticket.generation), FinalizeReason::Complete);
        }
        true
    }

    /// Finalize the tab's pending collection now. No-op if none is pending.
    pub async fn finalize(&self, tab_id: TabId) -> bool {
        let mut state = self.state.lock().await;
        self.finalize_locked(&mut state, tab_id, None, FinalizeReason::Requested)
    }

    /// Drop everything known about a tab (the tab was closed).
    pub async fn abort(&self, tab_id: TabId) -> bool {
        let mut state = self.state.lock().await;
        let pending = state.pending.remove(&tab_id);
        if let Some(p) = &pending {
            p.timer.abort();
        }
        let had_result = state.results.remove(&tab_id).is_some();

        let aborted = pending.is_some() || had_result;
        if aborted {
            tracing::debug!("tab {tab_id}: collection aborted");
            self.events.emit(GrabEvent::CollectionAborted { tab_id });
        }
        aborted
    }

    /// The published result for a tab, if any.
    pub async fn result(&self, tab_id: TabId) -> Option<CollectionResult> {
        self.state.lock().await.results.get(&tab_id).cloned()
    }

    pub async fn is_pending(&self, tab_id: TabId) -> bool {
        self.state.lock().await.pending.contains_key(&tab_id)
    }

    fn arm_deadline(&self, ticket: CollectionTicket) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.deadline).await;
            let mut state = this.state.lock().await;
            if this.finalize_locked(
                &mut state,
                ticket.tab_id,
                Some(ticket.generation),
                FinalizeReason::Deadline,
            ) {
                tracing::debug!("tab {}: deadline reached", ticket.tab_id);
            }
        })
    }

    /// Publish and discard a pending collection. Only the first caller for a
    /// given generation does any work.
    fn finalize_locked(
        &self,
        state: &mut AggregatorState,
        tab_id: TabId,
        generation: Option<u64>,
        reason: FinalizeReason,
    ) -> bool {
        let matches = state
            .pending
            .get(&tab_id)
            .is_some_and(|p| generation.map_or(true, |g| g == p.generation));
        if !matches {
            return false;
        }
        let Some(mut pending) = state.pending.remove(&tab_id) else {
            return false;
        };

        // The deadline task finalizing itself must not abort its own handle.
        if reason != FinalizeReason::Deadline {
            pending.timer.abort();
        }

        let links = dedup_links(std::mem::take(&mut pending.links));
        let result = CollectionResult {
            tab_id,
            source_url: pending.source_url.clone(),
            links,
            frames_expected: pending.expected_frames,
            frames_received: pending.received_frames,
            reason,
            collected_at: Utc::now(),
        };

        tracing::info!(
            "tab {tab_id}: finalized with {} links ({}/{} frames, {:?})",
            result.links.len(),
            result.frames_received,
            result.frames_expected,
            reason
        );
        self.events.emit(GrabEvent::CollectionFinalized {
            tab_id,
            reason,
            link_count: result.links.len(),
            frames_received: result.frames_received,
            frames_expected: result.frames_expected,
        });

        if let Some(waiter) = pending.waiter.take() {
            let _ = waiter.send(result.clone());
        }
        state.results.insert(tab_id, result);
        true
    }
}
