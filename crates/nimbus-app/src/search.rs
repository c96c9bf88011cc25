//! Debounced place search.
//!
//! Each query replaces the previous one: the older task is cancelled before
//! the new one is spawned, and a generation counter drops any result that
//! still slips through.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::Shared;

struct ActiveSearch {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActiveSearch {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

pub(crate) struct SearchPipeline {
    active: Mutex<Option<ActiveSearch>>,
    generation: AtomicU64,
}

impl SearchPipeline {
    pub(crate) fn new() -> Self {
        Self {
            active: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub(crate) fn cancel_active(&self) {
        if let Some(active) = self.active.lock().take() {
            active.stop();
        }
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

impl Shared {
    pub(crate) fn search_locations(self: &Arc<Self>, query: String) {
        let mut active = self.search.active.lock();
        if let Some(previous) = active.take() {
            previous.stop();
        }

        let blank = query.trim().is_empty();
        let mut generation = 0;
        self.state.send_modify(|s| {
            generation = self.search.generation.fetch_add(1, Ordering::SeqCst) + 1;
            s.search_query = query.clone();
            s.is_searching = !blank;
            if blank {
                s.search_results.clear();
            }
        });
        if blank {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.clone().run_search(query, generation, cancel.clone()));
        *active = Some(ActiveSearch { cancel, handle });
    }

    async fn run_search(self: Arc<Self>, query: String, generation: u64, cancel: CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(self.settings.search_debounce) => {}
        }

        tracing::debug!("Searching places for {:?}", query);
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = self.deps.weather.search_places(query.trim()) => result,
        };

        let applied = self.state.send_if_modified(|s| {
            if !self.search.is_latest(generation) {
                return false;
            }
            s.is_searching = false;
            match result {
                Ok(results) => {
                    tracing::debug!("{} places match {:?}", results.len(), query);
                    s.search_results = results;
                }
                Err(e) => {
                    tracing::warn!("Place search for {:?} failed: {}", query, e);
                    s.error_message = Some(format!("Search failed: {}", e));
                }
            }
            true
        });
        if !applied {
            tracing::debug!("Dropping results for superseded query {:?}", query);
        }
    }
}
