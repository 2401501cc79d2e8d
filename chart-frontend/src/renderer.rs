//! Chart instance lifecycle: one live chart per canvas target.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex as StdMutex, PoisonError};

use quote_client::{BenchmarkCache, QuoteSource};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use ts_core::{normalize_benchmark, RangeToken, SymbolCache};

use crate::compose::{compose, BenchmarkIndex, BenchmarkOverlay, ChartFeatures, PreparedChart};
use crate::config::ChartConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChartId(pub u64);

impl fmt::Display for ChartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chart#{}", self.0)
    }
}

#[derive(Debug, Error)]
#[error("chart backend failed: {0}")]
pub struct BackendError(pub String);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// The charting library behind the renderer.
pub trait ChartBackend: Send + Sync {
    fn create(&self, target: &str, config: &ChartConfig) -> Result<ChartId, BackendError>;

    fn destroy(&self, target: &str, chart: ChartId);

    /// Draw a text notice on an empty target.
    fn show_placeholder(&self, _target: &str, _message: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub chart: ChartId,
    pub points: usize,
    pub markers: usize,
    pub overlays: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered(RenderSummary),
    Skipped(SkipReason),
    /// A newer render for the same target started while this one was waiting.
    Superseded,
}

/// Proof of a render request. Only the latest ticket for a target may commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTicket {
    target: String,
    generation: u64,
}

impl RenderTicket {
    pub fn target(&self) -> &str {
        &self.target
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    chart: Option<ChartId>,
}

/// Inputs for the modal chart.
#[derive(Debug, Clone, Copy)]
pub struct ModalRequest<'a> {
    pub target: &'a str,
    pub symbol: &'a str,
    pub cache: &'a SymbolCache,
    pub range: RangeToken,
    pub features: &'a ChartFeatures,
    pub benchmarks: &'a [BenchmarkIndex],
}

pub struct ChartRenderer<B> {
    backend: B,
    slots: Mutex<HashMap<String, Slot>>,
}

impl<B: ChartBackend> ChartRenderer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Start a render for `target`, invalidating any earlier ticket.
    pub async fn begin(&self, target: &str) -> RenderTicket {
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(target.to_string()).or_default();
        slot.generation += 1;
        RenderTicket {
            target: target.to_string(),
            generation: slot.generation,
        }
    }

    /// Replace the target's chart with `config`, unless the ticket went stale.
    pub async fn commit(
        &self,
        ticket: &RenderTicket,
        config: &ChartConfig,
        summary: impl FnOnce(ChartId) -> RenderSummary,
    ) -> Result<RenderOutcome, RenderError> {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(&ticket.target) else {
            return Ok(RenderOutcome::Superseded);
        };
        if slot.generation != ticket.generation {
            debug!(canvas = %ticket.target, "render superseded");
            return Ok(RenderOutcome::Superseded);
        }
        if let Some(prev) = slot.chart.take() {
            self.backend.destroy(&ticket.target, prev);
        }
        let id = self.backend.create(&ticket.target, config)?;
        slot.chart = Some(id);
        Ok(RenderOutcome::Rendered(summary(id)))
    }

    /// Clear the target and optionally leave a notice, unless the ticket went stale.
    pub async fn skip(
        &self,
        ticket: &RenderTicket,
        reason: SkipReason,
        placeholder: Option<&str>,
    ) -> RenderOutcome {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(&ticket.target) else {
            return RenderOutcome::Superseded;
        };
        if slot.generation != ticket.generation {
            return RenderOutcome::Superseded;
        }
        if let Some(prev) = slot.chart.take() {
            self.backend.destroy(&ticket.target, prev);
        }
        if let Some(message) = placeholder {
            self.backend.show_placeholder(&ticket.target, message);
        }
        RenderOutcome::Skipped(reason)
    }

    /// Render the full modal chart, fetching benchmark indices one at a time.
    pub async fn render_modal<S: QuoteSource>(
        &self,
        req: ModalRequest<'_>,
        quotes: &BenchmarkCache<S>,
    ) -> Result<RenderOutcome, RenderError> {
        let ticket = self.begin(req.target).await;
        let prepared = PreparedChart::build(req.symbol, req.cache, req.range, req.features);
        if prepared.is_empty() {
            warn!(symbol = req.symbol, range = %req.range, "no chart data, skipping render");
            return Ok(self.skip(&ticket, SkipReason::NoData, None).await);
        }

        let mut overlays = Vec::new();
        if req.features.show_benchmarks {
            for index in req.benchmarks {
                let series = match quotes.get(&index.symbol, req.range).await {
                    Ok(series) => series,
                    Err(err) => {
                        warn!(index = %index.symbol, error = %err, "benchmark overlay omitted");
                        continue;
                    }
                };
                match normalize_benchmark(&prepared.price, &series.points) {
                    Some(points) => overlays.push(BenchmarkOverlay {
                        label: index.label.clone(),
                        color: index.color.clone(),
                        points,
                    }),
                    None => debug!(index = %index.symbol, "benchmark has no usable anchor"),
                }
            }
        }

        let config = compose(&prepared, &overlays);
        let outcome = self
            .commit(&ticket, &config, |chart| RenderSummary {
                chart,
                points: prepared.price.len(),
                markers: prepared.markers.len(),
                overlays: overlays.len(),
            })
            .await?;
        if let RenderOutcome::Rendered(summary) = outcome {
            info!(
                symbol = req.symbol,
                range = %req.range,
                points = summary.points,
                markers = summary.markers,
                overlays = summary.overlays,
                "chart rendered"
            );
        }
        Ok(outcome)
    }

    /// Destroy whatever chart is bound to `target`. Pending renders for it become stale.
    pub async fn destroy(&self, target: &str) -> bool {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(target) else {
            return false;
        };
        slot.generation += 1;
        match slot.chart.take() {
            Some(id) => {
                self.backend.destroy(target, id);
                true
            }
            None => false,
        }
    }

    pub async fn mounted(&self, target: &str) -> Option<ChartId> {
        self.slots.lock().await.get(target).and_then(|s| s.chart)
    }
}

/// In-memory backend that keeps each live chart as JSON.
#[derive(Debug, Default)]
pub struct JsonBackend {
    state: StdMutex<JsonState>,
}

#[derive(Debug, Default)]
struct JsonState {
    next_id: u64,
    live: HashMap<String, (ChartId, String)>,
    placeholders: HashMap<String, String>,
    destroyed: usize,
}

impl JsonBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut JsonState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn config_json(&self, target: &str) -> Option<String> {
        self.with_state(|s| s.live.get(target).map(|(_, json)| json.clone()))
    }

    pub fn placeholder(&self, target: &str) -> Option<String> {
        self.with_state(|s| s.placeholders.get(target).cloned())
    }

    pub fn live_count(&self) -> usize {
        self.with_state(|s| s.live.len())
    }

    pub fn destroyed_count(&self) -> usize {
        self.with_state(|s| s.destroyed)
    }
}

impl ChartBackend for JsonBackend {
    fn create(&self, target: &str, config: &ChartConfig) -> Result<ChartId, BackendError> {
        let json = config
            .to_json()
            .map_err(|e| BackendError(e.to_string()))?;
        Ok(self.with_state(|s| {
            s.next_id += 1;
            let id = ChartId(s.next_id);
            s.placeholders.remove(target);
            s.live.insert(target.to_string(), (id, json));
            id
        }))
    }

    fn destroy(&self, target: &str, chart: ChartId) {
        self.with_state(|s| {
            if s.live.get(target).is_some_and(|(id, _)| *id == chart) {
                s.live.remove(target);
                s.destroyed += 1;
            }
        });
    }

    fn show_placeholder(&self, target: &str, message: &str) {
        self.with_state(|s| {
            s.placeholders.insert(target.to_string(), message.to_string());
        });
    }
}
