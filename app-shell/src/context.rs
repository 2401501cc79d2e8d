//! Screener state passed explicitly to every chart and AI entry point.

use std::collections::HashMap;
use std::path::Path;

use ai_assist::{AiAssist, AiConfig, AiError, CompletionTransport, HttpTransport, StockSnapshot};
use chart_frontend::{
    watchlist, ChartBackend, ChartRenderer, ModalRequest, RenderError, RenderOutcome,
};
use quote_client::{BenchmarkCache, QuoteConfig, QuoteError, QuoteSource, YahooChartClient};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use ts_core::{RangeToken, SymbolCache};

use crate::settings::{ScreenerSettings, SettingsError};

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Owns the price cache, benchmark cache, credentials and chart instances.
pub struct ScreenerContext<S, T, B> {
    settings: ScreenerSettings,
    prices: RwLock<HashMap<String, SymbolCache>>,
    benchmarks: BenchmarkCache<S>,
    ai: AiAssist<T>,
    renderer: ChartRenderer<B>,
}

impl<B: ChartBackend> ScreenerContext<YahooChartClient, HttpTransport, B> {
    /// Context backed by the live quote and completion endpoints.
    pub fn connect(
        settings: ScreenerSettings,
        quotes: QuoteConfig,
        ai: AiConfig,
        backend: B,
    ) -> Result<Self, ShellError> {
        let client = YahooChartClient::new(quotes)?;
        let ai = AiAssist::new(ai.with_locale(settings.locale))?;
        Ok(Self::new(settings, client, ai, backend))
    }

    /// Same as [`connect`](Self::connect), with settings read from a TOML file.
    pub fn connect_from_file<P: AsRef<Path>>(
        path: P,
        quotes: QuoteConfig,
        ai: AiConfig,
        backend: B,
    ) -> Result<Self, ShellError> {
        let settings = ScreenerSettings::load(path)?;
        Self::connect(settings, quotes, ai, backend)
    }
}

impl<S, T, B> ScreenerContext<S, T, B>
where
    S: QuoteSource,
    T: CompletionTransport,
    B: ChartBackend,
{
    pub fn new(settings: ScreenerSettings, quotes: S, ai: AiAssist<T>, backend: B) -> Self {
        Self {
            settings,
            prices: RwLock::new(HashMap::new()),
            benchmarks: BenchmarkCache::new(quotes),
            ai,
            renderer: ChartRenderer::new(backend),
        }
    }

    pub fn settings(&self) -> &ScreenerSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ScreenerSettings {
        &mut self.settings
    }

    pub fn renderer(&self) -> &ChartRenderer<B> {
        &self.renderer
    }

    pub fn benchmarks(&self) -> &BenchmarkCache<S> {
        &self.benchmarks
    }

    pub fn ai(&self) -> &AiAssist<T> {
        &self.ai
    }

    /// Replace the cached bars and events for `symbol`.
    pub async fn store_prices(&self, symbol: &str, cache: SymbolCache) {
        debug!(
            symbol,
            bars = cache.chart.len(),
            events = cache.events.len(),
            "price cache updated"
        );
        self.prices.write().await.insert(symbol.to_string(), cache);
    }

    pub async fn prices(&self, symbol: &str) -> Option<SymbolCache> {
        self.prices.read().await.get(symbol).cloned()
    }

    pub async fn forget(&self, symbol: &str) -> bool {
        self.prices.write().await.remove(symbol).is_some()
    }

    /// Render the detail chart for `symbol` into `target`.
    pub async fn render_modal_chart(
        &self,
        target: &str,
        symbol: &str,
        range: RangeToken,
    ) -> Result<RenderOutcome, RenderError> {
        let cache = self.prices(symbol).await.unwrap_or_default();
        info!(symbol, %range, "rendering modal chart");
        let req = ModalRequest {
            target,
            symbol,
            cache: &cache,
            range,
            features: &self.settings.features,
            benchmarks: &self.settings.benchmarks,
        };
        self.renderer.render_modal(req, &self.benchmarks).await
    }

    /// Render the compact chart inside the watchlist row for `symbol`.
    pub async fn render_watchlist(
        &self,
        symbol: &str,
        range: RangeToken,
    ) -> Result<RenderOutcome, RenderError> {
        let cache = self.prices(symbol).await.unwrap_or_default();
        watchlist::render_watchlist(&self.renderer, symbol, &cache.chart, range).await
    }

    pub async fn extract_tickers_from_image(&self, image_url: &str) -> Vec<String> {
        self.ai.extract_tickers_from_image(image_url).await
    }

    pub async fn extract_tickers_from_text(&self, text: &str) -> Vec<String> {
        self.ai.extract_tickers_from_text(text).await
    }

    pub async fn ask(&self, question: &str, symbol: &str, stock: &StockSnapshot) -> String {
        self.ai.ask(question, symbol, stock).await
    }
}
