use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ai_assist::{AiAssist, AiConfig, AiError, ChatRequest, ChatResponse, CompletionTransport};
use app_shell::{ScreenerContext, ScreenerSettings, SettingsError, ShellError};
use async_trait::async_trait;
use chart_frontend::{JsonBackend, RenderOutcome, SkipReason, EMPTY_PLACEHOLDER};
use quote_client::{IndexSeries, QuoteConfig, QuoteError, QuoteSource};
use serde_json::Value;
use ts_core::{Bar, Event, EventKind, QuotePoint, RangeToken, SymbolCache, DAY_MS};

#[derive(Default)]
struct FakeQuotes {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl QuoteSource for FakeQuotes {
    async fn fetch_index(
        &self,
        symbol: &str,
        _range: RangeToken,
    ) -> Result<IndexSeries, QuoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if symbol == "^IXIC" {
            return Err(QuoteError::NoData(symbol.to_string()));
        }
        Ok(IndexSeries {
            symbol: symbol.to_string(),
            points: (0..400)
                .map(|i| QuotePoint {
                    ts: i * DAY_MS,
                    close: Some(4000.0 + i as f64),
                })
                .collect(),
        })
    }
}

struct SilentTransport;

#[async_trait]
impl CompletionTransport for SilentTransport {
    async fn complete(&self, _key: &str, _req: &ChatRequest) -> Result<ChatResponse, AiError> {
        Ok(ChatResponse::default())
    }
}

fn price_cache() -> SymbolCache {
    let chart = (0..400)
        .map(|i| Bar {
            time: i * DAY_MS,
            close: 50.0 + (i % 30) as f64,
            volume: 1_000.0 * (1 + i % 5) as f64,
        })
        .collect();
    let events = vec![
        Event::new((395 * DAY_MS).to_string(), EventKind::Earnings),
        Event::new("1970-03-01", EventKind::Dividend),
        Event::new("not a date", EventKind::Earnings),
    ];
    SymbolCache::new(chart, events)
}

type TestContext = ScreenerContext<FakeQuotes, SilentTransport, JsonBackend>;

fn context(settings: ScreenerSettings) -> (TestContext, Arc<AtomicUsize>) {
    let quotes = FakeQuotes::default();
    let calls = quotes.calls.clone();
    let ai = AiAssist::with_transport(AiConfig::unconfigured(), SilentTransport);
    (ScreenerContext::new(settings, quotes, ai, JsonBackend::new()), calls)
}

fn labels(json: &Value) -> Vec<String> {
    json["data"]["datasets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["label"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn modal_chart_composes_all_overlays() {
    let mut settings = ScreenerSettings::default();
    settings.features.show_benchmarks = true;
    let (ctx, calls) = context(settings);
    ctx.store_prices("MU", price_cache()).await;

    let outcome = ctx
        .render_modal_chart("modal-chart", "MU", RangeToken::ThreeMonths)
        .await
        .unwrap();
    let RenderOutcome::Rendered(summary) = outcome else {
        panic!("expected a rendered chart, got {outcome:?}");
    };
    assert_eq!(summary.points, 93);
    assert_eq!(summary.overlays, 1);
    assert_eq!(summary.markers, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let raw = ctx.renderer().backend().config_json("modal-chart").unwrap();
    let json: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(labels(&json), vec!["MU", "MA20", "MA50", "Volume", "S&P 500"]);
    assert_eq!(json["options"]["scales"]["x"]["time"]["unit"], "month");

    // second render hits the benchmark cache for the index that loaded
    ctx.render_modal_chart("modal-chart", "MU", RangeToken::ThreeMonths)
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(ctx.renderer().backend().live_count(), 1);
}

#[tokio::test]
async fn unknown_symbol_skips_render() {
    let (ctx, calls) = context(ScreenerSettings::default());
    let outcome = ctx
        .render_modal_chart("modal-chart", "NOPE", RangeToken::OneMonth)
        .await
        .unwrap();
    assert_eq!(outcome, RenderOutcome::Skipped(SkipReason::NoData));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.renderer().backend().live_count(), 0);
}

#[tokio::test]
async fn watchlist_and_modal_charts_coexist() {
    let (ctx, _) = context(ScreenerSettings::default());
    ctx.store_prices("BRK.B", price_cache()).await;

    ctx.render_modal_chart("modal-chart", "BRK.B", RangeToken::All)
        .await
        .unwrap();
    let outcome = ctx.render_watchlist("BRK.B", RangeToken::OneMonth).await.unwrap();
    let RenderOutcome::Rendered(summary) = outcome else {
        panic!("expected watchlist chart");
    };
    assert_eq!(summary.points, 31);
    assert_eq!(ctx.renderer().backend().live_count(), 2);

    let empty = ctx.render_watchlist("MU", RangeToken::OneYear).await.unwrap();
    assert_eq!(empty, RenderOutcome::Skipped(SkipReason::NoData));
    assert_eq!(
        ctx.renderer().backend().placeholder("wl-chart-MU").as_deref(),
        Some(EMPTY_PLACEHOLDER)
    );
}

#[tokio::test]
async fn ai_without_key_degrades() {
    let (ctx, _) = context(ScreenerSettings::default());
    assert!(ctx.extract_tickers_from_text("Micron").await.is_empty());
    let answer = ctx.ask("?", "MU", &Default::default()).await;
    assert_eq!(answer, ai_assist::Locale::Ja.not_configured());
}

#[test]
fn connect_reads_settings_file() {
    let path = std::env::temp_dir().join(format!("screener-{}.toml", std::process::id()));
    std::fs::write(&path, "locale = \"en\"\n").unwrap();
    let ctx = ScreenerContext::connect_from_file(
        &path,
        QuoteConfig::default(),
        AiConfig::unconfigured(),
        JsonBackend::new(),
    );
    std::fs::remove_file(&path).unwrap();
    let ctx = match ctx {
        Ok(ctx) => ctx,
        Err(err) => panic!("connect failed: {err}"),
    };
    assert_eq!(ctx.settings().locale, ai_assist::Locale::En);
    assert_eq!(ctx.ai().config().locale, ai_assist::Locale::En);
    assert!(!ctx.ai().is_configured());
}

#[test]
fn connect_reports_missing_settings_file() {
    let missing = std::env::temp_dir().join("screener-settings-that-does-not-exist.toml");
    let result = ScreenerContext::connect_from_file(
        &missing,
        QuoteConfig::default(),
        AiConfig::unconfigured(),
        JsonBackend::new(),
    );
    assert!(matches!(
        result,
        Err(ShellError::Settings(SettingsError::Read(_)))
    ));
}
