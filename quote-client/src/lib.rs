use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};
use ts_core::{QuotePoint, RangeToken, MS};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DAILY_INTERVAL: &str = "1d";

#[derive(Debug, Clone)]
pub struct QuoteConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl QuoteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("quote endpoint returned status {0}")]
    Status(u16),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("no chart data for {0}")]
    NoData(String),
}

/// Range vocabulary of the quote-chart endpoint.
pub fn provider_range(range: RangeToken) -> &'static str {
    match range {
        RangeToken::OneDay => "1d",
        RangeToken::OneWeek => "5d",
        RangeToken::OneMonth => "1mo",
        RangeToken::ThreeMonths => "3mo",
        RangeToken::SixMonths => "6mo",
        RangeToken::OneYear | RangeToken::All => "1y",
    }
}

/// Daily closes for one index symbol, timestamps in epoch millis.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSeries {
    pub symbol: String,
    pub points: Vec<QuotePoint>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Option<ChartBody>,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Option<Vec<Quote>>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

/// Parse a quote-chart payload. Timestamps arrive in epoch seconds.
pub fn parse_chart_payload(symbol: &str, body: &str) -> Result<IndexSeries, QuoteError> {
    let parsed: ChartResponse =
        serde_json::from_str(body).map_err(|e| QuoteError::ParseError(e.to_string()))?;
    let result = parsed
        .chart
        .and_then(|c| c.result)
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| QuoteError::NoData(symbol.to_string()))?;
    let timestamps = result
        .timestamp
        .ok_or_else(|| QuoteError::NoData(symbol.to_string()))?;
    let closes = result
        .indicators
        .and_then(|i| i.quote)
        .and_then(|q| q.into_iter().next())
        .and_then(|q| q.close)
        .ok_or_else(|| QuoteError::ParseError(format!("missing close series for {symbol}")))?;

    let points = timestamps
        .iter()
        .enumerate()
        .map(|(idx, ts)| QuotePoint {
            ts: ts * MS,
            close: closes.get(idx).copied().flatten(),
        })
        .collect();
    Ok(IndexSeries {
        symbol: symbol.to_string(),
        points,
    })
}

/// Source of benchmark index series.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_index(&self, symbol: &str, range: RangeToken)
        -> Result<IndexSeries, QuoteError>;
}

#[derive(Clone)]
pub struct YahooChartClient {
    config: QuoteConfig,
    http: reqwest::Client,
}

impl YahooChartClient {
    pub fn new(config: QuoteConfig) -> Result<Self, QuoteError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &QuoteConfig {
        &self.config
    }

    pub fn chart_url(&self, symbol: &str, range: RangeToken) -> Result<Url, QuoteError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| QuoteError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| QuoteError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("range", provider_range(range))
            .append_pair("interval", DAILY_INTERVAL);
        Ok(url)
    }
}

#[async_trait]
impl QuoteSource for YahooChartClient {
    async fn fetch_index(
        &self,
        symbol: &str,
        range: RangeToken,
    ) -> Result<IndexSeries, QuoteError> {
        let url = self.chart_url(symbol, range)?;
        debug!(%url, "fetching benchmark index");
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(QuoteError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        parse_chart_payload(symbol, &body)
    }
}

type CacheKey = (String, RangeToken);

/// Benchmark series keyed by `(symbol, range)`.
///
/// Concurrent requests for one key share a single in-flight fetch. Failures are
/// not cached, so the next request for that key fetches again.
pub struct BenchmarkCache<S> {
    source: S,
    entries: Mutex<HashMap<CacheKey, Arc<OnceCell<Arc<IndexSeries>>>>>,
}

impl<S: QuoteSource> BenchmarkCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn get(
        &self,
        symbol: &str,
        range: RangeToken,
    ) -> Result<Arc<IndexSeries>, QuoteError> {
        let cell = self
            .entries
            .lock()
            .await
            .entry((symbol.to_string(), range))
            .or_default()
            .clone();
        if let Some(hit) = cell.get() {
            debug!(symbol, %range, "benchmark cache hit");
            return Ok(hit.clone());
        }
        let series = cell
            .get_or_try_init(|| async {
                match self.source.fetch_index(symbol, range).await {
                    Ok(series) => Ok(Arc::new(series)),
                    Err(err) => {
                        warn!(symbol, %range, error = %err, "benchmark fetch failed");
                        Err(err)
                    }
                }
            })
            .await?;
        Ok(series.clone())
    }

    /// Number of keys holding a fetched series.
    pub async fn len(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
