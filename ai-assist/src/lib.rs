//! Ticker extraction and stock Q&A on top of a hosted chat-completion API.
//!
//! Nothing here fails outward: a missing credential or a transport failure
//! yields an empty ticker list or a localized message, and is logged.

pub mod config;
pub mod parse;
pub mod prompt;
pub mod transport;

use thiserror::Error;
use tracing::{debug, error, warn};

pub use config::{AiConfig, Locale, API_KEY_ENV};
pub use parse::{parse_ticker_array, parse_ticker_list, TickerFilter, DENYLIST};
pub use prompt::{Scores, StockSnapshot};
pub use transport::{ChatRequest, ChatResponse, CompletionTransport, HttpTransport};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("API key is not configured")]
    NotConfigured,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    #[error("malformed completion response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("completion had no content")]
    EmptyResponse,
}

pub struct AiAssist<T = HttpTransport> {
    config: AiConfig,
    transport: T,
}

impl AiAssist<HttpTransport> {
    pub fn new(config: AiConfig) -> Result<Self, AiError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self { config, transport })
    }
}

impl<T: CompletionTransport> AiAssist<T> {
    pub fn with_transport(config: AiConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, AiError> {
        let key = self.config.api_key().ok_or(AiError::NotConfigured)?;
        let resp = self.transport.complete(key, &request).await?;
        resp.content()
            .map(str::to_string)
            .ok_or(AiError::EmptyResponse)
    }

    /// Tickers visible in an image (a data URL or https URL).
    pub async fn extract_tickers_from_image(&self, image_url: &str) -> Vec<String> {
        let request = prompt::vision_request(&self.config.model, image_url);
        match self.complete(request).await {
            Ok(content) => {
                let tickers = parse::tickers_from_vision(&content);
                debug!(count = tickers.len(), "vision tickers extracted");
                tickers
            }
            Err(AiError::NotConfigured) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "vision ticker extraction failed");
                Vec::new()
            }
        }
    }

    /// Tickers named in OCR output or other free text.
    pub async fn extract_tickers_from_text(&self, text: &str) -> Vec<String> {
        let request = prompt::text_request(&self.config.model, text);
        match self.complete(request).await {
            Ok(content) => {
                let tickers = parse::tickers_from_text(&content);
                debug!(count = tickers.len(), "text tickers extracted");
                tickers
            }
            Err(AiError::NotConfigured) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "text ticker extraction failed");
                Vec::new()
            }
        }
    }

    /// Answer a question about `symbol`. Failures come back as a localized message.
    pub async fn ask(&self, question: &str, symbol: &str, stock: &StockSnapshot) -> String {
        let locale = self.config.locale;
        let request = prompt::qa_request(&self.config.model, locale, symbol, stock, question);
        match self.complete(request).await {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) | Err(AiError::EmptyResponse) => locale.no_answer().to_string(),
            Err(AiError::NotConfigured) => locale.not_configured().to_string(),
            Err(err) => {
                error!(symbol, error = %err, "stock question failed");
                locale.failure(&err.to_string())
            }
        }
    }
}
