use serde::{Deserialize, Serialize};

use crate::config::Locale;
use crate::transport::{ChatMessage, ChatRequest};

const VISION_SYSTEM: &str = "You are a financial data analysis expert.

TASK: Extract all stock ticker symbols explicitly represented in the image.

RULES:
1. Scan the Symbol and Company Name columns.
2. Use your knowledge to map company names to tickers correctly (e.g., \"PayPal\" to \"PYPL\").
3. CRITICAL: DO NOT add \"related\" tickers that are not present in the image. For example, if you see Micron (MU), DO NOT add Western Digital (WDC) or TSM unless they are also shown.
4. Output ONLY a clean JSON array of strings. No extra text, no repetitions.
Example: [\"MU\", \"CIEN\", \"PYPL\"]";

const VISION_USER: &str = "Identify all stock tickers in this image and list them as a JSON array. Do not include any stocks not explicitly shown.";

const TEXT_SYSTEM: &str = "You are a financial data expert. Your task is to extract stock tickers from messy OCR text.
RULES:
1. Identify all stock TICKERS (e.g., MU, AAPL) and COMPANY NAMES (e.g., Micron Technology, Ciena) explicitly or implicitly present.
2. If you find a COMPANY NAME, map it to its corresponding STOCK TICKER symbol.
3. If the text looks like a table with columns like \"Symbol\" and \"Company Name\", use both to ensure correct ticker extraction.
4. Output ONLY a COMMA-SEPARATED LIST of the identified/mapped ticker symbols.
5. DO NOT include generic terms like FWD, EPS, AVG, DATE, INDEX, 500.
6. Output 'NONE' if no financial entities are found.";

/// Sampling settings for one request shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

pub const VISION_SAMPLING: Sampling = Sampling {
    temperature: 0.0,
    max_tokens: 300,
};
pub const TEXT_SAMPLING: Sampling = Sampling {
    temperature: 0.0,
    max_tokens: 150,
};
pub const QA_SAMPLING: Sampling = Sampling {
    temperature: 0.2,
    max_tokens: 1000,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scores {
    pub mom: Option<f64>,
    pub fund: Option<f64>,
    pub sent: Option<f64>,
}

/// What the screener knows about a stock when the user asks about it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StockSnapshot {
    pub price: Option<f64>,
    pub change_percent: Option<f64>,
    pub verdict: Option<String>,
    pub scores: Scores,
}

impl StockSnapshot {
    fn price_text(&self) -> String {
        match self.price {
            Some(p) if p != 0.0 && p.is_finite() => p.to_string(),
            _ => "N/A".to_string(),
        }
    }

    fn change_text(&self) -> String {
        match self.change_percent {
            Some(c) if c.is_finite() => format!("{c:.2}"),
            _ => "N/A".to_string(),
        }
    }

    fn verdict_text(&self) -> &str {
        self.verdict.as_deref().unwrap_or("N/A")
    }
}

fn score(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// User-facing strings.
impl Locale {
    pub fn not_configured(&self) -> &'static str {
        match self {
            Locale::Ja => "Perplexity APIキーが設定されていません。設定から追加してください。",
            Locale::En => "Perplexity API key is not configured. Add it in settings.",
        }
    }

    pub fn no_answer(&self) -> &'static str {
        match self {
            Locale::Ja => "回答を生成できませんでした。",
            Locale::En => "Could not generate an answer.",
        }
    }

    pub fn failure(&self, detail: &str) -> String {
        match self {
            Locale::Ja => format!("エラーが発生しました: {detail}"),
            Locale::En => format!("An error occurred: {detail}"),
        }
    }

    pub fn persona(&self) -> &'static str {
        match self {
            Locale::Ja => "あなたは株式投資の専門家です。最新の市場情報を参照しながら、正確で役立つアドバイスを日本語で提供します。",
            Locale::En => "You are a stock investment expert. Using the latest market information, you give accurate and useful advice in English.",
        }
    }
}

/// Stock context followed by the user's question.
pub fn qa_context(locale: Locale, symbol: &str, stock: &StockSnapshot, question: &str) -> String {
    let price = stock.price_text();
    let change = stock.change_text();
    let verdict = stock.verdict_text();
    let mom = score(stock.scores.mom);
    let fund = score(stock.scores.fund);
    let sent = score(stock.scores.sent);
    match locale {
        Locale::Ja => format!(
            "株式情報:
- ティッカーシンボル: {symbol}
- 現在価格: ${price}
- 変動率: {change}%
- AIアドバイス: {verdict}
- モメンタムスコア: {mom}/100
- ファンダメンタルスコア: {fund}/100
- センチメントスコア: {sent}/100

ユーザーの質問: {question}

上記の株式情報を基に、最新の市場動向も考慮して日本語で簡潔かつ専門的に回答してください。"
        ),
        Locale::En => format!(
            "Stock information:
- Ticker: {symbol}
- Current price: ${price}
- Change: {change}%
- AI verdict: {verdict}
- Momentum score: {mom}/100
- Fundamental score: {fund}/100
- Sentiment score: {sent}/100

User question: {question}

Based on the stock information above and the latest market trends, answer concisely and professionally in English."
        ),
    }
}

fn request(model: &str, sampling: Sampling, messages: Vec<ChatMessage>) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages,
        max_tokens: sampling.max_tokens,
        temperature: sampling.temperature,
    }
}

pub fn vision_request(model: &str, image_url: &str) -> ChatRequest {
    request(
        model,
        VISION_SAMPLING,
        vec![
            ChatMessage::system(VISION_SYSTEM),
            ChatMessage::user_with_image(VISION_USER, image_url),
        ],
    )
}

pub fn text_request(model: &str, text: &str) -> ChatRequest {
    request(
        model,
        TEXT_SAMPLING,
        vec![
            ChatMessage::system(TEXT_SYSTEM),
            ChatMessage::user(format!("OCR Text: {text}")),
        ],
    )
}

pub fn qa_request(
    model: &str,
    locale: Locale,
    symbol: &str,
    stock: &StockSnapshot,
    question: &str,
) -> ChatRequest {
    request(
        model,
        QA_SAMPLING,
        vec![
            ChatMessage::system(locale.persona()),
            ChatMessage::user(qa_context(locale, symbol, stock, question)),
        ],
    )
}
