//! Market data tools backed by the Yahoo Finance JSON endpoints.
//!
//! All four tools share one [`YahooFinance`] client. Upstream failures are
//! reported as text so the reasoning engine can tell the user; only input
//! the tool cannot interpret is an error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use stepwise_core::error::ToolError;
use stepwise_core::tool::{InputShape, Tool, ToolInput};
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("stepwise/", env!("CARGO_PKG_VERSION"));
const TOP_GAINERS_LIMIT: usize = 5;

/// Thin client over the chart, trending and quoteSummary endpoints.
pub struct YahooFinance {
    base_url: String,
    client: reqwest::Client,
}

/// One daily close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyClose {
    pub date: String,
    pub close: f64,
}

/// A trending symbol and its last price, when the feed carries one.
#[derive(Debug, Clone, PartialEq)]
pub struct Trending {
    pub symbol: String,
    pub price: Option<f64>,
}

/// The parts of a company profile the tools report.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyProfile {
    pub summary: String,
    pub industry: String,
    pub sector: String,
}

impl YahooFinance {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Join `segments` onto the base URL, escaping each one.
    fn url_for(&self, segments: &[&str]) -> Result<reqwest::Url, String> {
        let invalid = || format!("invalid market data base url '{}'", self.base_url);
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, String> {
        let url = self.url_for(segments)?;
        debug!(url = %url, "Market data request");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }
        response.json().await.map_err(|e| e.to_string())
    }

    /// Latest regular-market price for `ticker`.
    pub async fn price(&self, ticker: &str) -> Result<f64, String> {
        let chart: ChartEnvelope = self
            .get_json(
                &["v8", "finance", "chart", ticker],
                &[("range", "1d".into()), ("interval", "1d".into())],
            )
            .await?;

        chart
            .first()?
            .meta
            .regular_market_price
            .ok_or_else(|| "no regularMarketPrice in response".to_string())
    }

    /// Daily closes between two dates (inclusive start, exclusive end).
    pub async fn history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, String> {
        let chart: ChartEnvelope = self
            .get_json(
                &["v8", "finance", "chart", ticker],
                &[
                    ("period1", unix_midnight(start).to_string()),
                    ("period2", unix_midnight(end).to_string()),
                    ("interval", "1d".into()),
                ],
            )
            .await?;

        let result = chart.first()?;
        let closes = result
            .indicators
            .quote
            .first()
            .map(|q| q.close.as_slice())
            .unwrap_or_default();

        Ok(result
            .timestamp
            .iter()
            .zip(closes)
            .filter_map(|(ts, close)| {
                let close = (*close)?;
                let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
                Some(DailyClose {
                    date: date.format("%Y-%m-%d").to_string(),
                    close,
                })
            })
            .collect())
    }

    /// Symbols trending in the US market, most popular first.
    pub async fn trending(&self) -> Result<Vec<Trending>, String> {
        let envelope: TrendingEnvelope = self
            .get_json(&["v1", "finance", "trending", "US"], &[])
            .await?;
        let result = envelope
            .finance
            .result
            .into_iter()
            .next()
            .ok_or_else(|| "empty trending result".to_string())?;

        Ok(result
            .quotes
            .into_iter()
            .map(|q| Trending {
                symbol: q.symbol,
                price: q.regular_market_price,
            })
            .collect())
    }

    /// Business summary, industry and sector.
    pub async fn profile(&self, ticker: &str) -> Result<CompanyProfile, String> {
        let envelope: SummaryEnvelope = self
            .get_json(
                &["v10", "finance", "quoteSummary", ticker],
                &[("modules", "assetProfile".into())],
            )
            .await?;

        let profile = envelope
            .quote_summary
            .result
            .into_iter()
            .next()
            .and_then(|r| r.asset_profile)
            .ok_or_else(|| "no assetProfile in response".to_string())?;

        Ok(CompanyProfile {
            summary: profile.long_business_summary.unwrap_or_default(),
            industry: profile.industry.unwrap_or_else(|| "unknown".into()),
            sector: profile.sector.unwrap_or_else(|| "unknown".into()),
        })
    }
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

fn ticker_from(tool: &str, input: &ToolInput) -> Result<String, ToolError> {
    input
        .text_or_field("ticker")
        .map(|t| t.to_uppercase())
        .ok_or_else(|| ToolError::InvalidInput {
            tool_name: tool.into(),
            reason: format!("expected a stock ticker, got {input}"),
        })
}

// --- Tools ---

pub struct StockPriceTool {
    client: Arc<YahooFinance>,
}

impl StockPriceTool {
    pub fn new(client: Arc<YahooFinance>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for StockPriceTool {
    fn name(&self) -> &str {
        "get_stock_price"
    }

    fn description(&self) -> &str {
        "Takes a stock ticker (like AAPL or TSLA) and returns the current price"
    }

    fn input_shape(&self) -> InputShape {
        InputShape::text("stock ticker, e.g. \"AAPL\"")
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError> {
        let ticker = ticker_from(self.name(), &input)?;
        match self.client.price(&ticker).await {
            Ok(price) => Ok(format!("The current price of {ticker} is ${price}.")),
            Err(reason) => {
                warn!(%ticker, %reason, "Price lookup failed");
                Ok(format!("Couldn't fetch stock info for {ticker}."))
            }
        }
    }
}

pub struct StockHistoryTool {
    client: Arc<YahooFinance>,
}

impl StockHistoryTool {
    pub fn new(client: Arc<YahooFinance>) -> Self {
        Self { client }
    }

    fn invalid(&self, reason: impl Into<String>) -> ToolError {
        ToolError::InvalidInput {
            tool_name: self.name().into(),
            reason: reason.into(),
        }
    }

    fn date_field(&self, input: &ToolInput, name: &str) -> Result<NaiveDate, ToolError> {
        let raw = input
            .field("period")
            .and_then(|p| p.get(name))
            .and_then(|v| v.as_str())
            .ok_or_else(|| self.invalid(format!("missing period.{name}")))?;
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|e| self.invalid(format!("period.{name} '{raw}' is not YYYY-MM-DD: {e}")))
    }
}

#[async_trait]
impl Tool for StockHistoryTool {
    fn name(&self) -> &str {
        "get_stock_history"
    }

    fn description(&self) -> &str {
        "Takes a ticker and a date range, returns historical close prices"
    }

    fn input_shape(&self) -> InputShape {
        InputShape::Record {
            schema: serde_json::json!({
                "ticker": "string",
                "period": {"start": "YYYY-MM-DD", "end": "YYYY-MM-DD"}
            }),
        }
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError> {
        let ticker = input
            .field("ticker")
            .and_then(|v| v.as_str())
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| self.invalid(format!("expected {{ticker, period}}, got {input}")))?;
        let start = self.date_field(&input, "start")?;
        let end = self.date_field(&input, "end")?;

        let history = match self.client.history(&ticker, start, end).await {
            Ok(h) => h,
            Err(reason) => {
                warn!(%ticker, %reason, "History lookup failed");
                return Ok(format!("Error fetching history for {ticker}."));
            }
        };

        let listing = serde_json::to_string_pretty(&history)
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;
        Ok(format!(
            "Stock history for {ticker} from {start} to {end}:\n{listing}"
        ))
    }
}

pub struct TopGainersTool {
    client: Arc<YahooFinance>,
}

impl TopGainersTool {
    pub fn new(client: Arc<YahooFinance>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for TopGainersTool {
    fn name(&self) -> &str {
        "get_top_gainers"
    }

    fn description(&self) -> &str {
        "Returns a list of top trending stocks today"
    }

    fn input_shape(&self) -> InputShape {
        InputShape::None
    }

    async fn invoke(&self, _input: ToolInput) -> Result<String, ToolError> {
        match self.client.trending().await {
            Ok(quotes) => {
                let lines: Vec<String> = quotes
                    .into_iter()
                    .take(TOP_GAINERS_LIMIT)
                    .map(|q| match q.price {
                        Some(p) => format!("{} (${p})", q.symbol),
                        None => q.symbol,
                    })
                    .collect();
                Ok(format!("Top trending stocks today:\n{}", lines.join("\n")))
            }
            Err(reason) => {
                warn!(%reason, "Trending lookup failed");
                Ok("Failed to fetch top gainers.".into())
            }
        }
    }
}

pub struct CompanyInfoTool {
    client: Arc<YahooFinance>,
}

impl CompanyInfoTool {
    pub fn new(client: Arc<YahooFinance>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for CompanyInfoTool {
    fn name(&self) -> &str {
        "get_company_info"
    }

    fn description(&self) -> &str {
        "Takes a stock ticker and returns company summary info"
    }

    fn input_shape(&self) -> InputShape {
        InputShape::text("stock ticker, e.g. \"MSFT\"")
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError> {
        let ticker = ticker_from(self.name(), &input)?;
        match self.client.profile(&ticker).await {
            Ok(p) => Ok(format!(
                "{}\nIndustry: {}, Sector: {}",
                p.summary, p.industry, p.sector
            )),
            Err(reason) => {
                warn!(%ticker, %reason, "Company profile lookup failed");
                Ok(format!(
                    "Could not retrieve company information for {ticker}."
                ))
            }
        }
    }
}

// --- Yahoo Finance response types ---

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

impl ChartEnvelope {
    fn first(self) -> Result<ChartResult, String> {
        self.chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| "empty chart result".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct TrendingEnvelope {
    finance: TrendingFinance,
}

#[derive(Debug, Deserialize)]
struct TrendingFinance {
    #[serde(default)]
    result: Vec<TrendingResult>,
}

#[derive(Debug, Deserialize)]
struct TrendingResult {
    #[serde(default)]
    quotes: Vec<TrendingQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrendingQuote {
    symbol: String,
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryEnvelope {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    #[serde(default)]
    result: Vec<SummaryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    asset_profile: Option<AssetProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetProfile {
    long_business_summary: Option<String>,
    industry: Option<String>,
    sector: Option<String>,
}
