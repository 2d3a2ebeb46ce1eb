use crate::table::Value;
use chrono::{Days, NaiveDate, NaiveTime};
use thiserror::Error;

/// Column headers of a price row, in output order.
pub const PRICE_COLUMNS: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"];

/// Default lookback: ten years of daily prices.
pub const LOOKBACK_DAYS: u64 = 3650;

/// One daily bar. Fields the provider left blank stay `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct Price {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<i64>,
}

impl Price {
    /// The bar as table values, ordered like [`PRICE_COLUMNS`].
    pub fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Text(self.date.to_string()),
            self.open.into(),
            self.high.into(),
            self.low.into(),
            self.close.into(),
            self.adj_close.into(),
            self.volume.into(),
        ]
    }
}

/// The prices fetched for one security code. Never empty.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceSeries {
    code: String,
    prices: Vec<Price>,
}

impl PriceSeries {
    pub fn new(code: impl Into<String>, prices: Vec<Price>) -> Result<Self, FetchError> {
        if prices.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(Self {
            code: code.into(),
            prices,
        })
    }

    /// The security code (not the provider symbol) the series was fetched for.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn prices(&self) -> &[Price] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Inclusive range of days requested from a provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    /// `[today - days, today]`; fails when the start falls outside the supported calendar.
    pub fn lookback(today: NaiveDate, days: u64) -> anyhow::Result<Self> {
        let start = today
            .checked_sub_days(Days::new(days))
            .ok_or_else(|| anyhow::anyhow!("cannot look back {days} days from {today}"))?;
        Ok(Self { start, end: today })
    }

    /// Unix timestamp of the first second of `start` (UTC).
    pub fn period1(&self) -> i64 {
        self.start.and_time(NaiveTime::MIN).and_utc().timestamp()
    }

    /// Unix timestamp of the last second of `end` (UTC).
    pub fn period2(&self) -> i64 {
        self.end.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399
    }
}

/// Why a single security code produced no prices.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected http status {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("provider error {code}: {description}")]
    Provider { code: String, description: String },

    #[error("invalid timestamp {0}")]
    Timestamp(i64),

    #[error("no results found within http response")]
    NoResults,

    #[error("no prices within the requested window")]
    Empty,
}

/// A source of daily price history.
///
/// Implementations report every failure through [`FetchError`]; the pipeline turns them into
/// skipped security codes instead of aborting the run.
#[allow(async_fn_in_trait)]
pub trait PriceProvider {
    /// Daily prices for the provider `symbol` over `window`, oldest first.
    async fn daily_prices(&self, symbol: &str, window: Window) -> Result<Vec<Price>, FetchError>;
}
