use super::prices::{FetchError, Price, PriceProvider, Window};
use crate::http::*;
use serde::Deserialize;
use tracing::{debug, trace};

/// Yahoo Finance v8 chart API.
#[derive(Clone, Debug)]
pub struct YahooFinance {
    http_client: HttpClient,
    base_url: String,
}

impl YahooFinance {
    pub const BASE_URL: &'static str = "https://query1.finance.yahoo.com";

    pub fn new(http_client: HttpClient) -> Self {
        Self::with_base_url(http_client, Self::BASE_URL)
    }

    /// Point the client at another host; used against mock servers.
    pub fn with_base_url(http_client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The chart request for `symbol` over `window`; a pure function of its inputs.
    pub fn chart_url(&self, symbol: &str, window: Window) -> String {
        format!(
            "{base}/v8/finance/chart/{symbol}?period1={period1}&period2={period2}&interval=1d&includeAdjustedClose=true",
            base = self.base_url,
            period1 = window.period1(),
            period2 = window.period2(),
        )
    }
}

// fetch
// ----------------------------------------------------------------------------

impl PriceProvider for YahooFinance {
    async fn daily_prices(&self, symbol: &str, window: Window) -> Result<Vec<Price>, FetchError> {
        let time = std::time::Instant::now();
        let url = self.chart_url(symbol, window);
        trace!("fetching Yahoo Finance prices for [{symbol}], url({url})");

        // fetch raw http response
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        // Yahoo answers unknown symbols with a 404 that still carries a `chart.error`
        let price_response: PriceResponse = match serde_json::from_slice(&body) {
            Ok(json) => json,
            Err(_) if !status.is_success() => return Err(FetchError::Status(status)),
            Err(err) => return Err(err.into()),
        };

        let prices = price_response.into_prices()?;
        debug!(
            "[{symbol}] {} prices fetched. {}",
            prices.len(),
            crate::time_elapsed(time)
        );

        Ok(prices)
    }
}

// de
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PriceResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<Meta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Meta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Quote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    adjclose: Vec<Option<f64>>,
}

impl PriceResponse {
    /// Transform the columnar chart response into daily rows.
    fn into_prices(self) -> Result<Vec<Price>, FetchError> {
        let mut results = match (self.chart.result, self.chart.error) {
            (_, Some(err)) => {
                return Err(FetchError::Provider {
                    code: err.code,
                    description: err.description,
                })
            }
            (Some(results), None) => results,
            (None, None) => return Err(FetchError::NoResults),
        };
        if results.is_empty() {
            return Err(FetchError::NoResults);
        }
        let base = results.swap_remove(0);

        // a symbol without trading days in the window comes back without timestamps
        let timestamps = match base.timestamp {
            Some(timestamps) if !timestamps.is_empty() => timestamps,
            _ => return Err(FetchError::Empty),
        };

        // timestamps mark the session open; shift to exchange time before taking the date
        let offset = base.meta.and_then(|meta| meta.gmtoffset).unwrap_or(0);
        let quote = base.indicators.quote.into_iter().next().unwrap_or_default();
        let adjclose = base
            .indicators
            .adjclose
            .and_then(|adj| adj.into_iter().next())
            .map(|adj| adj.adjclose)
            .unwrap_or_default();

        let at = |column: &[Option<f64>], i: usize| column.get(i).copied().flatten();

        timestamps
            .iter()
            .enumerate()
            .map(|(i, timestamp)| {
                let date = chrono::DateTime::from_timestamp(timestamp + offset, 0)
                    .ok_or(FetchError::Timestamp(*timestamp))?
                    .date_naive();
                Ok(Price {
                    date,
                    open: at(&quote.open, i),
                    high: at(&quote.high, i),
                    low: at(&quote.low, i),
                    close: at(&quote.close, i),
                    adj_close: at(&adjclose, i),
                    volume: quote.volume.get(i).copied().flatten(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn de(json: &str) -> PriceResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn chart_url_is_deterministic() {
        let yahoo = YahooFinance::with_base_url(HttpClient::new(), "http://localhost:8080/");
        let window = Window::lookback(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(), 3650).unwrap();
        let url = yahoo.chart_url("500325.BO", window);
        assert_eq!(
            url,
            "http://localhost:8080/v8/finance/chart/500325.BO?period1=1404345600&period2=1719791999&interval=1d&includeAdjustedClose=true"
        );
        assert_eq!(url, yahoo.chart_url("500325.BO", window));
    }

    #[test]
    fn transforms_columns_into_rows() {
        let response = de(r#"{"chart": {"result": [{
            "meta": {"gmtoffset": 19800},
            "timestamp": [1704167100, 1704253500],
            "indicators": {
                "quote": [{
                    "open": [10.0, 11.0],
                    "high": [12.0, null],
                    "low": [9.0, 10.5],
                    "close": [11.0, 10.75],
                    "volume": [100, 200]
                }],
                "adjclose": [{"adjclose": [10.9, 10.7]}]
            }
        }], "error": null}}"#);

        let prices = response.into_prices().unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(prices[1].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(prices[1].high, None);
        assert_eq!(prices[1].adj_close, Some(10.7));
        assert_eq!(prices[1].volume, Some(200));
    }

    #[test]
    fn chart_error_is_a_provider_error() {
        let response = de(r#"{"chart": {"result": null, "error": {
            "code": "Not Found",
            "description": "No data found, symbol may be delisted"
        }}}"#);
        assert!(matches!(
            response.into_prices(),
            Err(FetchError::Provider { code, .. }) if code == "Not Found"
        ));
    }

    #[test]
    fn missing_timestamps_are_empty() {
        let response = de(r#"{"chart": {"result": [{
            "meta": {"gmtoffset": 19800},
            "indicators": {"quote": [{}], "adjclose": [{"adjclose": []}]}
        }], "error": null}}"#);
        assert!(matches!(response.into_prices(), Err(FetchError::Empty)));
    }

    #[test]
    fn missing_result_and_error_is_no_results() {
        let response = de(r#"{"chart": {"result": null, "error": null}}"#);
        assert!(matches!(response.into_prices(), Err(FetchError::NoResults)));
    }
}
