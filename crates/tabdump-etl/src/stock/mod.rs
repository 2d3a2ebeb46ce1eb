/// Concatenation of fetched series and the left join onto security metadata.
pub mod merge;

/// Fetch, accumulate, merge, write: one run over a security list.
pub mod pipeline;

pub mod prices;

/// The input security list.
pub mod securities;

/// Price data collected from the Yahoo Finance API; inspiration from Python's [yfinance] library.
///
/// [yfinance]: https://github.com/ranaroussi/yfinance/
pub mod yahoo_finance;
