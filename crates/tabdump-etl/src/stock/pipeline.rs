use super::merge;
use super::prices::{FetchError, PriceProvider, PriceSeries, Window, LOOKBACK_DAYS};
use super::securities::{Securities, SECURITY_CODE};
use crate::tui::Progress;
use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

/// Exchange suffix Yahoo Finance uses for the Bombay Stock Exchange.
pub const BSE_SUFFIX: &str = ".BO";

/// Everything one run of the price pipeline needs; no state lives outside of it.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Security list, `.csv` with a header row.
    pub input: String,
    /// Merged output, `.csv`.
    pub output: String,
    /// Join key column of the security list.
    pub key_column: String,
    /// Appended to each security code to form the provider symbol.
    pub suffix: String,
    pub lookback_days: u64,
    /// Last day of the lookback window.
    pub today: NaiveDate,
    /// Draw progress bars instead of relying on tracing output.
    pub tui: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: "names.csv".to_string(),
            output: "data.csv".to_string(),
            key_column: SECURITY_CODE.to_string(),
            suffix: BSE_SUFFIX.to_string(),
            lookback_days: LOOKBACK_DAYS,
            today: chrono::Local::now().date_naive(),
            tui: false,
        }
    }
}

/// A security code that produced no prices, and why.
#[derive(Debug)]
pub struct Skipped {
    pub code: String,
    pub reason: FetchError,
}

/// The result of fetching one security code.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(PriceSeries),
    Failed(Skipped),
}

/// Summary of a finished run.
#[derive(Debug)]
pub struct Report {
    pub output: String,
    /// Data rows written.
    pub rows: usize,
    /// Number of security codes with prices.
    pub fetched: usize,
    /// Security codes without prices, in input order.
    pub skipped: Vec<Skipped>,
}

/// Provider symbol of a security code, e.g. `500325` -> `500325.BO`.
pub fn qualified_symbol(code: &str, suffix: &str) -> String {
    format!("{code}{suffix}")
}

/// Fetch the prices of one security code.
///
/// Provider failures are never propagated; they come back as [`FetchOutcome::Failed`]. One log
/// line is emitted per call, stating which of the two happened.
pub async fn fetch<P: PriceProvider>(
    provider: &P,
    code: &str,
    suffix: &str,
    window: Window,
) -> FetchOutcome {
    let symbol = qualified_symbol(code, suffix);
    let result = provider
        .daily_prices(&symbol, window)
        .await
        .and_then(|prices| PriceSeries::new(code, prices));

    match result {
        Ok(series) => {
            info!("fetched {} prices for [{symbol}]", series.len());
            FetchOutcome::Fetched(series)
        }
        Err(reason) => {
            warn!("no data available for [{symbol}], error({reason}); skipping ...");
            FetchOutcome::Failed(Skipped {
                code: code.to_string(),
                reason,
            })
        }
    }
}

/// Collects fetched series in fetch order, and the codes that were skipped.
///
/// Nothing is deduplicated: a code fetched twice is kept twice.
#[derive(Debug)]
pub struct Accumulator {
    series: Vec<PriceSeries>,
    skipped: Vec<Skipped>,
    processed: usize,
    total: usize,
}

impl Accumulator {
    /// An empty accumulator for a run over `total` security codes.
    pub fn new(total: usize) -> Self {
        Self {
            series: Vec::with_capacity(total),
            skipped: Vec::new(),
            processed: 0,
            total,
        }
    }

    pub fn record(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Fetched(series) => self.series.push(series),
            FetchOutcome::Failed(skipped) => self.skipped.push(skipped),
        }
        self.processed += 1;
        info!("processed {} out of {} rows", self.processed, self.total);
    }

    pub fn series(&self) -> &[PriceSeries] {
        &self.series
    }

    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Total price rows across all fetched series.
    pub fn row_count(&self) -> usize {
        self.series.iter().map(PriceSeries::len).sum()
    }

    pub fn into_parts(self) -> (Vec<PriceSeries>, Vec<Skipped>) {
        (self.series, self.skipped)
    }
}

/// Run the price pipeline: load the security list, fetch every code in order, merge the prices
/// with the security metadata and write the result.
///
/// Only an unreadable input, a lookback outside the calendar or an unwritable output fails the
/// run.
pub async fn run<P: PriceProvider>(provider: &P, config: &PipelineConfig) -> anyhow::Result<Report> {
    let time = std::time::Instant::now();

    // 1. load
    let securities = Securities::load(&config.input, &config.key_column).await?;

    // 2. fetch, one code at a time
    let window = Window::lookback(config.today, config.lookback_days).map_err(|err| {
        error!("invalid lookback window, error({err})");
        err
    })?;
    info!(
        "fetching {} securities from {} to {} ...",
        securities.len(),
        window.start,
        window.end
    );
    let progress = Progress::new(securities.len(), config.tui)?;
    let mut accumulator = Accumulator::new(securities.len());
    for code in securities.codes() {
        let outcome = fetch(provider, &code, &config.suffix, window).await;
        match &outcome {
            FetchOutcome::Fetched(_) => progress.success.inc(1),
            FetchOutcome::Failed(_) => progress.fails.inc(1),
        }
        progress.total.inc(1);
        accumulator.record(outcome);
    }
    progress.finish();
    debug!(
        "{} series fetched, {} rows. {}",
        accumulator.series().len(),
        accumulator.row_count(),
        crate::time_elapsed(time)
    );

    // 3. merge
    let (series, skipped) = accumulator.into_parts();
    if series.is_empty() {
        warn!("no prices were fetched; writing header only");
    }
    let merged = merge::left_join(&series, &securities)?;

    // 4. write
    crate::fs::write_table(&config.output, &merged).await?;
    info!("final stock data saved to {}", config.output);
    info!("\n{}", merged.preview(5));

    Ok(Report {
        output: config.output.clone(),
        rows: merged.len(),
        fetched: series.len(),
        skipped,
    })
}
