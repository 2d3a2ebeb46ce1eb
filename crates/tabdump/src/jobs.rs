use crate::cli::SqlAction;
use colored::Colorize;
use dotenv::var;
use tabdump_etl::sql::{self, PgSink};
use tabdump_etl::stock::pipeline::{self, PipelineConfig};
use tabdump_etl::stock::yahoo_finance::YahooFinance;
use tracing::{info, warn};

/// Fetch, merge & write stock prices for every security code in the input list.
pub(crate) async fn prices(config: PipelineConfig) -> anyhow::Result<()> {
    let time = std::time::Instant::now();
    let tui = config.tui;

    let http_client = tabdump_etl::std_client_build()?;
    let yahoo = match var("YAHOO_BASE_URL") {
        Ok(base_url) => YahooFinance::with_base_url(http_client, base_url),
        Err(_) => YahooFinance::new(http_client),
    };

    let report = pipeline::run(&yahoo, &config).await?;

    for skipped in &report.skipped {
        warn!("skipped security code {}: {}", skipped.code, skipped.reason);
    }
    info!(
        "{} rows from {} securities written to {}, time elapsed: {:?}",
        report.rows,
        report.fetched,
        report.output,
        time.elapsed()
    );

    if tui {
        println!(
            "{} rows from {} securities written to {}",
            report.rows.to_string().green(),
            report.fetched.to_string().green(),
            report.output
        );
        if !report.skipped.is_empty() {
            println!("{}", "skipped:".red());
            for skipped in &report.skipped {
                println!("  {} ({})", skipped.code.red(), skipped.reason);
            }
        }
    }

    Ok(())
}

/// Convert the first table of an HTML file to CSV.
pub(crate) async fn html(input: &str, output: &str, tui: bool) -> anyhow::Result<()> {
    let table = tabdump_etl::html::html_to_csv(input, output).await?;

    if tui {
        println!(
            "Data successfully written to {output} ({} rows)",
            table.rows.len()
        );
    }

    Ok(())
}

/// Load into, or drop, a table of the database at `db_url` (or `TABDUMP_DB_URL`).
pub(crate) async fn sql(action: SqlAction, db_url: Option<String>, tui: bool) -> anyhow::Result<()> {
    let db_url = match db_url {
        Some(url) => url,
        None => var("TABDUMP_DB_URL").map_err(|err| {
            anyhow::anyhow!("no --db-url given and TABDUMP_DB_URL is unset ({err})")
        })?,
    };
    let mut pg_client = sql::connect(&db_url).await?;
    let sink = PgSink::begin(&mut pg_client).await?;

    let done = match action {
        SqlAction::Load { csv, table } => {
            let rows = sql::load_csv(sink, &csv, &table).await?;
            format!("{rows} rows inserted into {table}")
        }
        SqlAction::Drop { table } => {
            sql::drop_table(sink, &table).await?;
            format!("{table} dropped")
        }
        SqlAction::Api { endpoint, table } => {
            let http_client = tabdump_etl::std_client_build()?;
            let rows = sql::load_json(sink, &http_client, &endpoint, &table).await?;
            format!("{rows} records inserted into {table}")
        }
    };

    if tui {
        println!("{}", done.green());
    }

    Ok(())
}
