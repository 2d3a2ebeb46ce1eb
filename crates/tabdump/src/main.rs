mod cli;
mod jobs;

// remote imports
use clap::Parser;
use cli::{Cli, TraceLevel};
use tracing::{subscriber, trace, Level};
use tracing_subscriber::FmtSubscriber;

////////////////////////////////////////////////////////////////////////////

// preproccess the trace level
fn preprocess(trace_level: Level) -> anyhow::Result<()> {
    let my_subscriber = FmtSubscriber::builder()
        .with_max_level(trace_level)
        .finish();
    subscriber::set_global_default(my_subscriber)?;
    Ok(())
}

////////////////////////////////////////////////////////////////////////////

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // set the trace level
    if let Some(trace_level) = cli.trace {
        preprocess(match trace_level {
            TraceLevel::DEBUG => Level::DEBUG,
            TraceLevel::ERROR => Level::ERROR,
            TraceLevel::INFO => Level::INFO,
            TraceLevel::TRACE => Level::TRACE,
            TraceLevel::WARN => Level::WARN,
        })?;
    }
    trace!("command line input recorded: {cli:?}");

    // if no trace level provided, use tui
    let tui = cli.trace.is_none();

    // read cli inputs
    use cli::Commands::*;
    match cli.command {
        // `tabdump prices`: fetch, merge & write stock prices
        Prices {
            input,
            output,
            key,
            suffix,
            lookback,
            today,
        } => {
            let mut config = tabdump_etl::stock::pipeline::PipelineConfig {
                input,
                output,
                key_column: key,
                suffix,
                lookback_days: lookback,
                tui,
                ..Default::default()
            };
            if let Some(today) = today {
                config.today = today;
            }
            jobs::prices(config).await?;
        }

        // `tabdump html`: first html table to csv
        Html { input, output } => jobs::html(&input, &output, tui).await?,

        // `tabdump sql <load|drop|api>`
        Sql { action, db_url } => jobs::sql(action, db_url, tui).await?,
    }

    Ok(())
}
