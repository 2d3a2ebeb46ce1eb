use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing.
    ///
    /// Without it, progress is drawn in the terminal instead.
    #[arg(short, long, global = true)]
    pub trace: Option<TraceLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download 10 years of daily prices per security code and merge them with the security list.
    Prices {
        /// Security list (.csv, header row required).
        #[arg(short, long, default_value = "names.csv")]
        input: String,

        /// Merged output (.csv).
        #[arg(short, long, default_value = "data.csv")]
        output: String,

        /// Column holding the security codes.
        #[arg(short, long, default_value = "Security Code")]
        key: String,

        /// Exchange suffix appended to each code.
        #[arg(short, long, default_value = ".BO")]
        suffix: String,

        /// Days of history to request, ending today (at most 100 years).
        #[arg(short, long, default_value_t = 3650, value_parser = clap::value_parser!(u64).range(1..=36500))]
        lookback: u64,

        /// End of the lookback window (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        today: Option<chrono::NaiveDate>,
    },

    /// Convert the first table of an HTML file to CSV.
    Html {
        #[arg(short, long, default_value = "company_list.html")]
        input: String,

        #[arg(short, long, default_value = "company_list.csv")]
        output: String,
    },

    /// Load rows into, or drop, a PostgreSQL table.
    Sql {
        #[command(subcommand)]
        action: SqlAction,

        /// Connection string; falls back to the TABDUMP_DB_URL environment variable.
        #[arg(long, global = true)]
        db_url: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SqlAction {
    /// Insert every row of a CSV file into a table, then commit.
    Load {
        #[arg(short, long)]
        csv: String,

        #[arg(short = 'T', long)]
        table: String,
    },

    /// Drop a table, if it exists.
    Drop {
        #[arg(short = 'T', long)]
        table: String,
    },

    /// Insert the JSON array returned by an HTTP endpoint into a table.
    Api {
        #[arg(short, long)]
        endpoint: String,

        #[arg(short = 'T', long)]
        table: String,
    },
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
#[clap(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    DEBUG,
    ERROR,
    INFO,
    TRACE,
    WARN,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookback(args: &[&str]) -> Result<u64, clap::Error> {
        let cli = Cli::try_parse_from(["tabdump", "prices"].iter().chain(args))?;
        match cli.command {
            Commands::Prices { lookback, .. } => Ok(lookback),
            other => panic!("expected prices, got {other:?}"),
        }
    }

    #[test]
    fn lookback_is_bounded() {
        assert_eq!(lookback(&[]).unwrap(), 3650);
        assert_eq!(lookback(&["--lookback", "36500"]).unwrap(), 36500);
        assert!(lookback(&["--lookback", "1000000000"]).is_err());
        assert!(lookback(&["--lookback", "0"]).is_err());
        assert!(lookback(&["--lookback", "-5"]).is_err());
    }
}
