/// CSV reading & writing of [`table::Table`]s.
pub mod fs;

/// First-table HTML scraping; the tabular source behind `tabdump html`.
pub mod html;

/// Row-by-row loading of tables into PostgreSQL.
pub mod sql;

/// Historical stock prices, fetched per security code and merged with the security metadata.
pub mod stock;

pub mod table;

pub(crate) mod tui;

/// Shortcut for required API elements.
pub mod http {
    pub use dotenv::var;
    pub use reqwest::Client as HttpClient;
    pub use tokio_postgres::Client as PgClient;
}

/// Standard HTTP client; the user agent is read from `USER_AGENT`, when set.
pub fn std_client_build() -> anyhow::Result<http::HttpClient> {
    let user_agent = http::var("USER_AGENT").unwrap_or_else(|_| {
        format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    });
    let client = reqwest::ClientBuilder::new()
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

/// Formats the time elapsed since `time`, for debug lines.
pub(crate) fn time_elapsed(time: std::time::Instant) -> String {
    format!("time elapsed: {:?}", time.elapsed())
}
