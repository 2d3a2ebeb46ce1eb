use crate::table::{Table, Value};
use tracing::{debug, error, trace};

/// Reads a `.csv` file from `path` into a [`Table`].
///
/// The first record is the header row; every field of the following records is run through
/// [`Value::infer`]. Records whose width differs from the header are an error.
pub async fn read_table(path: &str) -> anyhow::Result<Table> {
    trace!("reading file path: {path}");
    let file = tokio::fs::read(path).await.map_err(|err| {
        error!("failed to read {path}, error({err})");
        err
    })?;
    trace!("file read; parsing csv records ...");
    parse_table(&file).map_err(|err| {
        error!("failed to parse {path}, error({err})");
        err
    })
}

/// Parse csv bytes (header row first) into a [`Table`].
pub fn parse_table(bytes: &[u8]) -> anyhow::Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();
    let mut table = Table::new(headers);

    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(Value::infer).collect())?;
    }

    Ok(table)
}

/// Writes `table` to `path` as csv, header row first; [`Value::Null`] is an empty field.
///
/// Parent directories are created as necessary. The file is written in one go, but not
/// atomically: a failure part way leaves a partial (or no) file behind.
pub async fn write_table(path: &str, table: &Table) -> anyhow::Result<()> {
    let time = std::time::Instant::now();

    // ensure the directory exists
    trace!("checking directory path: {:?}", path);
    if let Some(dir_path) = std::path::Path::new(path).parent() {
        if !dir_path.as_os_str().is_empty() {
            tokio::fs::create_dir_all(dir_path).await?;
        }
    }

    let bytes = to_csv(table)?;
    tokio::fs::write(path, bytes).await.map_err(|err| {
        error!("failed to write {path}, error({err})");
        err
    })?;

    debug!(
        "{} rows written to {path}. {}",
        table.len(),
        crate::time_elapsed(time)
    );

    Ok(())
}

/// Serialize `table` to csv bytes.
pub fn to_csv(table: &Table) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.headers())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(ToString::to_string))?;
    }
    Ok(writer.into_inner()?)
}
