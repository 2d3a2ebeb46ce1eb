use super::prices::{PriceSeries, PRICE_COLUMNS};
use super::securities::Securities;
use crate::table::{Table, Value};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Concatenate `series` in order and left join the result onto the security metadata.
///
/// Keys on both sides are compared in their canonical string form (see
/// [`Value::canonical_key`]), so a code read as the number `7` still matches the text `"7"`.
///
/// Output columns are the price columns, then the key column, then the remaining metadata
/// columns in input order. A metadata column named like a price column is kept on both sides,
/// suffixed `_x` (price) and `_y` (metadata). Every price row is kept: a code listed `n` times in
/// the metadata yields `n` output rows per price, and an unknown code yields one row with null
/// metadata.
pub fn left_join(series: &[PriceSeries], securities: &Securities) -> anyhow::Result<Table> {
    let time = std::time::Instant::now();
    let key = securities.key_index();
    let key_column = securities.key_column();
    let metadata = securities.table();

    if PRICE_COLUMNS.contains(&key_column) {
        anyhow::bail!("key column \"{key_column}\" clashes with a price column");
    }

    let meta_columns: Vec<usize> = (0..metadata.headers().len())
        .filter(|&i| i != key)
        .collect();
    let clashes = |name: &str| {
        meta_columns
            .iter()
            .any(|&i| metadata.headers()[i] == name)
    };

    let mut headers: Vec<String> = PRICE_COLUMNS
        .iter()
        .map(|&c| {
            if clashes(c) {
                format!("{c}_x")
            } else {
                c.to_string()
            }
        })
        .collect();
    headers.push(key_column.to_string());
    headers.extend(meta_columns.iter().map(|&i| {
        let name = &metadata.headers()[i];
        if PRICE_COLUMNS.contains(&name.as_str()) {
            format!("{name}_y")
        } else {
            name.clone()
        }
    }));

    // canonical key -> metadata rows, in input order
    let mut index: HashMap<String, Vec<&[Value]>> = HashMap::new();
    for row in metadata.rows() {
        index.entry(row[key].canonical_key()).or_default().push(row);
    }

    let width = headers.len();
    let mut merged = Table::new(headers);
    let nulls = vec![Value::Null; meta_columns.len()];

    for s in series {
        let code = Value::Text(s.code().to_string());
        let matches: Vec<Vec<Value>> = match index.get(&code.canonical_key()) {
            Some(rows) => rows.iter().map(|row| pick(row, &meta_columns)).collect(),
            None => {
                debug!("no metadata for security code {}; metadata left null", s.code());
                vec![nulls.clone()]
            }
        };

        for price in s.prices() {
            for meta in &matches {
                let mut row = price.to_row();
                row.reserve(width - row.len());
                row.push(code.clone());
                row.extend(meta.iter().cloned());
                merged.push_row(row)?;
            }
        }
        trace!("{} prices merged for {}", s.len(), s.code());
    }

    debug!(
        "{} rows merged from {} series. {}",
        merged.len(),
        series.len(),
        crate::time_elapsed(time)
    );
    Ok(merged)
}

fn pick(row: &[Value], columns: &[usize]) -> Vec<Value> {
    columns.iter().map(|&i| row[i].clone()).collect()
}
