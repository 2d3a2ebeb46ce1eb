use crate::table::Table;
use std::collections::HashSet;
use tracing::{debug, error, info};

/// Default join key column of the security list.
pub const SECURITY_CODE: &str = "Security Code";

/// The input security list: one row per security, keyed by its code column, with any other
/// metadata columns (name, sector, ...) carried along untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Securities {
    table: Table,
    key: usize,
}

impl Securities {
    /// Read the security list from a `.csv` file at `path`.
    pub async fn load(path: &str, key_column: &str) -> anyhow::Result<Self> {
        info!("loading security list from {path} ...");
        let table = crate::fs::read_table(path).await?;
        Self::from_table(table, key_column)
    }

    /// Wrap an already parsed table, checking the key column exists and has no blank codes.
    pub fn from_table(table: Table, key_column: &str) -> anyhow::Result<Self> {
        let key = table.column(key_column).ok_or_else(|| {
            error!("security list has no \"{key_column}\" column");
            anyhow::anyhow!("security list has no \"{key_column}\" column")
        })?;

        let mut seen = HashSet::new();
        for (i, row) in table.rows().iter().enumerate() {
            let code = row[key].canonical_key();
            if code.is_empty() {
                error!("security list row {} has a blank \"{key_column}\"", i + 1);
                anyhow::bail!("security list row {} has a blank \"{key_column}\"", i + 1);
            }
            if !seen.insert(code.clone()) {
                debug!("security code {code} is listed more than once; it will be fetched again");
            }
        }

        debug!("{} securities loaded", table.len());
        Ok(Self { table, key })
    }

    /// Security codes, in input order, as canonical strings.
    pub fn codes(&self) -> impl Iterator<Item = String> + '_ {
        self.table
            .rows()
            .iter()
            .map(|row| row[self.key].canonical_key())
    }

    pub fn key_column(&self) -> &str {
        &self.table.headers()[self.key]
    }

    pub(crate) fn key_index(&self) -> usize {
        self.key
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::parse_table;

    #[test]
    fn codes_keep_input_order_and_duplicates() {
        let table = parse_table(b"Name,Security Code\nA,101\nB,202\nA again,101\n").unwrap();
        let securities = Securities::from_table(table, SECURITY_CODE).unwrap();
        assert_eq!(securities.key_column(), SECURITY_CODE);
        assert_eq!(
            securities.codes().collect::<Vec<_>>(),
            ["101", "202", "101"]
        );
    }

    #[test]
    fn missing_key_column_is_an_error() {
        let table = parse_table(b"Name,Code\nA,101\n").unwrap();
        assert!(Securities::from_table(table, SECURITY_CODE).is_err());
    }

    #[test]
    fn blank_code_is_an_error() {
        let table = parse_table(b"Security Code,Name\n101,A\n,B\n").unwrap();
        assert!(Securities::from_table(table, SECURITY_CODE).is_err());
    }
}
