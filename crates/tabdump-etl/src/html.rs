use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, info, trace};

/// The text content of an HTML table: a header row and body rows, every cell trimmed.
///
/// Rows are not required to match the header width.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HtmlTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl HtmlTable {
    /// Serialize as csv, header row first. An empty header is written as a blank line.
    pub fn to_csv(&self) -> anyhow::Result<Vec<u8>> {
        // the csv writer quotes an empty record as `""`
        let out = if self.headers.is_empty() {
            b"\n".to_vec()
        } else {
            Vec::new()
        };
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);
        if !self.headers.is_empty() {
            writer.write_record(&self.headers)?;
        }
        for row in &self.rows {
            writer.write_record(row)?;
        }
        Ok(writer.into_inner()?)
    }
}

fn selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow::anyhow!("invalid selector {css}: {err}"))
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Extract the first `<table>` of an HTML document.
///
/// The header comes from the `<th>` cells of the table's first `<tr>`; the body from the `<td>`
/// cells of every later `<tr>`. Rows without any `<td>` (extra header rows, spacers) are
/// dropped. A first row without `<th>` cells gives an empty header, not an error.
pub fn parse_table(html: &str) -> anyhow::Result<HtmlTable> {
    let document = Html::parse_document(html);
    let (table_sel, tr_sel, th_sel, td_sel) =
        (selector("table")?, selector("tr")?, selector("th")?, selector("td")?);

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| anyhow::anyhow!("no <table> found in document"))?;

    let mut rows = table.select(&tr_sel);
    let headers: Vec<String> = match rows.next() {
        Some(tr) => tr.select(&th_sel).map(cell_text).collect(),
        None => Vec::new(),
    };
    if headers.is_empty() {
        debug!("first table row has no <th> cells; header row is empty");
    }

    let rows: Vec<Vec<String>> = rows
        .map(|tr| tr.select(&td_sel).map(cell_text).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .collect();
    trace!("{} header cells, {} body rows parsed", headers.len(), rows.len());

    Ok(HtmlTable { headers, rows })
}

/// Reads the HTML file at `html_path` and writes its first table to `csv_path`.
pub async fn html_to_csv(html_path: &str, csv_path: &str) -> anyhow::Result<HtmlTable> {
    trace!("reading file path: {html_path}");
    let html = tokio::fs::read_to_string(html_path).await.map_err(|err| {
        error!("failed to read {html_path}, error({err})");
        err
    })?;

    let table = parse_table(&html).map_err(|err| {
        error!("failed to parse {html_path}, error({err})");
        err
    })?;

    tokio::fs::write(csv_path, table.to_csv()?)
        .await
        .map_err(|err| {
            error!("failed to write {csv_path}, error({err})");
            err
        })?;

    info!("data successfully written to {csv_path}");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPANIES: &str = r#"
        <html><body>
          <h1>Companies</h1>
          <table id="companies">
            <tr><th> Name </th><th>Code</th></tr>
            <tr><td>Reliance Industries</td><td> 500325 </td></tr>
            <tr><td><a href="/tcs">Tata <b>Consultancy</b></a></td><td>532540</td></tr>
          </table>
          <table><tr><th>Ignored</th></tr><tr><td>x</td></tr></table>
        </body></html>
    "#;

    #[test]
    fn reads_only_the_first_table() {
        let table = parse_table(COMPANIES).unwrap();
        assert_eq!(table.headers, ["Name", "Code"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["Reliance Industries".to_string(), "500325".to_string()],
                vec!["Tata Consultancy".to_string(), "532540".to_string()],
            ]
        );
    }

    #[test]
    fn csv_has_header_plus_body_lines() {
        let csv = String::from_utf8(parse_table(COMPANIES).unwrap().to_csv().unwrap()).unwrap();
        assert_eq!(
            csv.lines().collect::<Vec<_>>(),
            [
                "Name,Code",
                "Reliance Industries,500325",
                "Tata Consultancy,532540"
            ]
        );
    }

    #[test]
    fn rows_in_tbody_are_found() {
        let html = "<table><thead><tr><th>A</th></tr></thead>\
                    <tbody><tr><td>1</td></tr><tr></tr></tbody></table>";
        let table = parse_table(html).unwrap();
        assert_eq!(table.headers, ["A"]);
        assert_eq!(table.rows, vec![vec!["1".to_string()]]);
    }

    #[test]
    fn header_without_th_is_empty() {
        let table = parse_table("<table><tr><td>1</td></tr><tr><td>2</td></tr></table>").unwrap();
        assert!(table.headers.is_empty());
        assert_eq!(table.rows, vec![vec!["2".to_string()]]);

        let csv = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert_eq!(csv, "\n2\n");
    }

    #[test]
    fn document_without_table_is_an_error() {
        assert!(parse_table("<p>nothing here</p>").is_err());
    }

    #[tokio::test]
    async fn converts_file_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let html_path = dir.path().join("company_list.html");
        let csv_path = dir.path().join("company_list.csv");
        std::fs::write(&html_path, COMPANIES).unwrap();

        html_to_csv(html_path.to_str().unwrap(), csv_path.to_str().unwrap())
            .await
            .unwrap();

        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.starts_with("Name,Code\n"));
    }
}
