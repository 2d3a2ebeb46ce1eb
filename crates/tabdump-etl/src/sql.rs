use crate::http::*;
use crate::table::{Table, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{self as pg, NoTls, Statement, Transaction};
use tracing::{debug, error, info, trace};

/// A destination for parameterized statements, applied as one unit on [`commit`].
///
/// [`commit`]: RelationalSink::commit
#[allow(async_fn_in_trait)]
pub trait RelationalSink: Sized {
    /// Execute `statement` with `params` bound to `$1, $2, ...`; returns the rows affected.
    async fn execute(&mut self, statement: &str, params: &[Value]) -> anyhow::Result<u64>;

    async fn commit(self) -> anyhow::Result<()>;
}

// postgres
// ----------------------------------------------------------------------------

/// Connect to PostgreSQL; the connection is driven on a background task.
pub async fn connect(url: &str) -> anyhow::Result<PgClient> {
    trace!("connecting to database ...");
    let (pg_client, pg_conn) = pg::connect(url, NoTls).await.map_err(|err| {
        error!("database connection error: {}", err);
        err
    })?;

    tokio::spawn(async move {
        if let Err(err) = pg_conn.await {
            error!("database connection error: {}", err);
        }
    });
    debug!("database connection established");

    Ok(pg_client)
}

/// [`RelationalSink`] over a PostgreSQL transaction.
///
/// Statements are prepared once and cached; every [`Value`] is converted to the parameter type
/// the server inferred for its placeholder.
pub struct PgSink<'a> {
    transaction: Transaction<'a>,
    statements: HashMap<String, Statement>,
}

impl<'a> PgSink<'a> {
    pub async fn begin(pg_client: &'a mut PgClient) -> anyhow::Result<Self> {
        let transaction = pg_client.transaction().await?;
        Ok(Self {
            transaction,
            statements: HashMap::new(),
        })
    }

    async fn prepare(&mut self, statement: &str) -> anyhow::Result<Statement> {
        if let Some(prepared) = self.statements.get(statement) {
            return Ok(prepared.clone());
        }
        let prepared = self.transaction.prepare(statement).await.map_err(|err| {
            error!("failed to prepare statement \"{statement}\", error({err})");
            err
        })?;
        self.statements
            .insert(statement.to_string(), prepared.clone());
        Ok(prepared)
    }
}

impl RelationalSink for PgSink<'_> {
    async fn execute(&mut self, statement: &str, params: &[Value]) -> anyhow::Result<u64> {
        let prepared = self.prepare(statement).await?;
        if prepared.params().len() != params.len() {
            anyhow::bail!(
                "statement takes {} parameters, {} given",
                prepared.params().len(),
                params.len()
            );
        }

        let boxed = prepared
            .params()
            .iter()
            .zip(params)
            .map(|(ty, value)| to_sql(value, ty))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(|param| param.as_ref()).collect();

        Ok(self.transaction.execute(&prepared, &refs).await?)
    }

    async fn commit(self) -> anyhow::Result<()> {
        self.transaction.commit().await.map_err(|err| {
            error!("failed to commit transaction, error({err})");
            err
        })?;
        Ok(())
    }
}

/// Convert `value` into a parameter of postgres type `ty`.
///
/// Values are parsed from their text form, so `Int(5)` binds to a `FLOAT8`, `Text("5")` to an
/// `INT4` and `Float(2610.5)` to a `NUMERIC`. Types without a mapping here bind as text and are rejected by the driver if it can't.
fn to_sql(value: &Value, ty: &Type) -> anyhow::Result<Box<dyn ToSql + Sync>> {
    if *ty == Type::BOOL {
        return Ok(Box::new(match value {
            Value::Null => None,
            value => Some(parse_bool(&value.to_string())?),
        }));
    }
    if *ty == Type::INT2 {
        return typed::<i16>(value);
    }
    if *ty == Type::INT4 {
        return typed::<i32>(value);
    }
    if *ty == Type::INT8 {
        return typed::<i64>(value);
    }
    if *ty == Type::FLOAT4 {
        return typed::<f32>(value);
    }
    if *ty == Type::FLOAT8 {
        return typed::<f64>(value);
    }
    // prices usually live in NUMERIC columns, which only accept a decimal on the wire
    if *ty == Type::NUMERIC {
        return typed::<Decimal>(value);
    }
    if *ty == Type::DATE {
        return typed::<NaiveDate>(value);
    }
    if *ty == Type::TIMESTAMP {
        return Ok(Box::new(match value {
            Value::Null => None,
            value => Some(parse_timestamp(&value.to_string())?),
        }));
    }
    if *ty == Type::TIMESTAMPTZ {
        return typed::<DateTime<Utc>>(value);
    }

    Ok(Box::new(match value {
        Value::Null => None,
        value => Some(value.to_string()),
    }))
}

fn typed<T>(value: &Value) -> anyhow::Result<Box<dyn ToSql + Sync>>
where
    T: FromStr + ToSql + Sync + 'static,
    T::Err: Display,
{
    match value {
        Value::Null => Ok(Box::new(None::<T>)),
        value => {
            let text = value.to_string();
            let parsed = text
                .trim()
                .parse::<T>()
                .map_err(|err| anyhow::anyhow!("cannot convert \"{text}\": {err}"))?;
            Ok(Box::new(Some(parsed)))
        }
    }
}

fn parse_bool(text: &str) -> anyhow::Result<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => anyhow::bail!("cannot convert \"{text}\" to a boolean"),
    }
}

fn parse_timestamp(text: &str) -> anyhow::Result<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| anyhow::anyhow!("cannot convert \"{text}\" to a timestamp"))
}

// statements
// ----------------------------------------------------------------------------

fn quote_part(name: &str) -> anyhow::Result<String> {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => anyhow::bail!("empty SQL identifier"),
    };
    if plain {
        return Ok(name.to_string());
    }
    if name.contains(['"', ';']) || name.chars().any(char::is_control) {
        anyhow::bail!("invalid SQL identifier \"{name}\"");
    }
    Ok(format!("\"{name}\""))
}

/// A column name as it appears in a statement: plain names as-is, others double-quoted.
pub fn column_name(name: &str) -> anyhow::Result<String> {
    quote_part(name.trim())
}

/// A table name, optionally schema-qualified (`schema.table`).
pub fn table_name(name: &str) -> anyhow::Result<String> {
    let parts: Vec<&str> = name.trim().split('.').collect();
    if parts.len() > 2 {
        anyhow::bail!("invalid table name \"{name}\"");
    }
    Ok(parts
        .into_iter()
        .map(quote_part)
        .collect::<anyhow::Result<Vec<_>>>()?
        .join("."))
}

/// `INSERT INTO {table} ({columns}) VALUES ($1, ...)`
pub fn insert_statement<S: AsRef<str>>(table: &str, columns: &[S]) -> anyhow::Result<String> {
    if columns.is_empty() {
        anyhow::bail!("no columns to insert into {table}");
    }
    let names = columns
        .iter()
        .map(|column| column_name(column.as_ref()))
        .collect::<anyhow::Result<Vec<_>>>()?
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "INSERT INTO {} ({names}) VALUES ({placeholders})",
        table_name(table)?
    ))
}

// jobs
// ----------------------------------------------------------------------------

/// Insert every row of `data` into `table`, in order, then commit once.
pub async fn load_table<S: RelationalSink>(
    mut sink: S,
    table: &str,
    data: &Table,
) -> anyhow::Result<usize> {
    let time = std::time::Instant::now();
    let statement = insert_statement(table, data.headers())?;
    trace!("insert statement: {statement}");

    for (i, row) in data.rows().iter().enumerate() {
        sink.execute(&statement, row).await.map_err(|err| {
            error!("failed to insert row {} into {table}, error({err})", i + 1);
            err
        })?;
    }
    sink.commit().await?;

    debug!(
        "{} rows inserted into {table}. {}",
        data.len(),
        crate::time_elapsed(time)
    );
    Ok(data.len())
}

/// Insert the rows of the `.csv` file at `csv_path` into `table`.
pub async fn load_csv<S: RelationalSink>(
    sink: S,
    csv_path: &str,
    table: &str,
) -> anyhow::Result<usize> {
    let data = crate::fs::read_table(csv_path).await?;
    let rows = load_table(sink, table, &data).await?;
    info!("{rows} rows from {csv_path} inserted into {table}");
    Ok(rows)
}

/// `DROP TABLE IF EXISTS {table}`, committed.
pub async fn drop_table<S: RelationalSink>(mut sink: S, table: &str) -> anyhow::Result<()> {
    let statement = format!("DROP TABLE IF EXISTS {}", table_name(table)?);
    sink.execute(&statement, &[]).await.map_err(|err| {
        error!("failed to drop {table}, error({err})");
        err
    })?;
    sink.commit().await?;
    info!("{table} dropped");
    Ok(())
}

/// One JSON object, flattened to column names and values.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl From<serde_json::Map<String, serde_json::Value>> for Record {
    fn from(object: serde_json::Map<String, serde_json::Value>) -> Self {
        let (columns, values) = object
            .into_iter()
            .map(|(column, value)| (column, json_value(value)))
            .unzip();
        Self { columns, values }
    }
}

fn json_value(value: serde_json::Value) -> Value {
    use serde_json::Value as Json;
    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Text(b.to_string()),
        Json::Number(n) => match n.as_i64() {
            Some(int) => Value::Int(int),
            None => n.as_f64().map_or(Value::Text(n.to_string()), Value::Float),
        },
        Json::String(s) => Value::Text(s),
        nested => Value::Text(nested.to_string()),
    }
}

/// GET `endpoint`, expecting a JSON array of flat objects.
pub async fn fetch_records(http_client: &HttpClient, endpoint: &str) -> anyhow::Result<Vec<Record>> {
    trace!("fetching records from {endpoint}");
    let objects: Vec<serde_json::Map<String, serde_json::Value>> = http_client
        .get(endpoint)
        .send()
        .await
        .map_err(|err| {
            error!("failed to fetch {endpoint}, error({err})");
            err
        })?
        .error_for_status()?
        .json()
        .await
        .map_err(|err| {
            error!("failed to parse JSON from {endpoint}, error({err})");
            err
        })?;
    debug!("{} records fetched from {endpoint}", objects.len());
    Ok(objects.into_iter().map(Record::from).collect())
}

/// Insert each record into `table` (its keys as the columns), then commit once.
pub async fn load_records<S: RelationalSink>(
    mut sink: S,
    table: &str,
    records: &[Record],
) -> anyhow::Result<usize> {
    for record in records {
        let statement = insert_statement(table, &record.columns)?;
        sink.execute(&statement, &record.values).await?;
    }
    sink.commit().await?;
    Ok(records.len())
}

/// Fetch a JSON array from `endpoint` and insert it into `table`.
pub async fn load_json<S: RelationalSink>(
    sink: S,
    http_client: &HttpClient,
    endpoint: &str,
    table: &str,
) -> anyhow::Result<usize> {
    let records = fetch_records(http_client, endpoint).await?;
    let rows = load_records(sink, table, &records).await?;
    info!("{rows} records from {endpoint} inserted into {table}");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_insert_statements() {
        assert_eq!(
            insert_statement("T", &["A", "B"]).unwrap(),
            "INSERT INTO T (A, B) VALUES ($1, $2)"
        );
        assert_eq!(
            insert_statement("market.prices", &["Security Code", "close"]).unwrap(),
            "INSERT INTO market.prices (\"Security Code\", close) VALUES ($1, $2)"
        );
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        assert!(table_name("t; DROP TABLE x").is_err());
        assert!(table_name("a.b.c").is_err());
        assert!(table_name("").is_err());
        assert!(column_name("a\"b").is_err());
        assert!(insert_statement::<&str>("t", &[]).is_err());
    }

    #[test]
    fn parses_loose_booleans_and_timestamps() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());

        let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-01-02 09:15:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-02T09:15:00").unwrap(), expected);
        assert!(parse_timestamp("02/01/2024").is_err());
    }

    #[test]
    fn values_convert_to_the_inferred_type() {
        assert!(to_sql(&Value::Text("42".into()), &Type::INT4).is_ok());
        assert!(to_sql(&Value::Int(5), &Type::FLOAT8).is_ok());
        assert!(to_sql(&Value::Null, &Type::DATE).is_ok());
        assert!(to_sql(&Value::Text("2024-01-02".into()), &Type::DATE).is_ok());
        assert!(to_sql(&Value::Text("abc".into()), &Type::INT8).is_err());
    }

    // building the box is not enough: the driver must accept it for the column type
    fn accepted(value: Value, ty: Type) -> bool {
        let param = to_sql(&value, &ty).unwrap();
        let mut buf = bytes::BytesMut::new();
        param.to_sql_checked(&ty, &mut buf).is_ok()
    }

    #[test]
    fn driver_accepts_converted_values() {
        assert!(accepted(Value::Float(2610.5), Type::NUMERIC));
        assert!(accepted(Value::Int(120000), Type::NUMERIC));
        assert!(accepted(Value::Text("99.95".into()), Type::NUMERIC));
        assert!(accepted(Value::Null, Type::NUMERIC));
        assert!(accepted(Value::Int(7), Type::INT4));
        assert!(accepted(Value::Float(2.5), Type::FLOAT8));
        assert!(accepted(Value::Text("2024-01-02".into()), Type::DATE));
        assert!(accepted(Value::Text("RELIANCE".into()), Type::TEXT));
        assert!(accepted(Value::Text("RELIANCE".into()), Type::VARCHAR));
        assert!(to_sql(&Value::Text("n/a".into()), &Type::NUMERIC).is_err());
    }

    #[test]
    fn json_objects_flatten_to_records() {
        let object = serde_json::json!({"id": 1, "price": 2.5, "name": "x", "tags": [1], "gone": null});
        let record = match object {
            serde_json::Value::Object(map) => Record::from(map),
            _ => unreachable!(),
        };
        let value_of = |column: &str| {
            let i = record.columns.iter().position(|c| c == column).unwrap();
            record.values[i].clone()
        };
        assert_eq!(value_of("id"), Value::Int(1));
        assert_eq!(value_of("price"), Value::Float(2.5));
        assert_eq!(value_of("name"), Value::Text("x".into()));
        assert_eq!(value_of("tags"), Value::Text("[1]".into()));
        assert_eq!(value_of("gone"), Value::Null);
    }
}
