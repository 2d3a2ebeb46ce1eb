//! In-memory tables shared by every job: a header row and rows of inferred [`Value`]s.

use std::fmt;

/// A single parsed cell.
///
/// Raw fields are only read as numbers when doing so is lossless, i.e. the number prints back to
/// exactly the same text. `"7"` is an [`Value::Int`], while `"007"`, `"+7"` and `"1.50"` stay
/// [`Value::Text`], so writing a table back out never alters a field.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Infer the type of a raw field.
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return Value::Null;
        }
        if let Ok(int) = raw.parse::<i64>() {
            if int.to_string() == raw {
                return Value::Int(int);
            }
        }
        if let Ok(float) = raw.parse::<f64>() {
            if float.is_finite() && float.to_string() == raw {
                return Value::Float(float);
            }
        }
        Value::Text(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The canonical string form of a value used as a join key.
    ///
    /// Integers and integral floats render without a fractional part and text is trimmed, so
    /// `Int(7)`, `Float(7.0)` and `Text(" 7 ")` all become `"7"`.
    pub fn canonical_key(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(int) => int.to_string(),
            // 2^53: beyond this, not every integer is representable as f64
            Value::Float(float) if float.fract() == 0.0 && float.abs() < 9_007_199_254_740_992.0 => {
                (*float as i64).to_string()
            }
            Value::Float(float) => float.to_string(),
            Value::Text(text) => text.trim().to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(int) => write!(f, "{int}"),
            Value::Float(float) => write!(f, "{float}"),
            Value::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<i64> for Value {
    fn from(int: i64) -> Self {
        Value::Int(int)
    }
}

impl From<f64> for Value {
    fn from(float: f64) -> Self {
        Value::Float(float)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

/// A rectangular table: every row has exactly one value per header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row, rejecting rows whose width differs from the header row.
    pub fn push_row(&mut self, row: Vec<Value>) -> anyhow::Result<()> {
        if row.len() != self.headers.len() {
            anyhow::bail!(
                "row {} has {} fields, expected {}",
                self.rows.len() + 1,
                row.len(),
                self.headers.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the column named `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Render the header plus the first `n` rows as aligned text, for log lines.
    pub fn preview(&self, n: usize) -> String {
        let shown = &self.rows[..n.min(self.rows.len())];
        let cells: Vec<Vec<String>> = shown
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();

        let widths: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .fold(header.chars().count(), usize::max)
            })
            .collect();

        let mut out = aligned(self.headers.iter(), &widths);
        for row in &cells {
            out.push('\n');
            out.push_str(&aligned(row.iter(), &widths));
        }
        if self.rows.len() > shown.len() {
            out.push_str(&format!("\n[{} more rows]", self.rows.len() - shown.len()));
        }
        out
    }
}

fn aligned<'a>(fields: impl Iterator<Item = &'a String>, widths: &[usize]) -> String {
    fields
        .zip(widths)
        .map(|(field, &width)| format!("{field:>width$}"))
        .collect::<Vec<_>>()
        .join("  ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_only_lossless_numbers() {
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer("500325"), Value::Int(500325));
        assert_eq!(Value::infer("-3"), Value::Int(-3));
        assert_eq!(Value::infer("2.5"), Value::Float(2.5));
        assert_eq!(Value::infer("007"), Value::Text("007".into()));
        assert_eq!(Value::infer("+7"), Value::Text("+7".into()));
        assert_eq!(Value::infer("1.50"), Value::Text("1.50".into()));
        assert_eq!(Value::infer("NaN"), Value::Text("NaN".into()));
        assert_eq!(Value::infer("Reliance"), Value::Text("Reliance".into()));
    }

    #[test]
    fn canonical_keys_match_across_types() {
        assert_eq!(Value::Int(7).canonical_key(), "7");
        assert_eq!(Value::Float(7.0).canonical_key(), "7");
        assert_eq!(Value::Text(" 7 ".into()).canonical_key(), "7");
        assert_eq!(Value::Float(7.25).canonical_key(), "7.25");
        assert_eq!(Value::Null.canonical_key(), "");
    }

    #[test]
    fn rejects_ragged_rows() {
        let mut table = Table::new(vec!["A".into(), "B".into()]);
        assert!(table.push_row(vec![Value::Int(1), Value::Int(2)]).is_ok());
        assert!(table.push_row(vec![Value::Int(1)]).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn preview_aligns_and_truncates() {
        let mut table = Table::new(vec!["Code".into(), "Name".into()]);
        for (code, name) in [(1, "a"), (22, "bb"), (333, "ccc")] {
            table
                .push_row(vec![Value::Int(code), Value::from(name)])
                .unwrap();
        }

        let preview = table.preview(2);
        let lines: Vec<&str> = preview.lines().collect();
        assert_eq!(lines[0], "Code  Name");
        assert_eq!(lines[1], "   1     a");
        assert_eq!(lines[2], "  22    bb");
        assert_eq!(lines[3], "[1 more rows]");
    }
}
