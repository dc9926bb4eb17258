// Record input parsing
//
// Accepts a JSON array of records, a single JSON object, or newline-delimited
// JSON (one record per line, blank lines skipped).

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Supported input layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// A JSON array of records
    Json,
    /// A single JSON object
    Object,
    /// Newline-delimited JSON
    Jsonl,
}

/// Parse records from text, detecting the layout.
pub fn parse_records(content: &str) -> Result<(InputFormat, Vec<Value>)> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        bail!("input contains no records");
    }

    // A whole-document parse wins; JSONL with more than one line never parses as one value
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return match value {
            Value::Array(records) => Ok((InputFormat::Json, records)),
            Value::Object(_) => Ok((InputFormat::Object, vec![value])),
            other => bail!(
                "expected a JSON array or object, got {}",
                if other.is_string() { "a string" } else { "a scalar" }
            ),
        };
    }

    let mut records = Vec::new();
    for (index, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(line)
            .with_context(|| format!("invalid JSON on line {}", index + 1))?;
        records.push(record);
    }
    Ok((InputFormat::Jsonl, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_array_object_and_lines() {
        let (format, records) = parse_records(r#"[{"a":1},{"a":2}]"#).unwrap();
        assert_eq!(format, InputFormat::Json);
        assert_eq!(records.len(), 2);

        let (format, records) = parse_records(r#"  {"a":1}  "#).unwrap();
        assert_eq!(format, InputFormat::Object);
        assert_eq!(records.len(), 1);

        let (format, records) = parse_records("{\"a\":1}\n\n{\"a\":2}\n{\"a\":3}\n").unwrap();
        assert_eq!(format, InputFormat::Jsonl);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn reports_the_bad_line() {
        let err = parse_records("{\"a\":1}\n{oops}\n").unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn rejects_empty_and_scalar_input() {
        assert!(parse_records("   ").is_err());
        assert!(parse_records("42").is_err());
    }
}
