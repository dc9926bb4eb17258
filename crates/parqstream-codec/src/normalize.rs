// Convert schema-free JSON records into an Arrow RecordBatch
//
// Nested objects are flattened into dotted column names, each column gets the
// narrowest type that fits every non-null value in the batch, and the
// partition metadata columns are appended to every row.

use arrow::array::{
    ArrayRef, BooleanBuilder, Date32Array, Float64Builder, Int64Builder, RecordBatch,
    StringArray, StringBuilder, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{CodecError, Result};

pub const RECORD_ID_FIELD: &str = "record_id";
pub const DATA_DATE_FIELD: &str = "data_date";
pub const DATA_TYPE_FIELD: &str = "data_type";
pub const INGESTED_AT_FIELD: &str = "ingested_at";

/// Days from 0001-01-01 (CE) to 1970-01-01, the Date32 epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Partition tags stamped onto every row of a batch.
#[derive(Debug, Clone)]
pub struct RecordContext {
    pub data_type: String,
    pub data_date: NaiveDate,
    pub ingested_at: DateTime<Utc>,
}

/// Convert a calendar date to a Date32 value.
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Convert a Date32 value back to a calendar date.
pub fn days_to_date(days: i64) -> Option<NaiveDate> {
    let from_ce = i32::try_from(days + i64::from(UNIX_EPOCH_DAYS_FROM_CE)).ok()?;
    NaiveDate::from_num_days_from_ce_opt(from_ce)
}

fn is_reserved(name: &str) -> bool {
    matches!(
        name,
        RECORD_ID_FIELD | DATA_DATE_FIELD | DATA_TYPE_FIELD | INGESTED_AT_FIELD
    )
}

struct Column<'a> {
    name: String,
    values: Vec<Option<&'a Value>>,
}

/// Build a RecordBatch from JSON objects, tagging each row with `ctx`.
pub fn records_to_batch(records: &[Value], ctx: &RecordContext) -> Result<RecordBatch> {
    let row_count = records.len();
    let mut columns: Vec<Column<'_>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut record_ids = StringBuilder::with_capacity(row_count, row_count * 36);

    for (row, record) in records.iter().enumerate() {
        let object = record.as_object().ok_or_else(|| CodecError::InvalidRecord {
            index: row,
            reason: format!("expected a JSON object, got {}", json_kind(record)),
        })?;

        let mut flat = Vec::new();
        flatten_object("", object, &mut flat);

        let mut explicit_id = None;
        let mut plain_id = None;
        for (name, value) in flat {
            if name == RECORD_ID_FIELD {
                explicit_id = id_string(value);
            } else if name == "id" {
                plain_id = id_string(value);
            }
            if is_reserved(&name) || value.is_null() {
                continue;
            }

            let slot = match index.get(&name) {
                Some(&slot) => slot,
                None => {
                    columns.push(Column {
                        name: name.clone(),
                        values: vec![None; row_count],
                    });
                    index.insert(name, columns.len() - 1);
                    columns.len() - 1
                }
            };
            columns[slot].values[row] = Some(value);
        }

        let id = explicit_id
            .or(plain_id)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        record_ids.append_value(id);
    }

    let mut fields = Vec::with_capacity(columns.len() + 4);
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len() + 4);

    for column in &columns {
        let data_type = infer_type(&column.values);
        arrays.push(build_array(&data_type, &column.values));
        fields.push(Field::new(column.name.as_str(), data_type, true));
    }

    fields.extend(metadata_fields());
    arrays.push(Arc::new(record_ids.finish()));
    arrays.push(Arc::new(Date32Array::from(vec![
        date_to_days(ctx.data_date);
        row_count
    ])));
    arrays.push(Arc::new(StringArray::from(vec![
        ctx.data_type.as_str();
        row_count
    ])));
    arrays.push(Arc::new(
        TimestampMicrosecondArray::from(vec![ctx.ingested_at.timestamp_micros(); row_count])
            .with_timezone("UTC"),
    ));

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    Ok(batch)
}

/// The four columns every partition file carries, in file order.
pub fn metadata_fields() -> Vec<Field> {
    vec![
        Field::new(RECORD_ID_FIELD, DataType::Utf8, true),
        Field::new(DATA_DATE_FIELD, DataType::Date32, true),
        Field::new(DATA_TYPE_FIELD, DataType::Utf8, true),
        Field::new(
            INGESTED_AT_FIELD,
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            true,
        ),
    ]
}

fn flatten_object<'a>(
    prefix: &str,
    object: &'a Map<String, Value>,
    out: &mut Vec<(String, &'a Value)>,
) {
    for (key, value) in object {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => flatten_object(&name, nested, out),
            _ => out.push((name, value)),
        }
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn infer_type(values: &[Option<&Value>]) -> DataType {
    let mut all_bool = true;
    let mut all_int = true;
    let mut all_number = true;
    let mut all_string = true;
    let mut seen = false;

    for value in values.iter().flatten() {
        seen = true;
        all_bool &= value.is_boolean();
        all_int &= value.as_i64().is_some();
        all_number &= value.is_number();
        all_string &= value.is_string();
    }

    if !seen || all_string {
        DataType::Utf8
    } else if all_bool {
        DataType::Boolean
    } else if all_int {
        DataType::Int64
    } else if all_number {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

fn build_array(data_type: &DataType, values: &[Option<&Value>]) -> ArrayRef {
    match data_type {
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(values.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_bool));
            }
            Arc::new(builder.finish())
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(values.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_i64));
            }
            Arc::new(builder.finish())
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(values.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_f64));
            }
            Arc::new(builder.finish())
        }
        _ => {
            let mut builder = StringBuilder::with_capacity(values.len(), values.len() * 16);
            for value in values {
                match value {
                    Some(Value::String(s)) => builder.append_value(s),
                    Some(other) => builder.append_value(other.to_string()),
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
    }
}
