// Schema widening for appends
//
// A partition file is rewritten with the union of its own schema and the
// incoming batch's schema. New columns become nullable additions; type
// conflicts widen (Int64 + Float64 -> Float64, anything else -> Utf8).

use arrow::array::{new_null_array, Array, ArrayRef, RecordBatch};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

use crate::error::Result;

/// Widen two column types to one that can hold both.
pub fn widen_type(left: &DataType, right: &DataType) -> DataType {
    match (left, right) {
        (l, r) if l == r => l.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        _ => DataType::Utf8,
    }
}

fn all_null(batches: &[RecordBatch], name: &str) -> bool {
    batches.iter().all(|batch| {
        batch
            .column_by_name(name)
            .map(|column| column.null_count() == column.len())
            .unwrap_or(true)
    })
}

/// Union schema of an existing file and an incoming batch.
///
/// Existing column order is kept and incoming-only columns are appended.
/// A column that is entirely null on one side adopts the other side's type.
pub fn merge_schemas(
    existing: &Schema,
    existing_batches: &[RecordBatch],
    incoming: &RecordBatch,
) -> SchemaRef {
    let incoming_schema = incoming.schema();
    let incoming_batches = std::slice::from_ref(incoming);
    let mut fields: Vec<Field> = Vec::with_capacity(existing.fields().len());

    for field in existing.fields() {
        let data_type = match incoming_schema.field_with_name(field.name()) {
            Ok(other) if other.data_type() != field.data_type() => {
                if all_null(incoming_batches, other.name()) {
                    field.data_type().clone()
                } else if all_null(existing_batches, field.name()) {
                    other.data_type().clone()
                } else {
                    widen_type(field.data_type(), other.data_type())
                }
            }
            _ => field.data_type().clone(),
        };
        fields.push(Field::new(field.name(), data_type, true));
    }

    for field in incoming_schema.fields() {
        if existing.field_with_name(field.name()).is_err() {
            fields.push(Field::new(field.name(), field.data_type().clone(), true));
        }
    }

    Arc::new(Schema::new(fields))
}

/// Reshape a batch to `schema`: cast mismatched columns, null-fill missing ones.
pub fn conform_batch(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let column = match batch.column_by_name(field.name()) {
            Some(column) if column.data_type() == field.data_type() => Arc::clone(column),
            Some(column) if column.null_count() == column.len() => {
                new_null_array(field.data_type(), batch.num_rows())
            }
            Some(column) => cast(column, field.data_type())?,
            None => new_null_array(field.data_type(), batch.num_rows()),
        };
        columns.push(column);
    }

    let conformed = RecordBatch::try_new(Arc::clone(schema), columns)?;
    Ok(conformed)
}

/// Append `incoming` to `existing` rows under the widened union schema.
pub fn append_batches(
    existing_schema: &Schema,
    existing: &[RecordBatch],
    incoming: &RecordBatch,
) -> Result<RecordBatch> {
    let schema = merge_schemas(existing_schema, existing, incoming);

    let mut conformed = Vec::with_capacity(existing.len() + 1);
    for batch in existing {
        conformed.push(conform_batch(batch, &schema)?);
    }
    conformed.push(conform_batch(incoming, &schema)?);

    let merged = concat_batches(&schema, &conformed)?;
    Ok(merged)
}
