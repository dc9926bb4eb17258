// Parquet encoding for partition files
//
// Every write re-encodes the full file contents into an in-memory buffer;
// partition files are small enough that a single ArrowWriter pass is cheaper
// than managing multipart uploads.

use arrow::array::RecordBatch;
use parqstream_config::{Compression as CompressionSetting, ParquetConfig};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;

use crate::error::Result;

fn compression_setting(config: &ParquetConfig) -> Compression {
    match config.compression {
        CompressionSetting::Zstd => {
            let level = ZstdLevel::try_new(config.zstd_level).unwrap_or_default();
            Compression::ZSTD(level)
        }
        CompressionSetting::Snappy => Compression::SNAPPY,
        CompressionSetting::Uncompressed => Compression::UNCOMPRESSED,
    }
}

/// Build writer properties from configuration
///
/// - Configured compression (ZSTD by default)
/// - Dictionary encoding enabled
/// - Page-level statistics so readers can prune on `data_date`
/// - parqstream version embedded in the footer
pub fn writer_properties(config: &ParquetConfig) -> WriterProperties {
    let metadata = vec![KeyValue {
        key: "parqstream.version".to_string(),
        value: Some(env!("CARGO_PKG_VERSION").to_string()),
    }];

    WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(compression_setting(config))
        .set_data_page_size_limit(256 * 1024)
        .set_max_row_group_size(config.row_group_size.max(1))
        .set_dictionary_page_size_limit(128 * 1024)
        .set_key_value_metadata(Some(metadata))
        .build()
}

/// Encode a batch into a complete Parquet file.
pub fn encode_batch(batch: &RecordBatch, props: &WriterProperties) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props.clone()))?;
        writer.write(batch)?;
        writer.close()?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    #[test]
    fn encodes_a_valid_parquet_file() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("name", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec!["a", "b", "c"])),
            ],
        )
        .unwrap();

        let bytes = encode_batch(&batch, &writer_properties(&ParquetConfig::default())).unwrap();
        assert_eq!(&bytes[0..4], b"PAR1");
        assert_eq!(&bytes[bytes.len() - 4..], b"PAR1");
    }

    #[test]
    fn properties_follow_config() {
        let mut config = ParquetConfig::default();
        config.compression = CompressionSetting::Snappy;
        config.row_group_size = 500;

        let props = writer_properties(&config);
        assert_eq!(props.max_row_group_size(), 500);
        assert_eq!(
            props.compression(&parquet::schema::types::ColumnPath::from("x")),
            Compression::SNAPPY
        );

        let kv = props.key_value_metadata().unwrap();
        assert!(kv.iter().any(|entry| entry.key == "parqstream.version"));
    }

    #[test]
    fn out_of_range_zstd_level_falls_back_to_default() {
        let mut config = ParquetConfig::default();
        config.zstd_level = 99;
        assert_eq!(
            compression_setting(&config),
            Compression::ZSTD(ZstdLevel::default())
        );
    }
}
