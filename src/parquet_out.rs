use arrow::array::{ArrayRef, ListBuilder, StringArray, StringBuilder, TimestampMillisecondArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::{DateTime, Datelike, Timelike, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::ChunkReader;
use serde_json::Value;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use crate::error::{EtlError, Result};
use crate::types::NewsRecord;

const DEFAULT_ROW_GROUP_SIZE: usize = 1024 * 1024;

/// How Parquet files are encoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParquetOptions {
    pub compression: Compression,
    pub row_group_size: usize,
}

impl ParquetOptions {
    /// Encoding for news batches: gzip, default row groups.
    pub fn news() -> Self {
        Self {
            compression: Compression::GZIP(GzipLevel::default()),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build()
    }
}

pub fn parse_compression(name: &str) -> Result<Compression> {
    match name.trim().to_ascii_lowercase().as_str() {
        "none" | "uncompressed" => Ok(Compression::UNCOMPRESSED),
        "snappy" => Ok(Compression::SNAPPY),
        "gzip" => Ok(Compression::GZIP(GzipLevel::default())),
        "zstd" => Ok(Compression::ZSTD(ZstdLevel::default())),
        "lz4" => Ok(Compression::LZ4_RAW),
        "brotli" => Ok(Compression::BROTLI(BrotliLevel::default())),
        other => Err(EtlError::Config(format!(
            "Unsupported parquet compression '{other}'"
        ))),
    }
}

/// Object key for a news batch written at `now`:
/// `<prefix>/year=YYYY/month=MM/day=DD/hour=HH/batch_<YYYYMMDDTHHMMSS>.parquet`.
pub fn batch_key(prefix: &str, now: DateTime<Utc>) -> String {
    let prefix = prefix.trim_end_matches('/');
    let partition = format!(
        "year={}/month={:02}/day={:02}/hour={:02}/batch_{}.parquet",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.format("%Y%m%dT%H%M%S")
    );
    if prefix.is_empty() {
        partition
    } else {
        format!("{prefix}/{partition}")
    }
}

pub fn news_schema() -> SchemaRef {
    let utf8 = |name: &str, nullable: bool| Field::new(name, DataType::Utf8, nullable);
    Arc::new(Schema::new(vec![
        utf8("id", false),
        utf8("source", true),
        utf8("title", true),
        utf8("url", true),
        utf8("icon", true),
        utf8("image", true),
        Field::new(
            "time",
            DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
            false,
        ),
        Field::new(
            "symbols",
            DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
            true,
        ),
        utf8("first_price", true),
        utf8("info", true),
        utf8("suggestions", true),
    ]))
}

fn json_text(value: &Option<Value>) -> Option<String> {
    value.as_ref().map(Value::to_string)
}

fn string_column<'a>(
    records: &'a [NewsRecord],
    field: impl Fn(&'a NewsRecord) -> Option<&'a str>,
) -> ArrayRef {
    Arc::new(records.iter().map(field).collect::<StringArray>())
}

fn json_column<'a>(
    records: &'a [NewsRecord],
    field: impl Fn(&'a NewsRecord) -> &'a Option<Value>,
) -> ArrayRef {
    Arc::new(
        records
            .iter()
            .map(|r| json_text(field(r)))
            .collect::<StringArray>(),
    )
}

/// Lay a batch of news records out as one Arrow record batch.
/// Structured fields are stored as JSON text.
pub fn news_to_record_batch(records: &[NewsRecord]) -> Result<RecordBatch> {
    let ids: ArrayRef = Arc::new(StringArray::from_iter_values(
        records.iter().map(|r| r.id.as_str()),
    ));
    let times: ArrayRef = Arc::new(
        TimestampMillisecondArray::from(
            records
                .iter()
                .map(|r| r.time.timestamp_millis())
                .collect::<Vec<_>>(),
        )
        .with_timezone("UTC"),
    );

    let mut symbols = ListBuilder::new(StringBuilder::new());
    for r in records {
        match &r.symbols {
            Some(list) => {
                for s in list {
                    symbols.values().append_option(s.as_deref());
                }
                symbols.append(true);
            }
            None => symbols.append(false),
        }
    }
    let symbols: ArrayRef = Arc::new(symbols.finish());

    let batch = RecordBatch::try_new(
        news_schema(),
        vec![
            ids,
            string_column(records, |r| r.source.as_deref()),
            string_column(records, |r| r.title.as_deref()),
            string_column(records, |r| r.url.as_deref()),
            string_column(records, |r| r.icon.as_deref()),
            string_column(records, |r| r.image.as_deref()),
            times,
            symbols,
            json_column(records, |r| &r.first_price),
            json_column(records, |r| &r.info),
            json_column(records, |r| &r.suggestions),
        ],
    )?;
    Ok(batch)
}

/// Encode a record batch as an in-memory Parquet file.
pub fn encode_parquet(batch: &RecordBatch, options: &ParquetOptions) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(
        &mut buf,
        batch.schema(),
        Some(options.writer_properties()),
    )?;
    writer.write(batch)?;
    writer.close()?;
    Ok(buf)
}

pub fn write_parquet_file(
    path: impl AsRef<Path>,
    batch: &RecordBatch,
    options: &ParquetOptions,
) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(options.writer_properties()))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn read_all<R: ChunkReader + 'static>(reader: R) -> Result<RecordBatch> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(reader)?;
    let schema = builder.schema().clone();
    let batches = builder
        .build()?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Read a whole Parquet file back as a single record batch.
pub fn read_parquet_file(path: impl AsRef<Path>) -> Result<RecordBatch> {
    read_all(File::open(path)?)
}

pub fn decode_parquet(bytes: Bytes) -> Result<RecordBatch> {
    read_all(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::TimestampMillisecondType;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(id: &str, symbols: Option<Vec<&str>>) -> NewsRecord {
        NewsRecord {
            id: id.to_string(),
            source: Some("Terminal".to_string()),
            title: Some(format!("title {id}")),
            url: None,
            icon: None,
            image: None,
            time: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            symbols: symbols.map(|s| s.into_iter().map(|v| Some(v.to_string())).collect()),
            first_price: Some(json!({"BTC": 1.5})),
            info: None,
            suggestions: Some(json!([])),
        }
    }

    #[test]
    fn batch_key_is_hour_partitioned() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(
            batch_key("tree/news", now),
            "tree/news/year=2024/month=03/day=05/hour=07/batch_20240305T070809.parquet"
        );
        assert_eq!(
            batch_key("tree/news/", now),
            batch_key("tree/news", now)
        );
        assert_eq!(
            batch_key("", now),
            "year=2024/month=03/day=05/hour=07/batch_20240305T070809.parquet"
        );
    }

    #[test]
    fn record_batch_has_one_column_per_field() {
        let batch = news_to_record_batch(&[
            record("a", Some(vec!["BTC", "ETH"])),
            record("b", None),
        ])
        .unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 11);

        let ids = batch.column(0).as_string::<i32>();
        assert_eq!(ids.value(1), "b");

        let urls = batch.column(3).as_string::<i32>();
        assert!(urls.is_null(0));

        let times = batch.column(6).as_primitive::<TimestampMillisecondType>();
        assert_eq!(times.value(0), 1_700_000_000_000);

        let symbols = batch.column(7).as_list::<i32>();
        assert_eq!(symbols.value(0).len(), 2);
        assert!(symbols.is_null(1));

        let prices = batch.column(8).as_string::<i32>();
        assert_eq!(prices.value(0), r#"{"BTC":1.5}"#);
        let info = batch.column(9).as_string::<i32>();
        assert!(info.is_null(0));
    }

    #[test]
    fn null_symbol_entries_stay_null() {
        let mut rec = record("a", None);
        rec.symbols = Some(vec![Some("BTC".to_string()), None]);
        let batch = news_to_record_batch(&[rec]).unwrap();

        let list = batch.column(7).as_list::<i32>().value(0);
        let entries = list.as_string::<i32>();
        assert_eq!(entries.value(0), "BTC");
        assert!(entries.is_null(1));
    }

    #[test]
    fn gzip_parquet_decodes_to_same_rows() {
        let batch = news_to_record_batch(&[record("a", Some(vec!["SOL"]))]).unwrap();
        let bytes = encode_parquet(&batch, &ParquetOptions::news()).unwrap();
        assert_eq!(&bytes[..4], b"PAR1");

        let decoded = decode_parquet(Bytes::from(bytes)).unwrap();
        assert_eq!(decoded.num_rows(), 1);
        assert_eq!(decoded.schema().field(6).name(), "time");
    }

    #[test]
    fn empty_batch_still_encodes() {
        let batch = news_to_record_batch(&[]).unwrap();
        let bytes = encode_parquet(&batch, &ParquetOptions::news()).unwrap();
        let decoded = decode_parquet(Bytes::from(bytes)).unwrap();
        assert_eq!(decoded.num_rows(), 0);
    }

    #[test]
    fn codec_names_are_case_insensitive() {
        assert_eq!(parse_compression("GZIP").unwrap(), Compression::GZIP(GzipLevel::default()));
        assert_eq!(parse_compression("snappy").unwrap(), Compression::SNAPPY);
        assert!(parse_compression("rar").is_err());
    }
}
