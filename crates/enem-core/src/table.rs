//! In-memory Arrow tables and their Parquet/CSV codecs.
//!
//! A [`Table`] is one schema plus the record batches read from a single
//! source. Shards are read whole, so memory is bounded by the largest one.

use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use snafu::prelude::*;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::config::{CsvEncoding, ParquetCompression};
use crate::error::{
    BatchDecodeSnafu, CsvDecodeSnafu, CsvError, InferSchemaSnafu, ParquetError,
    ParquetReadSnafu, ParquetWriteSnafu, ProjectionSnafu, ReaderBuildSnafu, RewindSnafu,
    WriterCreateSnafu,
};

/// Rows per decoded batch when reading CSV.
pub const DEFAULT_CSV_BATCH_SIZE: usize = 8192;

/// A tabular structure: one schema and zero or more record batches.
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<&str> {
        self.schema
            .fields()
            .iter()
            .map(|field| field.name().as_str())
            .collect()
    }

    /// Decode a complete Parquet file.
    pub fn from_parquet(bytes: Bytes) -> Result<Self, ParquetError> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(bytes).context(ParquetReadSnafu)?;
        let schema = builder.schema().clone();
        let reader = builder.build().context(ParquetReadSnafu)?;
        let batches = reader
            .collect::<Result<Vec<_>, _>>()
            .context(BatchDecodeSnafu)?;

        Ok(Self { schema, batches })
    }

    /// Decode a CSV file with a header row, inferring column types from the whole input.
    pub fn from_csv(bytes: Bytes, delimiter: u8, encoding: CsvEncoding) -> Result<Self, CsvError> {
        let mut cursor = std::io::Cursor::new(bytes);
        let schema = infer_csv_schema(&mut cursor, delimiter, encoding, None)?;
        let reader = csv_reader(
            cursor,
            schema.clone(),
            delimiter,
            encoding,
            DEFAULT_CSV_BATCH_SIZE,
        )?;
        let batches = reader
            .collect::<Result<Vec<_>, _>>()
            .context(CsvDecodeSnafu)?;

        Ok(Self { schema, batches })
    }

    /// Keep only the columns at `indices`, in that order.
    ///
    /// Schema-level metadata is dropped: it describes the full column set
    /// (pandas writes such metadata) and would be wrong for the projection.
    pub fn project(&self, indices: &[usize]) -> Result<Self, ParquetError> {
        let fields: Vec<_> = indices
            .iter()
            .map(|&i| self.schema.field(i).clone())
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let batches = self
            .batches
            .iter()
            .map(|batch| {
                let columns = indices.iter().map(|&i| batch.column(i).clone()).collect();
                RecordBatch::try_new(schema.clone(), columns)
            })
            .collect::<Result<Vec<_>, _>>()
            .context(ProjectionSnafu)?;

        Ok(Self { schema, batches })
    }

    /// Encode as a Parquet file.
    ///
    /// The same table and codec always produce the same bytes.
    pub fn to_parquet(&self, compression: ParquetCompression) -> Result<Vec<u8>, ParquetError> {
        write_parquet(self.schema.clone(), &self.batches, compression)
    }
}

/// Encode record batches sharing `schema` as one Parquet file.
pub fn write_parquet(
    schema: SchemaRef,
    batches: &[RecordBatch],
    compression: ParquetCompression,
) -> Result<Vec<u8>, ParquetError> {
    let props = WriterProperties::builder()
        .set_compression(compression.into())
        .build();

    let mut writer =
        ArrowWriter::try_new(Vec::new(), schema, Some(props)).context(WriterCreateSnafu)?;
    for batch in batches {
        writer.write(batch).context(ParquetWriteSnafu)?;
    }
    writer.into_inner().context(ParquetWriteSnafu)
}

/// Arrow CSV reader over input transcoded to UTF-8.
pub type CsvReader<R> = arrow::csv::Reader<DecodeReaderBytes<R, Vec<u8>>>;

/// Infer a CSV schema from the header and the first `max_records` rows
/// (all rows when `None`), then rewind the input to its start.
///
/// A column with no values in the inspected rows is typed `Utf8` rather
/// than `Null`, which would discard anything that follows.
pub fn infer_csv_schema<R: Read + Seek>(
    input: &mut R,
    delimiter: u8,
    encoding: CsvEncoding,
    max_records: Option<usize>,
) -> Result<SchemaRef, CsvError> {
    let (schema, _) = csv_format(delimiter)
        .infer_schema(transcoded(&mut *input, encoding), max_records)
        .context(InferSchemaSnafu)?;
    input.seek(SeekFrom::Start(0)).context(RewindSnafu)?;
    Ok(Arc::new(widen_null_columns(&schema)))
}

/// Build a batched CSV reader for input with a header row.
pub fn csv_reader<R: Read>(
    input: R,
    schema: SchemaRef,
    delimiter: u8,
    encoding: CsvEncoding,
    batch_size: usize,
) -> Result<CsvReader<R>, CsvError> {
    ReaderBuilder::new(schema)
        .with_format(csv_format(delimiter))
        .with_batch_size(batch_size)
        .build(transcoded(input, encoding))
        .context(ReaderBuildSnafu)
}

fn csv_format(delimiter: u8) -> Format {
    Format::default()
        .with_header(true)
        .with_delimiter(delimiter)
}

// UTF-8 input passes through untouched.
fn transcoded<R: Read>(input: R, encoding: CsvEncoding) -> DecodeReaderBytes<R, Vec<u8>> {
    DecodeReaderBytesBuilder::new()
        .encoding(encoding.transcode_from())
        .build(input)
}

fn widen_null_columns(schema: &Schema) -> Schema {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| match field.data_type() {
            DataType::Null => field
                .as_ref()
                .clone()
                .with_data_type(DataType::Utf8)
                .with_nullable(true),
            _ => field.as_ref().clone(),
        })
        .collect();
    Schema::new_with_metadata(fields, schema.metadata().clone())
}
