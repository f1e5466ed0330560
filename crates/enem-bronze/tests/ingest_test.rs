//! Integration tests for bronze ingestion and chunking.

use std::path::PathBuf;

use arrow::array::{Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use bytes::Bytes;
use object_store::path::Path;
use tempfile::TempDir;

use enem_bronze::{
    BronzeConfig, ChunkingConfig, DirectoryUpload, FileUpload, Ingester, chunk_csv,
    upload_directory, upload_file,
};
use enem_core::{
    CsvEncoding, ErrorHandlingConfig, ParquetCompression, Reportable, RunOutcome, StorageProvider, Table,
    UnitStatus,
};

async fn local_bucket() -> (TempDir, StorageProvider) {
    let dir = tempfile::tempdir().unwrap();
    let storage = StorageProvider::for_url(dir.path().to_str().unwrap())
        .await
        .unwrap();
    (dir, storage)
}

const CSV: &str = "NU_INSCRICAO;TP_SEXO;NU_NOTA_MT\n\
210001;F;612.5\n\
210002;M;587.0\n\
210003;F;701.3\n\
210004;M;455.8\n\
210005;F;530.1\n";

#[tokio::test]
async fn test_upload_file_is_verbatim() {
    let (_bucket, storage) = local_bucket().await;
    let local = tempfile::tempdir().unwrap();
    let source = local.path().join("MICRODADOS_ENEM_2023.csv");
    std::fs::write(&source, CSV).unwrap();

    let destination = Path::from("bronze/microdados_enem.csv");
    let bytes = upload_file(&storage, &source, &destination).await.unwrap();

    assert_eq!(bytes, CSV.len() as u64);
    assert_eq!(
        storage.get(&destination).await.unwrap(),
        Bytes::from_static(CSV.as_bytes())
    );
}

#[tokio::test]
async fn test_directory_upload_skips_subdirectories() {
    let (_bucket, storage) = local_bucket().await;
    let local = tempfile::tempdir().unwrap();
    std::fs::write(local.path().join("chunk_2.parquet"), b"two").unwrap();
    std::fs::write(local.path().join("chunk_1.parquet"), b"one").unwrap();
    std::fs::create_dir(local.path().join("old")).unwrap();
    std::fs::write(local.path().join("old/chunk_0.parquet"), b"zero").unwrap();

    let report = upload_directory(&storage, local.path(), "bronze/parquet", 1)
        .await
        .unwrap();

    let destinations: Vec<&str> = report
        .uploads
        .iter()
        .map(|u| u.destination.as_ref())
        .collect();
    assert_eq!(
        destinations,
        vec!["bronze/parquet/chunk_1.parquet", "bronze/parquet/chunk_2.parquet"]
    );
    assert_eq!(report.outcome(), RunOutcome::Completed);
    assert_eq!(report.bytes_uploaded(), 6);

    let listed = storage.list_with_prefix("bronze/parquet").await.unwrap();
    assert_eq!(listed.len(), 2);
}

fn ingest_config(local: &std::path::Path) -> BronzeConfig {
    BronzeConfig {
        uploads: vec![
            FileUpload {
                source: local.join("missing.csv"),
                destination: "bronze/missing.csv".to_string(),
            },
            FileUpload {
                source: local.join("present.csv"),
                destination: "bronze/present.csv".to_string(),
            },
        ],
        directories: vec![],
        chunking: None,
    }
}

#[tokio::test]
async fn test_first_failed_upload_stops_by_default() {
    let (_bucket, storage) = local_bucket().await;
    let local = tempfile::tempdir().unwrap();
    std::fs::write(local.path().join("present.csv"), CSV).unwrap();

    let report = Ingester::new(
        storage.clone(),
        ingest_config(local.path()),
        &ErrorHandlingConfig { max_failures: 1 },
    )
    .run()
    .await
    .unwrap();

    assert_eq!(report.uploads.len(), 1);
    assert_eq!(report.uploads[0].status, UnitStatus::Failed);
    assert!(report.stopped_early);
    assert_eq!(report.outcome(), RunOutcome::TotalFailure);
    assert!(
        storage
            .get(&Path::from("bronze/present.csv"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_unlimited_failures_upload_the_rest() {
    let (_bucket, storage) = local_bucket().await;
    let local = tempfile::tempdir().unwrap();
    std::fs::write(local.path().join("present.csv"), CSV).unwrap();

    let mut config = ingest_config(local.path());
    let shards = local.path().join("shards");
    std::fs::create_dir(&shards).unwrap();
    std::fs::write(shards.join("a.parquet"), b"a").unwrap();
    config.directories.push(DirectoryUpload {
        source: shards,
        destination_prefix: "bronze/parquet".to_string(),
    });

    let report = Ingester::new(
        storage.clone(),
        config,
        &ErrorHandlingConfig { max_failures: 0 },
    )
    .run()
    .await
    .unwrap();

    let statuses: Vec<UnitStatus> = report.uploads.iter().map(|u| u.status).collect();
    assert_eq!(
        statuses,
        vec![UnitStatus::Failed, UnitStatus::Success, UnitStatus::Success]
    );
    assert_eq!(report.outcome(), RunOutcome::PartialFailure);
    assert!(
        storage
            .get(&Path::from("bronze/parquet/a.parquet"))
            .await
            .is_ok()
    );
}

fn chunking(source: PathBuf, output_dir: PathBuf, rows_per_chunk: usize) -> ChunkingConfig {
    ChunkingConfig {
        source,
        output_dir,
        rows_per_chunk,
        delimiter: ';',
        encoding: CsvEncoding::Utf8,
        compression: ParquetCompression::Snappy,
        infer_schema_rows: None,
    }
}

#[test]
fn test_chunk_row_counts() {
    let local = tempfile::tempdir().unwrap();
    let source = local.path().join("MICRODADOS_ENEM_2023.csv");
    std::fs::write(&source, CSV).unwrap();
    let output = local.path().join("parquet_chunks");

    let report = chunk_csv(&chunking(source, output.clone(), 2)).unwrap();

    let rows: Vec<usize> = report.chunks.iter().map(|c| c.rows).collect();
    assert_eq!(rows, vec![2, 2, 1]);
    assert_eq!(report.rows(), 5);
    assert_eq!(report.outcome(), RunOutcome::Completed);

    let last = output.join("MICRODADOS_ENEM_2023_chunk_3.parquet");
    assert_eq!(report.chunks[2].path, last);

    let table = Table::from_parquet(Bytes::from(std::fs::read(&last).unwrap())).unwrap();
    assert_eq!(table.num_rows(), 1);
    assert_eq!(
        table.column_names(),
        vec!["NU_INSCRICAO", "TP_SEXO", "NU_NOTA_MT"]
    );
}

#[test]
fn test_rechunk_removes_stale_shards() {
    let local = tempfile::tempdir().unwrap();
    let source = local.path().join("MICRODADOS_ENEM_2023.csv");
    std::fs::write(&source, CSV).unwrap();
    let output = local.path().join("parquet_chunks");

    chunk_csv(&chunking(source.clone(), output.clone(), 1)).unwrap();
    assert!(output.join("MICRODADOS_ENEM_2023_chunk_5.parquet").exists());

    let report = chunk_csv(&chunking(source, output.clone(), 10)).unwrap();

    assert_eq!(report.chunks.len(), 1);
    assert!(output.join("MICRODADOS_ENEM_2023_chunk_1.parquet").exists());
    assert!(!output.join("MICRODADOS_ENEM_2023_chunk_2.parquet").exists());
    assert!(!output.join("MICRODADOS_ENEM_2023_chunk_5.parquet").exists());
}

fn column_values(table: &Table, index: usize) -> Vec<Option<String>> {
    let column = cast(table.batches()[0].column(index), &DataType::Utf8).unwrap();
    let strings = column.as_any().downcast_ref::<StringArray>().unwrap();
    strings.iter().map(|v| v.map(str::to_string)).collect()
}

fn chunk_single(config: &ChunkingConfig) -> Table {
    let report = chunk_csv(config).unwrap();
    let bytes = std::fs::read(&report.chunks[0].path).unwrap();
    Table::from_parquet(Bytes::from(bytes)).unwrap()
}

#[test]
fn test_scores_after_inference_window_survive() {
    let local = tempfile::tempdir().unwrap();
    let source = local.path().join("MICRODADOS_ENEM_2023.csv");
    std::fs::write(
        &source,
        "NU_INSCRICAO;NU_NOTA_MT\n1;\n2;\n3;\n4;612.5\n5;700.1\n",
    )
    .unwrap();

    for infer_schema_rows in [None, Some(3)] {
        let mut config = chunking(source.clone(), local.path().join("parquet_chunks"), 10);
        config.infer_schema_rows = infer_schema_rows;
        let table = chunk_single(&config);

        let maths = column_values(&table, 1);
        assert!(maths[..3].iter().all(Option::is_none));
        assert_eq!(maths[3].as_deref(), Some("612.5"));
        assert_eq!(maths[4].as_deref(), Some("700.1"));
    }
}

#[test]
fn test_late_decimal_widens_column() {
    let local = tempfile::tempdir().unwrap();
    let source = local.path().join("MICRODADOS_ENEM_2023.csv");
    std::fs::write(
        &source,
        "NU_INSCRICAO;NU_NOTA_CN\n1;600\n2;601\n3;602\n4;612.5\n",
    )
    .unwrap();

    let table = chunk_single(&chunking(source, local.path().join("parquet_chunks"), 10));

    assert_eq!(table.schema().field(1).data_type(), &DataType::Float64);
    assert_eq!(column_values(&table, 1)[3].as_deref(), Some("612.5"));
}

#[test]
fn test_chunk_latin1_source() {
    let local = tempfile::tempdir().unwrap();
    let source = local.path().join("MICRODADOS_ENEM_2023.csv");
    std::fs::write(
        &source,
        b"NU_INSCRICAO;NO_MUNICIPIO_ESC\n1;S\xE3o Paulo\n2;Bel\xE9m\n",
    )
    .unwrap();

    let mut config = chunking(source, local.path().join("parquet_chunks"), 10);
    config.encoding = CsvEncoding::Latin1;

    let table = chunk_single(&config);
    assert_eq!(
        column_values(&table, 1),
        vec![Some("São Paulo".to_string()), Some("Belém".to_string())]
    );
}

#[test]
fn test_chunk_missing_source() {
    let local = tempfile::tempdir().unwrap();
    let result = chunk_csv(&chunking(
        local.path().join("absent.csv"),
        local.path().join("out"),
        2,
    ));
    assert!(matches!(
        result,
        Err(enem_bronze::IngestError::OpenCsv { .. })
    ));
}

#[test]
fn test_shipped_config_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/enem.yaml");
    let app = enem_bronze::Application::<enem_bronze::Config>::from_paths(&[
        enem_core::ConfigPath::file(path),
    ])
    .unwrap();

    let bronze = &app.config().bronze;
    assert_eq!(bronze.uploads[0].destination, "bronze/microdados_enem.csv");
    assert_eq!(bronze.directories[0].destination_prefix, "bronze/parquet");
    let chunking = bronze.chunking.as_ref().unwrap();
    assert_eq!(chunking.rows_per_chunk, 500_000);
    assert_eq!(chunking.encoding, CsvEncoding::Latin1);
}
