//! BigQuery load jobs.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use gcp_bigquery_client::Client;
use gcp_bigquery_client::client_builder::ClientBuilder;
use gcp_bigquery_client::model::job::Job;
use serde::Deserialize;
use serde_json::{Value, json};
use snafu::prelude::*;
use tokio::time::sleep;
use tracing::{debug, info};

use super::{LoadJob, TableRef, Warehouse};
use crate::error::{
    ConnectSnafu, JobEncodeSnafu, JobFailedSnafu, JobStatusSnafu, MissingJobIdSnafu, PollSnafu,
    SubmitSnafu, WarehouseError,
};

const STATE_DONE: &str = "DONE";

/// Request body of a full-replace Parquet load into `table`.
pub fn load_job_request(table: &TableRef, uris: &[String], location: Option<&str>) -> Value {
    let mut request = json!({
        "configuration": {
            "load": {
                "sourceUris": uris,
                "sourceFormat": "PARQUET",
                "writeDisposition": "WRITE_TRUNCATE",
                "destinationTable": {
                    "projectId": table.project_id,
                    "datasetId": table.dataset_id,
                    "tableId": table.table_id,
                },
            }
        }
    });
    if let Some(location) = location {
        request["jobReference"] = json!({
            "projectId": table.project_id,
            "location": location,
        });
    }
    request
}

// Only the job fields read back; the client's model is converted through JSON.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobView {
    job_reference: Option<JobReferenceView>,
    status: Option<JobStatusView>,
    statistics: Option<StatisticsView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReferenceView {
    job_id: Option<String>,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusView {
    state: Option<String>,
    error_result: Option<ErrorView>,
}

#[derive(Debug, Deserialize)]
struct ErrorView {
    reason: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatisticsView {
    load: Option<LoadStatisticsView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatisticsView {
    output_rows: Option<Value>,
}

impl JobView {
    fn from_job(job: &Job) -> Result<Self, WarehouseError> {
        let value = serde_json::to_value(job).context(JobStatusSnafu)?;
        serde_json::from_value(value).context(JobStatusSnafu)
    }

    fn job_id(&self) -> Option<&str> {
        self.job_reference.as_ref()?.job_id.as_deref()
    }

    fn location(&self) -> Option<&str> {
        self.job_reference.as_ref()?.location.as_deref()
    }

    fn state(&self) -> Option<&str> {
        self.status.as_ref()?.state.as_deref()
    }

    fn is_done(&self) -> bool {
        self.state() == Some(STATE_DONE)
    }

    fn error_message(&self) -> Option<String> {
        let error = self.status.as_ref()?.error_result.as_ref()?;
        Some(match (&error.reason, &error.message) {
            (Some(reason), Some(message)) => format!("{reason}: {message}"),
            (None, Some(message)) => message.clone(),
            (Some(reason), None) => reason.clone(),
            (None, None) => "unknown error".to_string(),
        })
    }

    // int64 fields arrive as JSON strings.
    fn output_rows(&self) -> Option<u64> {
        match self.statistics.as_ref()?.load.as_ref()?.output_rows.as_ref()? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }
}

/// Loads tables through BigQuery load jobs, polling until each is DONE.
pub struct BigQueryWarehouse {
    client: Client,
    location: Option<String>,
    poll_interval: Duration,
}

impl BigQueryWarehouse {
    /// Build a client from a service account key file, or from application
    /// default credentials when no file is given.
    pub async fn connect(
        credentials_path: Option<&Path>,
        location: Option<String>,
        poll_interval: Duration,
    ) -> Result<Self, WarehouseError> {
        let client = match credentials_path {
            Some(path) => {
                ClientBuilder::new()
                    .build_from_service_account_key_file(&path.to_string_lossy())
                    .await
            }
            None => {
                ClientBuilder::new()
                    .build_from_application_default_credentials()
                    .await
            }
        }
        .context(ConnectSnafu)?;

        Ok(Self {
            client,
            location,
            poll_interval,
        })
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn load_parquet(
        &self,
        table: &TableRef,
        uris: &[String],
    ) -> Result<LoadJob, WarehouseError> {
        let table_name = table.to_string();
        let request: Job =
            serde_json::from_value(load_job_request(table, uris, self.location.as_deref()))
                .context(JobEncodeSnafu { table: &table_name })?;

        let submitted = self
            .client
            .job()
            .insert(&table.project_id, request)
            .await
            .context(SubmitSnafu { table: &table_name })?;
        let mut view = JobView::from_job(&submitted)?;

        let job_id = view
            .job_id()
            .map(str::to_string)
            .context(MissingJobIdSnafu { table: &table_name })?;
        let location = view
            .location()
            .map(str::to_string)
            .or_else(|| self.location.clone());
        info!(job_id = %job_id, table = %table_name, "Submitted load job");

        while !view.is_done() {
            sleep(self.poll_interval).await;
            let job = self
                .client
                .job()
                .get_job(&table.project_id, &job_id, location.as_deref())
                .await
                .context(PollSnafu { job_id: &job_id })?;
            view = JobView::from_job(&job)?;
            debug!(job_id = %job_id, state = ?view.state(), "Polled load job");
        }

        if let Some(message) = view.error_message() {
            return JobFailedSnafu { job_id, message }.fail();
        }

        Ok(LoadJob {
            output_rows: view.output_rows(),
            job_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableRef {
        TableRef::new("enem-project", "dados_enem_2023", "notas").unwrap()
    }

    #[test]
    fn test_request_is_full_replace_parquet() {
        let uris = vec![
            "gs://enem-bucket/silver/parquet/notas/a_notas.parquet".to_string(),
            "gs://enem-bucket/silver/parquet/notas/b_notas.parquet".to_string(),
        ];
        let request = load_job_request(&table(), &uris, None);
        let load = &request["configuration"]["load"];

        assert_eq!(load["writeDisposition"], "WRITE_TRUNCATE");
        assert_eq!(load["sourceFormat"], "PARQUET");
        assert_eq!(load["sourceUris"], json!(uris));
        assert_eq!(load["destinationTable"]["tableId"], "notas");
        assert_eq!(load["destinationTable"]["datasetId"], "dados_enem_2023");
        assert!(request.get("jobReference").is_none());
    }

    #[test]
    fn test_request_carries_location() {
        let request = load_job_request(&table(), &[], Some("southamerica-east1"));
        assert_eq!(request["jobReference"]["location"], "southamerica-east1");
    }

    #[test]
    fn test_request_fits_client_model() {
        let request = load_job_request(&table(), &["gs://b/x.parquet".to_string()], None);
        let job: Job = serde_json::from_value(request).unwrap();
        let round: Value = serde_json::to_value(&job).unwrap();
        assert_eq!(
            round["configuration"]["load"]["writeDisposition"],
            "WRITE_TRUNCATE"
        );
    }

    #[test]
    fn test_job_view_reads_status() {
        let view: JobView = serde_json::from_value(json!({
            "jobReference": {"jobId": "job_1", "location": "US"},
            "status": {
                "state": "DONE",
                "errorResult": {"reason": "invalid", "message": "bad parquet"}
            },
            "statistics": {"load": {"outputRows": "42"}}
        }))
        .unwrap();

        assert_eq!(view.job_id(), Some("job_1"));
        assert_eq!(view.location(), Some("US"));
        assert!(view.is_done());
        assert_eq!(view.error_message().as_deref(), Some("invalid: bad parquet"));
        assert_eq!(view.output_rows(), Some(42));
    }

    #[test]
    fn test_job_view_running() {
        let view: JobView =
            serde_json::from_value(json!({"status": {"state": "RUNNING"}})).unwrap();
        assert!(!view.is_done());
        assert!(view.error_message().is_none());
        assert!(view.job_id().is_none());
    }
}
