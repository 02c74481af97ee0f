//! BigQuery REST v2 client implementing [`Warehouse`].
//!
//! Queries and loads are submitted as jobs (`jobs.insert`) and polled with
//! `jobs.get` until the job reports `DONE`. Loads use the multipart upload
//! endpoint so the CSV travels in the same request as the job config.
//! Authentication is a pre-issued OAuth bearer token.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::WarehouseError;
use crate::table::{SchemaField, TableRef};
use crate::warehouse::{QueryStats, Warehouse};

const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com";
const MULTIPART_BOUNDARY: &str = "sdbm_load_boundary_7f3a9c";

pub struct BigQueryClient {
    client: Client,
    api_base: String,
    upload_base: String,
    project: String,
    location: Option<String>,
    token: String,
    poll_interval: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobReferenceRequest<'a> {
    project_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    #[serde(default)]
    status: Option<JobStatus>,
    #[serde(default)]
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct JobStatistics {
    #[serde(default)]
    query: Option<QueryStatistics>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryStatistics {
    #[serde(default)]
    dml_stats: Option<DmlStats>,
}

/// int64 values arrive as JSON strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DmlStats {
    #[serde(default)]
    inserted_row_count: Option<String>,
    #[serde(default)]
    updated_row_count: Option<String>,
    #[serde(default)]
    deleted_row_count: Option<String>,
}

impl DmlStats {
    fn to_query_stats(&self) -> QueryStats {
        let count = |v: &Option<String>| v.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0);
        QueryStats {
            inserted_rows: count(&self.inserted_row_count),
            updated_rows: count(&self.updated_row_count),
            deleted_rows: count(&self.deleted_row_count),
        }
    }
}

impl BigQueryClient {
    /// Client for the public BigQuery endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Http`] if the HTTP client cannot be built.
    pub fn new(
        project: &str,
        access_token: &str,
        location: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, WarehouseError> {
        Self::with_base_url(DEFAULT_BASE_URL, project, access_token, location, timeout_secs)
    }

    /// Same as [`BigQueryClient::new`] against another host (for wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: &str,
        project: &str,
        access_token: &str,
        location: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, WarehouseError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let base = base_url.trim_end_matches('/');

        Ok(Self {
            client,
            api_base: format!("{base}/bigquery/v2"),
            upload_base: format!("{base}/upload/bigquery/v2"),
            project: project.to_owned(),
            location: location.map(str::to_owned),
            token: access_token.to_owned(),
            poll_interval: Duration::from_secs(1),
        })
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn job_reference(&self) -> JobReferenceRequest<'_> {
        JobReferenceRequest {
            project_id: &self.project,
            location: self.location.as_deref(),
        }
    }

    async fn wait_for_job(&self, mut job: Job) -> Result<Job, WarehouseError> {
        loop {
            if let Some(status) = &job.status {
                if status.state == "DONE" {
                    if let Some(error) = &status.error_result {
                        return Err(WarehouseError::Job {
                            job_id: job.job_reference.job_id.clone(),
                            message: match &error.reason {
                                Some(reason) => format!("{reason}: {}", error.message),
                                None => error.message.clone(),
                            },
                        });
                    }
                    return Ok(job);
                }
            }

            tokio::time::sleep(self.poll_interval).await;
            let url = format!(
                "{}/projects/{}/jobs/{}",
                self.api_base, self.project, job.job_reference.job_id
            );
            let mut request = self.client.get(&url).bearer_auth(&self.token);
            let location = job.job_reference.location.as_deref().or(self.location.as_deref());
            if let Some(location) = location {
                request = request.query(&[("location", location)]);
            }
            let response = request.send().await?;
            job = parse_job(response, "jobs.get").await?;
            tracing::debug!(
                job_id = %job.job_reference.job_id,
                state = job.status.as_ref().map_or("UNKNOWN", |s| s.state.as_str()),
                "polled warehouse job"
            );
        }
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    async fn run_query(&self, sql: &str) -> Result<QueryStats, WarehouseError> {
        let url = format!("{}/projects/{}/jobs", self.api_base, self.project);
        let body = json!({
            "jobReference": self.job_reference(),
            "configuration": {
                "query": {
                    "query": sql,
                    "useLegacySql": false,
                }
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let job = parse_job(response, "jobs.insert(query)").await?;
        tracing::debug!(job_id = %job.job_reference.job_id, "query job submitted");

        let job = self.wait_for_job(job).await?;
        Ok(job
            .statistics
            .and_then(|s| s.query)
            .and_then(|q| q.dml_stats)
            .map(|d| d.to_query_stats())
            .unwrap_or_default())
    }

    async fn load_csv(
        &self,
        path: &Path,
        table: &TableRef,
        schema: &[SchemaField],
    ) -> Result<(), WarehouseError> {
        let data = tokio::fs::read(path).await.map_err(|e| WarehouseError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let metadata = json!({
            "jobReference": self.job_reference(),
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": table.project,
                        "datasetId": table.dataset,
                        "tableId": table.table,
                    },
                    "schema": { "fields": schema },
                    "sourceFormat": "CSV",
                    "skipLeadingRows": 1,
                    "autodetect": false,
                    "createDisposition": "CREATE_IF_NEEDED",
                    "writeDisposition": "WRITE_TRUNCATE",
                }
            }
        });

        let url = format!("{}/projects/{}/jobs", self.upload_base, self.project);
        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "multipart")])
            .bearer_auth(&self.token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(multipart_related(&metadata.to_string(), &data))
            .send()
            .await?;
        let job = parse_job(response, "jobs.insert(load)").await?;
        tracing::debug!(job_id = %job.job_reference.job_id, table = %table, "load job submitted");

        self.wait_for_job(job).await?;
        Ok(())
    }

    async fn drop_table(&self, table: &TableRef) -> Result<(), WarehouseError> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}",
            self.api_base, table.project, table.dataset, table.table
        );
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 404 {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(WarehouseError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

async fn parse_job(response: Response, context: &str) -> Result<Job, WarehouseError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(WarehouseError::Api {
            status: status.as_u16(),
            body: text,
        });
    }
    serde_json::from_str(&text).map_err(|e| WarehouseError::Deserialize {
        context: context.to_owned(),
        source: e,
    })
}

fn multipart_related(metadata: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + data.len() + 256);
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{MULTIPART_BOUNDARY}\r\nContent-Type: text/csv\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}
