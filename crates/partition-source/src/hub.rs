use crate::auth::default_headers;
use crate::descriptor::PartitionDescriptor;
use crate::error::SourceError;
use crate::plan::{vstack_all, ScanPlan};
use crate::ranged::{fetch_columns, ParquetFooter, RangeRead};
use crate::responses::{HubErrorResponse, TreeEntry};
use crate::PartitionSource;
use async_trait::async_trait;
use configuration::RemoteConfig;
use core_types::columns::YEAR_COLUMN;
use core_types::PartitionYear;
use polars::prelude::*;
use reqwest::header::{RANGE, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use std::collections::HashMap;
use std::io::Cursor;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Reads the dataset's hive-partitioned parquet files (`{prefix}/year=YYYY/*.parquet`)
/// from a Hugging Face-compatible hub.
///
/// Schemas come from parquet footers fetched with range reads, and projected
/// scans fetch only the column chunks they decode. File listings, footers and
/// partition schemas are memoized; partition data is not, that is the
/// partition cache's job.
pub struct HuggingFaceSource {
    client: reqwest::Client,
    endpoint: String,
    dataset: String,
    revision: String,
    partition_prefix: String,
    credential: Option<String>,
    listings: RwLock<HashMap<PartitionYear, Arc<Vec<TreeEntry>>>>,
    schemas: RwLock<HashMap<PartitionYear, Vec<String>>>,
    footers: RwLock<HashMap<String, Arc<ParquetFooter>>>,
}

impl HuggingFaceSource {
    pub fn new(config: &RemoteConfig) -> Result<Self, SourceError> {
        let credential = config.access_token.clone().filter(|t| !t.is_empty());
        let client = reqwest::Client::builder()
            .default_headers(default_headers(credential.as_deref())?)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            dataset: config.dataset.clone(),
            revision: config.revision.clone(),
            partition_prefix: config.partition_prefix.trim_matches('/').to_string(),
            credential,
            listings: RwLock::new(HashMap::new()),
            schemas: RwLock::new(HashMap::new()),
            footers: RwLock::new(HashMap::new()),
        })
    }

    /// Repository-relative directory of one yearly partition.
    pub fn partition_path(&self, year: PartitionYear) -> String {
        format!("{}/{}={}", self.partition_prefix, YEAR_COLUMN, year)
    }

    pub fn tree_url(&self, year: PartitionYear) -> String {
        format!(
            "{}/api/datasets/{}/tree/{}/{}",
            self.endpoint,
            self.dataset,
            self.revision,
            self.partition_path(year)
        )
    }

    pub fn file_url(&self, path: &str) -> String {
        format!(
            "{}/datasets/{}/resolve/{}/{}",
            self.endpoint, self.dataset, self.revision, path
        )
    }

    /// Lists the parquet files of a partition, sorted by path.
    async fn list_files(&self, year: PartitionYear) -> Result<Arc<Vec<TreeEntry>>, SourceError> {
        if let Some(files) = self.listings.read().await.get(&year) {
            return Ok(Arc::clone(files));
        }

        let url = self.tree_url(year);
        tracing::debug!(%year, %url, "Listing partition files.");
        let response = self.client.get(&url).send().await?;
        let response = check_status(response, year).await?;
        let text = response.text().await?;
        let entries: Vec<TreeEntry> = serde_json::from_str(&text)?;

        let mut files: Vec<TreeEntry> = entries.into_iter().filter(TreeEntry::is_parquet_file).collect();
        if files.is_empty() {
            return Err(SourceError::PartitionNotFound(year));
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let files = Arc::new(files);
        self.listings.write().await.insert(year, Arc::clone(&files));
        Ok(files)
    }

    async fn download(&self, year: PartitionYear, path: &str) -> Result<Vec<u8>, SourceError> {
        let url = self.file_url(path);
        tracing::debug!(%year, %url, "Downloading partition file.");
        let response = self.client.get(&url).send().await?;
        let response = check_status(response, year).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// The footer of one file. Listings that carry a size allow two small range
    /// reads; otherwise the whole file is fetched.
    async fn footer(&self, year: PartitionYear, entry: &TreeEntry) -> Result<Arc<ParquetFooter>, SourceError> {
        if let Some(footer) = self.footers.read().await.get(&entry.path) {
            return Ok(Arc::clone(footer));
        }

        let footer = match entry.size {
            Some(size) => ParquetFooter::fetch(&self.objects(year), &entry.path, size).await?,
            None => ParquetFooter::from_file(&entry.path, &self.download(year, &entry.path).await?)?,
        };
        let footer = Arc::new(footer);
        self.footers
            .write()
            .await
            .insert(entry.path.clone(), Arc::clone(&footer));
        Ok(footer)
    }

    /// Fetches the bytes a plan needs from one file: only the projected column
    /// chunks when the plan narrows the columns, the whole file otherwise.
    async fn fetch_for_plan(
        &self,
        year: PartitionYear,
        entry: &TreeEntry,
        plan: &ScanPlan,
    ) -> Result<(Vec<u8>, Vec<String>), SourceError> {
        if entry.size.is_none() {
            let body = self.download(year, &entry.path).await?;
            let available = ParquetFooter::from_file(&entry.path, &body)?.columns()?;
            return Ok((body, available));
        }

        let footer = self.footer(year, entry).await?;
        let available = footer.columns()?;
        match plan.storage_columns(&available) {
            Some(columns) if !columns.is_empty() => {
                tracing::debug!(%year, path = %entry.path, ?columns, "Fetching projected column chunks.");
                let image = fetch_columns(&self.objects(year), &entry.path, &footer, &columns).await?;
                Ok((image, available))
            }
            _ => Ok((self.download(year, &entry.path).await?, available)),
        }
    }

    fn objects(&self, year: PartitionYear) -> HubObjects<'_> {
        HubObjects { source: self, year }
    }
}

/// Range reads against the files of one partition.
struct HubObjects<'a> {
    source: &'a HuggingFaceSource,
    year: PartitionYear,
}

#[async_trait]
impl RangeRead for HubObjects<'_> {
    async fn read_range(&self, path: &str, range: Range<u64>) -> Result<Vec<u8>, SourceError> {
        let url = self.source.file_url(path);
        let bytes = format!("bytes={}-{}", range.start, range.end.saturating_sub(1));
        tracing::trace!(year = %self.year, %url, %bytes, "Range read.");
        let response = self.source.client.get(&url).header(RANGE, bytes).send().await?;
        let response = check_status(response, self.year).await?;
        let partial = response.status() == StatusCode::PARTIAL_CONTENT;
        let body = response.bytes().await?;
        if partial {
            return Ok(body.to_vec());
        }

        // The server ignored the range and sent the whole object.
        let (Ok(start), Ok(end)) = (usize::try_from(range.start), usize::try_from(range.end)) else {
            return Err(SourceError::Malformed(format!("{path}: range out of bounds")));
        };
        body.get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| SourceError::Malformed(format!("{path}: range {start}..{end} past the end")))
    }
}

#[async_trait]
impl PartitionSource for HuggingFaceSource {
    fn descriptor(&self, year: PartitionYear) -> PartitionDescriptor {
        let locator = format!(
            "{}/datasets/{}/tree/{}/{}",
            self.endpoint,
            self.dataset,
            self.revision,
            self.partition_path(year)
        );
        PartitionDescriptor::new(year, locator, self.credential.clone())
    }

    async fn schema(&self, year: PartitionYear) -> Result<Vec<String>, SourceError> {
        if let Some(columns) = self.schemas.read().await.get(&year) {
            return Ok(columns.clone());
        }

        let files = self.list_files(year).await?;
        let Some(first) = files.first() else {
            return Err(SourceError::PartitionNotFound(year));
        };
        let mut columns = self.footer(year, first).await?.columns()?;
        if !columns.iter().any(|c| c == YEAR_COLUMN) {
            columns.push(YEAR_COLUMN.to_string());
        }

        self.schemas.write().await.insert(year, columns.clone());
        Ok(columns)
    }

    async fn execute(&self, plan: &ScanPlan) -> Result<DataFrame, SourceError> {
        let year = plan.year();
        let files = self.list_files(year).await?;

        let mut frames = Vec::with_capacity(files.len());
        let mut rows = 0usize;
        for entry in files.iter() {
            let (body, available) = self.fetch_for_plan(year, entry, plan).await?;
            let file_plan = plan.clone();
            let frame = tokio::task::spawn_blocking(move || decode_file(&body, &available, &file_plan))
                .await
                .map_err(|e| SourceError::Task(e.to_string()))??;

            rows += frame.height();
            frames.push(frame);

            // Files are independent, so once the cap is met the rest are never fetched.
            if plan.row_limit().is_some_and(|limit| rows >= limit) {
                break;
            }
        }

        let mut combined = vstack_all(frames)?;
        if let Some(limit) = plan.row_limit() {
            combined = combined.head(Some(limit));
        }
        tracing::debug!(%year, rows = combined.height(), "Executed remote scan.");
        Ok(combined)
    }
}

/// Maps non-success responses onto the structured error taxonomy.
async fn check_status(response: Response, year: PartitionYear) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after_secs = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, retry_after_secs, &body, year))
}

pub(crate) fn classify_status(
    status: StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
    year: PartitionYear,
) -> SourceError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited { retry_after_secs },
        StatusCode::NOT_FOUND => SourceError::PartitionNotFound(year),
        _ => {
            let message = serde_json::from_str::<HubErrorResponse>(body)
                .map(|e| e.error)
                .unwrap_or_else(|_| body.to_string());
            SourceError::Remote {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// Decodes one parquet file image, reading only the columns the plan needs,
/// and runs the plan over it. Bytes outside the decoded chunks are never read.
fn decode_file(bytes: &[u8], available: &[String], plan: &ScanPlan) -> Result<DataFrame, SourceError> {
    let mut reader = ParquetReader::new(Cursor::new(bytes));
    if let Some(columns) = plan.storage_columns(available) {
        reader = reader.with_columns(Some(columns));
    }
    let frame = reader.finish()?;
    Ok(plan.execute(frame)?)
}
