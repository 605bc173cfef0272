use crate::core::backlog::{backlog_filename, build_backlog, render_backlog, BacklogEntry};
use crate::core::fetch::fetch_table;
use crate::core::table::Table;
use crate::core::{Pipeline, Storage};
use crate::utils::error::Result;
use chrono::NaiveDate;
use reqwest::Client;

#[derive(Debug, Clone)]
pub struct BacklogJob {
    /// Pending shipments table, local path or URL.
    pub source: String,
    pub delimiter: String,
    pub output_path: String,
    pub today: NaiveDate,
    pub timeout_seconds: Option<u64>,
}

/// 產生未派送貨件的延誤報表
pub struct BacklogPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) job: BacklogJob,
    pub(crate) client: Client,
}

impl<S: Storage> BacklogPipeline<S> {
    pub fn new(storage: S, job: BacklogJob) -> Self {
        Self {
            storage,
            job,
            client: Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for BacklogPipeline<S> {
    type Extracted = Table;
    type Transformed = Vec<BacklogEntry>;

    async fn extract(&self) -> Result<Table> {
        fetch_table(
            &self.client,
            "pending",
            &self.job.source,
            &self.job.delimiter,
            self.job.timeout_seconds,
        )
        .await
    }

    async fn transform(&self, table: Table) -> Result<Vec<BacklogEntry>> {
        let entries = build_backlog(&table, self.job.today)?;

        let late = entries.iter().filter(|e| e.bucket == "+ de 48").count();
        tracing::info!(
            "⏰ {} pending shipments, {} more than 48h late",
            entries.len(),
            late
        );

        Ok(entries)
    }

    async fn load(&self, entries: Vec<BacklogEntry>) -> Result<String> {
        let filename = backlog_filename(self.job.today);
        let data = render_backlog(&entries, b';')?;

        self.storage.write_file(&filename, &data).await?;
        Ok(format!("{}/{}", self.job.output_path, filename))
    }
}
