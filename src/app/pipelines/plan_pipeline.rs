use crate::core::fetch::fetch_bytes;
use crate::core::plan::{build_plan, PlanOutput};
use crate::core::{Pipeline, Storage};
use crate::utils::error::Result;
use reqwest::Client;

#[derive(Debug, Clone)]
pub struct PlanJob {
    /// Route bundle from a previous run, local path or URL.
    pub bundle: String,
    pub selection: String,
    pub exclude_tokens: Vec<String>,
    pub output_path: String,
    pub plan_name: String,
}

/// 從既有路線包中挑選當日要派送的路線
pub struct PlanPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) job: PlanJob,
    pub(crate) client: Client,
}

impl<S: Storage> PlanPipeline<S> {
    pub fn new(storage: S, job: PlanJob) -> Self {
        Self {
            storage,
            job,
            client: Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for PlanPipeline<S> {
    type Extracted = Vec<u8>;
    type Transformed = PlanOutput;

    async fn extract(&self) -> Result<Vec<u8>> {
        fetch_bytes(&self.client, &self.job.bundle, None).await
    }

    async fn transform(&self, bundle: Vec<u8>) -> Result<PlanOutput> {
        let plan = build_plan(&bundle, &self.job.selection, &self.job.exclude_tokens)?;
        for sheet in &plan.sheets {
            tracing::info!("🗺️ {} ({} stops)", sheet.name, sheet.rows);
        }
        Ok(plan)
    }

    async fn load(&self, plan: PlanOutput) -> Result<String> {
        self.storage.write_file(&self.job.plan_name, &plan.bundle).await?;
        Ok(format!("{}/{}", self.job.output_path, self.job.plan_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::LocalStorage;
    use crate::core::plan::DEFAULT_EXCLUDE_TOKENS;
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    fn route_bundle() -> Vec<u8> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, body) in [
            ("rutas/HOSP.csv", "Parada;Exp\n1;E1\n"),
            ("rutas/ZREP_MORELLA.csv", "Parada;Exp\n1;E2\n"),
            ("rutas/ZREP_07.csv", "Parada;Exp\n1;E3\n2;E4\n"),
        ] {
            zip.start_file::<_, ()>(name, FileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_plan_pipeline_writes_selected_routes() {
        let input = tempfile::TempDir::new().unwrap();
        let output = tempfile::TempDir::new().unwrap();
        let bundle = input.path().join("reparto_output.zip");
        std::fs::write(&bundle, route_bundle()).unwrap();

        let output_path = output.path().to_string_lossy().to_string();
        let pipeline = PlanPipeline::new(
            LocalStorage::new(output_path.clone()),
            PlanJob {
                bundle: bundle.to_string_lossy().to_string(),
                selection: "all".to_string(),
                exclude_tokens: DEFAULT_EXCLUDE_TOKENS.iter().map(|s| s.to_string()).collect(),
                output_path: output_path.clone(),
                plan_name: "PLAN_TEST.zip".to_string(),
            },
        );

        let bytes = pipeline.extract().await.unwrap();
        let plan = pipeline.transform(bytes).await.unwrap();
        let names: Vec<&str> = plan.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["HOSP", "ZREP_07"]);

        let written = pipeline.load(plan).await.unwrap();
        assert_eq!(written, format!("{}/PLAN_TEST.zip", output_path));
        assert!(output.path().join("PLAN_TEST.zip").exists());
    }

    #[tokio::test]
    async fn test_plan_pipeline_rejects_out_of_range_selection() {
        let dir = tempfile::TempDir::new().unwrap();
        let pipeline = PlanPipeline::new(
            LocalStorage::new(dir.path().to_string_lossy().to_string()),
            PlanJob {
                bundle: String::new(),
                selection: "0,5".to_string(),
                exclude_tokens: Vec::new(),
                output_path: String::new(),
                plan_name: "PLAN.zip".to_string(),
            },
        );

        let err = pipeline.transform(route_bundle()).await.unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
