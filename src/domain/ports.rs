use crate::domain::model::{RoutingOptions, RuleSource};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTableSource {
    pub location: String,
    pub source: RuleSource,
}

pub trait ConfigProvider: Send + Sync {
    fn shipments_location(&self) -> &str;
    fn rule_tables(&self) -> Vec<RuleTableSource>;
    fn coordinates_location(&self) -> Option<&str>;
    fn output_path(&self) -> &str;
    /// `auto`, `;`, `,`, `|` or `tab`.
    fn delimiter(&self) -> &str;
    fn routing(&self) -> RoutingOptions;
    fn output_formats(&self) -> Vec<String> {
        vec!["csv".to_string()]
    }
    /// Zip bundle name; `None` writes loose files.
    fn bundle_filename(&self) -> Option<String> {
        Some("reparto_output.zip".to_string())
    }
    fn request_timeout_seconds(&self) -> Option<u64> {
        None
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Extracted: Send;
    type Transformed: Send;

    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<Self::Transformed>;
    async fn load(&self, result: Self::Transformed) -> Result<String>;
}
