use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting ETL process...");
        self.monitor.log_stats("Start");

        tracing::info!("📥 Extracting data...");
        let extracted = self.pipeline.extract().await?;
        self.monitor.log_stats("Extract");

        tracing::info!("🔄 Transforming data...");
        let transformed = self.pipeline.transform(extracted).await?;
        self.monitor.log_stats("Transform");

        tracing::info!("💾 Loading data...");
        let output_path = self.pipeline.load(transformed).await?;
        self.monitor.log_stats("Load");

        tracing::info!("📁 Output saved to: {}", output_path);
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPipeline {
        loads: AtomicUsize,
        fail_transform: bool,
    }

    #[async_trait]
    impl Pipeline for CountingPipeline {
        type Extracted = Vec<u32>;
        type Transformed = u32;

        async fn extract(&self) -> Result<Vec<u32>> {
            Ok(vec![1, 2, 3])
        }

        async fn transform(&self, data: Vec<u32>) -> Result<u32> {
            if self.fail_transform {
                return Err(EtlError::ProcessingError {
                    message: "boom".to_string(),
                });
            }
            Ok(data.iter().sum())
        }

        async fn load(&self, result: u32) -> Result<String> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(format!("total={}", result))
        }
    }

    #[tokio::test]
    async fn test_engine_runs_phases_in_order() {
        let engine = EtlEngine::new(CountingPipeline {
            loads: AtomicUsize::new(0),
            fail_transform: false,
        });

        assert_eq!(engine.run().await.unwrap(), "total=6");
        assert_eq!(engine.pipeline().loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_engine_stops_on_transform_error() {
        let engine = EtlEngine::new_with_monitoring(
            CountingPipeline {
                loads: AtomicUsize::new(0),
                fail_transform: true,
            },
            true,
        );

        assert!(engine.run().await.is_err());
        assert_eq!(engine.pipeline().loads.load(Ordering::SeqCst), 0);
    }
}
