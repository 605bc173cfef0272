use clap::Parser;
use reparto::app::pipelines::BacklogJob;
use reparto::utils::{logger, validation::Validate};
use reparto::{BacklogConfig, BacklogPipeline, EtlEngine, LocalStorage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BacklogConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    // 未指定日期時以本地時間的今天為準
    let today = config.today.unwrap_or_else(|| chrono::Local::now().date_naive());
    tracing::info!("⏰ Building backlog report for {}", today);

    let storage = LocalStorage::new(config.output_path.clone());
    let pipeline = BacklogPipeline::new(
        storage,
        BacklogJob {
            source: config.pending.clone(),
            delimiter: config.delimiter.clone(),
            output_path: config.output_path.clone(),
            today,
            timeout_seconds: config.timeout,
        },
    );
    let engine = EtlEngine::new_with_monitoring(pipeline, config.monitor);

    match engine.run().await {
        Ok(output_path) => {
            println!("✅ Backlog report written to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Backlog report failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = e.severity().exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
