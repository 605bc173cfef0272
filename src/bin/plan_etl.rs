use clap::Parser;
use reparto::app::pipelines::PlanJob;
use reparto::core::fetch::fetch_bytes;
use reparto::core::plan::{bundle_routes, default_plan_name, eligible_routes};
use reparto::utils::{logger, validation::Validate};
use reparto::{EtlEngine, LocalStorage, PlanConfig, PlanPipeline};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = PlanConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    // 只列出可選路線
    if config.list {
        let client = reqwest::Client::new();
        let listed = fetch_bytes(&client, &config.bundle, None)
            .await
            .and_then(|bytes| bundle_routes(&bytes));
        match listed {
            Ok(routes) => {
                println!("🗺️ Eligible routes:");
                for (index, name) in eligible_routes(&routes, &config.exclude).iter().enumerate() {
                    println!("  [{}] {}", index, name);
                }
            }
            Err(e) => {
                eprintln!("❌ {}", e.user_friendly_message());
                std::process::exit(e.severity().exit_code());
            }
        }
        return Ok(());
    }

    let plan_name = config
        .name
        .clone()
        .unwrap_or_else(|| default_plan_name(chrono::Local::now().naive_local()));

    let storage = LocalStorage::new(config.output_path.clone());
    let pipeline = PlanPipeline::new(
        storage,
        PlanJob {
            bundle: config.bundle.clone(),
            selection: config.select.clone().unwrap_or_default(),
            exclude_tokens: config.exclude.clone(),
            output_path: config.output_path.clone(),
            plan_name,
        },
    );
    let engine = EtlEngine::new(pipeline);

    match engine.run().await {
        Ok(output_path) => {
            println!("✅ Plan written to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Plan failed: {} (Category: {:?}, Severity: {:?})",
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
