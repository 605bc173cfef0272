use clap::Parser;
use reparto::config::toml_config::TomlConfig;
use reparto::core::ConfigProvider;
use reparto::utils::{logger, validation::Validate};
use reparto::{EtlEngine, LocalStorage, RoutePipeline};

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "Route generation driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "reparto.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON logs instead of the compact console format
    #[arg(long)]
    json_logs: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the zone fallback setting from config
    #[arg(long)]
    zone_fallback: Option<bool>,

    /// Dry run - show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_logger(logger::LogFormat::from_json_flag(args.json_logs), args.verbose);

    tracing::info!("🚀 Starting TOML-based route generation");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    // 載入 TOML 配置
    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 應用命令列覆蓋設定
    if let Some(zone_fallback) = args.zone_fallback {
        config.routing.zone_fallback = zone_fallback;
        tracing::info!("🔧 Zone fallback overridden to: {}", zone_fallback);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");

    // 顯示配置摘要
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config);
        return Ok(());
    }

    // 決定監控設定
    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());

    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = RoutePipeline::new(storage, config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Routes generated successfully!");
            println!("✅ Routes generated successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Route generation failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

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

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!(
        "  Pipeline: {} v{}",
        config.pipeline.name,
        config.pipeline.version.as_deref().unwrap_or("-")
    );
    println!("  Shipments: {}", config.shipments_location());
    println!("  Rule tables: {}", config.source.rules.len());
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.load.output_formats.join(", "));

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TomlConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();

    // 資料來源分析
    println!("📡 Data Sources:");
    println!("  Shipments: {}", config.shipments_location());
    for rule in config.rule_tables() {
        println!("  Rules ({:?}): {}", rule.source, rule.location);
    }
    match config.coordinates_location() {
        Some(location) => println!("  Coordinates: {}", location),
        None => println!("  Coordinates: none, routes keep input order"),
    }
    println!("  Delimiter: {}", config.delimiter());
    if let Some(timeout) = config.request_timeout_seconds() {
        println!("  HTTP timeout: {}s", timeout);
    }

    // 路線設定分析
    let routing = config.routing();
    println!();
    println!("🗺️ Routing:");
    println!(
        "  Depot: {:.6}, {:.6}",
        routing.depot.latitude, routing.depot.longitude
    );
    println!("  Default route: {}", routing.default_label);
    println!(
        "  Zone fallback: {}",
        if routing.zone_fallback { "ZREP_<zone>" } else { "off" }
    );

    // 輸出分析
    println!();
    println!("💾 Output Configuration:");
    println!("  Path: {}", config.output_path());
    println!("  Formats: {}", config.load.output_formats.join(", "));
    match config.bundle_filename() {
        Some(name) => println!("  Compression: {} (ZIP)", name),
        None => println!("  Compression: disabled, loose files"),
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
