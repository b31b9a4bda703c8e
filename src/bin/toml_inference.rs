use clap::Parser;
use satellite_inference::core::raster::list_scene_files;
use satellite_inference::core::ConfigProvider;
use satellite_inference::utils::{logger, validation::Validate};
use satellite_inference::{ChangeEngine, ChangePipeline, LocalStorage, TomlConfig};
use std::path::Path;

#[derive(Parser)]
#[command(name = "toml-inference")]
#[command(about = "Change analysis driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/settings.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the bundle setting from config
    #[arg(long)]
    bundle: Option<bool>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Dry run - list the scenes that would be compared without processing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.log_json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting TOML-based change analysis");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 命令列覆蓋設定
    if let Some(bundle) = args.bundle {
        config.load.bundle = Some(bundle);
        tracing::info!("🔧 Bundle output overridden to: {}", bundle);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config)?;
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = ChangePipeline::new(storage, config);
    let engine = ChangeEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Analysis completed successfully!");
            println!("✅ Analysis completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Analysis failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

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
        "  Analysis: {} v{}",
        config.analysis.name,
        config.analysis.version.as_deref().unwrap_or("-")
    );
    println!("  Scenes: {}", config.data_dir());
    println!("  Output: {}", config.output_path());
    println!("  Pixel area: {} m²", config.pixel_area_m2());
    println!(
        "  Heatmaps: {} (band {}, range ±{}, significance {})",
        if config.render_enabled() { "on" } else { "off" },
        config.render_band(),
        config.display_range(),
        config.significance_ratio()
    );
    if let Some(source) = config.price_source() {
        println!(
            "  Prices: {} ({})",
            source,
            config.ticker().unwrap_or("ticker from file name")
        );
    }
    println!("  Bundle: {}", config.bundle_enabled());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
}

fn perform_dry_run(config: &TomlConfig) -> satellite_inference::Result<()> {
    let files = list_scene_files(Path::new(config.data_dir()))?;

    println!("🔍 Scenes that would be loaded:");
    for file in &files {
        let dated = satellite_inference::core::dating::scene_date(file)
            .map(|(date, source)| format!("{} ({:?})", date, source))
            .unwrap_or_else(|e| format!("undated: {}", e));
        println!("  {} → {}", file.display(), dated);
    }
    if files.len() < 2 {
        println!("⚠️  Fewer than two scenes, nothing would be compared");
    }

    Ok(())
}
