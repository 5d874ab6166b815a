use clap::Parser;
use tft_catalog::config::toml_config::TomlConfig;
use tft_catalog::core::etl::{RunPlan, SpotChecks};
use tft_catalog::core::{ConfigProvider, Storage};
use tft_catalog::utils::{logger, validation::Validate};
use tft_catalog::{CatalogPipeline, CliConfig, EtlEngine, EtlError, LocalStorage};

#[tokio::main]
async fn main() {
    let args = CliConfig::parse();

    // 初始化日誌
    if args.log_json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting tft-catalog");
    if args.verbose {
        tracing::debug!("CLI config: {:?}", args);
    }

    let dry_run = args.dry_run;
    let result = match args.config.clone() {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path.display());
            match TomlConfig::from_file(&path) {
                Ok(config) => {
                    let monitor = args.monitor || config.monitoring_enabled();
                    execute(config, monitor, dry_run).await
                }
                Err(e) => Err(e),
            }
        }
        None => {
            let monitor = args.monitor;
            execute(args, monitor, dry_run).await
        }
    };

    if let Err(e) = result {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ Catalog build failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );

        // 輸出用戶友好的錯誤信息
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        std::process::exit(e.exit_code());
    }
}

async fn execute<C>(config: C, monitor: bool, dry_run: bool) -> Result<(), EtlError>
where
    C: ConfigProvider + Validate,
{
    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        return Err(e);
    }
    tracing::info!("✅ Configuration validated");

    let spot_checks = SpotChecks {
        trait_id: config.spot_check_trait(),
        unit_id: config.spot_check_unit(),
    };
    let run_timeout = config.run_timeout();

    if monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 相對路徑以目前目錄為準
    let pipeline = CatalogPipeline::new(LocalStorage::new("."), config)?;
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor)
        .with_timeout(run_timeout)
        .with_spot_checks(spot_checks);

    if dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be downloaded or written");
        let plan = engine.plan().await?;
        report_plan(&engine, &plan);
        return Ok(());
    }

    let summary = engine.run().await?;
    if let Some(persisted) = &summary.persisted {
        tracing::info!("📁 Catalog saved to: {}", persisted.catalog_path.display());
    }

    Ok(())
}

fn report_plan<S, C>(engine: &EtlEngine<CatalogPipeline<S, C>>, plan: &RunPlan)
where
    S: Storage,
    C: ConfigProvider,
{
    plan.summary.log();

    let downloader = engine.pipeline().downloader();
    let cached = plan
        .pending
        .iter()
        .filter(|p| {
            std::fs::metadata(downloader.local_path(p.unit.id))
                .map(|m| m.len() > 0)
                .unwrap_or(false)
        })
        .count();
    let missing_key = plan.pending.iter().filter(|p| p.art_key.is_none()).count();

    tracing::info!(
        "🖼️  {} units resolved: {} images already cached, {} to fetch, {} without an art key",
        plan.pending.len(),
        cached,
        plan.pending.len() - cached,
        missing_key
    );
    let config = engine.pipeline().config();
    tracing::info!(
        "💾 Would write {} and {} under {}",
        config.traits_output_file(),
        config.catalog_output_file(),
        config.output_dir().display()
    );
}
