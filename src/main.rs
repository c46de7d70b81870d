use clap::Parser;
use fund_sync::adapters::csv_store::read_rows;
use fund_sync::config::{CliConfig, Command};
use fund_sync::core::sync::SyncOptions;
use fund_sync::domain::ports::{Job, RecordStore};
use fund_sync::utils::cancel::CancelFlag;
use fund_sync::utils::error::{ErrorSeverity, Result};
use fund_sync::utils::validation::{validate_file_extension, Validate};
use fund_sync::utils::{logger, prompt};
use fund_sync::{
    CsvStore, DanjuanLookup, DryRunStore, FeishuStore, LocalStorage, RecordSynchronizer,
    RunSummary, SyncConfig, SyncEngine, TaggingJob, Taxonomy, TypeFillJob,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    match run(cli).await {
        Ok(Some(summary)) => println!("\n{}", summary),
        Ok(None) => {}
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

async fn run(cli: CliConfig) -> Result<Option<RunSummary>> {
    let config = SyncConfig::load_or_default(cli.config.as_deref())?;
    config.validate()?;
    if cli.command.is_remote() {
        config.validate_remote()?;
    }
    if let Some(csv) = cli.command.csv_path() {
        validate_file_extension("--csv", csv, &["csv"])?;
    }

    let taxonomy = if cli.command.needs_taxonomy() {
        Taxonomy::from_file(&config.taxonomy.path)?
    } else {
        Taxonomy::new()
    };

    if let Command::Match { name, type_code } = &cli.command {
        let result = config
            .resolver()
            .resolve(type_code.as_deref().unwrap_or_default(), name, &taxonomy);
        println!("{}", result);
        return Ok(None);
    }

    print_rules(&cli, &config, &taxonomy);
    if !cli.yes && !prompt::confirm("確認執行?")? {
        println!("已取消");
        return Ok(None);
    }

    let cancel = CancelFlag::new();
    cancel.listen_for_ctrl_c();
    let monitor = cli.monitor || config.monitoring_enabled();
    let page_size = config.feishu.page_size;

    let summary = match &cli.command {
        Command::Import { csv } => {
            let rows = read_rows(&LocalStorage::default(), csv).await?;
            let options = SyncOptions {
                names: config.fields.clone(),
                rules: config.normalize.clone(),
                throttle: config.throttle.to_throttle(false),
                page_size,
            };
            let store = remote_store(&config, cli.dry_run)?;
            drive(RecordSynchronizer::new(store, rows, options), monitor, &cancel).await?
        }
        Command::Tag => {
            let store = remote_store(&config, cli.dry_run)?;
            let job = TaggingJob::new(store, taxonomy, config.resolver())
                .with_field_names(config.fields.clone())
                .with_throttle(config.throttle.to_throttle(false))
                .with_page_size(page_size);
            drive(job, monitor, &cancel).await?
        }
        Command::TagLocal { csv } => {
            let store = local_store(&config, csv, cli.dry_run).await?;
            let job = TaggingJob::new(store, taxonomy, config.resolver())
                .with_field_names(config.fields.clone())
                .with_throttle(config.throttle.to_throttle(true))
                .with_page_size(page_size);
            drive(job, monitor, &cancel).await?
        }
        Command::FillType => {
            let job = TypeFillJob::new(remote_store(&config, cli.dry_run)?, lookup(&config)?)
                .with_field_names(config.fields.clone())
                .with_throttle(config.throttle.to_throttle(false))
                .with_page_size(page_size);
            drive(job, monitor, &cancel).await?
        }
        Command::FillTypeLocal { csv } => {
            let store = local_store(&config, csv, cli.dry_run).await?;
            let job = TypeFillJob::new(store, lookup(&config)?)
                .with_field_names(config.fields.clone())
                .with_throttle(config.throttle.to_throttle(true))
                .with_page_size(page_size);
            drive(job, monitor, &cancel).await?
        }
        Command::Match { .. } => return Ok(None),
    };

    Ok(Some(summary))
}

async fn drive<J: Job>(job: J, monitor: bool, cancel: &CancelFlag) -> Result<RunSummary> {
    SyncEngine::new(job).with_monitoring(monitor).run(cancel).await
}

fn remote_store(config: &SyncConfig, dry_run: bool) -> Result<Arc<dyn RecordStore>> {
    let store = FeishuStore::new(config.feishu.clone())?.with_retry(config.retry.to_policy());
    Ok(wrap(store, dry_run))
}

async fn local_store(
    config: &SyncConfig,
    csv: &str,
    dry_run: bool,
) -> Result<Arc<dyn RecordStore>> {
    let store = CsvStore::open(LocalStorage::default(), csv, &config.csv, &config.fields).await?;
    Ok(wrap(store, dry_run))
}

fn wrap<S: RecordStore + 'static>(store: S, dry_run: bool) -> Arc<dyn RecordStore> {
    if dry_run {
        tracing::info!("🧪 Dry run: no changes will be written");
        Arc::new(DryRunStore::new(store))
    } else {
        Arc::new(store)
    }
}

fn lookup(config: &SyncConfig) -> Result<DanjuanLookup> {
    Ok(DanjuanLookup::new(&config.lookup)?.with_retry(config.retry.to_policy()))
}

/// 執行前列出本次規則
fn print_rules(cli: &CliConfig, config: &SyncConfig, taxonomy: &Taxonomy) {
    let fields = &config.fields;
    match &cli.command {
        Command::Import { csv } => {
            println!("📥 匯入 {} 到遠端表格", csv);
            println!("   - 以 {} 組合鍵比對既有記錄", fields.key.join(" + "));
            println!("   - 已存在則只更新變動欄位，否則新建");
            println!("   - 數值欄位: {}", config.normalize.numeric_fields.join(", "));
        }
        Command::Tag | Command::TagLocal { .. } => {
            let target = cli.command.csv_path().unwrap_or("遠端表格");
            println!("🏷️  為 {} 加上 {} / {}", target, fields.tag1, fields.tag2);
            println!("   - 標籤庫: {} ({} 個分類)", config.taxonomy.path, taxonomy.len());
            println!("   - 匹配策略: {:?}", config.taxonomy.policy);
            println!("   - 货币型 → 货币，债券型 → 债券，其他類型先按名稱匹配");
            println!("   - 已有兩個標籤的記錄會跳過");
        }
        Command::FillType | Command::FillTypeLocal { .. } => {
            let target = cli.command.csv_path().unwrap_or("遠端表格");
            println!("🔎 為 {} 補齊 {}", target, fields.type_code);
            println!("   - 查詢來源: {}", config.lookup.base_url);
            println!("   - 代碼補零至 6 位，非數字代碼記為 代码格式错误");
            println!(
                "   - 每筆查詢間隔 {}ms，查詢較慢請耐心等待",
                config.throttle.lookup_delay_ms
            );
        }
        Command::Match { .. } => {}
    }
    if cli.dry_run {
        println!("   - 🧪 dry-run: 不會寫入任何變更");
    }
}
